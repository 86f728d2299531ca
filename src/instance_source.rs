// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! On-demand pod lookups.
//!
//! The reconciler needs a point lookup while it waits for a pod IP, and the periodic scan
//! needs a full point-in-time listing. Both go through [`InstanceSource`] so the core can
//! be exercised without a cluster.

use crate::constants::KUBE_LIST_PAGE_SIZE;
use crate::dns_errors::InstanceSourceError;
use crate::instance::InstanceIdentity;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use kube::api::ListParams;
use kube::Api;
use tracing::debug;

/// Lookups of the watched pods, scoped to one namespace and label selector.
#[async_trait]
pub trait InstanceSource: Send + Sync {
    /// Every pod currently matching the selector.
    async fn list(&self) -> Result<Vec<InstanceIdentity>, InstanceSourceError>;

    /// The current state of pod `name`, or `None` if it no longer exists.
    async fn get(&self, name: &str) -> Result<Option<InstanceIdentity>, InstanceSourceError>;
}

/// [`InstanceSource`] backed by the Kubernetes API.
#[derive(Clone)]
pub struct KubeInstanceSource {
    api: Api<Pod>,
    label_selector: Option<String>,
}

impl KubeInstanceSource {
    /// Create a source over `api` (already scoped to a namespace), filtered by
    /// `label_selector` (e.g. `app=web`). An empty selector matches every pod.
    pub fn new(api: Api<Pod>, label_selector: Option<String>) -> Self {
        Self {
            api,
            label_selector: label_selector.filter(|s| !s.is_empty()),
        }
    }

    /// The label selector applied to every lookup.
    #[must_use]
    pub fn label_selector(&self) -> Option<&str> {
        self.label_selector.as_deref()
    }
}

/// List parameters for the watched pods: first page of [`KUBE_LIST_PAGE_SIZE`], filtered
/// by `label_selector` when one is set.
#[must_use]
pub fn pod_list_params(label_selector: Option<&str>) -> ListParams {
    let params = ListParams::default().limit(KUBE_LIST_PAGE_SIZE);
    match label_selector.filter(|s| !s.is_empty()) {
        Some(selector) => params.labels(selector),
        None => params,
    }
}

/// List every pod matching `list_params`, one page of [`KUBE_LIST_PAGE_SIZE`] at a time.
///
/// # Errors
///
/// Returns an error if any page cannot be fetched.
pub async fn list_pods_paginated(
    api: &Api<Pod>,
    mut list_params: ListParams,
) -> Result<Vec<Pod>, InstanceSourceError> {
    list_params.limit = Some(KUBE_LIST_PAGE_SIZE);

    let mut all_pods = Vec::new();
    let mut page_count = 0;

    loop {
        page_count += 1;
        let page = api
            .list(&list_params)
            .await
            .map_err(|source| InstanceSourceError::Kube {
                operation: "listing pods".to_string(),
                source,
            })?;

        let pods_in_page = page.items.len();
        all_pods.extend(page.items);

        debug!(
            page = page_count,
            items_in_page = pods_in_page,
            total_items = all_pods.len(),
            "Fetched page of pods from Kubernetes API"
        );

        match page.metadata.continue_ {
            Some(token) if !token.is_empty() => list_params.continue_token = Some(token),
            _ => break,
        }
    }

    Ok(all_pods)
}

#[async_trait]
impl InstanceSource for KubeInstanceSource {
    async fn list(&self) -> Result<Vec<InstanceIdentity>, InstanceSourceError> {
        let pods =
            list_pods_paginated(&self.api, pod_list_params(self.label_selector())).await?;
        Ok(pods.iter().map(InstanceIdentity::from).collect())
    }

    async fn get(&self, name: &str) -> Result<Option<InstanceIdentity>, InstanceSourceError> {
        let pod = self
            .api
            .get_opt(name)
            .await
            .map_err(|source| InstanceSourceError::Kube {
                operation: format!("getting pod {name}"),
                source,
            })?;
        Ok(pod.as_ref().map(InstanceIdentity::from))
    }
}

#[cfg(test)]
#[path = "instance_source_tests.rs"]
mod instance_source_tests;
