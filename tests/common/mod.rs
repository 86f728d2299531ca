// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Common test utilities for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Namespace;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::{
    api::{Api, DeleteParams, PostParams},
    client::Client,
};
use private_dns::dns_errors::InstanceSourceError;
use private_dns::instance::InstanceIdentity;
use private_dns::instance_source::InstanceSource;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

/// Get a Kubernetes client or skip the test if not in a cluster
pub async fn get_kube_client_or_skip() -> Option<Client> {
    match Client::try_default().await {
        Ok(client) => Some(client),
        Err(e) => {
            eprintln!("Skipping integration test: not running in Kubernetes cluster: {e}");
            None
        }
    }
}

/// Create a test namespace
pub async fn create_test_namespace(
    client: &Client,
    name: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let namespaces: Api<Namespace> = Api::all(client.clone());

    let mut labels = BTreeMap::new();
    labels.insert("test".to_string(), "integration".to_string());
    labels.insert("managed-by".to_string(), "private-dns-test".to_string());

    let ns = Namespace {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            labels: Some(labels),
            ..Default::default()
        },
        ..Default::default()
    };

    match namespaces.create(&PostParams::default(), &ns).await {
        Ok(_) => Ok(()),
        Err(kube::Error::Api(ae)) if ae.code == 409 => Ok(()),
        Err(e) => Err(Box::new(e)),
    }
}

/// Cleanup test namespace
pub async fn cleanup_test_namespace(
    client: &Client,
    name: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let namespaces: Api<Namespace> = Api::all(client.clone());

    match namespaces.delete(name, &DeleteParams::default()).await {
        Ok(_) => Ok(()),
        Err(kube::Error::Api(ae)) if ae.code == 404 => Ok(()),
        Err(e) => Err(Box::new(e)),
    }
}

/// In-memory pod source standing in for the Kubernetes API.
#[derive(Default)]
pub struct FakePods {
    pods: Mutex<HashMap<String, InstanceIdentity>>,
}

impl FakePods {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a pod.
    pub fn put(&self, pod: InstanceIdentity) {
        self.pods.lock().unwrap().insert(pod.name.clone(), pod);
    }

    /// Remove a pod.
    pub fn remove(&self, name: &str) {
        self.pods.lock().unwrap().remove(name);
    }
}

#[async_trait]
impl InstanceSource for FakePods {
    async fn list(&self) -> Result<Vec<InstanceIdentity>, InstanceSourceError> {
        let mut pods: Vec<InstanceIdentity> = self.pods.lock().unwrap().values().cloned().collect();
        pods.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(pods)
    }

    async fn get(&self, name: &str) -> Result<Option<InstanceIdentity>, InstanceSourceError> {
        Ok(self.pods.lock().unwrap().get(name).cloned())
    }
}

/// A pod owned by `owner` in the default namespace.
pub fn pod(name: &str, owner: &str, ip: &str) -> InstanceIdentity {
    InstanceIdentity::new(name, Some(owner), "default", ip)
}
