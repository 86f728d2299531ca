// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Pod informer.
//!
//! Turns the kube watcher stream into the ordered [`InstanceEvent`] stream the reconciler
//! consumes:
//!
//! - the initial listing produces `Added` for every pod
//! - later applies produce `Added` for unseen pods and `Updated { old, new }` for known ones
//! - deletes produce `Deleted`
//! - a re-list (after a watch expiry) produces `Updated` for pods still present and
//!   `Deleted` for pods that vanished while the watch was down
//!
//! Every resync interval the informer re-delivers `Updated(cached, cached)` for every known
//! pod so a pod stuck in the pending set gets another chance even if it never changes.

use crate::instance::{InstanceEvent, InstanceIdentity};
use anyhow::{bail, Result};
use futures::StreamExt;
use k8s_openapi::api::core::v1::Pod;
use kube::runtime::watcher::{self, Event};
use kube::runtime::WatchStreamExt;
use kube::Api;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Cache of known pods that translates watcher events into lifecycle events.
#[derive(Debug, Default)]
pub struct EventTranslator {
    known: HashMap<String, InstanceIdentity>,
    relisted: Option<HashSet<String>>,
}

impl EventTranslator {
    /// Empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of pods currently cached.
    #[must_use]
    pub fn len(&self) -> usize {
        self.known.len()
    }

    /// Returns true if no pod is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.known.is_empty()
    }

    /// Translate one watcher event.
    pub fn translate(&mut self, event: Event<Pod>) -> Vec<InstanceEvent> {
        match event {
            Event::Init => {
                self.relisted = Some(HashSet::new());
                Vec::new()
            }
            Event::InitApply(pod) => {
                let instance = InstanceIdentity::from(&pod);
                if let Some(relisted) = self.relisted.as_mut() {
                    relisted.insert(instance.name.clone());
                }
                vec![self.apply(instance)]
            }
            Event::InitDone => {
                let Some(relisted) = self.relisted.take() else {
                    return Vec::new();
                };
                let mut vanished: Vec<String> = self
                    .known
                    .keys()
                    .filter(|name| !relisted.contains(*name))
                    .cloned()
                    .collect();
                vanished.sort();
                vanished
                    .into_iter()
                    .filter_map(|name| self.known.remove(&name))
                    .map(InstanceEvent::Deleted)
                    .collect()
            }
            Event::Apply(pod) => vec![self.apply(InstanceIdentity::from(&pod))],
            Event::Delete(pod) => {
                let instance = InstanceIdentity::from(&pod);
                let instance = match self.known.remove(&instance.name) {
                    Some(cached) if !instance.has_ip() => instance.with_ip(cached.ip),
                    _ => instance,
                };
                vec![InstanceEvent::Deleted(instance)]
            }
        }
    }

    /// `Updated(cached, cached)` for every known pod, ordered by name.
    #[must_use]
    pub fn resync(&self) -> Vec<InstanceEvent> {
        let mut instances: Vec<&InstanceIdentity> = self.known.values().collect();
        instances.sort_by(|a, b| a.name.cmp(&b.name));
        instances
            .into_iter()
            .map(|instance| InstanceEvent::Updated {
                old: instance.clone(),
                new: instance.clone(),
            })
            .collect()
    }

    fn apply(&mut self, instance: InstanceIdentity) -> InstanceEvent {
        match self.known.insert(instance.name.clone(), instance.clone()) {
            Some(old) => InstanceEvent::Updated { old, new: instance },
            None => InstanceEvent::Added(instance),
        }
    }
}

/// Send `events` in order. Returns false if the receiver is gone or shutdown was requested.
async fn forward(
    tx: &mpsc::Sender<InstanceEvent>,
    events: Vec<InstanceEvent>,
    cancel: &CancellationToken,
) -> bool {
    for event in events {
        debug!(event = event.kind(), pod = %event.instance().name, "Delivering pod event");
        tokio::select! {
            () = cancel.cancelled() => return false,
            sent = tx.send(event) => {
                if sent.is_err() {
                    return false;
                }
            }
        }
    }
    true
}

/// Watch pods through `api` and feed lifecycle events into `tx` until shutdown.
///
/// # Errors
///
/// Returns an error if the watch stream terminates unexpectedly.
pub async fn run_pod_informer(
    api: Api<Pod>,
    label_selector: Option<String>,
    tx: mpsc::Sender<InstanceEvent>,
    resync_interval: Duration,
    cancel: CancellationToken,
) -> Result<()> {
    let mut config = watcher::Config::default();
    if let Some(selector) = label_selector.as_deref().filter(|s| !s.is_empty()) {
        config = config.labels(selector);
    }

    info!(
        label_selector = label_selector.as_deref().unwrap_or(""),
        resync_interval = ?resync_interval,
        "Starting pod informer"
    );

    let mut stream = watcher::watcher(api, config).default_backoff().boxed();
    let mut translator = EventTranslator::new();
    let mut resync = interval_at(Instant::now() + resync_interval, resync_interval);
    resync.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        let batch = tokio::select! {
            () = cancel.cancelled() => {
                info!("Pod informer stopping");
                return Ok(());
            }
            _ = resync.tick() => {
                debug!(cached = translator.len(), "Resyncing cached pods");
                translator.resync()
            }
            item = stream.next() => match item {
                Some(Ok(event)) => translator.translate(event),
                Some(Err(e)) => {
                    warn!(error = %e, "Pod watch failed, backing off");
                    continue;
                }
                None => bail!("Pod watch stream ended"),
            },
        };

        if !forward(&tx, batch, &cancel).await {
            info!("Pod informer stopping");
            return Ok(());
        }
    }
}

#[cfg(test)]
#[path = "informer_tests.rs"]
mod informer_tests;
