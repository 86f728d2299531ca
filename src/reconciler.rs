// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Event-driven reconciliation.
//!
//! The [`Reconciler`] consumes pod lifecycle events one at a time, in delivery order, and
//! keeps the zone's A records in step with them:
//!
//! | Event                      | Action                                                  |
//! |----------------------------|---------------------------------------------------------|
//! | `Added` with an IP         | write the record                                        |
//! | `Added` without an IP      | poll the pod until it has one, then write the record;   |
//! |                            | on timeout remember the pod as pending                  |
//! | `Updated` of a pending pod | write the record once the update carries an IP          |
//! | `Updated` otherwise        | ignored                                                 |
//! | `Deleted`                  | forget the pending entry and delete the record if it    |
//! |                            | still points at the pod's IP                            |
//!
//! The pending set lives here and nowhere else: the periodic scan never sees it.
//! A failed event is logged and counted; the loop always moves on to the next event.

use crate::constants::IP_RESOLUTION_POLL_INTERVAL_SECS;
use crate::dns_errors::{NamingError, SyncError};
use crate::instance::{InstanceEvent, InstanceIdentity};
use crate::instance_source::InstanceSource;
use crate::metrics;
use crate::naming::RecordNamer;
use crate::record_store::{CreateOutcome, DeleteOutcome, RecordStore};
use crate::retry::{poll_until, PollOutcome};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// What handling one event did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    /// The pod's record was written (or already correct)
    Synced(CreateOutcome),
    /// The pod's record was deleted, or was already gone or owned by another IP
    Removed(DeleteOutcome),
    /// No IP within the timeout; the pod is now pending
    Pending,
    /// The pod disappeared while waiting for its IP
    Vanished,
    /// Nothing to do for this event
    Ignored,
    /// No record name can be derived for the pod
    Skipped,
    /// Shutdown interrupted the IP wait
    Cancelled,
}

impl EventOutcome {
    /// Short label for logs and metrics.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Synced(_) | Self::Removed(_) => "synced",
            Self::Pending => "pending",
            Self::Vanished => "vanished",
            Self::Ignored => "ignored",
            Self::Skipped => "skipped",
            Self::Cancelled => "cancelled",
        }
    }
}

enum IpResolution {
    Resolved(InstanceIdentity),
    Vanished,
    /// Carries the last state read from the source, if any lookup succeeded.
    TimedOut(Option<InstanceIdentity>),
    Cancelled,
}

/// Sequential handler for pod lifecycle events.
pub struct Reconciler {
    store: Arc<RecordStore>,
    source: Arc<dyn InstanceSource>,
    namer: RecordNamer,
    ip_timeout: Duration,
    ip_poll_interval: Duration,
    pending: HashMap<String, InstanceIdentity>,
    cancel: CancellationToken,
}

impl Reconciler {
    /// Create a reconciler writing through `store`, looking pods up through `source`, and
    /// waiting at most `ip_timeout` for a new pod's IP.
    pub fn new(
        store: Arc<RecordStore>,
        source: Arc<dyn InstanceSource>,
        namer: RecordNamer,
        ip_timeout: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            store,
            source,
            namer,
            ip_timeout,
            ip_poll_interval: Duration::from_secs(IP_RESOLUTION_POLL_INTERVAL_SECS),
            pending: HashMap::new(),
            cancel,
        }
    }

    /// Override the interval between pod lookups while waiting for an IP.
    #[must_use]
    pub fn with_ip_poll_interval(mut self, interval: Duration) -> Self {
        self.ip_poll_interval = interval;
        self
    }

    /// Pods waiting for an IP, keyed by pod name.
    #[must_use]
    pub fn pending(&self) -> &HashMap<String, InstanceIdentity> {
        &self.pending
    }

    /// Drain `events` until the channel closes or shutdown is requested.
    pub async fn run(mut self, mut events: mpsc::Receiver<InstanceEvent>) {
        info!(
            domain = %self.namer.domain(),
            format = %self.namer.format(),
            ip_timeout = ?self.ip_timeout,
            "Starting event reconciler"
        );

        loop {
            let event = tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                event = events.recv() => match event {
                    Some(event) => event,
                    None => {
                        info!("Event channel closed");
                        break;
                    }
                },
            };

            let kind = event.kind();
            let pod = event.instance().name.clone();
            let start = Instant::now();

            match self.handle(event).await {
                Ok(outcome) => {
                    debug!(event = kind, pod = %pod, outcome = outcome.label(), "Event handled");
                    metrics::record_event(kind, outcome.label(), start.elapsed());
                }
                Err(e) if e.is_transient() => {
                    warn!(
                        event = kind,
                        pod = %pod,
                        error = %e,
                        "Failed to reconcile pod event, the next scan will retry"
                    );
                    metrics::record_event(kind, "error", start.elapsed());
                    metrics::record_error("event", e.class());
                }
                Err(e) => {
                    error!(event = kind, pod = %pod, error = %e, "Failed to reconcile pod event");
                    metrics::record_event(kind, "error", start.elapsed());
                    metrics::record_error("event", e.class());
                }
            }
            metrics::set_pending_instances(self.pending.len());
        }

        info!(pending = self.pending.len(), "Event reconciler stopped");
    }

    /// Handle one event.
    ///
    /// # Errors
    ///
    /// Returns an error if the record store fails; the caller logs it and moves on.
    pub async fn handle(&mut self, event: InstanceEvent) -> Result<EventOutcome, SyncError> {
        match event {
            InstanceEvent::Added(instance) => self.on_added(instance).await,
            InstanceEvent::Updated { old, new } => self.on_updated(&old, new).await,
            InstanceEvent::Deleted(instance) => self.on_deleted(&instance).await,
        }
    }

    async fn on_added(&mut self, instance: InstanceIdentity) -> Result<EventOutcome, SyncError> {
        if let Err(e) = self.namer.record_name(&instance) {
            return Ok(skip(&e));
        }

        if instance.has_ip() {
            let outcome = self.upsert(&instance).await?;
            return Ok(EventOutcome::Synced(outcome));
        }

        debug!(pod = %instance.name, "Pod has no IP yet, waiting for one");
        match self.resolve_ip(&instance).await {
            IpResolution::Resolved(resolved) => {
                let outcome = self.upsert(&resolved).await?;
                Ok(EventOutcome::Synced(outcome))
            }
            IpResolution::TimedOut(latest) => {
                info!(
                    pod = %instance.name,
                    timeout = ?self.ip_timeout,
                    "Pod has no IP yet, deferring to update events"
                );
                let latest = latest.unwrap_or(instance);
                self.pending.insert(latest.name.clone(), latest);
                Ok(EventOutcome::Pending)
            }
            IpResolution::Vanished => {
                debug!(pod = %instance.name, "Pod disappeared while waiting for its IP");
                Ok(EventOutcome::Vanished)
            }
            IpResolution::Cancelled => Ok(EventOutcome::Cancelled),
        }
    }

    async fn on_updated(
        &mut self,
        old: &InstanceIdentity,
        new: InstanceIdentity,
    ) -> Result<EventOutcome, SyncError> {
        if !self.pending.contains_key(&new.name) {
            return Ok(EventOutcome::Ignored);
        }

        if !new.has_ip() {
            self.pending.insert(new.name.clone(), new);
            return Ok(EventOutcome::Ignored);
        }

        debug!(pod = %new.name, old_ip = %old.ip, ip = %new.ip, "Pending pod received an IP");
        match self.upsert(&new).await {
            Ok(outcome) => {
                self.pending.remove(&new.name);
                Ok(EventOutcome::Synced(outcome))
            }
            Err(e) => {
                self.pending.insert(new.name.clone(), new);
                Err(e)
            }
        }
    }

    async fn on_deleted(&mut self, instance: &InstanceIdentity) -> Result<EventOutcome, SyncError> {
        self.pending.remove(&instance.name);

        if let Err(e) = self.namer.record_name(instance) {
            return Ok(skip(&e));
        }

        let outcome = self.remove(instance).await?;
        Ok(EventOutcome::Removed(outcome))
    }

    /// Ensure the pod's record points at its IP.
    async fn upsert(&self, instance: &InstanceIdentity) -> Result<CreateOutcome, SyncError> {
        let name = self.namer.record_name(instance)?;
        Ok(self.store.create(&name, &instance.ip).await?)
    }

    /// Delete the pod's record if it still points at the pod's IP.
    async fn remove(&self, instance: &InstanceIdentity) -> Result<DeleteOutcome, SyncError> {
        let name = self.namer.record_name(instance)?;
        Ok(self.store.delete(&name, &instance.ip).await?)
    }

    async fn resolve_ip(&self, instance: &InstanceIdentity) -> IpResolution {
        let latest: Mutex<Option<InstanceIdentity>> = Mutex::new(None);
        let outcome = poll_until(
            self.ip_poll_interval,
            Some(self.ip_timeout),
            &self.cancel,
            || {
                let source = self.source.clone();
                let name = instance.name.clone();
                let latest = &latest;
                async move {
                    match source.get(&name).await {
                        Ok(Some(current)) if current.has_ip() => {
                            Some(IpResolution::Resolved(current))
                        }
                        Ok(Some(current)) => {
                            *latest.lock().unwrap_or_else(PoisonError::into_inner) = Some(current);
                            None
                        }
                        Ok(None) => Some(IpResolution::Vanished),
                        Err(e) => {
                            warn!(pod = %name, error = %e, "Pod lookup failed, will retry");
                            None
                        }
                    }
                }
            },
        )
        .await;

        match outcome {
            PollOutcome::Ready(resolution) => resolution,
            PollOutcome::TimedOut => IpResolution::TimedOut(
                latest.into_inner().unwrap_or_else(PoisonError::into_inner),
            ),
            PollOutcome::Cancelled => IpResolution::Cancelled,
        }
    }
}

fn skip(error: &NamingError) -> EventOutcome {
    warn!(error = %error, "Skipping pod");
    metrics::record_skipped_instance(match error {
        NamingError::MissingOwner { .. } => "missing_owner",
    });
    EventOutcome::Skipped
}

#[cfg(test)]
#[path = "reconciler_tests.rs"]
mod reconciler_tests;
