// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Pod identities and lifecycle events.
//!
//! The reconciler never looks at a full `Pod`: it only needs the name, the namespace,
//! the controlling owner's name, and the current pod IP. [`InstanceIdentity`] carries
//! exactly those fields, and [`InstanceEvent`] is the typed lifecycle event delivered
//! by the informer.

use k8s_openapi::api::core::v1::Pod;
use kube::ResourceExt;

/// The fields of a pod that determine its DNS record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InstanceIdentity {
    /// Pod name, unique within its namespace
    pub name: String,
    /// Name of the first owner reference (e.g. the `ReplicaSet`), if any
    pub owner_name: Option<String>,
    /// Pod namespace
    pub namespace: String,
    /// Current pod IP; empty while the pod has not been assigned one
    pub ip: String,
}

impl InstanceIdentity {
    /// Build an identity from its parts.
    pub fn new(
        name: impl Into<String>,
        owner_name: Option<&str>,
        namespace: impl Into<String>,
        ip: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            owner_name: owner_name.map(str::to_string),
            namespace: namespace.into(),
            ip: ip.into(),
        }
    }

    /// Returns true once the pod has been assigned an IP.
    #[must_use]
    pub fn has_ip(&self) -> bool {
        !self.ip.is_empty()
    }

    /// Copy of this identity carrying a different IP.
    #[must_use]
    pub fn with_ip(&self, ip: impl Into<String>) -> Self {
        Self {
            ip: ip.into(),
            ..self.clone()
        }
    }
}

impl From<&Pod> for InstanceIdentity {
    fn from(pod: &Pod) -> Self {
        let owner_name = pod
            .owner_references()
            .first()
            .map(|owner| owner.name.clone());
        let ip = pod
            .status
            .as_ref()
            .and_then(|status| status.pod_ip.clone())
            .unwrap_or_default();

        Self {
            name: pod.name_any(),
            owner_name,
            namespace: pod.namespace().unwrap_or_default(),
            ip,
        }
    }
}

/// A pod lifecycle event, delivered strictly in order to the reconciler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstanceEvent {
    /// A pod appeared (initial listing or creation)
    Added(InstanceIdentity),
    /// A known pod changed, or a resync re-delivered it
    Updated {
        /// Last state seen before this event
        old: InstanceIdentity,
        /// Current state
        new: InstanceIdentity,
    },
    /// A pod went away
    Deleted(InstanceIdentity),
}

impl InstanceEvent {
    /// Event kind used as a log field and metrics label.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Added(_) => "added",
            Self::Updated { .. } => "updated",
            Self::Deleted(_) => "deleted",
        }
    }

    /// The most recent identity carried by the event.
    #[must_use]
    pub fn instance(&self) -> &InstanceIdentity {
        match self {
            Self::Added(instance) | Self::Deleted(instance) => instance,
            Self::Updated { new, .. } => new,
        }
    }
}

#[cfg(test)]
#[path = "instance_tests.rs"]
mod instance_tests;
