// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for pod identities.

#[cfg(test)]
mod tests {
    use crate::instance::{InstanceEvent, InstanceIdentity};
    use k8s_openapi::api::core::v1::{Pod, PodStatus};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};

    fn owner(name: &str) -> OwnerReference {
        OwnerReference {
            api_version: "apps/v1".to_string(),
            kind: "ReplicaSet".to_string(),
            name: name.to_string(),
            uid: format!("{name}-uid"),
            controller: Some(true),
            block_owner_deletion: Some(true),
        }
    }

    fn pod(name: &str, owners: Vec<OwnerReference>, ip: Option<&str>) -> Pod {
        Pod {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some("apps".to_string()),
                owner_references: Some(owners),
                ..Default::default()
            },
            spec: None,
            status: Some(PodStatus {
                pod_ip: ip.map(str::to_string),
                ..Default::default()
            }),
        }
    }

    #[test]
    fn test_identity_from_pod_with_ip() {
        let identity = InstanceIdentity::from(&pod("web-1", vec![owner("web")], Some("10.0.0.5")));

        assert_eq!(identity.name, "web-1");
        assert_eq!(identity.owner_name.as_deref(), Some("web"));
        assert_eq!(identity.namespace, "apps");
        assert_eq!(identity.ip, "10.0.0.5");
        assert!(identity.has_ip());
    }

    #[test]
    fn test_identity_from_pod_uses_first_owner() {
        let identity = InstanceIdentity::from(&pod(
            "web-1",
            vec![owner("web"), owner("other")],
            Some("10.0.0.5"),
        ));
        assert_eq!(identity.owner_name.as_deref(), Some("web"));
    }

    #[test]
    fn test_identity_from_pod_without_ip_or_owner() {
        let identity = InstanceIdentity::from(&pod("web-1", vec![], None));

        assert_eq!(identity.owner_name, None);
        assert_eq!(identity.ip, "");
        assert!(!identity.has_ip());
    }

    #[test]
    fn test_identity_from_pod_without_status() {
        let mut p = pod("web-1", vec![owner("web")], None);
        p.status = None;
        let identity = InstanceIdentity::from(&p);
        assert!(!identity.has_ip());
    }

    #[test]
    fn test_with_ip() {
        let identity = InstanceIdentity::new("web-1", Some("web"), "apps", "");
        let resolved = identity.with_ip("10.0.0.7");
        assert_eq!(resolved.ip, "10.0.0.7");
        assert_eq!(resolved.name, identity.name);
        assert_eq!(resolved.owner_name, identity.owner_name);
    }

    #[test]
    fn test_event_kind_and_instance() {
        let old = InstanceIdentity::new("web-1", Some("web"), "apps", "");
        let new = old.with_ip("10.0.0.5");

        let added = InstanceEvent::Added(old.clone());
        let updated = InstanceEvent::Updated {
            old: old.clone(),
            new: new.clone(),
        };
        let deleted = InstanceEvent::Deleted(new.clone());

        assert_eq!(added.kind(), "added");
        assert_eq!(updated.kind(), "updated");
        assert_eq!(deleted.kind(), "deleted");
        assert_eq!(updated.instance(), &new);
        assert_eq!(added.instance(), &old);
    }
}
