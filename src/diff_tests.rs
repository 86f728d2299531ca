// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `diff.rs`

#[cfg(test)]
mod tests {
    use crate::diff::{plan, PlannedUpsert, ZoneSnapshot};
    use crate::dns_errors::NamingError;
    use crate::instance::InstanceIdentity;
    use crate::naming::{NameFormat, RecordNamer};
    use crate::record_store::ResourceRecordSet;

    fn namer() -> RecordNamer {
        RecordNamer::new("svc.internal", NameFormat::Full)
    }

    fn pod(name: &str, ip: &str) -> InstanceIdentity {
        InstanceIdentity::new(name, Some("web"), "default", ip)
    }

    fn record(name: &str, ip: &str) -> ResourceRecordSet {
        ResourceRecordSet::a_record(name, ip)
    }

    #[test]
    fn test_snapshot_keeps_only_managed_a_records() {
        let snapshot = ZoneSnapshot::build(
            vec![
                record("web-1.web.svc.internal.", "10.0.0.1"),
                record("web-2.svc.internal.", "10.0.0.2"),
                record("db.other.internal.", "10.0.0.3"),
                ResourceRecordSet {
                    name: "svc.internal.".to_string(),
                    record_type: "SOA".to_string(),
                    ttl: 21600,
                    rrdatas: vec!["ns.svc.internal. admin.svc.internal. 1 21600 3600 259200 300".to_string()],
                },
                ResourceRecordSet {
                    name: "web-1.web.svc.internal.".to_string(),
                    record_type: "TXT".to_string(),
                    ttl: 300,
                    rrdatas: vec!["\"owner\"".to_string()],
                },
            ],
            &namer(),
        );

        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.get("web-1").len(), 1);
        assert_eq!(snapshot.get("WEB-2").len(), 1);
        assert!(snapshot.get("db").is_empty());
    }

    #[test]
    fn test_snapshot_keeps_colliding_keys() {
        let snapshot = ZoneSnapshot::build(
            vec![
                record("web-1.web.svc.internal.", "10.0.0.1"),
                record("web-1.api.svc.internal.", "10.0.0.9"),
            ],
            &namer(),
        );

        assert_eq!(snapshot.get("web-1").len(), 2);
    }

    /// One matching, one drifted, one missing, one stale.
    #[test]
    fn test_plan_classifies_instances_and_records() {
        let snapshot = ZoneSnapshot::build(
            vec![
                record("x.web.svc.internal.", "10.0.0.1"),
                record("y.web.svc.internal.", "10.0.0.9"),
                record("w.web.svc.internal.", "10.0.0.4"),
            ],
            &namer(),
        );
        let instances = vec![pod("x", "10.0.0.1"), pod("y", "10.0.0.2"), pod("z", "10.0.0.3")];

        let zone_plan = plan(&instances, snapshot, &namer());

        assert_eq!(zone_plan.satisfied, vec![pod("x", "10.0.0.1")]);
        assert_eq!(
            zone_plan.to_upsert,
            vec![
                PlannedUpsert {
                    instance: pod("y", "10.0.0.2"),
                    record_name: "y.web.svc.internal.".to_string(),
                    current_ip: Some("10.0.0.9".to_string()),
                },
                PlannedUpsert {
                    instance: pod("z", "10.0.0.3"),
                    record_name: "z.web.svc.internal.".to_string(),
                    current_ip: None,
                },
            ]
        );
        assert_eq!(zone_plan.stale, vec![record("w.web.svc.internal.", "10.0.0.4")]);
        assert!(zone_plan.skipped.is_empty());
    }

    #[test]
    fn test_pod_without_ip_consumes_record_but_is_not_upserted() {
        let snapshot =
            ZoneSnapshot::build(vec![record("x.web.svc.internal.", "10.0.0.1")], &namer());

        let zone_plan = plan(&[pod("x", ""), pod("q", "")], snapshot, &namer());

        assert!(zone_plan.to_upsert.is_empty());
        assert!(zone_plan.stale.is_empty());
        assert_eq!(zone_plan.awaiting_ip.len(), 2);
    }

    #[test]
    fn test_same_key_other_owner_is_stale() {
        let snapshot =
            ZoneSnapshot::build(vec![record("x.old.svc.internal.", "10.0.0.1")], &namer());

        let zone_plan = plan(&[pod("x", "10.0.0.1")], snapshot, &namer());

        assert_eq!(zone_plan.to_upsert.len(), 1);
        assert_eq!(zone_plan.to_upsert[0].current_ip, None);
        assert_eq!(zone_plan.stale, vec![record("x.old.svc.internal.", "10.0.0.1")]);
    }

    #[test]
    fn test_owner_less_pod_is_skipped_in_full_format() {
        let snapshot =
            ZoneSnapshot::build(vec![record("solo.svc.internal.", "10.0.0.1")], &namer());
        let solo = InstanceIdentity::new("solo", None, "default", "10.0.0.1");

        let zone_plan = plan(std::slice::from_ref(&solo), snapshot, &namer());

        assert!(matches!(
            zone_plan.skipped.as_slice(),
            [(instance, NamingError::MissingOwner { .. })] if instance == &solo
        ));
        assert_eq!(zone_plan.stale.len(), 1);
    }

    #[test]
    fn test_short_format_plan() {
        let short = RecordNamer::new("svc.internal", NameFormat::Short);
        let snapshot = ZoneSnapshot::build(vec![record("solo.svc.internal.", "10.0.0.1")], &short);
        let solo = InstanceIdentity::new("solo", None, "default", "10.0.0.1");

        let zone_plan = plan(&[solo.clone()], snapshot, &short);

        assert_eq!(zone_plan.satisfied, vec![solo]);
        assert!(zone_plan.stale.is_empty());
    }

    #[test]
    fn test_empty_inputs() {
        let zone_plan = plan(&[], ZoneSnapshot::default(), &namer());
        assert!(zone_plan.satisfied.is_empty());
        assert!(zone_plan.to_upsert.is_empty());
        assert!(zone_plan.stale.is_empty());
    }
}
