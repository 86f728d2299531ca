// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! In-process managed zone.
//!
//! [`InMemoryZone`] implements [`DnsApi`] with the same validation rules as Cloud DNS:
//! a change is applied atomically or not at all, a deletion must match the stored
//! record set exactly (otherwise HTTP 412), and an addition must not collide with an
//! existing record set of the same name and type (otherwise HTTP 409).
//!
//! It backs `--dry-run` and the test suites. Tests can seed records, inject failures,
//! interleave a foreign change before the next submission, and keep changes pending for
//! a number of status polls.

use super::{Change, ChangeStatus, DnsApi, ListFilter, RecordSetPage, ResourceRecordSet};
use crate::dns_errors::DnsApiError;
use crate::http_errors::map_http_error_to_reason;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::info;

type RecordKey = (String, String);

#[derive(Default)]
struct ZoneState {
    records: BTreeMap<RecordKey, ResourceRecordSet>,
    changes: Vec<Change>,
    remaining_polls: HashMap<String, u32>,
    list_failures: VecDeque<DnsApiError>,
    change_failures: VecDeque<DnsApiError>,
    interleaved: VecDeque<Change>,
    list_calls: usize,
    status_calls: usize,
}

/// A managed zone held in memory.
#[derive(Default)]
pub struct InMemoryZone {
    state: Mutex<ZoneState>,
    pending_polls: u32,
    log_changes: bool,
}

fn key(name: &str, record_type: &str) -> RecordKey {
    (name.to_ascii_lowercase(), record_type.to_string())
}

fn http_error(status: u16, detail: String) -> DnsApiError {
    let (reason, message) = map_http_error_to_reason(status);
    DnsApiError::Http {
        status,
        reason,
        message: format!("{message}: {detail}"),
    }
}

impl InMemoryZone {
    /// Empty zone whose changes complete immediately.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty zone that logs every applied change; used by `--dry-run`.
    #[must_use]
    pub fn dry_run() -> Self {
        Self {
            log_changes: true,
            ..Self::default()
        }
    }

    /// Keep each change `pending` for this many status polls before reporting `done`.
    #[must_use]
    pub fn with_pending_polls(mut self, polls: u32) -> Self {
        self.pending_polls = polls;
        self
    }

    fn lock(&self) -> MutexGuard<'_, ZoneState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store a record set directly, bypassing change validation.
    pub fn insert(&self, record: ResourceRecordSet) {
        self.lock()
            .records
            .insert(key(&record.name, &record.record_type), record);
    }

    /// Every record set currently in the zone, ordered by name.
    #[must_use]
    pub fn records(&self) -> Vec<ResourceRecordSet> {
        self.lock().records.values().cloned().collect()
    }

    /// The A record stored under `name`, if any.
    #[must_use]
    pub fn a_record(&self, name: &str) -> Option<ResourceRecordSet> {
        self.lock().records.get(&key(name, "A")).cloned()
    }

    /// Every change applied so far, in submission order.
    #[must_use]
    pub fn changes(&self) -> Vec<Change> {
        self.lock().changes.clone()
    }

    /// Number of `list_record_sets` calls served.
    #[must_use]
    pub fn list_calls(&self) -> usize {
        self.lock().list_calls
    }

    /// Number of `get_change` calls served.
    #[must_use]
    pub fn status_calls(&self) -> usize {
        self.lock().status_calls
    }

    /// Fail the next `list_record_sets` call with `error`.
    pub fn fail_next_list(&self, error: DnsApiError) {
        self.lock().list_failures.push_back(error);
    }

    /// Fail the next `create_change` call with `error` without applying anything.
    pub fn fail_next_change(&self, error: DnsApiError) {
        self.lock().change_failures.push_back(error);
    }

    /// Apply `change` on behalf of another writer right before the next submission.
    pub fn interleave_before_next_change(&self, change: Change) {
        self.lock().interleaved.push_back(change);
    }

    fn apply_locked(state: &mut ZoneState, change: &Change) -> Result<(), DnsApiError> {
        let mut next = state.records.clone();

        for deletion in &change.deletions {
            let k = key(&deletion.name, &deletion.record_type);
            match next.get(&k) {
                Some(stored) if stored == deletion => {
                    next.remove(&k);
                }
                _ => {
                    return Err(http_error(
                        412,
                        format!("deletion of {} does not match the zone", deletion.name),
                    ))
                }
            }
        }

        for addition in &change.additions {
            let k = key(&addition.name, &addition.record_type);
            if next.contains_key(&k) {
                return Err(http_error(
                    409,
                    format!("{} {} already exists", addition.name, addition.record_type),
                ));
            }
            next.insert(k, addition.clone());
        }

        state.records = next;
        Ok(())
    }
}

#[async_trait]
impl DnsApi for InMemoryZone {
    async fn list_record_sets(&self, filter: &ListFilter) -> Result<RecordSetPage, DnsApiError> {
        let mut state = self.lock();
        state.list_calls += 1;
        if let Some(error) = state.list_failures.pop_front() {
            return Err(error);
        }

        let matching: Vec<ResourceRecordSet> = state
            .records
            .values()
            .filter(|r| {
                filter
                    .name
                    .as_deref()
                    .is_none_or(|name| r.name.eq_ignore_ascii_case(name))
            })
            .filter(|r| {
                filter
                    .record_type
                    .as_deref()
                    .is_none_or(|t| r.record_type == t)
            })
            .cloned()
            .collect();

        let offset: usize = filter
            .page_token
            .as_deref()
            .and_then(|token| token.parse().ok())
            .unwrap_or(0);
        let limit = filter.max_results.map_or(usize::MAX, |m| m as usize);
        let end = offset.saturating_add(limit).min(matching.len());
        let rrsets = matching.get(offset..end).map(<[_]>::to_vec).unwrap_or_default();
        let next_page_token = (end < matching.len()).then(|| end.to_string());

        Ok(RecordSetPage {
            rrsets,
            next_page_token,
        })
    }

    async fn create_change(&self, change: &Change) -> Result<Change, DnsApiError> {
        let mut state = self.lock();

        while let Some(foreign) = state.interleaved.pop_front() {
            Self::apply_locked(&mut state, &foreign)?;
        }
        if let Some(error) = state.change_failures.pop_front() {
            return Err(error);
        }

        Self::apply_locked(&mut state, change)?;

        let id = (state.changes.len() + 1).to_string();
        let status = if self.pending_polls == 0 {
            ChangeStatus::Done
        } else {
            state.remaining_polls.insert(id.clone(), self.pending_polls);
            ChangeStatus::Pending
        };
        let applied = Change {
            id: Some(id),
            status: Some(status),
            additions: change.additions.clone(),
            deletions: change.deletions.clone(),
        };
        state.changes.push(applied.clone());

        if self.log_changes {
            info!(
                additions = ?applied.additions,
                deletions = ?applied.deletions,
                "Dry run: change recorded in memory"
            );
        }

        Ok(applied)
    }

    async fn get_change(&self, change_id: &str) -> Result<Change, DnsApiError> {
        let mut state = self.lock();
        state.status_calls += 1;

        let Some(mut change) = state
            .changes
            .iter()
            .find(|c| c.id.as_deref() == Some(change_id))
            .cloned()
        else {
            return Err(http_error(404, format!("change {change_id} not found")));
        };

        let done = match state.remaining_polls.get_mut(change_id) {
            Some(remaining) if *remaining > 1 => {
                *remaining -= 1;
                false
            }
            _ => {
                state.remaining_polls.remove(change_id);
                true
            }
        };
        change.status = Some(if done {
            ChangeStatus::Done
        } else {
            ChangeStatus::Pending
        });

        Ok(change)
    }
}
