// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

#![allow(unexpected_cfgs)]

//! # Private DNS - Kubernetes pods in Cloud DNS private zones
//!
//! Keeps one A record per pod in a Google Cloud DNS managed private zone, so workloads
//! outside the cluster network can reach individual pods by name.
//!
//! ## Overview
//!
//! Two paths converge on the same zone:
//!
//! - An event path: the [`informer`] watches pods and feeds lifecycle events to the
//!   [`reconciler`], which creates and deletes records as pods come and go.
//! - A fallback path: the [`scanner`] periodically diffs every live pod against the
//!   whole zone (see [`diff`]) and repairs whatever the event path missed.
//!
//! Both write through the [`record_store`], which performs conditional read-modify-write
//! changes so neither path can clobber a record the other just wrote.
//!
//! ## Record names
//!
//! Pods are named `<pod>.<owner>.<domain>.` by default, where the owner is the pod's
//! controller (e.g. its `ReplicaSet`), or `<pod>.<domain>.` in short format. See [`naming`].
//!
//! ## Modules
//!
//! - [`instance`] - Pod identity and lifecycle events
//! - [`naming`] - Record name derivation
//! - [`record_store`] - Conditional A record operations over the Cloud DNS API
//! - [`cloud_dns`] - Cloud DNS REST client
//! - [`auth`] - Google OAuth2 access tokens
//! - [`instance_source`] - Pod lookups through the Kubernetes API
//! - [`informer`] - Pod watch to lifecycle event translation
//! - [`reconciler`] - Event-driven record sync
//! - [`diff`] - Zone versus pods comparison
//! - [`scanner`] - Periodic full reconciliation
//! - [`config`] - Command-line configuration
//! - [`server`] - Metrics and health endpoints
//!
//! ## Example
//!
//! ```rust,no_run
//! use private_dns::instance::InstanceIdentity;
//! use private_dns::naming::{NameFormat, RecordNamer};
//!
//! let namer = RecordNamer::new("svc.internal", NameFormat::Full);
//! let pod = InstanceIdentity::new("web-7d4b9-x2k4p", Some("web-7d4b9"), "default", "10.0.0.12");
//! assert_eq!(
//!     namer.record_name(&pod).unwrap(),
//!     "web-7d4b9-x2k4p.web-7d4b9.svc.internal."
//! );
//! ```

pub mod auth;
pub mod cloud_dns;
pub mod config;
pub mod constants;
pub mod diff;
pub mod dns_errors;
pub mod duration;
pub mod http_errors;
pub mod informer;
pub mod instance;
pub mod instance_source;
pub mod metrics;
pub mod naming;
pub mod reconciler;
pub mod record_store;
pub mod retry;
pub mod scanner;
pub mod server;
