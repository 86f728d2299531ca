// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Record name derivation.
//!
//! A pod's record name is a pure function of its identity, the managed domain and the
//! configured [`NameFormat`]:
//!
//! | Format  | Record name                        |
//! |---------|------------------------------------|
//! | `full`  | `<pod>.<owner>.<domain>.`          |
//! | `short` | `<pod>.<domain>.`                  |
//!
//! Names are always fully qualified. The zone snapshot built by the periodic scan is keyed
//! by the first label of each record name, which is the pod name in both formats.

use crate::dns_errors::NamingError;
use crate::instance::InstanceIdentity;
use std::fmt;
use std::str::FromStr;

/// How record names are built from pod identities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NameFormat {
    /// `<pod>.<domain>.`
    Short,
    /// `<pod>.<owner>.<domain>.`
    #[default]
    Full,
}

impl fmt::Display for NameFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Short => f.write_str("short"),
            Self::Full => f.write_str("full"),
        }
    }
}

impl FromStr for NameFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "short" => Ok(Self::Short),
            "full" => Ok(Self::Full),
            other => Err(format!(
                "unknown name format '{other}', expected 'short' or 'full'"
            )),
        }
    }
}

/// Builds record names under one managed domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordNamer {
    domain: String,
    format: NameFormat,
}

impl RecordNamer {
    /// Create a namer. Leading and trailing dots on `domain` are ignored.
    pub fn new(domain: &str, format: NameFormat) -> Self {
        Self {
            domain: domain.trim_matches('.').to_ascii_lowercase(),
            format,
        }
    }

    /// The managed domain without a trailing dot (e.g. `svc.internal`).
    #[must_use]
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// The configured name format.
    #[must_use]
    pub fn format(&self) -> NameFormat {
        self.format
    }

    /// Suffix every managed record name ends with (e.g. `svc.internal.`).
    #[must_use]
    pub fn zone_suffix(&self) -> String {
        format!("{}.", self.domain)
    }

    /// Returns true if `record_name` lives under the managed domain.
    #[must_use]
    pub fn is_managed(&self, record_name: &str) -> bool {
        record_name
            .to_ascii_lowercase()
            .ends_with(&format!(".{}", self.zone_suffix()))
    }

    /// Fully-qualified record name for a pod.
    ///
    /// # Errors
    ///
    /// Returns [`NamingError::MissingOwner`] in `full` format when the pod has no
    /// owner reference.
    pub fn record_name(&self, instance: &InstanceIdentity) -> Result<String, NamingError> {
        match self.format {
            NameFormat::Short => Ok(format!("{}.{}.", instance.name, self.domain)),
            NameFormat::Full => {
                let owner = instance
                    .owner_name
                    .as_deref()
                    .filter(|owner| !owner.is_empty())
                    .ok_or_else(|| NamingError::MissingOwner {
                        name: instance.name.clone(),
                        namespace: instance.namespace.clone(),
                    })?;
                Ok(format!("{}.{owner}.{}.", instance.name, self.domain))
            }
        }
    }
}

/// Zone snapshot key of a record name: everything before the first dot.
#[must_use]
pub fn snapshot_key(record_name: &str) -> &str {
    record_name
        .split_once('.')
        .map_or(record_name, |(key, _)| key)
}

#[cfg(test)]
#[path = "naming_tests.rs"]
mod naming_tests;
