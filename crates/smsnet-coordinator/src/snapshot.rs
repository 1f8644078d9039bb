// Copyright (c) 2025 SOLARE S.R.O.
//
// This file is part of FluxION.
//
// Licensed under the Creative Commons Attribution-NonCommercial-NoDerivatives 4.0 International
// (CC BY-NC-ND 4.0). You may use and share this file for non-commercial purposes only and you may not
// create derivatives. See <https://creativecommons.org/licenses/by-nc-nd/4.0/>.
//
// This software is provided "AS IS", without warranty of any kind.
//
// For commercial licensing, please contact: info@solare.cz

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// The four portal datasets collected in every cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotKey {
    LastReading,
    Consumptions,
    Billed,
    BillingInfo,
}

impl SnapshotKey {
    /// Fetch order within a cycle
    pub const ALL: [SnapshotKey; 4] = [
        Self::LastReading,
        Self::Consumptions,
        Self::Billed,
        Self::BillingInfo,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LastReading => "last_reading",
            Self::Consumptions => "consumptions",
            Self::Billed => "billed",
            Self::BillingInfo => "billing_info",
        }
    }
}

impl fmt::Display for SnapshotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one successful coordinator cycle
///
/// Only datasets fetched successfully are present in `data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateSnapshot {
    pub fetched_at: DateTime<Utc>,
    pub data: BTreeMap<SnapshotKey, Value>,
    /// Labelled failures of the cycle that produced this snapshot
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl UpdateSnapshot {
    pub fn get(&self, key: SnapshotKey) -> Option<&Value> {
        self.data.get(&key)
    }

    pub fn keys(&self) -> impl Iterator<Item = SnapshotKey> + '_ {
        self.data.keys().copied()
    }

    pub fn is_complete(&self) -> bool {
        SnapshotKey::ALL.iter().all(|k| self.data.contains_key(k))
    }
}
