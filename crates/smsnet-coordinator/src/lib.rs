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

//! Polling coordinator for the SMSnet portal
//!
//! Runs one update cycle per interval, tolerates partial failures and
//! publishes the collected datasets as an [`UpdateSnapshot`].

pub mod coordinator;
pub mod errors;
pub mod sensors;
pub mod snapshot;
pub mod source;

pub use coordinator::{CoordinatorStatus, CyclePhase, DEFAULT_UPDATE_INTERVAL, PortalCoordinator};
pub use errors::{CoordinatorError, CoordinatorResult};
pub use sensors::SensorValues;
pub use snapshot::{SnapshotKey, UpdateSnapshot};
pub use source::PortalDataSource;
