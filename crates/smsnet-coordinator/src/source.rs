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

use crate::snapshot::SnapshotKey;
use async_trait::async_trait;
use serde_json::Value;
use smsnet_client::{PortalClient, PortalResult};

/// Where the coordinator gets its data from
#[async_trait]
pub trait PortalDataSource: Send + Sync {
    /// Whether the session already holds an anti-forgery token
    fn has_token(&self) -> bool;

    async fn login(&self) -> PortalResult<()>;

    async fn fetch(&self, key: SnapshotKey) -> PortalResult<Value>;
}

#[async_trait]
impl PortalDataSource for PortalClient {
    fn has_token(&self) -> bool {
        PortalClient::has_token(self)
    }

    async fn login(&self) -> PortalResult<()> {
        PortalClient::login(self).await
    }

    async fn fetch(&self, key: SnapshotKey) -> PortalResult<Value> {
        match key {
            SnapshotKey::LastReading => self.get_last_reading().await,
            SnapshotKey::Consumptions => self.get_consumptions_graph().await,
            SnapshotKey::Billed => self.get_billed_graph().await,
            SnapshotKey::BillingInfo => self.get_billing_info().await,
        }
    }
}
