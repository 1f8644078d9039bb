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

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://www.aquamatrix.pt";
pub const DEFAULT_TENANT: &str = "SMSnet";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Portal account credentials
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Everything needed to open a session against one portal account
#[derive(Debug, Clone)]
pub struct PortalConfig {
    pub base_url: String,
    pub tenant: String,
    pub credentials: Credentials,
    pub request_timeout: Duration,
}

impl PortalConfig {
    pub fn new(tenant: impl Into<String>, credentials: Credentials) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_owned(),
            tenant: tenant.into(),
            credentials,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Stable identifier of the configured account (`tenant:username`)
    pub fn unique_id(&self) -> String {
        format!(
            "{}:{}",
            normalize_tenant(&self.tenant),
            self.credentials.username
        )
    }
}

/// Strip the leading and trailing slashes users tend to paste with the tenant
pub fn normalize_tenant(tenant: &str) -> &str {
    tenant.trim().trim_matches('/')
}

/// Portal pages and AJAX endpoints, relative to `{base_url}/{tenant}/`
pub mod paths {
    pub const LOGIN_PAGE: &str = "Account/Login";
    pub const TOKEN_PAGE: &str = "ReadingsAndConsumptions";
    pub const HOME_PAGE: &str = "Home/Index";

    pub const LAST_READING: [&str; 2] = [
        "ReadingsAndConsumptions/GetLastReadingInfo",
        "Readings/GetLastReadingInfo",
    ];
    pub const CONSUMPTIONS_GRAPH: [&str; 2] = [
        "ReadingsAndConsumptions/GetConsumptionsGraph",
        "Readings/GetConsumptionsGraph",
    ];
    pub const BILLED_GRAPH: &str = "Billing/GetBilledValuesGraph";
    pub const BILLING_INFO: &str = "Billing/GetBillingInfo";
}
