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

use thiserror::Error;

/// Errors raised by the portal session client
#[derive(Debug, Error)]
pub enum PortalError {
    /// Login page unreachable, login form missing or credentials rejected
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Every alias path and every retry step failed for one endpoint
    #[error("data fetch failed for {path}{}: {detail}", status_suffix(.status))]
    DataFetch {
        path: String,
        status: Option<u16>,
        detail: String,
    },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

impl PortalError {
    /// HTTP status carried by the error, if the portal answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::DataFetch { status, .. } => *status,
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            Self::Auth(_) | Self::Config(_) => None,
        }
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Auth(_))
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (status {s})")).unwrap_or_default()
}

pub type PortalResult<T> = Result<T, PortalError>;
