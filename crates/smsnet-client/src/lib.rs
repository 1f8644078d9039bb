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

//! Session client for the SMSnet water utility portal
//!
//! The portal is a server-rendered ASP.NET site without a public API. The
//! client signs in through its HTML login form, replays the anti-forgery token
//! on AJAX calls and re-authenticates when the session expires.

pub mod client;
pub mod errors;
pub mod form;
pub mod token;
pub mod types;

pub use client::PortalClient;
pub use errors::{PortalError, PortalResult};
pub use form::{AspNetFormExtractor, FormExtractor, LoginForm};
pub use token::TokenPairing;
pub use types::{
    Credentials, DEFAULT_BASE_URL, DEFAULT_REQUEST_TIMEOUT, DEFAULT_TENANT, PortalConfig,
    normalize_tenant,
};
