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

//! Anti-forgery token handling
//!
//! The portal embeds a `__RequestVerificationToken` hidden input in its pages
//! and sets a cookie with the same name prefix. AJAX endpoints expect the page
//! token echoed back in a request header, either on its own or paired with the
//! cookie value.

use regex::Regex;
use std::sync::LazyLock;

/// Marker shared by the anti-forgery input name and cookie name
pub const TOKEN_MARKER: &str = "__RequestVerificationToken";

/// Header names that both carry the token value
pub const TOKEN_HEADERS: [&str; 2] = ["RequestVerificationToken", "X-RequestVerificationToken"];

static PAGE_TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)name="__RequestVerificationToken"[^>]*value="([^"]+)""#)
        .expect("page token pattern is valid")
});

/// How the stored token is sent back to the portal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenPairing {
    /// Raw page token
    Simple,
    /// Page token and cookie token joined by a colon
    Paired,
}

/// Find the anti-forgery token value in a rendered page
pub fn extract_page_token(html: &str) -> Option<String> {
    PAGE_TOKEN_RE
        .captures(html)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_owned())
}

/// Find the anti-forgery cookie value in a `Cookie` header string
/// (`name=value; name2=value2`)
pub fn cookie_token(cookie_header: &str) -> Option<String> {
    cookie_header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| name.starts_with(TOKEN_MARKER))
        .map(|(_, value)| value.to_owned())
}

/// Build the header value for the given pairing convention
pub fn header_value(token: &str, pairing: TokenPairing, cookie_token: Option<&str>) -> String {
    match (pairing, cookie_token) {
        (TokenPairing::Paired, Some(cookie)) if !cookie.is_empty() => format!("{token}:{cookie}"),
        _ => token.to_owned(),
    }
}
