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

//! Login form discovery
//!
//! Field names are guessed from the page markup, so the extraction sits behind
//! [`FormExtractor`]. A portal with different markup gets its own implementation
//! without touching the session or retry logic.

use crate::errors::{PortalError, PortalResult};
use crate::token::TOKEN_MARKER;
use crate::types::Credentials;
use regex::Regex;
use reqwest::Url;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

pub const DEFAULT_USERNAME_FIELD: &str = "Email";
pub const DEFAULT_PASSWORD_FIELD: &str = "Password";
pub const REMEMBER_ME_FIELD: &str = "RememberMe";

static FORM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<form[^>]*method=["']?post["']?[^>]*>.*?</form>"#)
        .expect("form pattern is valid")
});
static INPUT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<input[^>]*>").expect("input pattern is valid"));
static ACTION_RE: LazyLock<Regex> = LazyLock::new(|| attribute_regex("action", "*"));
static NAME_RE: LazyLock<Regex> = LazyLock::new(|| attribute_regex("name", "+"));
static TYPE_RE: LazyLock<Regex> = LazyLock::new(|| attribute_regex("type", "+"));
static VALUE_RE: LazyLock<Regex> = LazyLock::new(|| attribute_regex("value", "*"));
static PASSWORD_INPUT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<input[^>]*type=["']?password"#).expect("password input pattern is valid")
});

fn attribute_regex(attribute: &str, repeat: &str) -> Regex {
    Regex::new(&format!(r#"(?i)\b{attribute}=["']([^"']{repeat})["']"#))
        .expect("attribute pattern is valid")
}

fn attribute<'a>(re: &Regex, tag: &'a str) -> Option<&'a str> {
    re.captures(tag).and_then(|c| c.get(1)).map(|m| m.as_str())
}

/// Login form found on the portal's login page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginForm {
    /// Where the credentials are posted
    pub action: Url,
    pub username_field: String,
    pub password_field: String,
    /// Hidden and anti-forgery inputs with their server-supplied values
    pub hidden_fields: BTreeMap<String, String>,
    /// Page offers a "remember me" option
    pub remember_me: bool,
}

impl LoginForm {
    /// Form-encoded body for the login POST
    pub fn submission(&self, credentials: &Credentials) -> BTreeMap<String, String> {
        let mut data = self.hidden_fields.clone();
        data.insert(self.username_field.clone(), credentials.username.clone());
        data.insert(self.password_field.clone(), credentials.password.clone());
        if self.remember_me {
            data.insert(REMEMBER_ME_FIELD.to_owned(), "true".to_owned());
        }
        data
    }
}

/// Extracts a [`LoginForm`] from the raw HTML of a login page
pub trait FormExtractor: Send + Sync + fmt::Debug {
    fn extract(&self, page_url: &Url, html: &str) -> PortalResult<LoginForm>;

    /// Whether the response to a login POST is the login page again
    fn rejects_credentials(&self, landed_on: &Url, html: &str) -> bool;
}

/// Extractor for ASP.NET login pages with a `__RequestVerificationToken` input
#[derive(Debug, Default, Clone, Copy)]
pub struct AspNetFormExtractor;

impl FormExtractor for AspNetFormExtractor {
    fn extract(&self, page_url: &Url, html: &str) -> PortalResult<LoginForm> {
        let form_html = FORM_RE
            .find(html)
            .map(|m| m.as_str())
            .ok_or_else(|| PortalError::Auth("form not found".to_owned()))?;

        let action = match attribute(&ACTION_RE, form_html).filter(|a| !a.is_empty()) {
            Some(action) => page_url.join(action).map_err(|e| {
                PortalError::Auth(format!("invalid form action '{action}': {e}"))
            })?,
            None => page_url.clone(),
        };

        let mut hidden_fields = BTreeMap::new();
        let mut username_candidates = Vec::new();
        let mut password_field = None;

        for input in INPUT_RE.find_iter(form_html).map(|m| m.as_str()) {
            let Some(name) = attribute(&NAME_RE, input) else {
                continue;
            };
            let input_type = attribute(&TYPE_RE, input)
                .map_or_else(|| "text".to_owned(), str::to_lowercase);
            let value = attribute(&VALUE_RE, input).unwrap_or_default();

            if name.contains(TOKEN_MARKER) || input_type == "hidden" {
                hidden_fields.insert(name.to_owned(), value.to_owned());
            } else if input_type == "password" {
                password_field = Some(name.to_owned());
            } else {
                username_candidates.push(name.to_owned());
            }
        }

        let username_field = username_candidates
            .into_iter()
            .next()
            .unwrap_or_else(|| DEFAULT_USERNAME_FIELD.to_owned());
        let password_field = password_field.unwrap_or_else(|| DEFAULT_PASSWORD_FIELD.to_owned());
        let remember_me =
            hidden_fields.contains_key(REMEMBER_ME_FIELD) || html.contains(REMEMBER_ME_FIELD);

        Ok(LoginForm {
            action,
            username_field,
            password_field,
            hidden_fields,
            remember_me,
        })
    }

    fn rejects_credentials(&self, landed_on: &Url, html: &str) -> bool {
        landed_on
            .path()
            .trim_end_matches('/')
            .ends_with(crate::types::paths::LOGIN_PAGE)
            && PASSWORD_INPUT_RE.is_match(html)
    }
}
