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

use crate::errors::{PortalError, PortalResult};
use crate::form::{AspNetFormExtractor, FormExtractor, LoginForm};
use crate::token::{self, TOKEN_HEADERS, TokenPairing};
use crate::types::{Credentials, PortalConfig, normalize_tenant, paths};
use parking_lot::RwLock;
use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, ORIGIN, REFERER};
use reqwest::{Client, StatusCode, Url};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, trace, warn};

const USER_AGENT: &str = "HomeAssistant";
const LOGIN_ACCEPT_LANGUAGE: &str = "pt-PT,pt;q=0.9,en;q=0.8";
const AJAX_ACCEPT: &str = "application/json, text/plain, */*";
const BODY_HEAD_CHARS: usize = 200;

/// Mutable state of one portal account: cookies and the anti-forgery token
struct Session {
    base_url: String,
    tenant: String,
    credentials: Credentials,
    cookies: Arc<Jar>,
    token: RwLock<Option<String>>,
}

impl Session {
    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}/{}",
            self.base_url,
            self.tenant,
            path.trim_start_matches('/')
        )
    }

    fn token(&self) -> Option<String> {
        self.token.read().clone()
    }

    fn store_token(&self, value: String) {
        *self.token.write() = Some(value);
    }

    /// Anti-forgery cookie currently held for the tenant
    fn cookie_token(&self) -> Option<String> {
        let url = Url::parse(&self.url("")).ok()?;
        let header = self.cookies.cookies(&url)?;
        token::cookie_token(header.to_str().ok()?)
    }

    /// Value for the token headers, `None` while no token has been scraped
    fn token_header(&self, pairing: TokenPairing) -> Option<String> {
        let token = self.token().filter(|t| !t.is_empty())?;
        let cookie = match pairing {
            TokenPairing::Simple => None,
            TokenPairing::Paired => self.cookie_token(),
        };
        Some(token::header_value(&token, pairing, cookie.as_deref()))
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("base_url", &self.base_url)
            .field("tenant", &self.tenant)
            .field("credentials", &self.credentials)
            .field("has_token", &self.token.read().is_some())
            .finish_non_exhaustive()
    }
}

/// SMSnet portal client
///
/// Logs in through the portal's HTML form, keeps the session cookies and the
/// anti-forgery token, and recovers from expired sessions while fetching data.
#[derive(Debug)]
pub struct PortalClient {
    client: Client,
    session: Session,
    extractor: Arc<dyn FormExtractor>,
}

impl PortalClient {
    /// Create a client for the ASP.NET login markup of the SMSnet portal
    pub fn new(config: PortalConfig) -> PortalResult<Self> {
        Self::with_extractor(config, Arc::new(AspNetFormExtractor))
    }

    /// Create a client with a custom login form extractor
    pub fn with_extractor(
        config: PortalConfig,
        extractor: Arc<dyn FormExtractor>,
    ) -> PortalResult<Self> {
        let base_url = config.base_url.trim().trim_end_matches('/').to_owned();
        Url::parse(&base_url)
            .map_err(|e| PortalError::Config(format!("Invalid base URL '{base_url}': {e}")))?;

        let tenant = normalize_tenant(&config.tenant).to_owned();
        if tenant.is_empty() {
            return Err(PortalError::Config("Tenant must not be empty".to_owned()));
        }

        let cookies = Arc::new(Jar::default());
        let client = Client::builder()
            .cookie_provider(Arc::clone(&cookies))
            .user_agent(USER_AGENT)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| PortalError::Config(format!("Failed to build HTTP client: {e}")))?;

        info!("Initializing SMSnet client for {}/{}", base_url, tenant);

        Ok(Self {
            client,
            session: Session {
                base_url,
                tenant,
                credentials: config.credentials,
                cookies,
                token: RwLock::new(None),
            },
            extractor,
        })
    }

    /// Whether an anti-forgery token has been captured
    pub fn has_token(&self) -> bool {
        self.session.token().is_some_and(|t| !t.is_empty())
    }

    pub fn token(&self) -> Option<String> {
        self.session.token()
    }

    /// Log in and verify that a data endpoint accepts the new session
    pub async fn login(&self) -> PortalResult<()> {
        self.login_basic().await?;

        let probe = paths::LAST_READING[0];
        if let Err(e) = self
            .get_json_once(probe, paths::TOKEN_PAGE, TokenPairing::Simple)
            .await
        {
            debug!("[PORTAL LOGIN] Verification with simple token failed: {}", e);
            self.refresh_token().await?;
            self.get_json_once(probe, paths::TOKEN_PAGE, TokenPairing::Paired)
                .await?;
        }

        info!("✅ [PORTAL LOGIN] Session verified for tenant {}", self.session.tenant);
        Ok(())
    }

    /// Log in without probing the data endpoints (credential validation)
    pub async fn login_basic(&self) -> PortalResult<()> {
        info!(
            "🔐 [PORTAL LOGIN] Signing in to tenant {} as {}",
            self.session.tenant, self.session.credentials.username
        );

        let (page_url, html) = self.fetch_login_page().await?;
        let form = self.extractor.extract(&page_url, &html)?;
        debug!(
            "[PORTAL LOGIN] Form: action={} user_field={} pass_field={} hidden={}",
            form.action,
            form.username_field,
            form.password_field,
            form.hidden_fields.len()
        );

        self.submit_login(&form, &page_url).await?;
        self.refresh_token().await?;
        Ok(())
    }

    /// Scrape a fresh anti-forgery token from an authenticated page
    ///
    /// The stored token is left untouched when the page does not expose one.
    pub async fn refresh_token(&self) -> PortalResult<Option<String>> {
        let url = self.session.url(paths::TOKEN_PAGE);
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        let html = response.text().await?;

        match token::extract_page_token(&html) {
            Some(value) => {
                debug!("[PORTAL TOKEN] Refreshed anti-forgery token (status {})", status);
                self.session.store_token(value);
            }
            None => {
                warn!(
                    "⚠️ [PORTAL TOKEN] No anti-forgery token on {} (status {}), keeping the previous one",
                    paths::TOKEN_PAGE,
                    status
                );
            }
        }

        Ok(self.session.token())
    }

    /// Latest meter reading
    pub async fn get_last_reading(&self) -> PortalResult<Value> {
        self.try_paths(&paths::LAST_READING, paths::TOKEN_PAGE).await
    }

    /// Monthly consumption graph
    pub async fn get_consumptions_graph(&self) -> PortalResult<Value> {
        self.try_paths(&paths::CONSUMPTIONS_GRAPH, paths::TOKEN_PAGE).await
    }

    /// Billed values graph
    pub async fn get_billed_graph(&self) -> PortalResult<Value> {
        self.get_json(paths::BILLED_GRAPH, paths::HOME_PAGE).await
    }

    /// Billing summary (debt, next invoice)
    pub async fn get_billing_info(&self) -> PortalResult<Value> {
        self.get_json(paths::BILLING_INFO, paths::HOME_PAGE).await
    }

    async fn fetch_login_page(&self) -> PortalResult<(Url, String)> {
        let login_url = self.session.url(paths::LOGIN_PAGE);
        let page_url = Url::parse(&login_url)
            .map_err(|e| PortalError::Config(format!("Invalid login URL '{login_url}': {e}")))?;

        let response = self
            .client
            .get(page_url.clone())
            .header(ACCEPT_LANGUAGE, LOGIN_ACCEPT_LANGUAGE)
            .send()
            .await
            .map_err(|e| PortalError::Auth(format!("login page unreachable: {e}")))?;

        // Redirects are followed, so anything but 2xx here means no usable page
        let status = response.status();
        if !status.is_success() {
            error!("❌ [PORTAL LOGIN] Login page returned {}", status);
            return Err(PortalError::Auth(format!("login GET failed: {}", status.as_u16())));
        }

        let html = response
            .text()
            .await
            .map_err(|e| PortalError::Auth(format!("login page unreadable: {e}")))?;
        Ok((page_url, html))
    }

    async fn submit_login(&self, form: &LoginForm, page_url: &Url) -> PortalResult<()> {
        let data = form.submission(&self.session.credentials);

        let response = self
            .client
            .post(form.action.clone())
            .header(ORIGIN, &self.session.base_url)
            .header(REFERER, page_url.as_str())
            .form(&data)
            .send()
            .await
            .map_err(|e| PortalError::Auth(format!("login POST failed: {e}")))?;

        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            error!("❌ [PORTAL LOGIN] Login POST returned {}", status);
            return Err(PortalError::Auth(format!("login POST failed: {}", status.as_u16())));
        }

        let landed_on = response.url().clone();
        let body = response
            .text()
            .await
            .map_err(|e| PortalError::Auth(format!("login response unreadable: {e}")))?;
        if self.extractor.rejects_credentials(&landed_on, &body) {
            error!("❌ [PORTAL LOGIN] Portal returned the login form again, credentials rejected");
            return Err(PortalError::Auth("credentials rejected".to_owned()));
        }

        debug!("[PORTAL LOGIN] Login POST accepted, landed on {}", landed_on);
        Ok(())
    }

    /// One authenticated AJAX GET with the given token pairing
    async fn get_json_once(
        &self,
        path: &str,
        referer_path: &str,
        pairing: TokenPairing,
    ) -> PortalResult<Value> {
        let url = self.session.url(path);
        debug!("🔍 [PORTAL FETCH] GET {} (pairing={:?})", path, pairing);

        let mut request = self
            .client
            .get(&url)
            .header("X-Requested-With", "XMLHttpRequest")
            .header(ACCEPT, AJAX_ACCEPT)
            .header(REFERER, self.session.url(referer_path));
        if let Some(value) = self.session.token_header(pairing) {
            for name in TOKEN_HEADERS {
                request = request.header(name, value.as_str());
            }
        }

        let fetch_error = |status: Option<u16>, detail: String| PortalError::DataFetch {
            path: path.to_owned(),
            status,
            detail,
        };

        let response = request
            .send()
            .await
            .map_err(|e| fetch_error(None, e.to_string()))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| fetch_error(Some(status.as_u16()), e.to_string()))?;
        trace!("   {} status={} head={}", path, status, body_head(&text));

        if status != StatusCode::OK {
            return Err(fetch_error(Some(status.as_u16()), body_head(&text)));
        }

        serde_json::from_str(&text)
            .map_err(|e| fetch_error(Some(status.as_u16()), format!("invalid JSON: {e}")))
    }

    /// Authenticated GET through the retry ladder:
    /// simple token, then refreshed paired token, then full re-login
    async fn get_json(&self, path: &str, referer_path: &str) -> PortalResult<Value> {
        let simple_error = match self
            .get_json_once(path, referer_path, TokenPairing::Simple)
            .await
        {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };
        debug!("[PORTAL FETCH] {} failed with simple token: {}", path, simple_error);

        if let Err(e) = self.refresh_token().await {
            warn!("⚠️ [PORTAL TOKEN] Token refresh failed: {}", e);
        }

        let paired_error = match self
            .get_json_once(path, referer_path, TokenPairing::Paired)
            .await
        {
            Ok(value) => return Ok(value),
            Err(e) => e,
        };
        warn!(
            "⚠️ [PORTAL FETCH] {} failed with paired token: {}. Signing in again",
            path, paired_error
        );

        match self.login().await {
            Err(e) if e.is_auth() => {
                error!("❌ [PORTAL FETCH] Re-login failed: {}", e);
                return Err(PortalError::DataFetch {
                    path: path.to_owned(),
                    status: e.status(),
                    detail: format!("re-login failed: {e}"),
                });
            }
            Err(e) => warn!("⚠️ [PORTAL LOGIN] Signed in but verification failed: {}", e),
            Ok(()) => {}
        }

        self.get_json_once(path, referer_path, TokenPairing::Paired)
            .await
            .inspect_err(|e| error!("❌ [PORTAL FETCH] Giving up on {}: {}", path, e))
    }

    /// Try alias paths in order, returning the first success
    async fn try_paths(&self, candidates: &[&str], referer_path: &str) -> PortalResult<Value> {
        let mut last_error = None;
        for path in candidates {
            match self.get_json(path, referer_path).await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    debug!("[PORTAL FETCH] Path {} failed: {}", path, e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| PortalError::DataFetch {
            path: candidates.join(", "),
            status: None,
            detail: "no paths to try".to_owned(),
        }))
    }
}

fn body_head(text: &str) -> String {
    text.chars().take(BODY_HEAD_CHARS).collect()
}
