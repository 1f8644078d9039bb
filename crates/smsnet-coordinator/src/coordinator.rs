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

use crate::errors::{CoordinatorError, CoordinatorResult};
use crate::snapshot::{SnapshotKey, UpdateSnapshot};
use crate::source::PortalDataSource;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Portal data changes at most a few times a day
pub const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_secs(6 * 60 * 60);

/// Where the current (or last) cycle is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CyclePhase {
    #[default]
    Idle,
    LoginCheck,
    /// Index into [`SnapshotKey::ALL`]
    Fetching(usize),
    Published,
    CycleFailed,
}

/// Health of the coordinator as seen by consumers
#[derive(Debug, Clone, Default, Serialize)]
pub struct CoordinatorStatus {
    pub phase: CyclePhase,
    /// Outcome of the most recent cycle; consumers mark data stale when false
    pub last_update_success: bool,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_failure_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub consecutive_failures: u32,
}

impl CoordinatorStatus {
    /// Published data no longer reflects the portal (last cycle failed)
    pub fn is_stale(&self) -> bool {
        self.consecutive_failures > 0
    }
}

/// Periodically refreshes portal data and publishes best-effort snapshots
pub struct PortalCoordinator {
    source: Arc<dyn PortalDataSource>,
    update_interval: Duration,
    snapshot_tx: watch::Sender<Option<Arc<UpdateSnapshot>>>,
    status: Mutex<CoordinatorStatus>,
}

impl fmt::Debug for PortalCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PortalCoordinator")
            .field("update_interval", &self.update_interval)
            .field("status", &*self.status.lock())
            .finish_non_exhaustive()
    }
}

impl PortalCoordinator {
    pub fn new(source: Arc<dyn PortalDataSource>, update_interval: Duration) -> Self {
        let (snapshot_tx, _) = watch::channel(None);
        Self {
            source,
            update_interval,
            snapshot_tx,
            status: Mutex::new(CoordinatorStatus::default()),
        }
    }

    pub fn update_interval(&self) -> Duration {
        self.update_interval
    }

    /// Last published snapshot, kept across failed cycles
    pub fn snapshot(&self) -> Option<Arc<UpdateSnapshot>> {
        self.snapshot_tx.borrow().clone()
    }

    /// Receiver notified whenever a new snapshot is published
    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<UpdateSnapshot>>> {
        self.snapshot_tx.subscribe()
    }

    pub fn status(&self) -> CoordinatorStatus {
        self.status.lock().clone()
    }

    /// Run one update cycle
    ///
    /// Login and fetch failures are collected; the cycle only fails when no
    /// dataset could be fetched, in which case the previous snapshot stays.
    pub async fn refresh(&self) -> CoordinatorResult<Arc<UpdateSnapshot>> {
        let mut errors = Vec::new();

        self.set_phase(CyclePhase::LoginCheck);
        if !self.source.has_token() {
            debug!("[COORDINATOR] No anti-forgery token yet, signing in");
            if let Err(e) = self.source.login().await {
                warn!("⚠️ [COORDINATOR] Login failed, continuing with fetches: {}", e);
                errors.push(format!("login: {e}"));
            }
        }

        let mut data = BTreeMap::new();
        for (index, key) in SnapshotKey::ALL.into_iter().enumerate() {
            self.set_phase(CyclePhase::Fetching(index));
            match self.source.fetch(key).await {
                Ok(value) => {
                    data.insert(key, value);
                }
                Err(e) => {
                    warn!("⚠️ [COORDINATOR] Fetching {} failed: {}", key, e);
                    errors.push(format!("{key}: {e}"));
                }
            }
        }

        if data.is_empty() {
            let message = if errors.is_empty() {
                "No data".to_owned()
            } else {
                errors.join("; ")
            };
            error!("❌ [COORDINATOR] Update failed: {}", message);
            self.record_failure(&message);
            return Err(CoordinatorError::CycleFailed(message));
        }

        let snapshot = Arc::new(UpdateSnapshot {
            fetched_at: Utc::now(),
            data,
            errors,
        });
        self.snapshot_tx.send_replace(Some(Arc::clone(&snapshot)));
        self.record_success(snapshot.fetched_at);

        info!(
            "✅ [COORDINATOR] Published snapshot with {}/{} datasets",
            snapshot.data.len(),
            SnapshotKey::ALL.len()
        );
        if !snapshot.errors.is_empty() {
            debug!("   Partial errors: {:?}", snapshot.errors);
        }
        Ok(snapshot)
    }

    /// Refresh on every interval tick until `shutdown` resolves
    ///
    /// The first cycle starts immediately. Cycles run inside the loop, so a
    /// new one never starts while the previous one is in progress.
    pub async fn run<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval(self.update_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        info!(
            "🔄 [COORDINATOR] Polling every {}s",
            self.update_interval.as_secs()
        );

        loop {
            tokio::select! {
                () = &mut shutdown => {
                    info!("[COORDINATOR] Shutdown requested, stopping");
                    break;
                }
                _ = ticker.tick() => {
                    // Failure is already logged and recorded in the status
                    let _ = self.refresh().await;
                }
            }
        }
    }

    fn set_phase(&self, phase: CyclePhase) {
        self.status.lock().phase = phase;
    }

    fn record_success(&self, at: DateTime<Utc>) {
        let mut status = self.status.lock();
        status.phase = CyclePhase::Published;
        status.last_update_success = true;
        status.last_success_at = Some(at);
        status.consecutive_failures = 0;
    }

    fn record_failure(&self, message: &str) {
        let mut status = self.status.lock();
        status.phase = CyclePhase::CycleFailed;
        status.last_update_success = false;
        status.last_failure_at = Some(Utc::now());
        status.last_error = Some(message.to_owned());
        status.consecutive_failures += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::{Value, json};
    use smsnet_client::{PortalError, PortalResult};
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Data source whose failures are scripted per key
    #[derive(Default)]
    struct ScriptedSource {
        has_token: Mutex<bool>,
        login_fails: bool,
        failing: Mutex<HashSet<SnapshotKey>>,
        login_calls: AtomicUsize,
        fetch_calls: AtomicUsize,
    }

    impl ScriptedSource {
        fn failing(keys: &[SnapshotKey]) -> Self {
            let source = Self::default();
            source.set_failing(keys);
            source
        }

        fn set_failing(&self, keys: &[SnapshotKey]) {
            *self.failing.lock() = keys.iter().copied().collect();
        }
    }

    #[async_trait]
    impl PortalDataSource for ScriptedSource {
        fn has_token(&self) -> bool {
            *self.has_token.lock()
        }

        async fn login(&self) -> PortalResult<()> {
            self.login_calls.fetch_add(1, Ordering::SeqCst);
            if self.login_fails {
                return Err(PortalError::Auth("form not found".to_owned()));
            }
            *self.has_token.lock() = true;
            Ok(())
        }

        async fn fetch(&self, key: SnapshotKey) -> PortalResult<Value> {
            self.fetch_calls.fetch_add(1, Ordering::SeqCst);
            if self.failing.lock().contains(&key) {
                return Err(PortalError::DataFetch {
                    path: key.to_string(),
                    status: Some(500),
                    detail: "boom".to_owned(),
                });
            }
            Ok(json!({ "key": key.as_str() }))
        }
    }

    fn coordinator(source: &Arc<ScriptedSource>) -> PortalCoordinator {
        let source: Arc<dyn PortalDataSource> = Arc::clone(source) as Arc<dyn PortalDataSource>;
        PortalCoordinator::new(source, DEFAULT_UPDATE_INTERVAL)
    }

    #[tokio::test]
    async fn test_partial_cycle_publishes_only_successful_keys() {
        let source = Arc::new(ScriptedSource::failing(&[
            SnapshotKey::Consumptions,
            SnapshotKey::BillingInfo,
        ]));
        let coordinator = coordinator(&source);

        let snapshot = coordinator.refresh().await.unwrap();

        let keys: Vec<SnapshotKey> = snapshot.keys().collect();
        assert_eq!(keys, [SnapshotKey::LastReading, SnapshotKey::Billed]);
        assert_eq!(snapshot.errors.len(), 2);
        assert!(snapshot.errors[0].starts_with("consumptions: "));
        assert!(snapshot.errors[1].starts_with("billing_info: "));
        assert_eq!(source.fetch_calls.load(Ordering::SeqCst), 4);

        let status = coordinator.status();
        assert!(status.last_update_success);
        assert!(!status.is_stale());
        assert_eq!(status.phase, CyclePhase::Published);
        assert_eq!(coordinator.snapshot(), Some(snapshot));
    }

    #[tokio::test]
    async fn test_total_failure_keeps_previous_snapshot() {
        let source = Arc::new(ScriptedSource::default());
        let coordinator = coordinator(&source);
        let first = coordinator.refresh().await.unwrap();
        assert!(first.is_complete());

        source.set_failing(&SnapshotKey::ALL);
        let result = coordinator.refresh().await;

        match result {
            Err(CoordinatorError::CycleFailed(message)) => {
                let parts: Vec<&str> = message.split("; ").collect();
                assert_eq!(parts.len(), 4);
                assert!(parts[0].starts_with("last_reading: "));
                assert!(parts[3].starts_with("billing_info: "));
            }
            Ok(_) => panic!("cycle with no data must fail"),
        }

        let kept = coordinator.snapshot().unwrap();
        assert!(Arc::ptr_eq(&kept, &first));

        let status = coordinator.status();
        assert!(status.is_stale());
        assert!(!status.last_update_success);
        assert_eq!(status.phase, CyclePhase::CycleFailed);
        assert_eq!(status.consecutive_failures, 1);
        assert!(status.last_success_at.is_some());
    }

    #[tokio::test]
    async fn test_successful_cycle_clears_stale_status() {
        let source = Arc::new(ScriptedSource::failing(&SnapshotKey::ALL));
        let coordinator = coordinator(&source);
        assert!(!coordinator.status().is_stale());

        coordinator.refresh().await.unwrap_err();
        coordinator.refresh().await.unwrap_err();
        let status = coordinator.status();
        assert!(status.is_stale());
        assert_eq!(status.consecutive_failures, 2);
        assert!(status.last_success_at.is_none());

        source.set_failing(&[SnapshotKey::Billed]);
        coordinator.refresh().await.unwrap();
        let status = coordinator.status();
        assert!(!status.is_stale());
        assert_eq!(status.consecutive_failures, 0);
        assert!(status.last_error.is_some());
    }

    #[tokio::test]
    async fn test_login_failure_does_not_abort_cycle() {
        let source = Arc::new(ScriptedSource {
            login_fails: true,
            ..ScriptedSource::default()
        });
        let coordinator = coordinator(&source);

        let snapshot = coordinator.refresh().await.unwrap();

        assert_eq!(source.login_calls.load(Ordering::SeqCst), 1);
        assert!(snapshot.is_complete());
        assert_eq!(snapshot.errors.len(), 1);
        assert!(snapshot.errors[0].starts_with("login: "));
    }

    #[tokio::test]
    async fn test_login_error_leads_aggregate_message() {
        let source = Arc::new(ScriptedSource {
            login_fails: true,
            ..ScriptedSource::default()
        });
        source.set_failing(&SnapshotKey::ALL);
        let coordinator = coordinator(&source);

        let err = coordinator.refresh().await.unwrap_err();

        let CoordinatorError::CycleFailed(message) = err;
        assert!(
            message.starts_with("login: authentication failed: form not found; last_reading: ")
        );
        assert!(coordinator.snapshot().is_none());
    }

    #[tokio::test]
    async fn test_login_skipped_when_token_present() {
        let source = Arc::new(ScriptedSource::default());
        *source.has_token.lock() = true;
        let coordinator = coordinator(&source);

        coordinator.refresh().await.unwrap();
        coordinator.refresh().await.unwrap();

        assert_eq!(source.login_calls.load(Ordering::SeqCst), 0);
        assert_eq!(source.fetch_calls.load(Ordering::SeqCst), 8);
    }

    #[tokio::test]
    async fn test_subscribers_see_published_snapshot() {
        let source = Arc::new(ScriptedSource::default());
        let coordinator = coordinator(&source);
        let mut rx = coordinator.subscribe();
        assert!(rx.borrow().is_none());

        coordinator.refresh().await.unwrap();

        assert!(rx.has_changed().unwrap());
        let published = rx.borrow_and_update().clone().unwrap();
        assert_eq!(published.get(SnapshotKey::Billed), Some(&json!({"key": "billed"})));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_refreshes_on_interval_until_shutdown() {
        let source = Arc::new(ScriptedSource::default());
        let coordinator = coordinator(&source);

        // Ticks at 0h, 6h and 12h, shutdown at 13h
        coordinator
            .run(tokio::time::sleep(Duration::from_secs(13 * 60 * 60)))
            .await;

        assert_eq!(source.fetch_calls.load(Ordering::SeqCst), 12);
        assert_eq!(source.login_calls.load(Ordering::SeqCst), 1);
    }
}
