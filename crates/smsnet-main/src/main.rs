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

mod cli;
mod config;

use anyhow::{Context, Result};
use clap::Parser;
use smsnet_client::PortalClient;
use smsnet_coordinator::{PortalCoordinator, PortalDataSource, SensorValues, UpdateSnapshot};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::FmtSubscriber;

use crate::cli::{Cli, Commands};
use crate::config::AppConfig;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Respects RUST_LOG environment variable
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to install tracing subscriber")?;

    let config = AppConfig::load(cli.config.as_deref()).context("Invalid configuration")?;
    let portal = config.portal_config();
    let unique_id = portal.unique_id();
    let client = Arc::new(PortalClient::new(portal).context("Failed to create portal client")?);

    match cli.command() {
        Commands::Validate => {
            client
                .login_basic()
                .await
                .with_context(|| format!("Sign-in failed for {unique_id}"))?;
            info!("✅ Credentials accepted for {}", unique_id);
            println!("{unique_id}");
        }
        Commands::Fetch => {
            let coordinator = PortalCoordinator::new(client, config.update_interval());
            let snapshot = coordinator.refresh().await?;
            println!("{}", serde_json::to_string_pretty(&*snapshot)?);
        }
        Commands::Run => run(&config, client, &unique_id).await,
    }

    Ok(())
}

async fn run(config: &AppConfig, client: Arc<PortalClient>, unique_id: &str) {
    info!("🚀 Starting SMSnet poller for {}", unique_id);
    info!("   Portal: {}/{}", config.base_url, config.tenant);
    info!("   Request timeout: {}s", config.request_timeout_secs);

    // A failed sign-in here is retried by the first cycle
    if let Err(e) = client.login().await {
        warn!("⚠️ Initial sign-in failed: {}", e);
    }

    let source: Arc<dyn PortalDataSource> = client;
    let coordinator = Arc::new(PortalCoordinator::new(source, config.update_interval()));
    info!(
        "   Update interval: {}s",
        coordinator.update_interval().as_secs()
    );

    let mut snapshots = coordinator.subscribe();
    let reporter = tokio::spawn(async move {
        while snapshots.changed().await.is_ok() {
            let snapshot = snapshots.borrow_and_update().clone();
            if let Some(snapshot) = snapshot {
                log_sensor_values(&snapshot);
            }
        }
    });
    let health = tokio::spawn(watch_health(Arc::clone(&coordinator)));

    coordinator
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl-C: {}", e);
            }
        })
        .await;

    reporter.abort();
    health.abort();
    info!("👋 SMSnet poller stopped");
}

/// Warn while the published data is stale, checked halfway between cycles
async fn watch_health(coordinator: Arc<PortalCoordinator>) {
    let period = coordinator.update_interval();
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period / 2, period);

    loop {
        ticker.tick().await;
        let status = coordinator.status();
        if status.is_stale() {
            warn!(
                "⚠️ Portal data is stale: {} failed cycle(s), last success {}, last error: {}",
                status.consecutive_failures,
                status
                    .last_success_at
                    .map_or_else(|| "never".to_owned(), |at| at.to_rfc3339()),
                status.last_error.as_deref().unwrap_or("-")
            );
        }
    }
}

fn log_sensor_values(snapshot: &UpdateSnapshot) {
    let values = SensorValues::from_snapshot(snapshot);
    info!("📊 Snapshot at {}", snapshot.fetched_at);
    info!(
        "   Last reading: {:?} m³ on {:?}",
        values.last_reading_value, values.last_reading_date
    );
    info!(
        "   Consumption: {:?} m³ ({}), previous month {:?} m³",
        values.consumption_current_month,
        values.consumption_current_month_label.as_deref().unwrap_or("-"),
        values.consumption_previous_month
    );
    info!(
        "   Last bill: {:?} EUR ({})",
        values.billed_last_value,
        values.billed_last_label.as_deref().unwrap_or("-")
    );
    info!(
        "   Debt: {:?} EUR, next due {:?}",
        values.debt_total, values.next_due_date
    );
    for err in &snapshot.errors {
        warn!("   Partial failure: {}", err);
    }
}
