//! Cold-chain Tracker - Main entry point

mod cli;

use anyhow::Context;
use clap::Parser;
use cli::Args;
use coldchain_core::TrackingViewModel;
use coldchain_engine::tracking::{spawn_tracker, LinkStatus, TrackerHandle};
use coldchain_networking::api::{fetch_trackable_shipment, in_transit_shipments};
use coldchain_networking::websocket::WsConnector;
use coldchain_networking::{ApiClient, StaticCredentials};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "coldchain_tracker=info,coldchain_engine=info,coldchain_networking=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let credentials = match args.token.as_deref() {
        Some(token) => StaticCredentials::new(token),
        None => StaticCredentials::none(),
    };
    let api = ApiClient::new(&args.api_url, Arc::new(credentials))
        .context("failed to build API client")?;

    if args.list {
        for shipment in in_transit_shipments(&api).await? {
            println!(
                "{}\t{}\t{} -> {}",
                shipment.id,
                shipment.reference.as_deref().unwrap_or("-"),
                shipment.origin.as_deref().unwrap_or("?"),
                shipment.destination.as_deref().unwrap_or("?"),
            );
        }
        return Ok(());
    }

    let shipment_id = args
        .shipment_id()
        .context("a shipment id is required unless --list is given")?;

    // The header is informative only; tracking proceeds without it
    match fetch_trackable_shipment(&api, &shipment_id).await {
        Ok(shipment) => match shipment.temperature_range() {
            Some((min, max)) => tracing::info!(
                "Shipment {} ({:?}), allowed range {}..{}°C",
                shipment.id,
                shipment.status,
                min,
                max
            ),
            None => tracing::info!(
                "Shipment {} ({:?}), no temperature range configured",
                shipment.id,
                shipment.status
            ),
        },
        Err(e) => tracing::warn!("Could not load shipment {} from the API: {}", shipment_id, e),
    }

    let config = args.tracker_config();
    let tracker = spawn_tracker(&config, Arc::new(WsConnector::new()), shipment_id)
        .context("failed to start tracker")?;

    let result = follow(&tracker, args.retry_after_give_up_secs.map(Duration::from_secs)).await;
    tracker.stop().await;
    result
}

/// Log view and link changes until Ctrl-C or a final give-up
async fn follow(
    tracker: &TrackerHandle,
    retry_after_give_up: Option<Duration>,
) -> anyhow::Result<()> {
    let mut view = tracker.view();
    let mut status = tracker.watch_status();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted, shutting down");
                return Ok(());
            }
            changed = view.changed() => {
                if changed.is_err() {
                    return Ok(());
                }
                let snapshot = view.borrow_and_update().clone();
                log_view(&snapshot);
            }
            changed = status.changed() => {
                if changed.is_err() {
                    return Ok(());
                }
                let current = status.borrow_and_update().clone();
                tracing::info!("Link: {:?}", current.link);

                if current.link == LinkStatus::GaveUp {
                    let Some(delay) = retry_after_give_up else {
                        anyhow::bail!(
                            "tracking server unreachable: {}",
                            current.last_error.unwrap_or_else(|| "no error reported".to_string())
                        );
                    };
                    tracing::warn!("Retrying in {}s", delay.as_secs());
                    if sleep_unless(delay, tokio::signal::ctrl_c()).await {
                        tracing::info!("Interrupted while waiting to retry, shutting down");
                        return Ok(());
                    }
                    if let Err(e) = tracker.reconnect() {
                        tracing::error!("Manual reconnect failed: {}", e);
                    }
                }
            }
        }
    }
}

/// Sleep for `delay` unless `interrupt` resolves first; true when interrupted
async fn sleep_unless<F: Future>(delay: Duration, interrupt: F) -> bool {
    tokio::select! {
        _ = interrupt => true,
        _ = tokio::time::sleep(delay) => false,
    }
}

fn log_view(view: &TrackingViewModel) {
    if let Some(location) = view.location {
        tracing::info!("Location: {:.5}, {:.5}", location.latitude, location.longitude);
    }
    if let Some(reading) = view.temperature.as_ref() {
        tracing::info!(
            "Temperature: {:.1}°C (avg {:.1}°C){}",
            reading.temperature,
            reading.avg_temperature,
            if view.has_violations() { " VIOLATION" } else { "" }
        );
    }
    if let Some(alert) = view.alerts.last() {
        tracing::info!(
            "Alerts: {} (latest: {} at {})",
            view.alerts.len(),
            alert.message,
            alert.timestamp
        );
    }
}
