// Flight AR - headless host
// Runs the feed, reconciliation and enrichment pipeline with a logging scene

use std::sync::Arc;

use clap::Parser;
use flight_ar::config::Config;
use flight_ar::coordinator::{Coordinator, CoordinatorHandle};
use flight_ar::enrichment::{EnrichmentService, FlightAwareLookup};
use flight_ar::net::{replay_fixture, FeedClient};
use flight_ar::scene::{LoggingScene, LoggingStatus, StatusDisplay};
use flight_ar::tracker::TrackReconciler;
use tokio::signal;
use tokio::sync::mpsc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::parse();

    init_logging(config.verbose);

    info!("Starting flight AR host");
    let viewer = config.viewer();
    info!("Viewer at {:.5},{:.5} ({:.0} m)", viewer.lat, viewer.lon, viewer.alt);

    let (handle, events) = CoordinatorHandle::channel(64);
    let (location_tx, location_rx) = mpsc::unbounded_channel();

    let reconciler = TrackReconciler::with_grace(config.projection_scale(), config.grace());
    let status: Arc<dyn StatusDisplay> = Arc::new(LoggingStatus);
    let mut coordinator = Coordinator::new(events, reconciler, Box::new(LoggingScene::new()), status)
        .with_upstream(location_tx)
        .with_status_interval(config.status_interval());

    if config.no_enrichment {
        info!("Enrichment disabled");
    } else {
        coordinator = coordinator.with_enrichment(EnrichmentService::new(FlightAwareLookup::new()?));
    }

    let coordinator_task = tokio::spawn(coordinator.run());
    handle.update_viewer_location(viewer).await;

    let feed_task = match &config.fixture {
        Some(path) => {
            let count = replay_fixture(path, &handle).await?;
            info!("Fixture replayed ({} flights)", count);
            None
        }
        None => {
            let client = FeedClient::new(&config.feed_url, config.reconnect_policy(), handle.clone(), location_rx);
            Some(tokio::spawn(async move {
                if let Err(e) = client.run().await {
                    error!("Feed client stopped: {}", e);
                }
            }))
        }
    };

    info!("Host ready");

    match signal::ctrl_c().await {
        Ok(()) => {
            info!("Received shutdown signal (Ctrl+C)");
        }
        Err(err) => {
            error!("Unable to listen for shutdown signal: {}", err);
            return Err(err.into());
        }
    }

    info!("Shutting down...");
    if let Some(feed_task) = feed_task {
        feed_task.abort();
        let _ = feed_task.await;
    }
    let tracked = handle.tracked().await.len();
    drop(handle);
    let _ = coordinator_task.await;

    info!("Stopped. {} aircraft were tracked", tracked);
    Ok(())
}

/// Initialize logging subsystem
fn init_logging(verbose: bool) {
    use tracing_subscriber::fmt::format::FmtSpan;

    let subscriber = tracing_subscriber::fmt()
        .with_target(false)
        .with_thread_ids(false)
        .with_level(true)
        .with_span_events(if verbose {
            FmtSpan::ENTER | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        });

    if verbose {
        subscriber
            .with_max_level(tracing::Level::DEBUG)
            .init();
        info!("Verbose logging enabled (DEBUG level)");
    } else {
        subscriber
            .with_max_level(tracing::Level::INFO)
            .init();
    }
}
