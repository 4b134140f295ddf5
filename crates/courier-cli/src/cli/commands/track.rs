//! Live tracking command.

use std::time::Duration;

use anyhow::{Context as _, Result};
use courier_core::tracking::{TrackingEvent, TrackingPoller};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::Context;

pub async fn run(
    ctx: &Context,
    delivery_id: i64,
    ticks: Option<usize>,
    interval_secs: Option<u64>,
) -> Result<()> {
    let interval = interval_secs
        .map(Duration::from_secs)
        .unwrap_or_else(|| ctx.config.tracking.poll_interval());

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    ctrlc::set_handler(move || on_interrupt.cancel()).context("install Ctrl+C handler")?;

    let mut poller = TrackingPoller::new(ctx.client.clone(), delivery_id, interval);
    if let Some(ticks) = ticks {
        poller = poller.with_max_ticks(ticks);
    }

    let (tx, mut rx) = mpsc::channel(16);
    let handle = poller.spawn(cancel.clone(), tx);

    while let Some(event) = rx.recv().await {
        match event {
            TrackingEvent::Updated(update) => {
                let info = &update.info;
                let location = info
                    .courier_location
                    .map_or_else(|| "-".to_string(), |p| p.to_string());
                let eta = info
                    .eta_minutes
                    .map_or_else(|| "-".to_string(), |m| format!("{m} min"));
                println!(
                    "{:?}  courier {location}  eta {eta}  route {} points",
                    info.status,
                    update.route.len()
                );
                if info.status.is_terminal() {
                    cancel.cancel();
                }
            }
            TrackingEvent::Failed(err) => eprintln!("poll failed: {err}"),
        }
    }

    handle.await.context("tracking task panicked")?;
    Ok(())
}
