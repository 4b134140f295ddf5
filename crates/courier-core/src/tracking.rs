//! Background polling of delivery tracking for map display.
//!
//! The poller re-issues the tracking query on a fixed interval and forwards each
//! result to a channel. Overlapping polls are not coalesced: every tick issues
//! its own request.

use std::time::Duration;

use courier_types::{GeoPoint, TrackingInfo};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::api::{ApiClient, ApiError, ApiErrorKind};
use crate::geometry::polyline;

/// A tracking snapshot with its route already decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackingUpdate {
    pub info: TrackingInfo,
    pub route: Vec<GeoPoint>,
}

impl From<TrackingInfo> for TrackingUpdate {
    fn from(info: TrackingInfo) -> Self {
        let route = info
            .route_polyline
            .as_deref()
            .map(polyline::decode)
            .unwrap_or_default();
        Self { info, route }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TrackingEvent {
    Updated(TrackingUpdate),
    /// A single poll failed; polling continues on the next tick.
    Failed(ApiError),
}

/// Shortest period the poller will tick at.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

pub struct TrackingPoller {
    client: ApiClient,
    delivery_id: i64,
    interval: Duration,
    max_ticks: Option<usize>,
}

impl TrackingPoller {
    /// A zero `interval` is raised to [`MIN_POLL_INTERVAL`].
    pub fn new(client: ApiClient, delivery_id: i64, interval: Duration) -> Self {
        Self {
            client,
            delivery_id,
            interval: interval.max(MIN_POLL_INTERVAL),
            max_ticks: None,
        }
    }

    /// Stops after `ticks` polls instead of running until cancelled.
    #[must_use]
    pub fn with_max_ticks(mut self, ticks: usize) -> Self {
        self.max_ticks = Some(ticks);
        self
    }

    /// Polls until `cancel` fires, the receiver is dropped, the tick limit is hit,
    /// or the session store fails.
    ///
    /// The first poll happens immediately. In-flight requests and blocked sends are
    /// tied to `cancel`, so nothing is delivered after cancellation. A
    /// `Persistence` failure is forwarded and then ends polling, since the stored
    /// credentials can no longer be trusted.
    pub async fn run(self, cancel: CancellationToken, events: mpsc::Sender<TrackingEvent>) {
        let client = self.client.scoped(&cancel);
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut polls = 0usize;

        tracing::debug!(delivery_id = self.delivery_id, interval_ms = self.interval.as_millis() as u64, "Tracking started");

        loop {
            if self.max_ticks.is_some_and(|max| polls >= max) {
                break;
            }

            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            polls += 1;

            let (event, halt) = match client.tracking_info(self.delivery_id).await {
                Ok(info) => (TrackingEvent::Updated(info.into()), false),
                Err(err) if err.kind == ApiErrorKind::Cancelled => break,
                Err(err) if err.kind == ApiErrorKind::Persistence => {
                    tracing::error!(delivery_id = self.delivery_id, error = %err, "Session store failed; stopping tracking");
                    (TrackingEvent::Failed(err), true)
                }
                Err(err) => {
                    tracing::warn!(delivery_id = self.delivery_id, error = %err, "Tracking poll failed");
                    (TrackingEvent::Failed(err), false)
                }
            };

            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                sent = events.send(event) => {
                    if sent.is_err() {
                        tracing::debug!(delivery_id = self.delivery_id, "Tracking receiver dropped");
                        break;
                    }
                }
            }
            if halt {
                break;
            }
        }

        tracing::debug!(delivery_id = self.delivery_id, polls, "Tracking stopped");
    }

    /// Runs the poller on the current runtime.
    pub fn spawn(
        self,
        cancel: CancellationToken,
        events: mpsc::Sender<TrackingEvent>,
    ) -> JoinHandle<()> {
        tokio::spawn(self.run(cancel, events))
    }
}
