use tokio::sync::broadcast;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{info, trace, warn};

use bench_protocol::SensorState;

use crate::connection::ConnectionState;

/// Task: Logs every connection state transition published by the device
/// link, so a broken connection surfaces as status rather than a crash.
/// Can be cancelled.
#[tracing::instrument(skip_all)]
pub async fn task_link_status_logging(
    token: CancellationToken,
    mut rx_state: watch::Receiver<ConnectionState>,
) {
    info!("Started.");
    loop {
        tokio::select! {
            _ = token.cancelled() => {
                warn!("Cancelled.");
                break;
            },
            changed = rx_state.changed() => {
                if changed.is_err() {
                    warn!("Device link state channel closed.");
                    break;
                }
                let state = *rx_state.borrow_and_update();
                info!("Device link is now {}.", state);
            }
        };
    }
}

/// Task: Mirrors what the bench display would show by logging sensor state
/// changes. Purely a consumer; publishes nothing. Can be cancelled.
#[tracing::instrument(skip_all)]
pub async fn task_sensor_state_logging(
    token: CancellationToken,
    mut rx_sensor_state: broadcast::Receiver<SensorState>,
) {
    info!("Started.");
    let mut last: Option<SensorState> = None;
    loop {
        tokio::select! {
            _ = token.cancelled() => {
                warn!("Cancelled.");
                break;
            },
            Ok(state) = rx_sensor_state.recv() => {
                if last != Some(state) {
                    info!("Sensor state changed: {}", state);
                    last = Some(state);
                } else {
                    trace!("Sensor state unchanged.");
                }
            }
        };
    }
}
