use std::time::Duration;

use tokio::sync::broadcast::Sender;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use bench_protocol::SensorState;

use crate::gate::OperationGate;
use crate::link::{LinkClient, LinkError};

/// Task: Runs periodically to poll the bench sensors and emit sensor state
/// messages. Skips the tick while the gate is engaged; attempts a reconnect
/// instead of a poll while disconnected. Can be cancelled.
#[tracing::instrument(skip_all)]
pub async fn task_poll_sensors(
    token: CancellationToken,
    link: LinkClient,
    gate: OperationGate,
    tx_sensor_state: Sender<SensorState>,
    period: Duration,
) {
    info!("Started.");
    loop {
        poll_tick(&link, &gate, &tx_sensor_state).await;

        tokio::select! {
            _ = token.cancelled() => {
                warn!("Cancelled.");
                break;
            },
            _ = tokio::time::sleep(period) => {}
        };
    }
}

/// One poll cycle. Exactly one poll or one reconnect attempt happens per
/// tick, never both; both are skipped while an operation is in flight.
/// A malformed response means no update this tick, so consumers keep the
/// last published state.
#[tracing::instrument(skip_all)]
async fn poll_tick(link: &LinkClient, gate: &OperationGate, tx_sensor_state: &Sender<SensorState>) {
    trace!("Executing poll tick.");

    if gate.get() {
        trace!("Operation in flight, skipping this tick.");
        return;
    }

    if !link.is_connected() {
        debug!("Not connected, attempting reconnect.");
        if let Err(e) = link.connect().await {
            warn!("Reconnect attempt failed. Error: {}", e);
        }
        return;
    }

    match link.poll_sensors().await {
        Err(LinkError::Decode(e)) => {
            warn!("Discarding malformed sensor response. Error: {}", e);
        }
        Err(e) => {
            warn!("Sensor poll failed. Error: {}", e);
        }
        Ok(state) => {
            if let Err(e) = tx_sensor_state.send(state) {
                error!("Failed to broadcast sensor state. Error: {}", e);
            } else {
                debug!("Published sensor state: {}", state);
            }
        }
    }
}
