use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::{info, trace, warn};

use bench_protocol::{
    decode_load_cell_response, decode_sensor_response, Command, DecodeError, FrameError,
    MotorDirection, SensorState,
};

use crate::connection::{ConnectionState, DeviceConnection, DeviceError};
use crate::gate::OperationGate;
use crate::models::load_cell::LoadCellValue;

/// Capacity of the request channel. One slot keeps exactly one request
/// outstanding on the wire; a second caller waits in `send`.
pub const LINK_QUEUE_DEPTH: usize = 1;

/// Represents errors surfaced to callers of [`LinkClient`].
#[derive(Error, Debug)]
pub enum LinkError {
    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("device link task is no longer running")]
    LinkClosed,
}

/// A request serviced by the device link task. Frames are encoded by the
/// client so parameter errors surface before anything is queued.
pub enum LinkRequest {
    Roundtrip {
        frame: Vec<u8>,
        reply: oneshot::Sender<Result<Vec<u8>, DeviceError>>,
    },
    Connect {
        reply: oneshot::Sender<Result<(), DeviceError>>,
    },
}

/// Task: owns the [`DeviceConnection`] and services requests one at a time
/// from the shared channel, publishing the connection state after each.
/// This is the mutual exclusion for the single socket: no other code ever
/// touches it. Can be cancelled.
#[tracing::instrument(skip_all)]
pub async fn task_device_link(
    token: CancellationToken,
    mut connection: DeviceConnection,
    mut rx_requests: mpsc::Receiver<LinkRequest>,
    tx_state: watch::Sender<ConnectionState>,
) {
    info!("Started.");
    loop {
        tokio::select! {
            _ = token.cancelled() => {
                warn!("Cancelled.");
                break;
            },
            request = rx_requests.recv() => {
                let Some(request) = request else {
                    warn!("All link clients dropped.");
                    break;
                };
                handle_request(&mut connection, request, &tx_state).await;
            }
        };
    }
    connection.close();
    publish_state(&tx_state, connection.state());
}

/// Service one request. State is published before the reply is released so
/// a caller that awaits its reply always sees the state its own request
/// produced.
async fn handle_request(
    connection: &mut DeviceConnection,
    request: LinkRequest,
    tx_state: &watch::Sender<ConnectionState>,
) {
    match request {
        LinkRequest::Roundtrip { frame, reply } => {
            trace!("Round trip for frame: {:02X?}.", frame);
            let result = connection.send_request(&frame).await;
            publish_state(tx_state, connection.state());
            if reply.send(result).is_err() {
                warn!("Link client dropped before its reply arrived.");
            }
        }
        LinkRequest::Connect { reply } => {
            trace!("Explicit connect requested.");
            let result = connection.connect().await;
            publish_state(tx_state, connection.state());
            if reply.send(result).is_err() {
                warn!("Link client dropped before its reply arrived.");
            }
        }
    }
}

fn publish_state(tx_state: &watch::Sender<ConnectionState>, state: ConnectionState) {
    tx_state.send_if_modified(|current| {
        if *current != state {
            *current = state;
            true
        } else {
            false
        }
    });
}

/// Cloneable handle to the device link. All bench operations go through
/// here; actuation commands hold the operation gate for their round trip.
#[derive(Clone)]
pub struct LinkClient {
    tx_requests: mpsc::Sender<LinkRequest>,
    rx_state: watch::Receiver<ConnectionState>,
    gate: OperationGate,
    gate_load_cell_reads: bool,
}

impl LinkClient {
    pub fn new(
        tx_requests: mpsc::Sender<LinkRequest>,
        rx_state: watch::Receiver<ConnectionState>,
        gate: OperationGate,
        gate_load_cell_reads: bool,
    ) -> Self {
        Self {
            tx_requests,
            rx_state,
            gate,
            gate_load_cell_reads,
        }
    }

    /// Last connection state published by the link task.
    pub fn connection_state(&self) -> ConnectionState {
        *self.rx_state.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.connection_state() == ConnectionState::Connected
    }

    /// Ask the link task for one explicit connect attempt.
    pub async fn connect(&self) -> Result<(), LinkError> {
        let (tx_reply, rx_reply) = oneshot::channel();
        self.tx_requests
            .send(LinkRequest::Connect { reply: tx_reply })
            .await
            .map_err(|_| LinkError::LinkClosed)?;
        rx_reply.await.map_err(|_| LinkError::LinkClosed)??;
        Ok(())
    }

    async fn roundtrip(&self, command: Command) -> Result<Vec<u8>, LinkError> {
        let frame = command.encode()?;
        let (tx_reply, rx_reply) = oneshot::channel();
        self.tx_requests
            .send(LinkRequest::Roundtrip {
                frame,
                reply: tx_reply,
            })
            .await
            .map_err(|_| LinkError::LinkClosed)?;
        let response = rx_reply.await.map_err(|_| LinkError::LinkClosed)??;
        Ok(response)
    }

    /// One sensor poll round trip, decoded.
    pub async fn poll_sensors(&self) -> Result<SensorState, LinkError> {
        let response = self.roundtrip(Command::PollSensors).await?;
        Ok(decode_sensor_response(&response)?)
    }

    /// Energize or release a relay. Holds the gate for the round trip.
    pub async fn set_relay(&self, relay: u8, on: bool) -> Result<(), LinkError> {
        let _guard = self.gate.engage();
        let command = if on {
            Command::RelayOn(relay)
        } else {
            Command::RelayOff(relay)
        };
        self.roundtrip(command).await?;
        Ok(())
    }

    /// Spin an internal motor. Holds the gate for the round trip.
    pub async fn drive_internal_motor(
        &self,
        motor: u8,
        direction: MotorDirection,
    ) -> Result<(), LinkError> {
        let _guard = self.gate.engage();
        let command = match direction {
            MotorDirection::Clockwise => Command::InternalMotorCw(motor),
            MotorDirection::CounterClockwise => Command::InternalMotorCcw(motor),
        };
        self.roundtrip(command).await?;
        Ok(())
    }

    /// Trigger an external motor action. Holds the gate for the round trip.
    pub async fn trigger_external_motor(&self, motor: u8) -> Result<(), LinkError> {
        let _guard = self.gate.engage();
        self.roundtrip(Command::ExternalMotorControl(motor)).await?;
        Ok(())
    }

    /// Read a single load cell on demand. Gating is configurable; see
    /// `BenchConfig::gate_load_cell_reads`.
    pub async fn read_load_cell(&self, cell: u8) -> Result<LoadCellValue, LinkError> {
        let _guard = self.gate_load_cell_reads.then(|| self.gate.engage());
        let response = self.roundtrip(Command::ReadLoadCell(cell)).await?;
        let value = decode_load_cell_response(&response)?;
        Ok(LoadCellValue::new(cell, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{link_fixture, spawn_mock_device, spawn_mock_device_with_delay};
    use std::time::Duration;

    fn load_cell_response(value: f32) -> Vec<u8> {
        let mut response = vec![0x7E, 0xB4];
        response.extend_from_slice(&value.to_le_bytes());
        response.push(0xAA);
        response
    }

    #[tokio::test]
    async fn test_actuation_round_trip() {
        let (addr, mut rx_frames) = spawn_mock_device(vec![0x7E, 0xB1, 0x00, 0xAA]).await;
        let fixture = link_fixture(addr.to_string(), false).await;

        fixture.client.set_relay(3, true).await.unwrap();
        assert_eq!(
            rx_frames.recv().await.unwrap(),
            vec![0x7E, 0xB1, 0x03, 0x01, 0xAA]
        );
        assert!(!fixture.gate.get(), "gate must clear after the round trip");
        assert!(fixture.client.is_connected());
    }

    #[tokio::test]
    async fn test_motor_commands() {
        let (addr, mut rx_frames) = spawn_mock_device(vec![0x7E, 0xB2, 0x00, 0xAA]).await;
        let fixture = link_fixture(addr.to_string(), false).await;

        fixture
            .client
            .drive_internal_motor(2, MotorDirection::CounterClockwise)
            .await
            .unwrap();
        assert_eq!(
            rx_frames.recv().await.unwrap(),
            vec![0x7E, 0xB2, 0x02, 0xFF, 0xAA]
        );

        fixture.client.trigger_external_motor(4).await.unwrap();
        assert_eq!(
            rx_frames.recv().await.unwrap(),
            vec![0x7E, 0xB3, 0x04, 0x00, 0xAA]
        );
    }

    #[tokio::test]
    async fn test_read_load_cell() {
        let (addr, mut rx_frames) = spawn_mock_device(load_cell_response(12.345)).await;
        let fixture = link_fixture(addr.to_string(), false).await;

        let value = fixture.client.read_load_cell(2).await.unwrap();
        assert_eq!(rx_frames.recv().await.unwrap(), vec![0x7E, 0xB4, 0x01, 0xAA]);
        assert_eq!(value.cell, 2);
        assert_eq!(value.rounded(), 12.35);
    }

    #[tokio::test]
    async fn test_gated_load_cell_read_holds_gate_for_round_trip() {
        let (addr, mut rx_frames) =
            spawn_mock_device_with_delay(load_cell_response(1.0), Duration::from_millis(200)).await;
        let fixture = link_fixture(addr.to_string(), true).await;

        let client = fixture.client.clone();
        let read = tokio::spawn(async move { client.read_load_cell(1).await });

        // The reply is held back, so the read is still in flight once its
        // frame reaches the wire; the gate must be engaged.
        assert_eq!(rx_frames.recv().await.unwrap(), vec![0x7E, 0xB4, 0x00, 0xAA]);
        assert!(fixture.gate.get(), "gate must be held while the read is in flight");

        let value = read.await.unwrap().unwrap();
        assert_eq!(value.cell, 1);
        assert!(!fixture.gate.get(), "gate must clear after the round trip");
    }

    #[tokio::test]
    async fn test_ungated_load_cell_read_leaves_gate_clear() {
        let (addr, mut rx_frames) =
            spawn_mock_device_with_delay(load_cell_response(1.0), Duration::from_millis(200)).await;
        let fixture = link_fixture(addr.to_string(), false).await;

        let client = fixture.client.clone();
        let read = tokio::spawn(async move { client.read_load_cell(1).await });

        // Default behavior: the read serializes through the link but never
        // touches the gate, even mid-flight.
        assert_eq!(rx_frames.recv().await.unwrap(), vec![0x7E, 0xB4, 0x00, 0xAA]);
        assert!(!fixture.gate.get());

        read.await.unwrap().unwrap();
        assert!(!fixture.gate.get());
    }

    #[tokio::test]
    async fn test_invalid_parameter_sends_nothing() {
        let (addr, mut rx_frames) = spawn_mock_device(vec![0x00]).await;
        let fixture = link_fixture(addr.to_string(), false).await;

        let err = fixture.client.set_relay(9, true).await.unwrap_err();
        assert!(matches!(err, LinkError::Frame(_)));
        assert!(rx_frames.try_recv().is_err(), "no frame may reach the wire");
        assert!(!fixture.gate.get());
    }

    #[tokio::test]
    async fn test_poll_sensors_decodes() {
        let (addr, _rx_frames) = spawn_mock_device(vec![0x7E, 0xB0, 0b1000_0000, 0x00, 0xAA]).await;
        let fixture = link_fixture(addr.to_string(), false).await;

        let state = fixture.client.poll_sensors().await.unwrap();
        assert_eq!(state.is_active(1), Some(true));
        assert_eq!(state.is_active(2), Some(false));
    }

    #[tokio::test]
    async fn test_connect_publishes_state() {
        let (addr, _rx_frames) = spawn_mock_device(vec![0x00]).await;
        let fixture = link_fixture(addr.to_string(), false).await;

        assert_eq!(
            fixture.client.connection_state(),
            ConnectionState::Disconnected
        );
        fixture.client.connect().await.unwrap();
        assert_eq!(
            fixture.client.connection_state(),
            ConnectionState::Connected
        );
    }

    #[tokio::test]
    async fn test_link_closed_after_cancel() {
        let (addr, _rx_frames) = spawn_mock_device(vec![0x00]).await;
        let fixture = link_fixture(addr.to_string(), false).await;

        fixture.token.cancel();
        fixture.task.await.unwrap();

        let err = fixture.client.connect().await.unwrap_err();
        assert!(matches!(err, LinkError::LinkClosed));
    }
}
