//! Loopback stand-ins for the bench board, used by the async tests.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::connection::{ConnectionState, DeviceConnection};
use crate::gate::OperationGate;
use crate::link::{task_device_link, LinkClient, LinkRequest, LINK_QUEUE_DEPTH};

/// Bind a loopback listener that answers every received frame with
/// `response` and forwards each received frame for inspection.
pub async fn spawn_mock_device(
    response: Vec<u8>,
) -> (SocketAddr, mpsc::UnboundedReceiver<Vec<u8>>) {
    spawn_mock_device_with_delay(response, Duration::ZERO).await
}

/// Like [`spawn_mock_device`] but holding each reply back by `delay`, for
/// tests that need to observe state while a round trip is in flight.
pub async fn spawn_mock_device_with_delay(
    response: Vec<u8>,
    delay: Duration,
) -> (SocketAddr, mpsc::UnboundedReceiver<Vec<u8>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let rx_frames = serve_mock_device(listener, response, delay);
    (addr, rx_frames)
}

/// Like [`spawn_mock_device`] but on a caller-chosen address, for tests
/// that bring the device up after the controller started.
pub async fn spawn_mock_device_on(
    addr: SocketAddr,
    response: Vec<u8>,
) -> (SocketAddr, mpsc::UnboundedReceiver<Vec<u8>>) {
    let listener = TcpListener::bind(addr).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let rx_frames = serve_mock_device(listener, response, Duration::ZERO);
    (addr, rx_frames)
}

fn serve_mock_device(
    listener: TcpListener,
    response: Vec<u8>,
    delay: Duration,
) -> mpsc::UnboundedReceiver<Vec<u8>> {
    let (tx_frames, rx_frames) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                break;
            };
            let tx_frames = tx_frames.clone();
            let response = response.clone();
            tokio::spawn(async move {
                let mut buffer = [0u8; 1024];
                loop {
                    match socket.read(&mut buffer).await {
                        Ok(0) | Err(_) => break,
                        Ok(received) => {
                            tx_frames.send(buffer[..received].to_vec()).ok();
                            if !delay.is_zero() {
                                tokio::time::sleep(delay).await;
                            }
                            if socket.write_all(&response).await.is_err() {
                                break;
                            }
                        }
                    }
                }
            });
        }
    });
    rx_frames
}

/// A wired-up device link: client handle, its task, the shared gate and
/// the cancellation token.
pub struct LinkFixture {
    pub client: LinkClient,
    pub gate: OperationGate,
    pub token: CancellationToken,
    pub task: JoinHandle<()>,
}

/// Build a device link against `addr` with short timeouts suitable for
/// loopback tests.
pub async fn link_fixture(addr: String, gate_load_cell_reads: bool) -> LinkFixture {
    let token = CancellationToken::new();
    let gate = OperationGate::new();
    let connection =
        DeviceConnection::new(addr, Duration::from_millis(500), Duration::from_millis(500));

    let (tx_requests, rx_requests) = mpsc::channel::<LinkRequest>(LINK_QUEUE_DEPTH);
    let (tx_state, rx_state) = watch::channel(ConnectionState::Disconnected);

    let token_clone = token.clone();
    let task = tokio::spawn(async move {
        task_device_link(token_clone, connection, rx_requests, tx_state).await;
    });

    let client = LinkClient::new(tx_requests, rx_state, gate.clone(), gate_load_cell_reads);
    LinkFixture {
        client,
        gate,
        token,
        task,
    }
}
