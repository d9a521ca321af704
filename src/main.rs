pub mod config;
pub mod connection;
pub mod gate;
pub mod link;
pub mod models;
pub mod tasks;

#[cfg(test)]
mod testutil;

use anyhow::Result;
use clap::Parser;
use tokio::{
    signal,
    sync::{broadcast, mpsc, watch},
};
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::level_filters::LevelFilter;

use config::BenchConfig;
use connection::{ConnectionState, DeviceConnection};
use gate::OperationGate;
use link::{task_device_link, LinkClient, LinkRequest, LINK_QUEUE_DEPTH};
use tasks::poller::task_poll_sensors;
use tasks::status::{task_link_status_logging, task_sensor_state_logging};

#[tokio::main]
async fn main() -> Result<()> {
    let bench_config = BenchConfig::parse();

    let subscriber = tracing_subscriber::fmt()
        .compact()
        .with_file(true)
        .with_line_number(true)
        .with_thread_ids(true)
        .with_target(false)
        .with_max_level(LevelFilter::DEBUG)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    let tracker = TaskTracker::new();

    let token = CancellationToken::new();

    let gate = OperationGate::new();
    let (tx_requests, rx_requests) = mpsc::channel::<LinkRequest>(LINK_QUEUE_DEPTH);
    let (tx_state, rx_state) = watch::channel(ConnectionState::Disconnected);
    let (tx_sensor_state, rx_sensor_state) = broadcast::channel(32);

    let device_connection = DeviceConnection::new(
        bench_config.device_addr(),
        bench_config.connect_timeout(),
        bench_config.request_timeout(),
    );
    let link = LinkClient::new(
        tx_requests,
        rx_state.clone(),
        gate.clone(),
        bench_config.gate_load_cell_reads,
    );

    let token_clone = token.clone();
    tracker.spawn(async {
        task_device_link(token_clone, device_connection, rx_requests, tx_state).await
    });

    let token_clone = token.clone();
    let gate_clone = gate.clone();
    let tx_sensor_state_clone = tx_sensor_state.clone();
    let poll_period = bench_config.poll_interval();
    tracker.spawn(async move {
        task_poll_sensors(
            token_clone,
            link,
            gate_clone,
            tx_sensor_state_clone,
            poll_period,
        )
        .await
    });

    let token_clone = token.clone();
    tracker.spawn(async { task_link_status_logging(token_clone, rx_state).await });

    let token_clone = token.clone();
    tracker.spawn(async { task_sensor_state_logging(token_clone, rx_sensor_state).await });

    let token_clone = token.clone();
    tokio::select! {
        _ = token_clone.cancelled() => {}
        res = signal::ctrl_c() => {
            match res {
                Ok(_) => {
                    token.cancel();
                },
                Err(e) => {
                    tracing::error!("Failed to listen for ctrl_c. Error: {}", e);
                    token.cancel();
                }
            };
        },
    }

    tracker.close();
    tracker.wait().await;

    Ok(())
}
