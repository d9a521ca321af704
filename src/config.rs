use std::time::Duration;

use clap::Parser;

/// Test-bench controller configuration.
#[derive(Parser, Debug, Clone)]
#[command(name = "bench-controller")]
#[command(about = "Drives the test-bench board over TCP", long_about = None)]
pub struct BenchConfig {
    /// Address of the embedded board.
    #[arg(long, default_value = "192.168.0.141")]
    pub host: String,

    /// TCP port of the embedded board.
    #[arg(long, default_value_t = 502)]
    pub port: u16,

    /// Sensor poll period in milliseconds.
    #[arg(long, default_value_t = 1000)]
    pub poll_interval_ms: u64,

    /// How long a connect attempt may take before it is abandoned.
    #[arg(long, default_value_t = 3000)]
    pub connect_timeout_ms: u64,

    /// How long to wait for a reply to a sent frame.
    #[arg(long, default_value_t = 3000)]
    pub request_timeout_ms: u64,

    /// Hold the operation gate while a load cell read is in flight.
    /// Off by default: load cell reads already serialize through the
    /// device link and the bench GUI never gated them.
    #[arg(long)]
    pub gate_load_cell_reads: bool,
}

impl BenchConfig {
    pub fn device_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}
