use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;
use hold::HoldConfig;

/// Runtime settings. Every flag falls back to its environment variable.
#[derive(Clone, Debug, Parser)]
#[clap(name = "hold-gateway", version)]
pub struct AppConfig {
    /// Address the WebSocket listener binds to.
    #[clap(long, env = "HOLD_LISTEN_ADDR", default_value = "0.0.0.0:8080")]
    pub listen_addr: SocketAddr,

    /// How long a claim or renewal keeps a car exclusive.
    #[clap(long, env = "HOLD_DURATION_SECS", default_value_t = 600)]
    pub hold_duration_secs: u64,

    /// Cadence of the background expiry sweep.
    #[clap(long, env = "HOLD_SWEEP_INTERVAL_MS", default_value_t = 1_000)]
    pub sweep_interval_ms: u64,

    /// How long released/expired holds stay visible to `inspect`.
    #[clap(long, env = "HOLD_TOMBSTONE_RETENTION_SECS", default_value_t = 300)]
    pub tombstone_retention_secs: u64,

    /// Events buffered per room before a slow connection starts lagging.
    #[clap(long, env = "HOLD_ROOM_CHANNEL_CAPACITY", default_value_t = 64)]
    pub room_channel_capacity: usize,

    /// Emit JSON logs (also switched on by `APP_ENV=production`).
    #[clap(long)]
    pub json_logs: bool,
}

impl AppConfig {
    pub fn hold_config(&self) -> HoldConfig {
        HoldConfig {
            hold_duration: Duration::from_secs(self.hold_duration_secs),
            tombstone_retention: Duration::from_secs(self.tombstone_retention_secs),
        }
    }

    pub fn sweep_interval(&self) -> Duration {
        // zero would make tokio's interval panic
        Duration::from_millis(self.sweep_interval_ms.max(1))
    }

    pub fn use_json_logs(&self) -> bool {
        self.json_logs || std::env::var("APP_ENV").unwrap_or_default() == "production"
    }
}
