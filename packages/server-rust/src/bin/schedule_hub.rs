use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use schedule_hub_server::publish::{HttpPublisher, LogPublisher};
use schedule_hub_server::storage::{DEFAULT_OPERATION_TTL, MAX_OPERATION_TTL};
use schedule_hub_server::traits::Publisher;
use schedule_hub_server::{NetworkConfig, NetworkModule, ServiceConfig, Services};
use tracing::info;

#[derive(Parser)]
#[command(name = "schedule-hub")]
#[command(about = "Scheduling API with tracked async updates", long_about = None)]
struct Cli {
    /// Bind address
    #[arg(long, default_value = "0.0.0.0", env = "HOST")]
    host: String,

    #[arg(short, long, default_value_t = 3000, env = "PORT")]
    port: u16,

    /// Seconds an operation record lives after its last write
    #[arg(
        long,
        default_value_t = DEFAULT_OPERATION_TTL.as_secs(),
        env = "OPERATION_TTL_SECS",
        value_parser = clap::value_parser!(u64).range(1..=MAX_OPERATION_TTL.as_secs())
    )]
    operation_ttl_secs: u64,

    /// Soft cap on stored operation records
    #[arg(long, env = "OPERATION_CAPACITY")]
    operation_capacity: Option<usize>,

    /// Publisher destination for change notifications
    #[arg(long, env = "APPOINTMENT_TOPIC_ARN")]
    notification_destination: Option<String>,

    /// Broker gateway base URL; notifications are only logged when unset
    #[arg(long, env = "PUBLISHER_URL")]
    publisher_url: Option<String>,

    /// Apply async updates to the same resource one at a time
    #[arg(long, env = "SERIALIZE_PER_RESOURCE")]
    serialize_per_resource: bool,

    /// Notify on changes to every resource kind, not only appointments
    #[arg(long, env = "NOTIFY_ALL_KINDS")]
    notify_all_kinds: bool,

    #[arg(
        long,
        default_value_t = 60_000,
        env = "SWEEP_INTERVAL_MS",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    sweep_interval_ms: u64,

    /// Enable JSON logging
    #[arg(long, env = "JSON_LOGS")]
    json_logs: bool,

    /// Log filter (trace, debug, info, warn, error, or directives)
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    log_level: String,
}

impl Cli {
    fn service_config(&self) -> ServiceConfig {
        let config = ServiceConfig {
            operation_ttl: Duration::from_secs(self.operation_ttl_secs),
            operation_capacity: self.operation_capacity,
            notification_destination: self.notification_destination.clone(),
            serialize_per_resource: self.serialize_per_resource,
            sweep_interval: Duration::from_millis(self.sweep_interval_ms),
            ..ServiceConfig::default()
        };
        if self.notify_all_kinds {
            config.notify_all_kinds()
        } else {
            config
        }
    }

    fn network_config(&self) -> NetworkConfig {
        NetworkConfig {
            host: self.host.clone(),
            port: self.port,
            ..NetworkConfig::default()
        }
    }

    fn publisher(&self) -> Result<Arc<dyn Publisher>> {
        Ok(match &self.publisher_url {
            Some(url) => {
                info!(url = %url, "publishing through broker gateway");
                Arc::new(HttpPublisher::new(url.as_str())?)
            }
            None => {
                info!("no publisher URL set, notifications are logged only");
                Arc::new(LogPublisher)
            }
        })
    }
}

fn init_logging(level: &str, json: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let env_filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = if json {
        fmt::layer().json().with_current_span(false).boxed()
    } else {
        fmt::layer().with_target(false).boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.json_logs);

    info!("Starting schedule-hub v{}", env!("CARGO_PKG_VERSION"));

    let services = Services::in_memory(cli.service_config(), cli.publisher()?);
    let mut sweeper = services.start_sweeper();

    let mut network = NetworkModule::new(cli.network_config(), services);
    let port = network.start().await?;
    info!(port, "schedule-hub listening");

    let served = network
        .serve(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
            info!("Shutting down schedule-hub...");
        })
        .await;

    sweeper.stop().await;
    served
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operation_ttl_must_be_positive_and_bounded() {
        assert!(Cli::try_parse_from(["schedule-hub", "--operation-ttl-secs", "0"]).is_err());
        assert!(
            Cli::try_parse_from(["schedule-hub", "--operation-ttl-secs", &u64::MAX.to_string()])
                .is_err()
        );

        let cli = Cli::try_parse_from(["schedule-hub", "--operation-ttl-secs", "120"]).unwrap();
        assert_eq!(cli.service_config().operation_ttl, Duration::from_secs(120));
    }

    #[test]
    fn sweep_interval_must_be_positive() {
        assert!(Cli::try_parse_from(["schedule-hub", "--sweep-interval-ms", "0"]).is_err());
    }
}
