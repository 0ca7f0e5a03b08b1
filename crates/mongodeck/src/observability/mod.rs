//! Observability module for logging and metrics

#[cfg(feature = "metrics")]
mod metrics;

#[cfg(feature = "metrics")]
pub use metrics::{
    init_metrics, record_client_build, record_client_close, record_client_lookup,
    render_metrics, set_resident_clients,
};

use crate::Result;
use crate::config::ObservabilityConfig;

/// Initialize observability stack
pub fn init_observability(config: &ObservabilityConfig) -> Result<()> {
    #[cfg(feature = "metrics")]
    {
        init_metrics()?;
    }

    init_logging(config);
    Ok(())
}

/// Install the global `tracing` subscriber.
///
/// `RUST_LOG` wins over the configured level.
fn init_logging(config: &ObservabilityConfig) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::{EnvFilter, Layer};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| filter_for(config));

    let fmt_layer = if config.json_logs {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer().with_target(true).boxed()
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

fn filter_for(config: &ObservabilityConfig) -> tracing_subscriber::EnvFilter {
    tracing_subscriber::EnvFilter::try_new(&config.log_level)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_for_configured_level() {
        let config = ObservabilityConfig {
            log_level: "mongodeck=debug,tower_http=warn".to_string(),
            json_logs: false,
        };
        let filter = filter_for(&config).to_string();
        assert!(filter.contains("mongodeck=debug"));
    }

    #[test]
    fn test_filter_for_invalid_level_falls_back() {
        let config = ObservabilityConfig {
            log_level: "mongodeck=verbose".to_string(),
            json_logs: true,
        };
        assert_eq!(filter_for(&config).to_string(), "info");
    }
}
