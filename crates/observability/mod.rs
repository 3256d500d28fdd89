mod config;
mod layer;
mod notifier;
mod webhook;

use anyhow::Result;
use config::ObservabilityConfig;
use layer::OperatorAlertLayer;
use notifier::AlertDispatcher;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use webhook::WebhookAlertSink;

const ALERT_QUEUE_CAPACITY: usize = 256;

/// Installs the global subscriber: RUST_LOG-driven fmt output plus, when
/// `ALERT_WEBHOOK_URL` is configured, operator alerts. Must run inside a
/// tokio runtime.
pub fn init_observability(component: &str) -> Result<()> {
    let config = ObservabilityConfig::from_env(component);
    let mut warnings = config.warnings.clone();

    let alert_layer = match config.alerts.as_ref() {
        Some(alerts) => match WebhookAlertSink::new(alerts.webhook_url.clone()) {
            Ok(sink) => {
                let dispatcher = AlertDispatcher::spawn(vec![Arc::new(sink)], ALERT_QUEUE_CAPACITY);
                Some(
                    OperatorAlertLayer::new(dispatcher, config.service_context.clone(), alerts.min_level)
                        .with_filter(LevelFilter::from_level(alerts.min_level)),
                )
            }
            Err(err) => {
                warnings.push(format!("alert webhook client could not be built: {err}"));
                None
            }
        },
        None => None,
    };
    let alerts_enabled = alert_layer.is_some();

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // Local time so `TZ=Asia/Kolkata` shows `+05:30` in logs.
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339());

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(alert_layer)
        .with(env_filter)
        .try_init()?;

    for warning in &warnings {
        warn!(
            service = %config.service_context.service_name,
            environment = %config.service_context.environment,
            warning = %warning,
            "observability: config warning"
        );
    }

    info!(
        service = %config.service_context.service_name,
        environment = %config.service_context.environment,
        component = %config.service_context.component,
        alerts_enabled,
        "observability: initialized"
    );

    Ok(())
}
