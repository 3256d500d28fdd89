use std::env;
use tracing::Level;
use url::Url;

#[derive(Clone, Debug)]
pub(crate) struct ServiceContext {
    pub(crate) service_name: String,
    pub(crate) environment: String,
    pub(crate) component: String,
}

#[derive(Clone, Debug)]
pub(crate) struct AlertConfig {
    pub(crate) webhook_url: Url,
    pub(crate) min_level: Level,
}

#[derive(Clone, Debug)]
pub(crate) struct ObservabilityConfig {
    pub(crate) service_context: ServiceContext,
    pub(crate) alerts: Option<AlertConfig>,
    /// Collected before tracing exists; logged once the subscriber is up.
    pub(crate) warnings: Vec<String>,
}

impl ObservabilityConfig {
    pub(crate) fn from_env(component: &str) -> Self {
        Self::from_lookup(component, |key| env::var(key).ok())
    }

    pub(crate) fn from_lookup(component: &str, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let component = component.trim().to_string();
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let service_context = ServiceContext {
            service_name: non_empty("SERVICE_NAME").unwrap_or_else(|| component.clone()),
            environment: non_empty("STAGE").unwrap_or_else(|| "unknown".to_string()),
            component,
        };

        let mut warnings = Vec::new();
        let enabled = match non_empty("ALERT_NOTIFY_ENABLED") {
            Some(raw) => parse_bool(&raw).unwrap_or_else(|| {
                warnings.push(format!("ALERT_NOTIFY_ENABLED is invalid (value: {raw}); treating as enabled"));
                true
            }),
            None => true,
        };

        let webhook_url = match non_empty("ALERT_WEBHOOK_URL") {
            Some(raw) if enabled => match Url::parse(raw.trim()) {
                Ok(url) => Some(url),
                Err(err) => {
                    // The URL embeds a secret; only the parse error is reported.
                    warnings.push(format!(
                        "ALERT_WEBHOOK_URL is set but invalid; operator alerts disabled (parse error: {err})"
                    ));
                    None
                }
            },
            _ => None,
        };

        let alerts = webhook_url.map(|webhook_url| {
            let min_level = match non_empty("ALERT_MIN_LEVEL") {
                Some(raw) => parse_level(&raw).unwrap_or_else(|| {
                    warnings.push(format!("ALERT_MIN_LEVEL is invalid (value: {raw}); defaulting to ERROR"));
                    Level::ERROR
                }),
                None => Level::ERROR,
            };
            AlertConfig {
                webhook_url,
                min_level,
            }
        });

        Self {
            service_context,
            alerts,
            warnings,
        }
    }
}

fn parse_level(input: &str) -> Option<Level> {
    match input.trim().to_ascii_lowercase().as_str() {
        "error" => Some(Level::ERROR),
        "warn" | "warning" => Some(Level::WARN),
        "info" => Some(Level::INFO),
        _ => None,
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
