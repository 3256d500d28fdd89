use anyhow::{Context, Result};

use super::config_model::{Database, DotEnvyConfig, Reconcile, Upstream};

pub fn load() -> Result<DotEnvyConfig> {
    dotenvy::dotenv().ok();
    load_from(|key| std::env::var(key).ok())
}

pub fn load_from(lookup: impl Fn(&str) -> Option<String>) -> Result<DotEnvyConfig> {
    let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
    let required = |key: &str| var(key).with_context(|| format!("{key} is invalid"));

    let database = Database {
        url: required("DATABASE_URL")?,
        max_connections: var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|| "4".to_string())
            .parse()
            .context("DATABASE_MAX_CONNECTIONS is invalid")?,
    };

    let subscriptions_url = var("SUBSCRIPTION_SERVICE_URL")
        .or_else(|| var("UPSTREAM_GATEWAY_URL"))
        .context("SUBSCRIPTION_SERVICE_URL or UPSTREAM_GATEWAY_URL is required")?;
    let upstream = Upstream {
        subscriptions_url: subscriptions_url.trim_end_matches('/').to_string(),
        timeout_secs: var("UPSTREAM_TIMEOUT_SECS")
            .unwrap_or_else(|| "10".to_string())
            .parse()
            .context("UPSTREAM_TIMEOUT_SECS is invalid")?,
    };

    let reconcile = Reconcile {
        interval_secs: var("RECONCILE_INTERVAL_SECS")
            .unwrap_or_else(|| "60".to_string())
            .parse()
            .context("RECONCILE_INTERVAL_SECS is invalid")?,
        max_attempts: var("RECONCILE_MAX_ATTEMPTS")
            .unwrap_or_else(|| "5".to_string())
            .parse()
            .context("RECONCILE_MAX_ATTEMPTS is invalid")?,
        batch_size: var("RECONCILE_BATCH_SIZE")
            .unwrap_or_else(|| "50".to_string())
            .parse()
            .context("RECONCILE_BATCH_SIZE is invalid")?,
        service_token: required("RECONCILER_SERVICE_TOKEN")?,
    };

    Ok(DotEnvyConfig {
        database,
        upstream,
        reconcile,
    })
}
