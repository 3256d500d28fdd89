use anyhow::{Context, Result};
use crates::infra::http::service_client::UpstreamEndpoints;

use super::{
    config_model::{Auth, BackendServer, Checkout, Database, DotEnvyConfig, Upstream},
    stage::Stage,
};

pub fn load() -> Result<DotEnvyConfig> {
    dotenvy::dotenv().ok();
    load_from(|key| std::env::var(key).ok())
}

pub fn load_from(lookup: impl Fn(&str) -> Option<String>) -> Result<DotEnvyConfig> {
    let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
    let required = |key: &str| var(key).with_context(|| format!("{key} is invalid"));

    let backend_server = BackendServer {
        port: required("SERVER_PORT_BACKEND")?
            .parse()
            .context("SERVER_PORT_BACKEND is invalid")?,
        body_limit: var("SERVER_BODY_LIMIT")
            .unwrap_or_else(|| "2".to_string())
            .parse()
            .context("SERVER_BODY_LIMIT is invalid")?,
        timeout: var("SERVER_TIMEOUT")
            .unwrap_or_else(|| "30".to_string())
            .parse()
            .context("SERVER_TIMEOUT is invalid")?,
    };

    let gateway = required("UPSTREAM_GATEWAY_URL")?;
    let mut endpoints = UpstreamEndpoints::behind_gateway(&gateway);
    for (key, slot) in [
        ("PLAN_SERVICE_URL", &mut endpoints.plans),
        ("ORDER_SERVICE_URL", &mut endpoints.orders),
        ("SUBSCRIPTION_SERVICE_URL", &mut endpoints.subscriptions),
        ("PAYMENT_SERVICE_URL", &mut endpoints.payments),
        ("USER_SERVICE_URL", &mut endpoints.users),
    ] {
        if let Some(url) = var(key) {
            *slot = url.trim_end_matches('/').to_string();
        }
    }

    let upstream = Upstream {
        endpoints,
        timeout_secs: var("UPSTREAM_TIMEOUT_SECS")
            .unwrap_or_else(|| "10".to_string())
            .parse()
            .context("UPSTREAM_TIMEOUT_SECS is invalid")?,
    };

    let auth = Auth {
        jwt_secret: required("JWT_SECRET")?,
    };

    let checkout = Checkout {
        currency: var("PAYMENT_CURRENCY").unwrap_or_else(|| "INR".to_string()),
        gateway_key_id: required("GATEWAY_KEY_ID")?,
    };

    let database = match var("DATABASE_URL") {
        Some(url) => Some(Database {
            url,
            max_connections: var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|| "10".to_string())
                .parse()
                .context("DATABASE_MAX_CONNECTIONS is invalid")?,
        }),
        None => None,
    };

    let stage = var("STAGE")
        .and_then(|raw| Stage::try_from(&raw).ok())
        .unwrap_or_default();

    Ok(DotEnvyConfig {
        backend_server,
        upstream,
        auth,
        checkout,
        database,
        stage,
    })
}
