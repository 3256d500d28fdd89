use crates::infra::http::service_client::UpstreamEndpoints;

use super::stage::Stage;

#[derive(Debug, Clone)]
pub struct DotEnvyConfig {
    pub backend_server: BackendServer,
    pub upstream: Upstream,
    pub auth: Auth,
    pub checkout: Checkout,
    pub database: Option<Database>,
    pub stage: Stage,
}

#[derive(Debug, Clone)]
pub struct BackendServer {
    pub port: u16,
    pub body_limit: u64,
    pub timeout: u64,
}

#[derive(Debug, Clone)]
pub struct Upstream {
    pub endpoints: UpstreamEndpoints,
    pub timeout_secs: u64,
}

#[derive(Clone)]
pub struct Auth {
    pub jwt_secret: String,
}

impl std::fmt::Debug for Auth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Auth").field("jwt_secret", &"[REDACTED]").finish()
    }
}

#[derive(Debug, Clone)]
pub struct Checkout {
    pub currency: String,
    pub gateway_key_id: String,
}

#[derive(Debug, Clone)]
pub struct Database {
    pub url: String,
    pub max_connections: u32,
}
