#[derive(Debug, Clone)]
pub struct DotEnvyConfig {
    pub database: Database,
    pub upstream: Upstream,
    pub reconcile: Reconcile,
}

#[derive(Debug, Clone)]
pub struct Database {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone)]
pub struct Upstream {
    pub subscriptions_url: String,
    pub timeout_secs: u64,
}

#[derive(Clone)]
pub struct Reconcile {
    pub interval_secs: u64,
    pub max_attempts: i32,
    pub batch_size: i64,
    pub service_token: String,
}

impl std::fmt::Debug for Reconcile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconcile")
            .field("interval_secs", &self.interval_secs)
            .field("max_attempts", &self.max_attempts)
            .field("batch_size", &self.batch_size)
            .field("service_token", &"[REDACTED]")
            .finish()
    }
}
