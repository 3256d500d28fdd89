use anyhow::Result;
use backend::axum_http::http_serve;
use backend::config::config_loader;
use crates::domain::repositories::payment_intents::PaymentIntentRepository;
use crates::infra::{
    db::{postgres::postgres_connection, repositories::payment_intents::PaymentIntentPostgres},
    memory::payment_intents::InMemoryPaymentIntentRepository,
};
use std::sync::Arc;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        error!("Backend exited with error: {:?}", error);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    dotenvy::dotenv().ok();
    crates::observability::init_observability("backend")?;

    let dotenvy_env = config_loader::load()?;
    info!(stage = %dotenvy_env.stage, "ENV has been loaded");

    let intent_repo: Arc<dyn PaymentIntentRepository + Send + Sync> = match &dotenvy_env.database {
        Some(database) => {
            let postgres_pool =
                postgres_connection::establish_connection(&database.url, database.max_connections)?;
            info!("Postgres connection has been established");
            Arc::new(PaymentIntentPostgres::new(Arc::new(postgres_pool)))
        }
        None => {
            warn!("DATABASE_URL not set; payment intents are kept in memory");
            Arc::new(InMemoryPaymentIntentRepository::new())
        }
    };

    http_serve::start(Arc::new(dotenvy_env), intent_repo).await?;

    Ok(())
}
