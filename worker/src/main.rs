use anyhow::Result;
use crates::{
    domain::{
        repositories::{
            payment_intents::PaymentIntentRepository, subscriptions::SubscriptionRepository,
        },
        value_objects::sessions::AccessToken,
    },
    infra::{
        db::{postgres::postgres_connection, repositories::payment_intents::PaymentIntentPostgres},
        http::{service_client::build_http_client, subscriptions::SubscriptionServiceClient},
    },
};
use std::{sync::Arc, time::Duration};
use tracing::{error, info};
use worker::{
    config,
    services::worker_loop,
    usecases::reconcile_partial_assignments::{
        ReconcileParams, ReconcilePartialAssignmentsUseCase,
    },
};

#[tokio::main]
async fn main() -> Result<()> {
    if let Err(error) = run().await {
        error!("Worker exited with error: {}", error);
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> Result<()> {
    dotenvy::dotenv().ok();
    crates::observability::init_observability("worker")?;

    let dotenvy_env = config::config_loader::load()?;
    info!("ENV has been loaded");

    let postgres_pool = postgres_connection::establish_connection(
        &dotenvy_env.database.url,
        dotenvy_env.database.max_connections,
    )?;
    info!("Postgres connection has been established");

    let intent_repo: Arc<dyn PaymentIntentRepository + Send + Sync> =
        Arc::new(PaymentIntentPostgres::new(Arc::new(postgres_pool)));

    let http = build_http_client(Duration::from_secs(dotenvy_env.upstream.timeout_secs))?;
    let subscription_repo: Arc<dyn SubscriptionRepository + Send + Sync> = Arc::new(
        SubscriptionServiceClient::new(http, dotenvy_env.upstream.subscriptions_url.clone()),
    );

    let usecase = Arc::new(ReconcilePartialAssignmentsUseCase::new(
        intent_repo,
        subscription_repo,
        AccessToken::new(dotenvy_env.reconcile.service_token.clone()),
        ReconcileParams {
            max_attempts: dotenvy_env.reconcile.max_attempts,
            batch_size: dotenvy_env.reconcile.batch_size,
        },
    ));

    let reconcile_loop = tokio::spawn(worker_loop::run_reconcile_loop(
        usecase,
        Duration::from_secs(dotenvy_env.reconcile.interval_secs),
    ));

    tokio::select! {
        result = reconcile_loop => result??,
        _ = tokio::signal::ctrl_c() => info!("Received ctrl+C signal"),
    };
    Ok(())
}
