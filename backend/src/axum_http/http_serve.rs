use crate::{
    auth::SharedAuthenticator,
    axum_http::{
        default_routers,
        routers::{self, checkout::CheckoutDeps},
    },
    config::config_model::DotEnvyConfig,
    usecases::{auth::AuthUseCase, checkout::CheckoutSettings},
};
use anyhow::Result;
use axum::{
    Extension, Router,
    http::{
        Method,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    routing::get,
};
use crates::{
    domain::repositories::payment_intents::PaymentIntentRepository,
    infra::http::{
        orders::OrderServiceClient, plans::PlanServiceClient, service_client::build_http_client,
        subscriptions::SubscriptionServiceClient, users::UserServiceClient,
    },
    payments::payment_service_client::PaymentServiceClient,
};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{error, info};

/// One client per upstream service, sharing a connection pool.
pub struct UpstreamClients {
    pub plans: Arc<PlanServiceClient>,
    pub orders: Arc<OrderServiceClient>,
    pub subscriptions: Arc<SubscriptionServiceClient>,
    pub users: Arc<UserServiceClient>,
    pub payments: Arc<PaymentServiceClient>,
}

impl UpstreamClients {
    pub fn from_config(config: &DotEnvyConfig) -> Result<Self> {
        let http = build_http_client(Duration::from_secs(config.upstream.timeout_secs))?;
        let endpoints = &config.upstream.endpoints;

        Ok(Self {
            plans: Arc::new(PlanServiceClient::new(http.clone(), &endpoints.plans)),
            orders: Arc::new(OrderServiceClient::new(http.clone(), &endpoints.orders)),
            subscriptions: Arc::new(SubscriptionServiceClient::new(
                http.clone(),
                &endpoints.subscriptions,
            )),
            users: Arc::new(UserServiceClient::new(http.clone(), &endpoints.users)),
            payments: Arc::new(PaymentServiceClient::new(
                http,
                &endpoints.payments,
                &config.checkout.currency,
            )),
        })
    }
}

pub fn app(
    config: &DotEnvyConfig,
    clients: UpstreamClients,
    intent_repo: Arc<dyn PaymentIntentRepository + Send + Sync>,
) -> Result<Router> {
    let auth_usecase = Arc::new(AuthUseCase::new(
        Arc::clone(&clients.users),
        config.auth.jwt_secret.clone(),
    ));
    let authenticator: SharedAuthenticator = auth_usecase.clone();

    let checkout_deps = CheckoutDeps {
        plan_repo: Arc::clone(&clients.plans),
        order_repo: Arc::clone(&clients.orders),
        subscription_repo: Arc::clone(&clients.subscriptions),
        intent_repo,
        gateway: Arc::clone(&clients.payments),
        settings: CheckoutSettings {
            gateway_key_id: config.checkout.gateway_key_id.clone(),
        },
    };

    let router = Router::new()
        .fallback(default_routers::not_found)
        .nest("/api/v1/auth", routers::auth::routes(auth_usecase))
        .nest("/api/v1/plans", routers::plans::routes(Arc::clone(&clients.plans)))
        .nest(
            "/api/v1/upgrades",
            routers::upgrades::routes(Arc::clone(&clients.plans), Arc::clone(&clients.orders)),
        )
        .nest("/api/v1/checkout", routers::checkout::routes(checkout_deps))
        .nest(
            "/api/v1/admin/orders",
            routers::admin_orders::routes(
                Arc::clone(&clients.orders),
                Arc::clone(&clients.users),
                Arc::clone(&clients.plans),
            ),
        )
        .route("/api/v1/health-check", get(default_routers::health_check))
        .layer(Extension(authenticator))
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.backend_server.timeout,
        )))
        .layer(RequestBodyLimitLayer::new(
            (config.backend_server.body_limit * 1024 * 1024).try_into()?,
        ))
        .layer(
            CorsLayer::new()
                .allow_methods([Method::GET, Method::POST])
                .allow_headers([AUTHORIZATION, CONTENT_TYPE])
                .allow_origin(Any),
        )
        .layer(TraceLayer::new_for_http());

    Ok(router)
}

pub async fn start(
    config: Arc<DotEnvyConfig>,
    intent_repo: Arc<dyn PaymentIntentRepository + Send + Sync>,
) -> Result<()> {
    let clients = UpstreamClients::from_config(&config)?;
    let app = app(&config, clients, intent_repo)?;

    let addr = SocketAddr::from(([0, 0, 0, 0], config.backend_server.port));
    let listener = TcpListener::bind(addr).await?;

    info!(
        port = config.backend_server.port,
        stage = %config.stage,
        "Server is running"
    );
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = ?err, "Failed to install CTRL+C signal handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = ?err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received ctrl+C signal"),
        _ = terminate => info!("Received terminate signal"),
    }
}
