//! Pizza delivery storefront server

use std::sync::Arc;

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pizza_delivery::payments::{DisabledGateway, DynPaymentGateway, StripeGateway};
use pizza_delivery::publisher::EventPublisher;
use pizza_delivery::store::PgStore;
use pizza_delivery::{router, AppState, Settings};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = Settings::from_env()?;
    let db = PgPoolOptions::new().max_connections(10).connect(&settings.database_url).await?;
    sqlx::migrate!("./migrations").run(&db).await?;

    let payments: DynPaymentGateway = match &settings.stripe.secret_key {
        Some(key) => Arc::new(StripeGateway::new(key.clone(), settings.stripe.webhook_secret.clone())),
        None => {
            tracing::warn!("STRIPE_SECRET_KEY not set; card checkout is disabled");
            Arc::new(DisabledGateway)
        }
    };

    let nats = match &settings.nats_url {
        Some(url) => match async_nats::connect(url.as_str()).await {
            Ok(client) => Some(client),
            Err(e) => {
                tracing::warn!(error = %e, "NATS unavailable; order events are only logged");
                None
            }
        },
        None => None,
    };

    let port = settings.port;
    let state = AppState::new(settings, Arc::new(PgStore::new(db)), payments, EventPublisher::new(nats));
    let app = router(state);

    tracing::info!("🍕 Pizza delivery listening on 0.0.0.0:{}", port);
    axum::serve(tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?, app).await?;
    Ok(())
}
