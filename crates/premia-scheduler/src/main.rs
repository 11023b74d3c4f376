use anyhow::{Context, Result};
use chrono::Utc;
use futures_util::StreamExt;
use premia_billing::{generate_for_all_active, generate_for_policy_id};
use premia_platform::{
    EventBus, POLICIES_ACTIVATED_CHANNEL, PolicyActivatedEvent, ServiceConfig, connect_database,
};
use redis::Msg;
use sqlx::PgPool;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "premia_scheduler=info".to_string()),
        )
        .init();

    let config = ServiceConfig::from_env()?;
    let pool = connect_database(&config).await?;
    let bus = EventBus::connect(&config.redis_url)?;

    run_batch(&pool).await?;

    let mut pubsub = bus.subscribe(POLICIES_ACTIVATED_CHANNEL).await?;
    let mut messages = pubsub.on_message();

    info!("scheduler subscribed to {POLICIES_ACTIVATED_CHANNEL}");

    loop {
        let msg = messages
            .next()
            .await
            .context("policy activation stream ended unexpectedly")?;
        if let Err(err) = handle_activation(&pool, msg).await {
            error!("failed to process activation: {err:#}");
        }
    }
}

/// One pass over every active policy. Per-policy failures are reported
/// and the run keeps going; re-running is safe because generation skips
/// due dates already on file.
async fn run_batch(pool: &PgPool) -> Result<()> {
    let today = Utc::now().date_naive();
    let outcome = generate_for_all_active(pool, today).await?;

    info!(
        "batch run: {} policies processed, {} payments created",
        outcome.policies_processed, outcome.payments_created
    );
    for failure in &outcome.errors {
        error!("policy {}: {}", failure.policy_id, failure.error);
    }

    Ok(())
}

async fn handle_activation(pool: &PgPool, msg: Msg) -> Result<()> {
    let payload: String = msg.get_payload()?;
    let event: PolicyActivatedEvent = serde_json::from_str(&payload)?;

    let today = Utc::now().date_naive();
    let created = generate_for_policy_id(pool, event.policy_id, today).await?;
    info!(
        "policy {} activated, {created} payments scheduled",
        event.policy_id
    );

    Ok(())
}
