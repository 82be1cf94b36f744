//! Sandbox walkthrough: provision a user, collect from a test payer, then
//! disburse part of it back and wait for both transactions to settle.
//!
//! Reads `MOMO_*` variables (see `MomoConfig::from_env`); a `.env` file is
//! picked up when present.

use anyhow::{bail, Context as _};
use momo_mtn::{
    init_tracing, timestamped_idempotency_key, Context, MomoClient, MomoConfig, PollConfig,
    Product, SubmitOptions,
};
use rust_decimal::Decimal;
use std::time::Duration;
use tracing::{error, info, warn};

const SANDBOX_PAYER: &str = "46733123454";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = MomoConfig::from_env().context("failed to load MoMo configuration")?;
    let client = MomoClient::new(config).context("failed to create MoMo client")?;
    let ctx = Context::background().with_timeout(Duration::from_secs(60));

    if let Err(e) = run(&client, &ctx).await {
        error!(error = %e, "sandbox flow failed");
        client.close().await;
        return Err(e);
    }

    client.close().await;
    Ok(())
}

async fn run(client: &MomoClient, ctx: &Context) -> anyhow::Result<()> {
    if client.auth().credentials().await.is_none() {
        provision(client, ctx).await?;
    }

    let token = client
        .auth()
        .get_access_token(ctx, Product::Collection)
        .await
        .context("collection token exchange failed")?;
    info!(expires_at = %token.expires_at, "collection token ready");

    let collection = client.collection();
    let reference = collection
        .request_to_pay(
            ctx,
            SANDBOX_PAYER,
            Decimal::new(500, 2),
            SubmitOptions::default()
                .with_idempotency_key(timestamped_idempotency_key("request_to_pay"))
                .with_payer_message("sandbox order")
                .with_payee_note("thanks"),
        )
        .await
        .context("request to pay was rejected")?;
    info!(
        reference_id = %reference.reference_id,
        idempotency_key = %reference.idempotency_key,
        "request to pay submitted"
    );

    let outcome = collection
        .await_transaction(ctx, reference.reference_id, PollConfig::default())
        .await?;
    info!(
        status = %outcome.status.status,
        attempts = outcome.attempts,
        failed_polls = outcome.failed_polls,
        "request to pay settled"
    );
    if !outcome.is_terminal() {
        bail!("request to pay still {} after {} polls", outcome.status.status, outcome.attempts);
    }

    if client.config().disbursement_key.is_none() {
        warn!("MOMO_DISBURSEMENT_KEY not set, skipping transfer");
        return Ok(());
    }

    let disbursement = client.disbursement();
    let transfer = disbursement
        .transfer(
            ctx,
            SANDBOX_PAYER,
            Decimal::new(250, 2),
            SubmitOptions::default()
                .with_idempotency_key(timestamped_idempotency_key("transfer"))
                .with_payee_note("refund"),
        )
        .await
        .context("transfer was rejected")?;

    let outcome = disbursement
        .await_transfer(ctx, transfer.reference_id, PollConfig::default())
        .await?;
    info!(
        reference_id = %transfer.reference_id,
        status = %outcome.status.status,
        attempts = outcome.attempts,
        "transfer settled"
    );

    Ok(())
}

async fn provision(client: &MomoClient, ctx: &Context) -> anyhow::Result<()> {
    let auth = client.auth();
    let api_user = auth
        .create_api_user(ctx)
        .await
        .context("failed to create sandbox API user")?;
    let api_key = auth
        .create_api_key(ctx, &api_user.to_string())
        .await
        .context("failed to create sandbox API key")?;
    info!(
        api_user = %api_user,
        api_key_len = api_key.len(),
        "sandbox credentials provisioned"
    );
    Ok(())
}
