use crate::auth::AuthProvisioner;
use crate::client::ClientShared;
use crate::context::Context;
use crate::error::{MomoError, MomoResult};
use crate::idempotency::generate_idempotency_key;
use crate::operations::poller::StatusSource;
use crate::transport::{
    ApiRequest, CALLBACK_URL_HEADER, REFERENCE_ID_HEADER, SUBSCRIPTION_KEY_HEADER,
    TARGET_ENVIRONMENT_HEADER,
};
use crate::types::{
    validate_amount, validate_msisdn, AccountBalance, Party, Product, SubmitOptions,
    TransactionReference, TransactionStatus,
};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// The two asynchronous money movements the provider supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    RequestToPay,
    Transfer,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::RequestToPay => "request_to_pay",
            OperationKind::Transfer => "transfer",
        }
    }

    pub fn product(&self) -> Product {
        match self {
            OperationKind::RequestToPay => Product::Collection,
            OperationKind::Transfer => Product::Disbursement,
        }
    }

    fn resource(&self) -> &'static str {
        match self {
            OperationKind::RequestToPay => "requesttopay",
            OperationKind::Transfer => "transfer",
        }
    }

    fn party_field(&self) -> &'static str {
        match self {
            OperationKind::RequestToPay => "payer",
            OperationKind::Transfer => "payee",
        }
    }

    fn status_operation(&self) -> &'static str {
        match self {
            OperationKind::RequestToPay => "get_transaction_status",
            OperationKind::Transfer => "get_transfer_status",
        }
    }
}

#[derive(Debug, Deserialize)]
struct AccountHolderResponse {
    result: bool,
}

/// Submits one kind of operation and queries its status.
///
/// A submission sends exactly one request and is never retried here; callers
/// retry with the same idempotency key (and reference id) to stay safe.
#[derive(Clone)]
pub struct OperationDispatcher {
    shared: Arc<ClientShared>,
    auth: AuthProvisioner,
    kind: OperationKind,
}

impl OperationDispatcher {
    pub(crate) fn new(shared: Arc<ClientShared>, auth: AuthProvisioner, kind: OperationKind) -> Self {
        Self { shared, auth, kind }
    }

    fn product(&self) -> Product {
        self.kind.product()
    }

    /// Attach provider headers; also returns the bearer token that was used.
    async fn authorized(
        &self,
        ctx: &Context,
        request: ApiRequest,
    ) -> MomoResult<(ApiRequest, String)> {
        let product = self.product();
        let subscription_key = self.shared.config.subscription_key_for(product)?;
        let token = self.auth.get_access_token(ctx, product).await?;
        let request = request
            .bearer_auth(&token.value)
            .header(TARGET_ENVIRONMENT_HEADER, self.shared.config.target_environment.as_str())
            .header(SUBSCRIPTION_KEY_HEADER, subscription_key);
        Ok((request, token.value))
    }

    /// A 401 only evicts the token it was sent with, never one refreshed meanwhile.
    async fn reject_token(&self, sent: &str) {
        self.shared
            .tokens
            .invalidate_if_current(self.product(), sent)
            .await;
    }

    pub async fn submit(
        &self,
        ctx: &Context,
        msisdn: &str,
        amount: Decimal,
        options: SubmitOptions,
    ) -> MomoResult<TransactionReference> {
        let operation = self.kind.as_str();
        let party_id = validate_msisdn(msisdn)?;
        validate_amount(amount)?;

        // The accepted response has no body, so the id must exist before the call.
        let reference_id = options.reference_id.unwrap_or_else(Uuid::new_v4);
        let idempotency_key = match options.idempotency_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => key.to_string(),
            _ => generate_idempotency_key(operation, &reference_id.to_string()),
        };

        let mut body = serde_json::json!({
            "amount": amount.to_string(),
            "currency": self.shared.config.currency,
            "externalId": idempotency_key,
            "payerMessage": options.payer_message.unwrap_or_default(),
            "payeeNote": options.payee_note.unwrap_or_default(),
        });
        body[self.kind.party_field()] = serde_json::to_value(Party::msisdn(party_id))
            .map_err(|e| MomoError::decode(operation, e.to_string()))?;

        let mut request = ApiRequest::post(
            operation,
            format!("/{}/v1_0/{}", self.product().as_str(), self.kind.resource()),
        )
        .header(REFERENCE_ID_HEADER, reference_id.to_string())
        .json(body);
        if let Some(url) = options.callback_url.as_deref().filter(|u| !u.trim().is_empty()) {
            request = request.header(CALLBACK_URL_HEADER, url);
        }
        let (request, token) = self.authorized(ctx, request).await?;

        let response = ctx
            .run(operation, self.shared.transport.send(request))
            .await?;
        if response.status == 401 {
            // Let the next call mint a fresh token; this one is not retried.
            self.reject_token(&token).await;
        }
        if !response.is_success() {
            let err = response.payment_error(operation, Some(reference_id));
            warn!(
                operation,
                reference_id = %reference_id,
                status = response.status,
                error = %err,
                "submission rejected"
            );
            return Err(err);
        }

        info!(
            operation,
            reference_id = %reference_id,
            idempotency_key = %idempotency_key,
            amount = %amount,
            "submission accepted"
        );
        Ok(TransactionReference {
            reference_id,
            product: self.product(),
            idempotency_key,
        })
    }

    pub async fn status(&self, ctx: &Context, reference_id: Uuid) -> MomoResult<TransactionStatus> {
        let operation = self.kind.status_operation();
        let request = ApiRequest::get(
            operation,
            format!(
                "/{}/v1_0/{}/{}",
                self.product().as_str(),
                self.kind.resource(),
                reference_id
            ),
        );
        let (request, token) = self.authorized(ctx, request).await?;

        let response = ctx
            .run(operation, self.shared.transport.send(request))
            .await?;
        if response.status == 401 {
            self.reject_token(&token).await;
        }
        if !response.is_success() {
            return Err(response.payment_error(operation, Some(reference_id)));
        }
        let status: TransactionStatus = response.json(operation)?;
        debug!(operation, reference_id = %reference_id, status = %status.status, "status fetched");
        Ok(status)
    }

    pub async fn account_balance(&self, ctx: &Context) -> MomoResult<AccountBalance> {
        let operation = "get_account_balance";
        let request = ApiRequest::get(
            operation,
            format!("/{}/v1_0/account/balance", self.product().as_str()),
        );
        let (request, _) = self.authorized(ctx, request).await?;
        let response = ctx
            .run(operation, self.shared.transport.send(request))
            .await?;
        if !response.is_success() {
            return Err(response.payment_error(operation, None));
        }
        response.json(operation)
    }

    pub async fn is_account_holder_active(&self, ctx: &Context, msisdn: &str) -> MomoResult<bool> {
        let operation = "is_account_holder_active";
        let party_id = validate_msisdn(msisdn)?;
        let request = ApiRequest::get(
            operation,
            format!(
                "/{}/v1_0/accountholder/msisdn/{}/active",
                self.product().as_str(),
                party_id
            ),
        );
        let (request, _) = self.authorized(ctx, request).await?;
        let response = ctx
            .run(operation, self.shared.transport.send(request))
            .await?;
        if !response.is_success() {
            return Err(response.payment_error(operation, None));
        }
        let body: AccountHolderResponse = response.json(operation)?;
        Ok(body.result)
    }
}

#[async_trait]
impl StatusSource for OperationDispatcher {
    async fn fetch_status(
        &self,
        ctx: &Context,
        reference_id: Uuid,
    ) -> MomoResult<TransactionStatus> {
        self.status(ctx, reference_id).await
    }
}
