use crate::auth::AuthProvisioner;
use crate::client::ClientShared;
use crate::context::Context;
use crate::error::MomoResult;
use crate::operations::dispatcher::{OperationDispatcher, OperationKind};
use crate::operations::poller::{PollConfig, PollOutcome, StatusPoller};
use crate::types::{AccountBalance, RequestToPayOptions, TransactionReference, TransactionStatus};
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

/// Collection product: ask a payer to approve a debit.
#[derive(Clone)]
pub struct Collection {
    dispatcher: OperationDispatcher,
}

impl Collection {
    pub(crate) fn new(shared: Arc<ClientShared>, auth: AuthProvisioner) -> Self {
        Self {
            dispatcher: OperationDispatcher::new(shared, auth, OperationKind::RequestToPay),
        }
    }

    /// Submit a request-to-pay. Returns as soon as the provider accepts it;
    /// use the returned reference to follow its progress.
    pub async fn request_to_pay(
        &self,
        ctx: &Context,
        payer: &str,
        amount: Decimal,
        options: RequestToPayOptions,
    ) -> MomoResult<TransactionReference> {
        self.dispatcher.submit(ctx, payer, amount, options).await
    }

    pub async fn get_transaction_status(
        &self,
        ctx: &Context,
        reference_id: Uuid,
    ) -> MomoResult<TransactionStatus> {
        self.dispatcher.status(ctx, reference_id).await
    }

    /// Poll the request-to-pay until it is final or `config.max_attempts` is used up.
    pub async fn await_transaction(
        &self,
        ctx: &Context,
        reference_id: Uuid,
        config: PollConfig,
    ) -> MomoResult<PollOutcome> {
        StatusPoller::new(self.dispatcher.clone())
            .poll(ctx, reference_id, config)
            .await
    }

    pub async fn get_account_balance(&self, ctx: &Context) -> MomoResult<AccountBalance> {
        self.dispatcher.account_balance(ctx).await
    }

    pub async fn is_account_holder_active(&self, ctx: &Context, msisdn: &str) -> MomoResult<bool> {
        self.dispatcher.is_account_holder_active(ctx, msisdn).await
    }
}
