use crate::auth::AuthProvisioner;
use crate::client::ClientShared;
use crate::context::Context;
use crate::error::MomoResult;
use crate::operations::dispatcher::{OperationDispatcher, OperationKind};
use crate::operations::poller::{PollConfig, PollOutcome, StatusPoller};
use crate::types::{AccountBalance, TransactionReference, TransactionStatus, TransferOptions};
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

/// Disbursement product: push funds to a payee.
#[derive(Clone)]
pub struct Disbursement {
    dispatcher: OperationDispatcher,
}

impl Disbursement {
    pub(crate) fn new(shared: Arc<ClientShared>, auth: AuthProvisioner) -> Self {
        Self {
            dispatcher: OperationDispatcher::new(shared, auth, OperationKind::Transfer),
        }
    }

    pub async fn transfer(
        &self,
        ctx: &Context,
        payee: &str,
        amount: Decimal,
        options: TransferOptions,
    ) -> MomoResult<TransactionReference> {
        self.dispatcher.submit(ctx, payee, amount, options).await
    }

    pub async fn get_transfer_status(
        &self,
        ctx: &Context,
        reference_id: Uuid,
    ) -> MomoResult<TransactionStatus> {
        self.dispatcher.status(ctx, reference_id).await
    }

    pub async fn await_transfer(
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
