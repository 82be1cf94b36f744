//! Client SDK for the MTN Mobile Money (MoMo) Open API.
//!
//! Covers sandbox user provisioning, per-product access tokens with a
//! single-flight cache, request-to-pay (collection) and transfer
//! (disbursement) submission, and status polling until a transaction is
//! final.
//!
//! ```no_run
//! use momo_mtn::{Context, MomoClient, MomoConfig, PollConfig, SubmitOptions};
//! use rust_decimal::Decimal;
//!
//! # async fn run() -> momo_mtn::MomoResult<()> {
//! let client = MomoClient::new(MomoConfig::from_env()?)?;
//! let ctx = Context::background();
//! let reference = client
//!     .collection()
//!     .request_to_pay(&ctx, "46733123454", Decimal::new(500, 2), SubmitOptions::default())
//!     .await?;
//! let outcome = client
//!     .collection()
//!     .await_transaction(&ctx, reference.reference_id, PollConfig::default())
//!     .await?;
//! println!("{}", outcome.status.status);
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod client;
pub mod config;
pub mod context;
pub mod error;
pub mod idempotency;
pub mod logging;
pub mod operations;
pub mod transport;
pub mod types;

#[cfg(test)]
pub(crate) mod test_support;

pub use auth::{AuthProvisioner, TokenCache};
pub use client::MomoClient;
pub use config::{Environment, MomoConfig, MomoConfigBuilder};
pub use context::{CancelHandle, Context};
pub use error::{MomoError, MomoResult};
pub use idempotency::{generate_idempotency_key, timestamped_idempotency_key};
pub use logging::{init_tracing, init_tracing_with, LogFormat, LoggingConfig};
pub use operations::{
    Collection, Disbursement, OperationKind, PollConfig, PollOutcome, StatusPoller, StatusSource,
};
#[cfg(feature = "http")]
pub use transport::HttpTransport;
pub use transport::{ApiRequest, ApiResponse, HttpMethod, MomoTransport};
pub use types::{
    AccessToken, AccountBalance, ApiCredential, Product, RequestToPayOptions, SubmitOptions,
    TransactionReference, TransactionState, TransactionStatus, TransferOptions,
};
