use crate::error::{MomoError, MomoResult};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// API product; each has its own subscription key, token and URL prefix.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Product {
    Collection,
    Disbursement,
}

impl Product {
    pub fn as_str(&self) -> &'static str {
        match self {
            Product::Collection => "collection",
            Product::Disbursement => "disbursement",
        }
    }
}

impl std::fmt::Display for Product {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Product {
    type Err = MomoError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "collection" => Ok(Product::Collection),
            "disbursement" => Ok(Product::Disbursement),
            _ => Err(MomoError::validation(
                format!("unsupported product: {}", value),
                "product",
            )),
        }
    }
}

/// API user and key pair used for the token exchange.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiCredential {
    pub api_user: String,
    pub api_key: String,
}

impl std::fmt::Debug for ApiCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiCredential")
            .field("api_user", &self.api_user)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

/// Bearer token for one product.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub value: String,
    pub product: Product,
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    /// Usable when `now` is earlier than the expiry minus the safety margin.
    pub fn is_usable_at(&self, now: DateTime<Utc>, safety_margin: chrono::Duration) -> bool {
        now < self.expires_at - safety_margin
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("value", &crate::logging::mask_secret(&self.value))
            .field("product", &self.product)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Handle returned by a submission and used for every later status query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionReference {
    pub reference_id: Uuid,
    pub product: Product,
    pub idempotency_key: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionState {
    Pending,
    Successful,
    Failed,
    Rejected,
    Timeout,
    Ongoing,
    #[serde(other)]
    Unknown,
}

impl TransactionState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransactionState::Successful | TransactionState::Failed | TransactionState::Rejected
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionState::Pending => "PENDING",
            TransactionState::Successful => "SUCCESSFUL",
            TransactionState::Failed => "FAILED",
            TransactionState::Rejected => "REJECTED",
            TransactionState::Timeout => "TIMEOUT",
            TransactionState::Ongoing => "ONGOING",
            TransactionState::Unknown => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for TransactionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Provider-side view of a request-to-pay or transfer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TransactionStatus {
    pub status: TransactionState,
    #[serde(default)]
    pub financial_transaction_id: Option<String>,
    #[serde(default)]
    pub external_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub amount: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default, deserialize_with = "reason_text")]
    pub reason: Option<String>,
}

impl TransactionStatus {
    pub fn pending() -> Self {
        Self::with_state(TransactionState::Pending)
    }

    pub fn with_state(status: TransactionState) -> Self {
        Self {
            status,
            financial_transaction_id: None,
            external_id: None,
            amount: None,
            currency: None,
            reason: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AccountBalance {
    #[serde(deserialize_with = "required_lenient_string")]
    pub available_balance: String,
    pub currency: String,
}

/// Payer or payee as the provider expects it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Party {
    pub party_id_type: String,
    pub party_id: String,
}

impl Party {
    pub fn msisdn(number: impl Into<String>) -> Self {
        Self {
            party_id_type: "MSISDN".to_string(),
            party_id: number.into(),
        }
    }
}

/// Per-call options for a request-to-pay or transfer.
#[derive(Debug, Clone, Default)]
pub struct SubmitOptions {
    /// Sent as `externalId`; generated from the operation and reference id when blank.
    pub idempotency_key: Option<String>,
    /// Reuse the reference id of an earlier attempt when retrying the same submission.
    pub reference_id: Option<Uuid>,
    pub payer_message: Option<String>,
    pub payee_note: Option<String>,
    pub callback_url: Option<String>,
}

pub type RequestToPayOptions = SubmitOptions;
pub type TransferOptions = SubmitOptions;

impl SubmitOptions {
    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    pub fn with_reference_id(mut self, reference_id: Uuid) -> Self {
        self.reference_id = Some(reference_id);
        self
    }

    pub fn with_payer_message(mut self, message: impl Into<String>) -> Self {
        self.payer_message = Some(message.into());
        self
    }

    pub fn with_payee_note(mut self, note: impl Into<String>) -> Self {
        self.payee_note = Some(note.into());
        self
    }

    pub fn with_callback_url(mut self, url: impl Into<String>) -> Self {
        self.callback_url = Some(url.into());
        self
    }
}

/// Normalize and validate an MSISDN: optional leading `+`, then 8-15 digits.
///
/// Only the format is checked; whether the subscriber exists is the provider's call.
pub fn validate_msisdn(raw: &str) -> MomoResult<String> {
    let trimmed = raw.trim();
    let digits = trimmed.strip_prefix('+').unwrap_or(trimmed);

    if digits.is_empty() {
        return Err(MomoError::validation("phone number is required", "msisdn"));
    }
    if !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(MomoError::validation(
            format!("phone number must contain only digits: {}", raw),
            "msisdn",
        ));
    }
    if digits.len() < 8 || digits.len() > 15 {
        return Err(MomoError::validation(
            format!(
                "invalid phone number length: {} (expected 8-15 digits)",
                digits.len()
            ),
            "msisdn",
        ));
    }
    Ok(digits.to_string())
}

pub fn validate_amount(amount: Decimal) -> MomoResult<()> {
    if amount <= Decimal::ZERO {
        return Err(MomoError::validation(
            "amount must be greater than zero",
            "amount",
        ));
    }
    Ok(())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    Text(String),
    Number(serde_json::Number),
}

impl From<StringOrNumber> for String {
    fn from(value: StringOrNumber) -> Self {
        match value {
            StringOrNumber::Text(text) => text,
            StringOrNumber::Number(number) => number.to_string(),
        }
    }
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<StringOrNumber>::deserialize(deserializer)?.map(String::from))
}

fn required_lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(StringOrNumber::deserialize(deserializer)?.into())
}

// Older API versions report `reason` as `{code, message}`, newer ones as a bare code.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawReason {
    Text(String),
    Detail {
        #[serde(default)]
        code: Option<String>,
        #[serde(default)]
        message: Option<String>,
    },
}

fn reason_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(
        Option::<RawReason>::deserialize(deserializer)?.and_then(|raw| match raw {
            RawReason::Text(text) => Some(text),
            RawReason::Detail { code, message } => match (code, message) {
                (Some(code), Some(message)) => Some(format!("{}: {}", code, message)),
                (code, message) => code.or(message),
            },
        }),
    )
}
