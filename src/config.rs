//! Client configuration.
//!
//! Built either programmatically through [`MomoConfig::builder`] or from
//! `MOMO_*` environment variables via [`MomoConfig::from_env`]. The client only
//! ever reads a validated [`MomoConfig`].

use crate::error::{MomoError, MomoResult};
use crate::types::{ApiCredential, Product};
use std::env;
use std::time::Duration;

pub const SANDBOX_HOST: &str = "https://sandbox.momodeveloper.mtn.com";
pub const PRODUCTION_HOST: &str = "https://proxy.momoapi.mtn.com";
pub const SANDBOX_TARGET_ENVIRONMENT: &str = "sandbox";
pub const SANDBOX_CURRENCY: &str = "EUR";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Sandbox,
    Production,
}

impl Environment {
    pub fn default_host(&self) -> &'static str {
        match self {
            Environment::Sandbox => SANDBOX_HOST,
            Environment::Production => PRODUCTION_HOST,
        }
    }
}

#[derive(Clone)]
pub struct MomoConfig {
    pub environment: Environment,
    /// Base URL without trailing slash.
    pub host: String,
    /// Value of the `X-Target-Environment` header.
    pub target_environment: String,
    /// Collection subscription key; also used for API user provisioning.
    pub subscription_key: String,
    pub disbursement_key: Option<String>,
    /// Sent as `providerCallbackHost` when the API user is created.
    pub callback_host: Option<String>,
    pub currency: String,
    pub api_user: Option<String>,
    pub api_key: Option<String>,
    pub request_timeout: Duration,
    /// Tokens are refreshed this long before they expire.
    pub token_safety_margin: Duration,
}

impl std::fmt::Debug for MomoConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MomoConfig")
            .field("environment", &self.environment)
            .field("host", &self.host)
            .field("target_environment", &self.target_environment)
            .field("subscription_key", &"<redacted>")
            .field(
                "disbursement_key",
                &self.disbursement_key.as_ref().map(|_| "<redacted>"),
            )
            .field("callback_host", &self.callback_host)
            .field("currency", &self.currency)
            .field("api_user", &self.api_user)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("request_timeout", &self.request_timeout)
            .field("token_safety_margin", &self.token_safety_margin)
            .finish()
    }
}

impl MomoConfig {
    pub fn builder(environment: Environment) -> MomoConfigBuilder {
        MomoConfigBuilder::new(environment)
    }

    /// Load configuration from environment variables (and `.env`, if present).
    pub fn from_env() -> MomoResult<Self> {
        let _ = dotenv::dotenv().ok();

        let environment = match env::var("MOMO_ENVIRONMENT")
            .unwrap_or_else(|_| "sandbox".to_string())
            .trim()
            .to_lowercase()
            .as_str()
        {
            "sandbox" | "" => Environment::Sandbox,
            "production" | "live" => Environment::Production,
            other => {
                return Err(MomoError::config(format!(
                    "MOMO_ENVIRONMENT must be sandbox or production, got {}",
                    other
                )))
            }
        };

        let mut builder = MomoConfig::builder(environment)
            .with_subscription_key(env::var("MOMO_SUBSCRIPTION_KEY").unwrap_or_default())
            .with_disbursement_key(env::var("MOMO_DISBURSEMENT_KEY").unwrap_or_default())
            .with_callback_host(env::var("MOMO_CALLBACK_HOST").unwrap_or_default())
            .with_host(env::var("MOMO_HOST").unwrap_or_default())
            .with_target_environment(env::var("MOMO_TARGET_ENVIRONMENT").unwrap_or_default())
            .with_currency(env::var("MOMO_CURRENCY").unwrap_or_default());

        if let (Ok(user), Ok(key)) = (env::var("MOMO_API_USER"), env::var("MOMO_API_KEY")) {
            builder = builder.with_api_credentials(user, key);
        }
        if let Ok(raw) = env::var("MOMO_REQUEST_TIMEOUT_SECS") {
            let secs = raw.trim().parse::<u64>().map_err(|_| {
                MomoError::config("MOMO_REQUEST_TIMEOUT_SECS must be a whole number of seconds")
            })?;
            builder = builder.with_request_timeout(Duration::from_secs(secs));
        }
        if let Ok(raw) = env::var("MOMO_TOKEN_SAFETY_MARGIN_SECS") {
            let secs = raw.trim().parse::<u64>().map_err(|_| {
                MomoError::config(
                    "MOMO_TOKEN_SAFETY_MARGIN_SECS must be a whole number of seconds",
                )
            })?;
            builder = builder.with_token_safety_margin(Duration::from_secs(secs));
        }

        builder.build()
    }

    pub fn validate(&self) -> MomoResult<()> {
        if self.subscription_key.trim().is_empty() {
            return Err(MomoError::config("subscription key is required"));
        }
        if !(self.host.starts_with("https://") || self.host.starts_with("http://")) {
            return Err(MomoError::config(format!(
                "host must be an http(s) URL, got {}",
                self.host
            )));
        }
        if self.target_environment.trim().is_empty() {
            return Err(MomoError::config(
                "target environment is required outside the sandbox",
            ));
        }
        if self.environment == Environment::Production
            && self.target_environment == SANDBOX_TARGET_ENVIRONMENT
        {
            return Err(MomoError::config(
                "production clients cannot target the sandbox environment",
            ));
        }
        if self.currency.trim().is_empty() {
            return Err(MomoError::config("currency is required"));
        }
        if self.request_timeout.is_zero() {
            return Err(MomoError::config("request timeout must be non-zero"));
        }
        Ok(())
    }

    /// Subscription key for `product`; disbursement calls fail here when no key is configured.
    pub fn subscription_key_for(&self, product: Product) -> MomoResult<&str> {
        match product {
            Product::Collection => Ok(&self.subscription_key),
            Product::Disbursement => self.disbursement_key.as_deref().ok_or_else(|| {
                MomoError::config("disbursement key is required for disbursement operations")
            }),
        }
    }

    pub fn credentials(&self) -> Option<ApiCredential> {
        match (&self.api_user, &self.api_key) {
            (Some(api_user), Some(api_key)) => Some(ApiCredential {
                api_user: api_user.clone(),
                api_key: api_key.clone(),
            }),
            _ => None,
        }
    }
}

/// Builder mirroring the option style of the provider's own SDKs: empty strings
/// are treated as "not set" so unset environment variables fall back to defaults.
#[derive(Debug, Clone)]
pub struct MomoConfigBuilder {
    environment: Environment,
    host: Option<String>,
    target_environment: Option<String>,
    subscription_key: Option<String>,
    disbursement_key: Option<String>,
    callback_host: Option<String>,
    currency: Option<String>,
    credentials: Option<(String, String)>,
    request_timeout: Duration,
    token_safety_margin: Duration,
}

fn non_empty(value: impl Into<String>) -> Option<String> {
    let value = value.into();
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

impl MomoConfigBuilder {
    fn new(environment: Environment) -> Self {
        Self {
            environment,
            host: None,
            target_environment: None,
            subscription_key: None,
            disbursement_key: None,
            callback_host: None,
            currency: None,
            credentials: None,
            request_timeout: Duration::from_secs(30),
            token_safety_margin: Duration::from_secs(30),
        }
    }

    pub fn with_subscription_key(mut self, key: impl Into<String>) -> Self {
        self.subscription_key = non_empty(key);
        self
    }

    pub fn with_disbursement_key(mut self, key: impl Into<String>) -> Self {
        self.disbursement_key = non_empty(key);
        self
    }

    pub fn with_callback_host(mut self, host: impl Into<String>) -> Self {
        self.callback_host = non_empty(host);
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = non_empty(host).map(|h| h.trim_end_matches('/').to_string());
        self
    }

    pub fn with_target_environment(mut self, target: impl Into<String>) -> Self {
        self.target_environment = non_empty(target);
        self
    }

    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = non_empty(currency).map(|c| c.to_uppercase());
        self
    }

    pub fn with_api_credentials(
        mut self,
        api_user: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        self.credentials = match (non_empty(api_user), non_empty(api_key)) {
            (Some(user), Some(key)) => Some((user, key)),
            _ => None,
        };
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_token_safety_margin(mut self, margin: Duration) -> Self {
        self.token_safety_margin = margin;
        self
    }

    pub fn build(self) -> MomoResult<MomoConfig> {
        let sandbox = self.environment == Environment::Sandbox;
        let (api_user, api_key) = match self.credentials {
            Some((user, key)) => (Some(user), Some(key)),
            None => (None, None),
        };

        let config = MomoConfig {
            environment: self.environment,
            host: self
                .host
                .unwrap_or_else(|| self.environment.default_host().to_string()),
            target_environment: self.target_environment.unwrap_or_else(|| {
                if sandbox {
                    SANDBOX_TARGET_ENVIRONMENT.to_string()
                } else {
                    String::new()
                }
            }),
            subscription_key: self.subscription_key.unwrap_or_default(),
            disbursement_key: self.disbursement_key,
            callback_host: self.callback_host,
            currency: self.currency.unwrap_or_else(|| {
                if sandbox {
                    SANDBOX_CURRENCY.to_string()
                } else {
                    String::new()
                }
            }),
            api_user,
            api_key,
            request_timeout: self.request_timeout,
            token_safety_margin: self.token_safety_margin,
        };
        config.validate()?;
        Ok(config)
    }
}
