use crate::client::ClientShared;
use crate::context::Context;
use crate::error::{MomoError, MomoResult};
use crate::logging::mask_secret;
use crate::transport::{ApiRequest, REFERENCE_ID_HEADER, SUBSCRIPTION_KEY_HEADER};
use crate::types::{AccessToken, ApiCredential, Product};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
struct ApiKeyResponse {
    #[serde(rename = "apiKey")]
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    token_type: Option<String>,
    expires_in: i64,
}

/// Credential bootstrap and token exchange for one client.
#[derive(Clone)]
pub struct AuthProvisioner {
    shared: Arc<ClientShared>,
}

impl AuthProvisioner {
    pub(crate) fn new(shared: Arc<ClientShared>) -> Self {
        Self { shared }
    }

    /// Register a new API user and return its id.
    ///
    /// A conflict surfaces as an `Auth` error for which
    /// [`MomoError::is_already_exists`] is true; callers may ignore it.
    pub async fn create_api_user(&self, ctx: &Context) -> MomoResult<Uuid> {
        let operation = "create_api_user";
        let config = &self.shared.config;
        let callback_host = config.callback_host.as_deref().ok_or_else(|| {
            MomoError::config("callback host is required to create an API user")
        })?;

        let api_user = Uuid::new_v4();
        let request = ApiRequest::post(operation, "/v1_0/apiuser")
            .header(REFERENCE_ID_HEADER, api_user.to_string())
            .header(SUBSCRIPTION_KEY_HEADER, config.subscription_key.as_str())
            .json(serde_json::json!({ "providerCallbackHost": callback_host }));

        let response = ctx.run(operation, self.shared.transport.send(request)).await?;
        if !response.is_success() {
            return Err(response.auth_error(operation));
        }

        info!(api_user = %api_user, "api user created");
        Ok(api_user)
    }

    /// Create an API key for `api_user` and install the pair as this client's credentials.
    pub async fn create_api_key(&self, ctx: &Context, api_user: &str) -> MomoResult<String> {
        let operation = "create_api_key";
        let api_user = api_user.trim();
        if api_user.is_empty() {
            return Err(MomoError::validation("api user id is required", "api_user"));
        }

        let request = ApiRequest::post(operation, format!("/v1_0/apiuser/{}/apikey", api_user))
            .header(
                SUBSCRIPTION_KEY_HEADER,
                self.shared.config.subscription_key.as_str(),
            );
        let response = ctx.run(operation, self.shared.transport.send(request)).await?;
        if !response.is_success() {
            return Err(response.auth_error(operation));
        }
        let body: ApiKeyResponse = response.json(operation)?;

        self.set_credentials(ApiCredential {
            api_user: api_user.to_string(),
            api_key: body.api_key.clone(),
        })
        .await;
        info!(api_user = %api_user, api_key = %mask_secret(&body.api_key), "api key created");
        Ok(body.api_key)
    }

    /// Return a token for `product`, exchanging credentials only on a cache miss.
    pub async fn get_access_token(
        &self,
        ctx: &Context,
        product: Product,
    ) -> MomoResult<AccessToken> {
        let operation = "get_access_token";
        let subscription_key = self.shared.config.subscription_key_for(product)?;

        ctx.run(
            operation,
            self.shared
                .tokens
                .get_or_refresh(product, || self.exchange(product, subscription_key)),
        )
        .await
    }

    async fn exchange(&self, product: Product, subscription_key: &str) -> MomoResult<AccessToken> {
        let operation = "get_access_token";
        let credential = self.credentials().await.ok_or_else(|| {
            MomoError::config(
                "API user and key are not set; provision them or configure MOMO_API_USER/MOMO_API_KEY",
            )
        })?;

        debug!(product = %product, api_user = %credential.api_user, "exchanging credentials for access token");
        let request = ApiRequest::post(operation, format!("/{}/token/", product.as_str()))
            .basic_auth(&credential.api_user, &credential.api_key)
            .header(SUBSCRIPTION_KEY_HEADER, subscription_key);

        let response = self.shared.transport.send(request).await?;
        if !response.is_success() {
            return Err(response.auth_error(operation));
        }
        let body: TokenResponse = response.json(operation)?;
        if body.access_token.is_empty() || body.expires_in <= 0 {
            return Err(MomoError::decode(
                operation,
                "token response is missing access_token or expires_in",
            ));
        }

        info!(
            product = %product,
            token_type = body.token_type.as_deref().unwrap_or("access_token"),
            expires_in = body.expires_in,
            token = %mask_secret(&body.access_token),
            "access token issued"
        );
        Ok(AccessToken {
            value: body.access_token,
            product,
            expires_at: Utc::now() + chrono::Duration::seconds(body.expires_in),
        })
    }

    /// Install credentials issued out of band (for example from the provider portal).
    pub async fn set_credentials(&self, credential: ApiCredential) {
        *self.shared.credentials.write().await = Some(credential);
        // Also discards exchanges still running with the previous credential.
        self.shared.tokens.clear().await;
    }

    pub async fn credentials(&self) -> Option<ApiCredential> {
        self.shared.credentials.read().await.clone()
    }

    pub async fn invalidate_token(&self, product: Product) {
        self.shared.tokens.invalidate(product).await;
    }
}
