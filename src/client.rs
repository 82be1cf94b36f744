use crate::auth::{AuthProvisioner, TokenCache};
use crate::config::MomoConfig;
use crate::error::MomoResult;
use crate::operations::{Collection, Disbursement};
use crate::transport::MomoTransport;
use crate::types::ApiCredential;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

/// State owned by one client instance and shared by its product handles.
pub(crate) struct ClientShared {
    pub(crate) config: MomoConfig,
    pub(crate) transport: Arc<dyn MomoTransport>,
    pub(crate) tokens: TokenCache,
    pub(crate) credentials: RwLock<Option<ApiCredential>>,
}

/// Entry point: one client per subscription, each with its own token cache.
///
/// Clients never share state, so several clients with different keys can run
/// side by side in one process.
pub struct MomoClient {
    shared: Arc<ClientShared>,
    auth: AuthProvisioner,
    collection: Collection,
    disbursement: Disbursement,
}

impl MomoClient {
    /// Build a client that talks to `config.host` over HTTPS.
    #[cfg(feature = "http")]
    pub fn new(config: MomoConfig) -> MomoResult<Self> {
        let transport = crate::transport::HttpTransport::from_config(&config)?;
        Self::with_transport(config, Arc::new(transport))
    }

    /// Build a client on top of a caller-supplied transport.
    pub fn with_transport(
        config: MomoConfig,
        transport: Arc<dyn MomoTransport>,
    ) -> MomoResult<Self> {
        config.validate()?;

        info!(
            environment = ?config.environment,
            host = %config.host,
            target_environment = %config.target_environment,
            has_credentials = config.credentials().is_some(),
            "momo client initialized"
        );

        let shared = Arc::new(ClientShared {
            tokens: TokenCache::new(config.token_safety_margin),
            credentials: RwLock::new(config.credentials()),
            transport,
            config,
        });
        let auth = AuthProvisioner::new(shared.clone());

        Ok(Self {
            collection: Collection::new(shared.clone(), auth.clone()),
            disbursement: Disbursement::new(shared.clone(), auth.clone()),
            auth,
            shared,
        })
    }

    pub fn auth(&self) -> &AuthProvisioner {
        &self.auth
    }

    pub fn collection(&self) -> &Collection {
        &self.collection
    }

    pub fn disbursement(&self) -> &Disbursement {
        &self.disbursement
    }

    pub fn config(&self) -> &MomoConfig {
        &self.shared.config
    }

    /// Forget cached access tokens; the next call exchanges credentials again.
    pub async fn clear_tokens(&self) {
        self.shared.tokens.clear().await;
    }

    /// Drop cached tokens and credentials. The client must be re-provisioned before reuse.
    pub async fn close(&self) {
        self.shared.tokens.clear().await;
        *self.shared.credentials.write().await = None;
        info!("momo client closed");
    }

    #[cfg(test)]
    pub(crate) fn shared(&self) -> &ClientShared {
        &self.shared
    }
}
