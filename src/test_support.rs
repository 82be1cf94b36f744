use crate::client::MomoClient;
use crate::config::{Environment, MomoConfig};
use crate::error::{MomoError, MomoResult};
use crate::transport::{ApiRequest, ApiResponse, HttpMethod, MomoTransport};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Clone)]
enum MockReply {
    Response(ApiResponse),
    Error(MomoError),
}

/// In-memory transport. Replies queue per route; once one reply is left it
/// is returned for every further request to that route. Unknown routes
/// answer 404 with an empty body.
#[derive(Default)]
pub struct MockTransport {
    routes: Mutex<HashMap<String, VecDeque<MockReply>>>,
    requests: Mutex<Vec<ApiRequest>>,
    delay: Option<Duration>,
}

fn route_key(method: HttpMethod, path: &str) -> String {
    format!("{} {}", method.as_str(), path)
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn respond(&self, method: HttpMethod, path: &str, status: u16, body: &str) {
        self.push(method, path, MockReply::Response(ApiResponse::new(status, body)));
    }

    pub fn fail(&self, method: HttpMethod, path: &str, error: MomoError) {
        self.push(method, path, MockReply::Error(error));
    }

    fn push(&self, method: HttpMethod, path: &str, reply: MockReply) {
        self.routes
            .lock()
            .unwrap()
            .entry(route_key(method, path))
            .or_default()
            .push_back(reply);
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requests_to(&self, method: HttpMethod, path: &str) -> Vec<ApiRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == method && r.path == path)
            .collect()
    }

    pub fn count(&self, method: HttpMethod, path: &str) -> usize {
        self.requests_to(method, path).len()
    }

    fn next_reply(&self, method: HttpMethod, path: &str) -> MockReply {
        let mut routes = self.routes.lock().unwrap();
        match routes.get_mut(&route_key(method, path)) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap(),
            Some(queue) if !queue.is_empty() => queue[0].clone(),
            _ => MockReply::Response(ApiResponse::new(404, "")),
        }
    }
}

#[async_trait]
impl MomoTransport for MockTransport {
    async fn send(&self, request: ApiRequest) -> MomoResult<ApiResponse> {
        let (method, path) = (request.method, request.path.clone());
        self.requests.lock().unwrap().push(request);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match self.next_reply(method, &path) {
            MockReply::Response(response) => Ok(response),
            MockReply::Error(error) => Err(error),
        }
    }
}

pub fn sandbox_config(with_credentials: bool) -> MomoConfig {
    let builder = MomoConfig::builder(Environment::Sandbox)
        .with_subscription_key("collection-key")
        .with_disbursement_key("disbursement-key")
        .with_callback_host("callback.example.com")
        .with_currency("EUR");
    let builder = if with_credentials {
        builder.with_api_credentials("api-user", "api-key")
    } else {
        builder
    };
    builder.build().unwrap()
}

pub fn client_with_config(transport: Arc<MockTransport>, config: MomoConfig) -> MomoClient {
    MomoClient::with_transport(config, transport).unwrap()
}

pub fn test_client(transport: Arc<MockTransport>, with_credentials: bool) -> MomoClient {
    client_with_config(transport, sandbox_config(with_credentials))
}

pub fn token_body(token: &str, expires_in: i64) -> String {
    serde_json::json!({
        "access_token": token,
        "token_type": "access_token",
        "expires_in": expires_in,
    })
    .to_string()
}
