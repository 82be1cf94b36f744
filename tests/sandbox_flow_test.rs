//! End-to-end tests of the HTTP client against a local stand-in for the MoMo API.

use momo_mtn::{
    Context, MomoClient, MomoConfig, MomoError, PollConfig, Product, SubmitOptions,
    TransactionState,
};
use rust_decimal_macros::dec;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

#[derive(Debug, Clone)]
struct RecordedRequest {
    method: String,
    path: String,
    headers: HashMap<String, String>,
    body: String,
}

impl RecordedRequest {
    fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    fn json(&self) -> Value {
        serde_json::from_str(&self.body).expect("request body is not JSON")
    }
}

/// Routes match on method plus either the exact path or, for routes ending
/// in `/`, any path below it. The last queued reply for a route repeats.
#[derive(Default)]
struct Routes {
    table: Vec<(String, String, VecDeque<(u16, String)>)>,
}

impl Routes {
    fn add(mut self, method: &str, path: &str, replies: &[(u16, &str)]) -> Self {
        let replies = replies
            .iter()
            .map(|(status, body)| (*status, body.to_string()))
            .collect();
        self.table.push((method.to_string(), path.to_string(), replies));
        self
    }

    fn reply(&mut self, method: &str, path: &str) -> (u16, String) {
        let found = self.table.iter_mut().find(|(m, route, _)| {
            m.as_str() == method
                && (path == route.as_str()
                    || (route.ends_with('/') && path.starts_with(route.as_str())))
        });
        match found {
            Some((_, _, queue)) if queue.len() > 1 => queue.pop_front().unwrap(),
            Some((_, _, queue)) if !queue.is_empty() => queue[0].clone(),
            _ => (404, String::new()),
        }
    }
}

struct MockServer {
    base_url: String,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockServer {
    async fn start(routes: Routes) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind test listener");
        let addr = listener.local_addr().expect("failed to read listener addr");
        let routes = Arc::new(Mutex::new(routes));
        let requests = Arc::new(Mutex::new(Vec::new()));

        let recorded = requests.clone();
        tokio::spawn(async move {
            loop {
                let (socket, _) = match listener.accept().await {
                    Ok(conn) => conn,
                    Err(_) => break,
                };
                let routes = routes.clone();
                let recorded = recorded.clone();
                tokio::spawn(async move {
                    handle_connection(socket, routes, recorded).await;
                });
            }
        });

        Self {
            base_url: format!("http://{}", addr),
            requests,
        }
    }

    fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn requests_to(&self, method: &str, path_prefix: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == method && r.path.starts_with(path_prefix))
            .collect()
    }
}

async fn handle_connection(
    mut socket: TcpStream,
    routes: Arc<Mutex<Routes>>,
    recorded: Arc<Mutex<Vec<RecordedRequest>>>,
) {
    let mut buf = Vec::new();
    let mut chunk = [0_u8; 4096];
    let header_end = loop {
        let n = match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => n,
        };
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = head.lines();
    let request_line = lines.next().unwrap_or_default();
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or_default().to_string();
    let path = parts.next().unwrap_or_default().to_string();

    let headers: HashMap<String, String> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_ascii_lowercase(), v.trim().to_string()))
        .collect();
    let content_length = headers
        .get("content-length")
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(0);

    while buf.len() < header_end + content_length {
        let n = match socket.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => n,
        };
        buf.extend_from_slice(&chunk[..n]);
    }
    let body_end = (header_end + content_length).min(buf.len());
    let body = String::from_utf8_lossy(&buf[header_end..body_end]).to_string();

    let (status, reply) = routes.lock().unwrap().reply(&method, &path);
    recorded.lock().unwrap().push(RecordedRequest {
        method,
        path,
        headers,
        body,
    });

    let response = format!(
        "HTTP/1.1 {} Mock\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        reply.len(),
        reply
    );
    let _ = socket.write_all(response.as_bytes()).await;
    let _ = socket.shutdown().await;
}

fn token_json(token: &str) -> String {
    format!(
        r#"{{"access_token":"{}","token_type":"access_token","expires_in":3600}}"#,
        token
    )
}

fn config_for(base_url: &str) -> MomoConfig {
    MomoConfig::builder(momo_mtn::Environment::Sandbox)
        .with_host(base_url)
        .with_subscription_key("sub-key")
        .with_disbursement_key("dis-key")
        .with_callback_host("callback.example.com")
        .with_request_timeout(Duration::from_secs(5))
        .build()
        .expect("valid test config")
}

#[tokio::test]
async fn test_full_sandbox_flow_over_http() {
    let collection_token = token_json("collection-token");
    let disbursement_token = token_json("disbursement-token");
    let routes = Routes::default()
        .add("POST", "/v1_0/apiuser", &[(201, "")])
        .add("POST", "/v1_0/apiuser/", &[(201, r#"{"apiKey":"generated-key"}"#)])
        .add("POST", "/collection/token/", &[(200, collection_token.as_str())])
        .add("POST", "/collection/v1_0/requesttopay", &[(202, "")])
        .add(
            "GET",
            "/collection/v1_0/requesttopay/",
            &[
                (200, r#"{"status":"PENDING"}"#),
                (
                    200,
                    r#"{"amount":"5.00","currency":"EUR","financialTransactionId":"1234","status":"SUCCESSFUL"}"#,
                ),
            ],
        )
        .add("POST", "/disbursement/token/", &[(200, disbursement_token.as_str())])
        .add("POST", "/disbursement/v1_0/transfer", &[(202, "")])
        .add(
            "GET",
            "/disbursement/v1_0/transfer/",
            &[(200, r#"{"status":"FAILED","reason":"PAYEE_NOT_FOUND"}"#)],
        );
    let server = MockServer::start(routes).await;
    let client = MomoClient::new(config_for(&server.base_url)).expect("client");
    let ctx = Context::background().with_timeout(Duration::from_secs(10));

    let api_user = client.auth().create_api_user(&ctx).await.unwrap();
    let api_key = client
        .auth()
        .create_api_key(&ctx, &api_user.to_string())
        .await
        .unwrap();
    assert_eq!(api_key, "generated-key");

    let user_request = &server.requests_to("POST", "/v1_0/apiuser")[0];
    assert_eq!(user_request.header("X-Reference-Id"), Some(api_user.to_string().as_str()));
    assert_eq!(user_request.header("Ocp-Apim-Subscription-Key"), Some("sub-key"));
    assert_eq!(
        user_request.json()["providerCallbackHost"],
        "callback.example.com"
    );

    let reference = client
        .collection()
        .request_to_pay(
            &ctx,
            "+46733123454",
            dec!(5.00),
            SubmitOptions::default().with_idempotency_key("order-77"),
        )
        .await
        .unwrap();
    assert_eq!(reference.product, Product::Collection);
    assert_eq!(reference.idempotency_key, "order-77");

    let token_request = &server.requests_to("POST", "/collection/token/")[0];
    assert!(token_request
        .header("Authorization")
        .unwrap()
        .starts_with("Basic "));

    let submit = &server.requests_to("POST", "/collection/v1_0/requesttopay")[0];
    assert_eq!(
        submit.header("X-Reference-Id"),
        Some(reference.reference_id.to_string().as_str())
    );
    assert_eq!(submit.header("Authorization"), Some("Bearer collection-token"));
    assert_eq!(submit.header("X-Target-Environment"), Some("sandbox"));
    assert_eq!(submit.header("Ocp-Apim-Subscription-Key"), Some("sub-key"));
    let body = submit.json();
    assert_eq!(body["amount"], "5.00");
    assert_eq!(body["currency"], "EUR");
    assert_eq!(body["externalId"], "order-77");
    assert_eq!(body["payer"]["partyIdType"], "MSISDN");
    assert_eq!(body["payer"]["partyId"], "46733123454");

    let outcome = client
        .collection()
        .await_transaction(
            &ctx,
            reference.reference_id,
            PollConfig::new(5, Duration::from_millis(10)),
        )
        .await
        .unwrap();
    assert_eq!(outcome.status.status, TransactionState::Successful);
    assert_eq!(outcome.attempts, 2);
    assert_eq!(server.requests_to("POST", "/collection/token/").len(), 1);

    let transfer = client
        .disbursement()
        .transfer(&ctx, "46733123454", dec!(2.50), SubmitOptions::default())
        .await
        .unwrap();
    let transfer_request = &server.requests_to("POST", "/disbursement/v1_0/transfer")[0];
    assert_eq!(transfer_request.header("Ocp-Apim-Subscription-Key"), Some("dis-key"));
    assert_eq!(
        transfer_request.header("Authorization"),
        Some("Bearer disbursement-token")
    );
    assert_eq!(transfer_request.json()["payee"]["partyId"], "46733123454");
    assert_eq!(
        transfer_request.json()["externalId"],
        transfer.idempotency_key.as_str()
    );

    let transfer_outcome = client
        .disbursement()
        .await_transfer(
            &ctx,
            transfer.reference_id,
            PollConfig::new(3, Duration::from_millis(10)),
        )
        .await
        .unwrap();
    assert_eq!(transfer_outcome.status.status, TransactionState::Failed);
    assert_eq!(transfer_outcome.attempts, 1);

    client.close().await;
}

#[tokio::test]
async fn test_provider_error_maps_to_payment_error() {
    let token = token_json("collection-token");
    let routes = Routes::default()
        .add("POST", "/collection/token/", &[(200, token.as_str())])
        .add(
            "POST",
            "/collection/v1_0/requesttopay",
            &[(
                500,
                r#"{"code":"INTERNAL_PROCESSING_ERROR","message":"An internal error occurred"}"#,
            )],
        );
    let server = MockServer::start(routes).await;
    let config = MomoConfig::builder(momo_mtn::Environment::Sandbox)
        .with_host(server.base_url.as_str())
        .with_subscription_key("sub-key")
        .with_api_credentials("api-user", "api-key")
        .build()
        .unwrap();
    let client = MomoClient::new(config).unwrap();

    let err = client
        .collection()
        .request_to_pay(
            &Context::background(),
            "46733123454",
            dec!(1),
            SubmitOptions::default(),
        )
        .await
        .unwrap_err();

    match err {
        MomoError::Payment {
            status,
            code,
            reference_id,
            ..
        } => {
            assert_eq!(status, 500);
            assert_eq!(code.as_deref(), Some("INTERNAL_PROCESSING_ERROR"));
            assert!(reference_id.is_some());
        }
        other => panic!("expected payment error, got {other:?}"),
    }
    assert_eq!(
        server
            .requests_to("POST", "/collection/v1_0/requesttopay")
            .len(),
        1
    );
}

#[tokio::test]
async fn test_unreachable_host_is_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let config = MomoConfig::builder(momo_mtn::Environment::Sandbox)
        .with_host(format!("http://{}", addr))
        .with_subscription_key("sub-key")
        .with_api_credentials("api-user", "api-key")
        .with_request_timeout(Duration::from_secs(2))
        .build()
        .unwrap();
    let client = MomoClient::new(config).unwrap();

    let err = client
        .auth()
        .get_access_token(&Context::background(), Product::Collection)
        .await
        .unwrap_err();
    assert!(matches!(err, MomoError::Transport { .. }));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_silent_host_is_reported_as_timeout() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        // Accept and hold the connection without answering.
        if let Ok((socket, _)) = listener.accept().await {
            tokio::time::sleep(Duration::from_secs(30)).await;
            drop(socket);
        }
    });

    let config = MomoConfig::builder(momo_mtn::Environment::Sandbox)
        .with_host(format!("http://{}", addr))
        .with_subscription_key("sub-key")
        .with_api_credentials("api-user", "api-key")
        .with_request_timeout(Duration::from_millis(200))
        .build()
        .unwrap();
    let client = MomoClient::new(config).unwrap();

    let err = client
        .auth()
        .get_access_token(&Context::background(), Product::Collection)
        .await
        .unwrap_err();
    assert!(matches!(err, MomoError::Transport { timed_out: true, .. }));
}
