use axum::Router;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Canned answer of the mock accrual service for one order.
#[derive(Clone)]
pub enum Reply {
    NoContent,
    TooManyRequests,
    Json(serde_json::Value),
    Status(u16),
    Raw(&'static str),
}

/// In-process stand-in for the accrual service, bound to an ephemeral port.
#[derive(Clone, Default)]
pub struct MockAccrual {
    replies: Arc<Mutex<HashMap<String, Reply>>>,
    hits: Arc<Mutex<Vec<String>>>,
}

impl MockAccrual {
    pub fn reply(&self, number: &str, reply: Reply) {
        self.replies
            .lock()
            .unwrap()
            .insert(number.to_string(), reply);
    }

    pub fn processed(&self, number: &str, accrual: f64) {
        self.reply(
            number,
            Reply::Json(serde_json::json!({
                "order": number,
                "status": "PROCESSED",
                "accrual": accrual,
            })),
        );
    }

    pub fn hits(&self) -> Vec<String> {
        self.hits.lock().unwrap().clone()
    }

    /// Starts serving and returns the base URL.
    pub async fn serve(&self) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = Router::new()
            .route("/api/orders/{number}", get(lookup))
            .with_state(self.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }
}

async fn lookup(State(mock): State<MockAccrual>, Path(number): Path<String>) -> Response {
    mock.hits.lock().unwrap().push(number.clone());
    let reply = mock.replies.lock().unwrap().get(&number).cloned();
    match reply.unwrap_or(Reply::NoContent) {
        Reply::NoContent => StatusCode::NO_CONTENT.into_response(),
        Reply::TooManyRequests => StatusCode::TOO_MANY_REQUESTS.into_response(),
        Reply::Json(body) => (StatusCode::OK, axum::Json(body)).into_response(),
        Reply::Status(code) => StatusCode::from_u16(code).unwrap().into_response(),
        Reply::Raw(body) => (StatusCode::OK, body).into_response(),
    }
}
