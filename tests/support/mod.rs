#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use contentlink::{
    application::{Client, SpaceConfig},
    infra::{
        error::InfraError,
        transport::{ApiRequest, ApiResponse, HttpTransport},
    },
};
use serde_json::{Value, json};

/// Replays canned responses in order, then keeps answering with `exhausted`.
///
/// A transport built with [`ScriptedTransport::failing`] never answers and
/// reports a transport error for every request instead.
pub struct ScriptedTransport {
    script: Mutex<VecDeque<ApiResponse>>,
    exhausted: ApiResponse,
    failure: Option<String>,
    requests: Mutex<Vec<ApiRequest>>,
}

impl ScriptedTransport {
    pub fn new(responses: impl IntoIterator<Item = ApiResponse>) -> Arc<Self> {
        Self::with_exhausted(responses, ApiResponse::new(500, "script exhausted"))
    }

    pub fn repeating(response: ApiResponse) -> Arc<Self> {
        Self::with_exhausted(Vec::new(), response)
    }

    pub fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(VecDeque::new()),
            exhausted: ApiResponse::new(500, "unreachable"),
            failure: Some(message.to_string()),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn with_exhausted(
        responses: impl IntoIterator<Item = ApiResponse>,
        exhausted: ApiResponse,
    ) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(responses.into_iter().collect()),
            exhausted,
            failure: None,
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().expect("requests lock").len()
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().expect("requests lock").clone()
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, InfraError> {
        self.requests.lock().expect("requests lock").push(request);
        if let Some(message) = self.failure.as_deref() {
            return Err(InfraError::transport(message));
        }
        let next = self.script.lock().expect("script lock").pop_front();
        Ok(next.unwrap_or_else(|| self.exhausted.clone()))
    }
}

pub fn client(config: SpaceConfig, transport: &Arc<ScriptedTransport>) -> Client {
    Client::builder()
        .space("main", config)
        .transport(Arc::clone(transport) as Arc<dyn HttpTransport>)
        .build()
        .expect("client builds")
}

pub fn ok(body: &Value) -> ApiResponse {
    ApiResponse::new(200, body.to_string())
}

pub fn status(code: u16) -> ApiResponse {
    ApiResponse::new(code, json!({"sys": {"type": "Error", "id": "Failure"}}).to_string())
}

pub fn entry_link(id: &str) -> Value {
    json!({"sys": {"type": "Link", "linkType": "Entry", "id": id}})
}

pub fn entry(id: &str, fields: Value) -> Value {
    json!({
        "sys": {
            "type": "Entry",
            "id": id,
            "locale": "en-US",
            "space": {"sys": {"type": "Link", "linkType": "Space", "id": "cfexampleapi"}},
            "contentType": {"sys": {"type": "Link", "linkType": "ContentType", "id": "cat"}}
        },
        "fields": fields
    })
}

pub fn array(items: Vec<Value>, includes: Value) -> Value {
    json!({
        "sys": {"type": "Array"},
        "total": items.len(),
        "skip": 0,
        "limit": 100,
        "items": items,
        "includes": includes
    })
}

pub fn cat_content_type() -> Value {
    json!({
        "sys": {"type": "ContentType", "id": "cat"},
        "name": "Cat",
        "displayField": "name",
        "fields": [
            {"id": "name", "name": "Name", "type": "Text"},
            {"id": "bestFriend", "name": "Best Friend", "type": "Link", "linkType": "Entry"}
        ]
    })
}
