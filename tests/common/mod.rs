#![allow(dead_code)]

use axum::{
    Json, Router,
    body::to_bytes,
    extract::Request,
    http::{HeaderMap, StatusCode},
};
use base64::Engine;
use firebase_bootstrap::app::{AppOptions, FirebaseApp, initialize_named_app};
use firebase_bootstrap::config::{Endpoints, FirebaseConfig};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use url::Url;

pub const API_KEY: &str = "test-api-key";
pub const PROJECT_ID: &str = "project-guard-demo";

#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub path: String,
    pub query: String,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl Recorded {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap_or(Value::Null)
    }

    pub fn query_pairs(&self) -> Vec<(String, String)> {
        url::form_urlencoded::parse(self.query.as_bytes())
            .into_owned()
            .collect()
    }

    pub fn form(&self) -> Vec<(String, String)> {
        url::form_urlencoded::parse(&self.body).into_owned().collect()
    }
}

pub struct FakeServer {
    pub base: Url,
    pub requests: Arc<Mutex<Vec<Recorded>>>,
}

impl FakeServer {
    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    pub fn endpoints(&self) -> Endpoints {
        Endpoints {
            identity_toolkit: self.base.join("identitytoolkit/v1/").unwrap(),
            secure_token: self.base.join("securetoken/v1/").unwrap(),
            firestore: self.base.join("firestore/v1/").unwrap(),
            google_auth: self.base.join("o/oauth2/auth").unwrap(),
            google_token: self.base.join("token").unwrap(),
        }
    }
}

/// Serve `responder` on an ephemeral local port, recording every request.
pub async fn spawn_fake<F>(responder: F) -> FakeServer
where
    F: Fn(&Recorded) -> (StatusCode, Value) + Send + Sync + 'static,
{
    let requests = Arc::new(Mutex::new(Vec::new()));
    let responder = Arc::new(responder);
    let recorded = requests.clone();

    let app = Router::new().fallback(move |req: Request| {
        let responder = responder.clone();
        let recorded = recorded.clone();
        async move {
            let (parts, body) = req.into_parts();
            let body = to_bytes(body, usize::MAX)
                .await
                .map(|b| b.to_vec())
                .unwrap_or_default();
            let rec = Recorded {
                method: parts.method.to_string(),
                path: parts.uri.path().to_string(),
                query: parts.uri.query().unwrap_or_default().to_string(),
                headers: parts.headers,
                body,
            };
            let (status, json) = responder(&rec);
            recorded.lock().unwrap().push(rec);
            (status, Json(json))
        }
    });

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind fake server");
    let addr = listener.local_addr().expect("fake server addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("fake server crashed");
    });

    FakeServer {
        base: Url::parse(&format!("http://{addr}/")).unwrap(),
        requests,
    }
}

pub fn firebase_config() -> FirebaseConfig {
    FirebaseConfig {
        api_key: API_KEY.to_string(),
        auth_domain: format!("{PROJECT_ID}.firebaseapp.com"),
        project_id: PROJECT_ID.to_string(),
        storage_bucket: format!("{PROJECT_ID}.firebasestorage.app"),
        messaging_sender_id: "39752936719".to_string(),
        app_id: "1:39752936719:web:0000000000000000".to_string(),
    }
}

pub fn named_app(name: &str, endpoints: Endpoints, persistence_url: Option<String>) -> FirebaseApp {
    let options = AppOptions {
        endpoints,
        proxy: None,
        persistence_url,
    };
    initialize_named_app(name, firebase_config(), options).expect("app init")
}

/// Unsigned JWT carrying `payload`.
pub fn fake_jwt(payload: &Value) -> String {
    let enc = base64::engine::general_purpose::URL_SAFE_NO_PAD;
    format!(
        "{}.{}.signature",
        enc.encode(r#"{"alg":"RS256","typ":"JWT"}"#),
        enc.encode(payload.to_string())
    )
}

pub fn sign_in_body(uid: &str, id_token: &str, expires_in: &str) -> Value {
    serde_json::json!({
        "kind": "identitytoolkit#VerifyPasswordResponse",
        "localId": uid,
        "email": format!("{uid}@example.com"),
        "displayName": "",
        "idToken": id_token,
        "refreshToken": format!("refresh-{uid}"),
        "expiresIn": expires_in,
        "registered": true
    })
}
