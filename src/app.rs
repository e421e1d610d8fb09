//! Application handles and the process-wide app registry.
//!
//! An app is the root context every service client is derived from. Each name
//! is registered at most once per process; asking again with identical options
//! hands back the same instance.

use crate::auth::Auth;
use crate::config::{AppConfig, Endpoints, FirebaseConfig};
use crate::db::SessionStorage;
use crate::error::FirebaseError;
use crate::firestore::Firestore;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock, Mutex, OnceLock, PoisonError};
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

pub const DEFAULT_APP_NAME: &str = "[DEFAULT]";

static APPS: LazyLock<Mutex<HashMap<String, FirebaseApp>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

/// Everything besides the project record that shapes an app.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppOptions {
    pub endpoints: Endpoints,
    pub proxy: Option<Url>,
    pub persistence_url: Option<String>,
}

impl From<&AppConfig> for AppOptions {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            endpoints: cfg.endpoints.clone(),
            proxy: cfg.proxy.clone(),
            persistence_url: cfg.auth.persistence_url.clone(),
        }
    }
}

#[derive(Clone)]
pub struct FirebaseApp {
    inner: Arc<AppInner>,
}

struct AppInner {
    name: String,
    config: FirebaseConfig,
    options: AppOptions,
    http: reqwest::Client,
    persistence: Option<SessionStorage>,
    auth: OnceLock<Auth>,
    firestore: OnceLock<Firestore>,
}

impl std::fmt::Debug for FirebaseApp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FirebaseApp")
            .field("name", &self.inner.name)
            .field("config", &self.inner.config)
            .finish()
    }
}

impl FirebaseApp {
    fn build(name: &str, config: FirebaseConfig, options: AppOptions) -> Result<Self, FirebaseError> {
        let mut builder = reqwest::Client::builder()
            .user_agent(concat!("firebase-bootstrap/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(15))
            .redirect(reqwest::redirect::Policy::none());
        if let Some(proxy_url) = options.proxy.as_ref() {
            builder = builder.proxy(reqwest::Proxy::all(proxy_url.as_str())?);
        }
        let http = builder.build()?;

        let persistence = options
            .persistence_url
            .as_deref()
            .map(SessionStorage::connect_lazy)
            .transpose()?;

        Ok(Self {
            inner: Arc::new(AppInner {
                name: name.to_string(),
                config,
                options,
                http,
                persistence,
                auth: OnceLock::new(),
                firestore: OnceLock::new(),
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn config(&self) -> &FirebaseConfig {
        &self.inner.config
    }

    pub fn options(&self) -> &AppOptions {
        &self.inner.options
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.inner.options.endpoints
    }

    /// Shared HTTP client; connections are opened on first request.
    pub fn http_client(&self) -> reqwest::Client {
        self.inner.http.clone()
    }

    pub(crate) fn persistence(&self) -> Option<SessionStorage> {
        self.inner.persistence.clone()
    }

    pub(crate) fn auth_slot(&self) -> &OnceLock<Auth> {
        &self.inner.auth
    }

    pub(crate) fn firestore_slot(&self) -> &OnceLock<Firestore> {
        &self.inner.firestore
    }

    /// True when both handles refer to the same registered app.
    pub fn ptr_eq(&self, other: &FirebaseApp) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

/// Register the default app.
pub fn initialize_app(
    config: FirebaseConfig,
    options: AppOptions,
) -> Result<FirebaseApp, FirebaseError> {
    initialize_named_app(DEFAULT_APP_NAME, config, options)
}

pub fn initialize_named_app(
    name: &str,
    config: FirebaseConfig,
    options: AppOptions,
) -> Result<FirebaseApp, FirebaseError> {
    let mut apps = APPS.lock().unwrap_or_else(PoisonError::into_inner);

    if let Some(existing) = apps.get(name) {
        if existing.inner.config == config && existing.inner.options == options {
            debug!(app = name, "Firebase app already initialized; reusing");
            return Ok(existing.clone());
        }
        return Err(FirebaseError::DuplicateApp(name.to_string()));
    }

    let app = FirebaseApp::build(name, config, options)?;
    apps.insert(name.to_string(), app.clone());
    info!(
        app = name,
        project_id = %app.config().project_id,
        auth_domain = %app.config().auth_domain,
        "Firebase app initialized"
    );
    Ok(app)
}

pub fn get_app(name: &str) -> Result<FirebaseApp, FirebaseError> {
    APPS.lock()
        .unwrap_or_else(PoisonError::into_inner)
        .get(name)
        .cloned()
        .ok_or_else(|| FirebaseError::NoApp(name.to_string()))
}

pub fn get_default_app() -> Result<FirebaseApp, FirebaseError> {
    get_app(DEFAULT_APP_NAME)
}
