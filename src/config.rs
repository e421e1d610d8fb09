use crate::error::FirebaseError;
use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::LazyLock;
use url::Url;

/// Extra scope requested by the bootstrapped Google provider.
pub const GMAIL_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/gmail.readonly";

pub const CONFIG_FILE: &str = "config.toml";
pub const ENV_PREFIX: &str = "FIREBASE_";

pub static IDENTITY_TOOLKIT_URL: LazyLock<Url> = LazyLock::new(|| {
    Url::parse("https://identitytoolkit.googleapis.com/v1/").expect("invalid identity toolkit url")
});
pub static SECURE_TOKEN_URL: LazyLock<Url> = LazyLock::new(|| {
    Url::parse("https://securetoken.googleapis.com/v1/").expect("invalid secure token url")
});
pub static FIRESTORE_URL: LazyLock<Url> = LazyLock::new(|| {
    Url::parse("https://firestore.googleapis.com/v1/").expect("invalid firestore url")
});
pub static GOOGLE_AUTH_URL: LazyLock<Url> = LazyLock::new(|| {
    Url::parse("https://accounts.google.com/o/oauth2/v2/auth").expect("invalid google auth url")
});
pub static GOOGLE_TOKEN_URI: LazyLock<Url> = LazyLock::new(|| {
    Url::parse("https://oauth2.googleapis.com/token").expect("invalid google token url")
});

/// Process configuration, loaded once on first access.
///
/// Panics if neither `config.toml` nor the environment provide the `app` section.
pub static CONFIG: LazyLock<AppConfig> =
    LazyLock::new(|| AppConfig::load().expect("FATAL: failed to load configuration"));

/// Identifies one Firebase project/web app. All values are opaque to this crate.
#[derive(Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct FirebaseConfig {
    pub api_key: String,
    pub auth_domain: String,
    pub project_id: String,
    pub storage_bucket: String,
    pub messaging_sender_id: String,
    pub app_id: String,
}

impl fmt::Debug for FirebaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FirebaseConfig")
            .field("api_key", &"<redacted>")
            .field("auth_domain", &self.auth_domain)
            .field("project_id", &self.project_id)
            .field("storage_bucket", &self.storage_bucket)
            .field("messaging_sender_id", &self.messaging_sender_id)
            .field("app_id", &self.app_id)
            .finish()
    }
}

/// Base URLs of the remote services. Override these to target an emulator.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Endpoints {
    pub identity_toolkit: Url,
    pub secure_token: Url,
    pub firestore: Url,
    pub google_auth: Url,
    pub google_token: Url,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            identity_toolkit: IDENTITY_TOOLKIT_URL.clone(),
            secure_token: SECURE_TOKEN_URL.clone(),
            firestore: FIRESTORE_URL.clone(),
            google_auth: GOOGLE_AUTH_URL.clone(),
            google_token: GOOGLE_TOKEN_URI.clone(),
        }
    }
}

impl Endpoints {
    /// Point every Firebase service at a single emulator host, e.g. `http://127.0.0.1:9099`.
    pub fn emulator(base: &Url) -> Result<Self, FirebaseError> {
        Ok(Self {
            identity_toolkit: base.join("identitytoolkit.googleapis.com/v1/")?,
            secure_token: base.join("securetoken.googleapis.com/v1/")?,
            firestore: base.join("v1/")?,
            ..Self::default()
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthSection {
    /// SQLite URL for session persistence; sessions live in memory when unset.
    pub persistence_url: Option<String>,
}

/// Google OAuth client used by the server-side redirect sign-in flow.
#[derive(Clone, Deserialize, Serialize)]
pub struct OAuthClientConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_url: Url,
}

impl fmt::Debug for OAuthClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthClientConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("redirect_url", &self.redirect_url.as_str())
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerSection {
    pub listen: SocketAddr,
    /// At least 64 bytes; a random key is generated per process when unset.
    pub cookie_secret: Option<String>,
    pub insecure_cookie: bool,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([0, 0, 0, 0], 8000)),
            cookie_secret: None,
            insecure_cookie: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default = "default_loglevel")]
    pub loglevel: String,
    #[serde(default)]
    pub proxy: Option<Url>,
    pub app: FirebaseConfig,
    #[serde(default)]
    pub endpoints: Endpoints,
    #[serde(default)]
    pub auth: AuthSection,
    #[serde(default)]
    pub oauth: Option<OAuthClientConfig>,
    #[serde(default)]
    pub server: ServerSection,
}

fn default_loglevel() -> String {
    "info".to_string()
}

impl AppConfig {
    /// Layer `config.toml` under `FIREBASE_*` environment variables.
    pub fn load() -> Result<Self, FirebaseError> {
        Self::load_from(Path::new(CONFIG_FILE))
    }

    pub fn load_from(path: &Path) -> Result<Self, FirebaseError> {
        Self::figment(path).extract().map_err(FirebaseError::from)
    }

    fn figment(path: &Path) -> Figment {
        Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Config with default sections around the given app record.
    pub fn with_app(app: FirebaseConfig) -> Self {
        Self {
            loglevel: default_loglevel(),
            proxy: None,
            app,
            endpoints: Endpoints::default(),
            auth: AuthSection::default(),
            oauth: None,
            server: ServerSection::default(),
        }
    }
}
