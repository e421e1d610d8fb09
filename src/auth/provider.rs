use crate::config::{Endpoints, OAuthClientConfig};
use crate::error::FirebaseError;
use oauth2::{
    AuthUrl, AuthorizationCode, Client as OAuth2Client, ClientId, ClientSecret, CsrfToken,
    EndpointNotSet, EndpointSet, ExtraTokenFields, PkceCodeChallenge, PkceCodeVerifier,
    RedirectUrl, Scope, StandardRevocableToken, StandardTokenResponse, TokenResponse, TokenUrl,
    basic::{
        BasicErrorResponse, BasicRevocationErrorResponse, BasicTokenIntrospectionResponse,
        BasicTokenType,
    },
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;
use url::Url;

pub const GOOGLE_PROVIDER_ID: &str = "google.com";

/// Requested on every consent screen, ahead of any added scopes.
const BASE_SCOPES: [&str; 3] = ["openid", "email", "profile"];

/// Parameters the flow sets itself; custom values for these are dropped.
const RESERVED_PARAMETERS: [&str; 8] = [
    "client_id",
    "response_type",
    "scope",
    "redirect_uri",
    "state",
    "code_challenge",
    "code_challenge_method",
    "nonce",
];

/// Google identity provider with caller-added OAuth scopes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GoogleAuthProvider {
    scopes: Vec<String>,
    custom_parameters: BTreeMap<String, String>,
}

/// Provider tokens handed to `Auth::sign_in_with_credential`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthCredential {
    pub provider_id: String,
    pub id_token: Option<String>,
    pub access_token: Option<String>,
}

impl OAuthCredential {
    /// Form-encoded `postBody` for `accounts:signInWithIdp`.
    pub fn to_post_body(&self) -> String {
        let mut body = url::form_urlencoded::Serializer::new(String::new());
        if let Some(id_token) = &self.id_token {
            body.append_pair("id_token", id_token);
        }
        if let Some(access_token) = &self.access_token {
            body.append_pair("access_token", access_token);
        }
        body.append_pair("providerId", &self.provider_id);
        body.finish()
    }
}

impl GoogleAuthProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn provider_id(&self) -> &'static str {
        GOOGLE_PROVIDER_ID
    }

    /// Request an additional scope. Adding a scope twice is a no-op.
    pub fn add_scope(&mut self, scope: impl Into<String>) -> &mut Self {
        let scope = scope.into();
        if !self.scopes.contains(&scope) {
            self.scopes.push(scope);
        }
        self
    }

    /// Scopes added through `add_scope`, in insertion order.
    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    pub fn set_custom_parameters(&mut self, params: BTreeMap<String, String>) -> &mut Self {
        self.custom_parameters = params
            .into_iter()
            .filter(|(k, _)| !RESERVED_PARAMETERS.contains(&k.as_str()))
            .collect();
        self
    }

    pub fn custom_parameters(&self) -> &BTreeMap<String, String> {
        &self.custom_parameters
    }

    pub fn credential_from_id_token(id_token: impl Into<String>) -> OAuthCredential {
        OAuthCredential {
            provider_id: GOOGLE_PROVIDER_ID.to_string(),
            id_token: Some(id_token.into()),
            access_token: None,
        }
    }

    pub fn credential_from_access_token(access_token: impl Into<String>) -> OAuthCredential {
        OAuthCredential {
            provider_id: GOOGLE_PROVIDER_ID.to_string(),
            id_token: None,
            access_token: Some(access_token.into()),
        }
    }

    /// Consent-screen URL with the base scopes followed by the added ones.
    pub fn authorize_url(
        &self,
        oauth: &OAuthClientConfig,
        endpoints: &Endpoints,
        challenge: PkceCodeChallenge,
    ) -> Result<(Url, CsrfToken), FirebaseError> {
        let client = build_oauth2_client(oauth, endpoints)?;
        let mut request = client
            .authorize_url(CsrfToken::new_random)
            .set_pkce_challenge(challenge);
        for scope in self.all_scopes() {
            request = request.add_scope(Scope::new(scope));
        }
        for (name, value) in &self.custom_parameters {
            request = request.add_extra_param(name.as_str(), value.as_str());
        }
        Ok(request.url())
    }

    /// Exchange an authorization code (PKCE) for Google tokens.
    pub async fn exchange_code(
        &self,
        oauth: &OAuthClientConfig,
        endpoints: &Endpoints,
        code: AuthorizationCode,
        verifier: PkceCodeVerifier,
        http_client: &reqwest::Client,
    ) -> Result<OAuthCredential, FirebaseError> {
        let client = build_oauth2_client(oauth, endpoints)?;
        let token: GoogleTokenResponse = client
            .exchange_code(code)
            .set_pkce_verifier(verifier)
            .request_async(http_client)
            .await?;
        info!(
            granted_scopes = token.scopes().map(|s| s.len()).unwrap_or(0),
            "Google authorization code exchanged"
        );
        Ok(OAuthCredential {
            provider_id: GOOGLE_PROVIDER_ID.to_string(),
            id_token: token.extra_fields().id_token.clone(),
            access_token: Some(token.access_token().secret().clone()),
        })
    }

    fn all_scopes(&self) -> Vec<String> {
        BASE_SCOPES
            .iter()
            .map(|s| s.to_string())
            .chain(
                self.scopes
                    .iter()
                    .filter(|s| !BASE_SCOPES.contains(&s.as_str()))
                    .cloned(),
            )
            .collect()
    }
}

/// Build the Google OAuth2 client from configuration.
fn build_oauth2_client(
    oauth: &OAuthClientConfig,
    endpoints: &Endpoints,
) -> Result<GoogleOauth2Client, FirebaseError> {
    let client = OAuth2Client::new(ClientId::new(oauth.client_id.clone()))
        .set_client_secret(ClientSecret::new(oauth.client_secret.clone()))
        .set_auth_uri(AuthUrl::new(endpoints.google_auth.as_str().to_string())?)
        .set_token_uri(TokenUrl::new(endpoints.google_token.as_str().to_string())?)
        .set_redirect_uri(RedirectUrl::new(oauth.redirect_url.as_str().to_string())?);
    Ok(client)
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub(crate) struct GoogleTokenField {
    #[serde(rename = "id_token")]
    pub id_token: Option<String>,
}
impl ExtraTokenFields for GoogleTokenField {}

pub(crate) type GoogleTokenResponse = StandardTokenResponse<GoogleTokenField, BasicTokenType>;

pub(crate) type GoogleOauth2Client = OAuth2Client<
    BasicErrorResponse,
    GoogleTokenResponse,
    BasicTokenIntrospectionResponse,
    StandardRevocableToken,
    BasicRevocationErrorResponse,
    EndpointSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointNotSet,
    EndpointSet,
>;
