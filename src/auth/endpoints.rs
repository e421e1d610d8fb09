use crate::api::rest::{endpoint_url, read_json, send_with_retry};
use crate::config::Endpoints;
use crate::error::FirebaseError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::info;

/// What the Identity Toolkit calls need from the owning app.
#[derive(Clone)]
pub(super) struct IdentityContext {
    pub api_key: String,
    pub endpoints: Endpoints,
    pub http: reqwest::Client,
}

/// Stateless Identity Toolkit / Secure Token endpoints.
pub(super) struct IdentityEndpoints;

impl IdentityEndpoints {
    pub(super) async fn sign_in_with_idp(
        ctx: &IdentityContext,
        post_body: String,
        request_uri: String,
    ) -> Result<SignInResponse, FirebaseError> {
        let body = SignInWithIdpRequest {
            post_body,
            request_uri,
            return_secure_token: true,
            return_idp_credential: true,
        };
        let resp: SignInResponse = Self::accounts(ctx, "signInWithIdp", &body).await?;
        info!(uid = %resp.local_id, "signInWithIdp succeeded");
        Ok(resp)
    }

    pub(super) async fn sign_in_with_password(
        ctx: &IdentityContext,
        email: &str,
        password: &str,
    ) -> Result<SignInResponse, FirebaseError> {
        let body = PasswordRequest {
            email: Some(email),
            password: Some(password),
            return_secure_token: true,
        };
        Self::accounts(ctx, "signInWithPassword", &body).await
    }

    /// Email/password sign-up, or an anonymous account when both are `None`.
    pub(super) async fn sign_up(
        ctx: &IdentityContext,
        email: Option<&str>,
        password: Option<&str>,
    ) -> Result<SignInResponse, FirebaseError> {
        let body = PasswordRequest {
            email,
            password,
            return_secure_token: true,
        };
        Self::accounts(ctx, "signUp", &body).await
    }

    pub(super) async fn send_password_reset(
        ctx: &IdentityContext,
        email: &str,
    ) -> Result<(), FirebaseError> {
        let body = OobCodeRequest {
            request_type: "PASSWORD_RESET",
            email,
        };
        let _: serde_json::Value = Self::accounts(ctx, "sendOobCode", &body).await?;
        Ok(())
    }

    pub(super) async fn lookup(
        ctx: &IdentityContext,
        id_token: &str,
    ) -> Result<AccountInfo, FirebaseError> {
        let body = IdTokenRequest { id_token };
        let resp: LookupResponse = Self::accounts(ctx, "lookup", &body).await?;
        resp.users
            .into_iter()
            .next()
            .ok_or(FirebaseError::NoCurrentUser)
    }

    pub(super) async fn delete_account(
        ctx: &IdentityContext,
        id_token: &str,
    ) -> Result<(), FirebaseError> {
        let body = IdTokenRequest { id_token };
        let _: serde_json::Value = Self::accounts(ctx, "delete", &body).await?;
        Ok(())
    }

    /// Exchange a refresh token for a fresh ID token.
    pub(super) async fn refresh_token(
        ctx: &IdentityContext,
        refresh_token: &str,
    ) -> Result<TokenRefreshResponse, FirebaseError> {
        let url = endpoint_url(&ctx.endpoints.secure_token, ["token"])?;
        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ];
        let resp: TokenRefreshResponse = send_with_retry("securetoken refresh", || async {
            let resp = ctx
                .http
                .post(url.clone())
                .query(&[("key", ctx.api_key.as_str())])
                .form(&form)
                .send()
                .await?;
            read_json(resp).await
        })
        .await?;
        info!(uid = %resp.user_id, "ID token refreshed");
        Ok(resp)
    }

    async fn accounts<B, R>(ctx: &IdentityContext, method: &str, body: &B) -> Result<R, FirebaseError>
    where
        B: Serialize,
        R: DeserializeOwned,
    {
        let url = endpoint_url(&ctx.endpoints.identity_toolkit, [format!("accounts:{method}").as_str()])?;
        send_with_retry(method, || async {
            let resp = ctx
                .http
                .post(url.clone())
                .query(&[("key", ctx.api_key.as_str())])
                .json(body)
                .send()
                .await?;
            read_json(resp).await
        })
        .await
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SignInWithIdpRequest {
    post_body: String,
    request_uri: String,
    return_secure_token: bool,
    return_idp_credential: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PasswordRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    password: Option<&'a str>,
    return_secure_token: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OobCodeRequest<'a> {
    request_type: &'static str,
    email: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct IdTokenRequest<'a> {
    id_token: &'a str,
}

/// Shared shape of `signInWithIdp`, `signInWithPassword` and `signUp` responses.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct SignInResponse {
    pub local_id: String,
    pub id_token: String,
    pub refresh_token: String,
    pub expires_in: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub email_verified: Option<bool>,
    #[serde(default)]
    pub provider_id: Option<String>,
    #[serde(default)]
    pub oauth_access_token: Option<String>,
    #[serde(default)]
    pub is_new_user: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub(super) struct TokenRefreshResponse {
    pub expires_in: String,
    pub refresh_token: String,
    pub id_token: String,
    pub user_id: String,
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<AccountInfo>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct AccountInfo {
    pub local_id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub email_verified: bool,
}
