mod common;

use axum::http::StatusCode;
use common::{API_KEY, fake_jwt, named_app, sign_in_body, spawn_fake};
use firebase_bootstrap::FirebaseError;
use firebase_bootstrap::auth::{GoogleAuthProvider, get_auth};
use firebase_bootstrap::db::{DbSession, SessionStorage};
use chrono::{Duration, Utc};
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

#[tokio::test]
async fn password_sign_in_sets_current_user_and_notifies() {
    let token = fake_jwt(&json!({ "user_id": "alice" }));
    let reply = sign_in_body("alice", &token, "3600");
    let fake = spawn_fake(move |req| {
        assert!(req.path.ends_with("/accounts:signInWithPassword"));
        (StatusCode::OK, reply.clone())
    })
    .await;
    let auth = get_auth(&named_app("auth-password", fake.endpoints(), None));
    let mut changes = auth.on_auth_state_changed();

    let cred = auth
        .sign_in_with_email_and_password("alice@example.com", "hunter2")
        .await
        .expect("sign-in should succeed");

    assert_eq!(cred.user.uid, "alice");
    assert_eq!(cred.user.provider_id, "password");
    assert_eq!(auth.current_user().unwrap().uid, "alice");
    assert!(changes.has_changed().unwrap());
    assert_eq!(changes.borrow_and_update().as_ref().unwrap().uid, "alice");
    assert_eq!(cred.user.claims().unwrap()["user_id"], "alice");

    let requests = fake.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, "POST");
    assert!(
        requests[0]
            .query_pairs()
            .contains(&("key".to_string(), API_KEY.to_string()))
    );
    let body = requests[0].json();
    assert_eq!(body["email"], "alice@example.com");
    assert_eq!(body["password"], "hunter2");
    assert_eq!(body["returnSecureToken"], true);
}

#[tokio::test]
async fn api_errors_surface_without_retry() {
    let fake = spawn_fake(|_| {
        (
            StatusCode::BAD_REQUEST,
            json!({ "error": { "code": 400, "message": "INVALID_PASSWORD", "errors": [] } }),
        )
    })
    .await;
    let auth = get_auth(&named_app("auth-errors", fake.endpoints(), None));

    let err = auth
        .sign_in_with_email_and_password("bob@example.com", "wrong")
        .await
        .unwrap_err();

    match err {
        FirebaseError::Api { code, message } => {
            assert_eq!(code, 400);
            assert_eq!(message, "INVALID_PASSWORD");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(auth.current_user().is_none());
    assert_eq!(fake.requests().len(), 1);
}

#[tokio::test]
async fn idp_sign_in_posts_provider_credential() {
    let token = fake_jwt(&json!({ "user_id": "carol" }));
    let fake = spawn_fake(move |_| {
        let mut body = sign_in_body("carol", &token, "3600");
        body["providerId"] = json!("google.com");
        body["oauthAccessToken"] = json!("ya29.gmail");
        body["isNewUser"] = json!(true);
        (StatusCode::OK, body)
    })
    .await;
    let auth = get_auth(&named_app("auth-idp", fake.endpoints(), None));

    let cred = auth
        .sign_in_with_credential(GoogleAuthProvider::credential_from_access_token("ya29.gmail"))
        .await
        .unwrap();

    assert_eq!(cred.user.provider_id, "google.com");
    assert_eq!(cred.oauth_access_token.as_deref(), Some("ya29.gmail"));
    assert!(cred.is_new_user);

    let requests = fake.requests();
    let req = &requests[0];
    assert!(req.path.ends_with("/accounts:signInWithIdp"));
    let body = req.json();
    assert_eq!(
        body["postBody"],
        "access_token=ya29.gmail&providerId=google.com"
    );
    assert_eq!(body["returnIdpCredential"], true);
}

#[tokio::test]
async fn expiring_token_is_refreshed_once() {
    let first = fake_jwt(&json!({ "user_id": "dave", "n": 1 }));
    let second = fake_jwt(&json!({ "user_id": "dave", "n": 2 }));
    let second_reply = second.clone();
    let fake = spawn_fake(move |req| {
        if req.path.ends_with("/token") {
            (
                StatusCode::OK,
                json!({
                    "expires_in": "3600",
                    "token_type": "Bearer",
                    "refresh_token": "refresh-dave-2",
                    "id_token": second_reply,
                    "user_id": "dave",
                    "project_id": "1234"
                }),
            )
        } else {
            (StatusCode::OK, sign_in_body("dave", &first, "10"))
        }
    })
    .await;
    let auth = get_auth(&named_app("auth-refresh", fake.endpoints(), None));
    auth.sign_in_with_email_and_password("dave@example.com", "pw")
        .await
        .unwrap();

    let token = auth.id_token(false).await.unwrap();
    assert_eq!(token, second);
    let again = auth.id_token(false).await.unwrap();
    assert_eq!(again, second);

    let requests = fake.requests();
    let refreshes: Vec<_> = requests
        .iter()
        .filter(|r| r.path.ends_with("/securetoken/v1/token"))
        .collect();
    assert_eq!(refreshes.len(), 1);
    let form = refreshes[0].form();
    assert!(form.contains(&("grant_type".to_string(), "refresh_token".to_string())));
    assert!(form.contains(&("refresh_token".to_string(), "refresh-dave".to_string())));
    assert_eq!(
        auth.current_user().unwrap().tokens.refresh_token,
        "refresh-dave-2"
    );
}

#[tokio::test]
async fn anonymous_sign_in_and_sign_out() {
    let fake = spawn_fake(|_| {
        (
            StatusCode::OK,
            json!({
                "localId": "anon-1",
                "idToken": "a.b.c",
                "refreshToken": "r",
                "expiresIn": "3600"
            }),
        )
    })
    .await;
    let auth = get_auth(&named_app("auth-anonymous", fake.endpoints(), None));

    let cred = auth.sign_in_anonymously().await.unwrap();
    assert!(cred.user.is_anonymous);
    assert!(cred.is_new_user);
    let again = auth.sign_in_anonymously().await.unwrap();
    assert_eq!(again.user.uid, "anon-1");
    assert_eq!(fake.requests().len(), 1);

    let body = fake.requests()[0].json();
    assert!(body.get("email").is_none());
    assert_eq!(body["returnSecureToken"], true);

    auth.sign_out().await.unwrap();
    assert!(auth.current_user().is_none());
    assert!(matches!(
        auth.id_token(false).await,
        Err(FirebaseError::NoCurrentUser)
    ));
}

#[tokio::test]
async fn persisted_session_is_restored_and_cleared() {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time before UNIX_EPOCH")
        .as_nanos();
    let mut temp_path = std::env::temp_dir();
    temp_path.push(format!(
        "firebase-bootstrap-session-{}-{}.sqlite",
        std::process::id(),
        nanos
    ));
    let database_url = format!("sqlite:{}", temp_path.display());

    let token = fake_jwt(&json!({ "user_id": "erin" }));
    let reply = sign_in_body("erin", &token, "3600");
    let fake = spawn_fake(move |_| (StatusCode::OK, reply.clone())).await;

    let auth = get_auth(&named_app(
        "auth-persistence",
        fake.endpoints(),
        Some(database_url.clone()),
    ));
    assert!(auth.restore_persisted_user().await.unwrap().is_none());

    let signed_in = auth
        .sign_in_with_email_and_password("erin@example.com", "pw")
        .await
        .unwrap()
        .user;

    let storage = SessionStorage::connect_lazy(&database_url).unwrap();
    let stored = storage
        .load(&auth.storage_key())
        .await
        .unwrap()
        .expect("session persisted on sign-in");
    assert_eq!(stored.into_user().unwrap(), signed_in);

    let mut edited = signed_in.clone();
    edited.display_name = Some("Erin".into());
    storage
        .save(DbSession::new(auth.storage_key(), &edited).unwrap())
        .await
        .unwrap();
    let restored = auth.restore_persisted_user().await.unwrap().unwrap();
    assert_eq!(restored.display_name.as_deref(), Some("Erin"));
    assert_eq!(auth.current_user(), Some(edited));

    auth.sign_out().await.unwrap();
    assert!(storage.load(&auth.storage_key()).await.unwrap().is_none());

    let _ = std::fs::remove_file(&temp_path);
}

#[tokio::test]
async fn account_lifecycle_calls_identity_toolkit() {
    let token = fake_jwt(&json!({ "user_id": "frank" }));
    let reply = sign_in_body("frank", &token, "3600");
    let fake = spawn_fake(move |req| {
        let method = req.path.rsplit('/').next().unwrap_or_default().to_string();
        match method.as_str() {
            "accounts:signUp" => (StatusCode::OK, reply.clone()),
            "accounts:sendOobCode" => (StatusCode::OK, json!({ "email": "frank@example.com" })),
            "accounts:lookup" => (
                StatusCode::OK,
                json!({
                    "users": [{
                        "localId": "frank",
                        "email": "frank@example.com",
                        "displayName": "Frank",
                        "photoUrl": "https://example.com/frank.png",
                        "emailVerified": true
                    }]
                }),
            ),
            "accounts:delete" => (StatusCode::OK, json!({ "kind": "identitytoolkit#DeleteAccountResponse" })),
            _ => (StatusCode::NOT_FOUND, json!({ "error": { "code": 404, "message": method.clone() } })),
        }
    })
    .await;
    let auth = get_auth(&named_app("auth-lifecycle", fake.endpoints(), None));

    let created = auth
        .create_user_with_email_and_password("frank@example.com", "s3cret!")
        .await
        .unwrap();
    assert_eq!(created.user.uid, "frank");
    assert_eq!(created.user.provider_id, "password");
    assert!(!created.user.is_anonymous);

    auth.send_password_reset_email("frank@example.com")
        .await
        .unwrap();

    let reloaded = auth.reload_user().await.unwrap();
    assert_eq!(reloaded.display_name.as_deref(), Some("Frank"));
    assert!(reloaded.email_verified);
    assert_eq!(auth.current_user().unwrap(), reloaded);

    let mut changes = auth.on_auth_state_changed();
    auth.delete_user().await.unwrap();
    assert!(auth.current_user().is_none());
    assert!(changes.has_changed().unwrap());
    assert!(changes.borrow_and_update().is_none());

    let requests = fake.requests();
    let paths: Vec<&str> = requests
        .iter()
        .map(|r| r.path.rsplit('/').next().unwrap_or_default())
        .collect();
    assert_eq!(
        paths,
        [
            "accounts:signUp",
            "accounts:sendOobCode",
            "accounts:lookup",
            "accounts:delete"
        ]
    );

    let sign_up = requests[0].json();
    assert_eq!(sign_up["email"], "frank@example.com");
    assert_eq!(sign_up["password"], "s3cret!");
    assert_eq!(sign_up["returnSecureToken"], true);

    let reset = requests[1].json();
    assert_eq!(reset["requestType"], "PASSWORD_RESET");
    assert_eq!(reset["email"], "frank@example.com");

    assert_eq!(requests[2].json()["idToken"], token.as_str());
    assert_eq!(requests[3].json()["idToken"], token.as_str());
}

#[tokio::test]
async fn transient_server_errors_are_retried() {
    let token = fake_jwt(&json!({ "user_id": "gus" }));
    let reply = sign_in_body("gus", &token, "3600");
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = calls.clone();
    let fake = spawn_fake(move |_| {
        if seen.fetch_add(1, Ordering::SeqCst) == 0 {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                json!({ "error": { "code": 503, "message": "UNAVAILABLE" } }),
            )
        } else {
            (StatusCode::OK, reply.clone())
        }
    })
    .await;
    let auth = get_auth(&named_app("auth-retry", fake.endpoints(), None));

    let cred = auth
        .sign_in_with_email_and_password("gus@example.com", "pw")
        .await
        .expect("second attempt should succeed");

    assert_eq!(cred.user.uid, "gus");
    assert_eq!(fake.requests().len(), 2);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn oversized_token_lifetime_falls_back_to_an_hour() {
    let token = fake_jwt(&json!({ "user_id": "hana" }));
    let reply = sign_in_body("hana", &token, "9223372036854775807");
    let fake = spawn_fake(move |_| (StatusCode::OK, reply.clone())).await;
    let auth = get_auth(&named_app("auth-huge-expiry", fake.endpoints(), None));

    let before = Utc::now();
    let cred = auth
        .sign_in_with_email_and_password("hana@example.com", "pw")
        .await
        .unwrap();

    let remaining = cred.user.tokens.expires_at - before;
    assert!(remaining >= Duration::minutes(59));
    assert!(remaining <= Duration::minutes(61));
    assert_eq!(auth.id_token(false).await.unwrap(), token);
}
