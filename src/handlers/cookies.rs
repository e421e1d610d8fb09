//! Encrypted cookies that carry sign-in state between requests.

use axum_extra::extract::cookie::{Cookie, PrivateCookieJar, SameSite};
use time::Duration;

const STATE_COOKIE: &str = "fb_oauth_state";
const VERIFIER_COOKIE: &str = "fb_oauth_verifier";
const SESSION_COOKIE: &str = "fb_session";

const PENDING_TTL: Duration = Duration::minutes(15);
const SESSION_TTL: Duration = Duration::days(7);

/// A Google redirect that has been started but not yet completed.
pub(crate) struct PendingSignIn {
    pub csrf_state: String,
    pub pkce_verifier: String,
}

impl PendingSignIn {
    pub(crate) fn store(self, jar: PrivateCookieJar, insecure: bool) -> PrivateCookieJar {
        jar.add(scoped(STATE_COOKIE, self.csrf_state, PENDING_TTL, insecure))
            .add(scoped(VERIFIER_COOKIE, self.pkce_verifier, PENDING_TTL, insecure))
    }

    /// Take the pending redirect out of the jar. Its cookies are cleared
    /// whether or not both halves were present.
    pub(crate) fn take(jar: PrivateCookieJar) -> (PrivateCookieJar, Option<Self>) {
        let csrf_state = jar.get(STATE_COOKIE).map(|c| c.value().to_owned());
        let pkce_verifier = jar.get(VERIFIER_COOKIE).map(|c| c.value().to_owned());
        let jar = jar.remove(expired(STATE_COOKIE)).remove(expired(VERIFIER_COOKIE));
        let pending = csrf_state
            .zip(pkce_verifier)
            .map(|(csrf_state, pkce_verifier)| Self {
                csrf_state,
                pkce_verifier,
            });
        (jar, pending)
    }
}

/// Bind the browser to the signed-in uid.
pub(crate) fn start_session(jar: PrivateCookieJar, uid: &str, insecure: bool) -> PrivateCookieJar {
    jar.add(scoped(SESSION_COOKIE, uid.to_owned(), SESSION_TTL, insecure))
}

pub(crate) fn session_uid(jar: &PrivateCookieJar) -> Option<String> {
    jar.get(SESSION_COOKIE).map(|c| c.value().to_owned())
}

pub(crate) fn end_session(jar: PrivateCookieJar) -> PrivateCookieJar {
    jar.remove(expired(SESSION_COOKIE))
}

fn scoped(name: &'static str, value: String, ttl: Duration, insecure: bool) -> Cookie<'static> {
    Cookie::build((name, value))
        .path("/")
        .http_only(true)
        .secure(!insecure)
        .same_site(SameSite::Lax)
        .max_age(ttl)
        .build()
}

fn expired(name: &'static str) -> Cookie<'static> {
    Cookie::build(name).path("/").build()
}
