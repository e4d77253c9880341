//! Client identification middleware.
//!
//! Each browser is identified by an opaque token in the `liftlog_client`
//! cookie. Requests without a valid token get a fresh one, which is returned
//! in a `Set-Cookie` header. Handlers read the token from request extensions.

use axum::{
    body::Body,
    extract::Request,
    http::{
        HeaderMap, HeaderValue,
        header::{COOKIE, SET_COOKIE},
    },
    middleware::Next,
    response::Response,
};
use tracing::{debug, warn};

use liftlog_session::ClientToken;

/// Cookie carrying the client token.
pub const CLIENT_COOKIE: &str = "liftlog_client";

/// Cookie lifetime in seconds (one year).
const COOKIE_MAX_AGE: u64 = 365 * 24 * 60 * 60;

/// Token presented in the request's cookies, if any is valid.
pub fn token_from_headers(headers: &HeaderMap) -> Option<ClientToken> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == CLIENT_COOKIE)
        .and_then(|(_, value)| match ClientToken::parse(value) {
            Ok(token) => Some(token),
            Err(e) => {
                debug!(error = %e, "Ignoring malformed client cookie");
                None
            }
        })
}

fn set_cookie_value(token: &ClientToken) -> Option<HeaderValue> {
    HeaderValue::from_str(&format!(
        "{CLIENT_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={COOKIE_MAX_AGE}"
    ))
    .ok()
}

/// Attach a [`ClientToken`] to every request, issuing one when missing.
pub async fn client_middleware(mut request: Request<Body>, next: Next) -> Response {
    let (token, issued) = match token_from_headers(request.headers()) {
        Some(token) => (token, false),
        None => (ClientToken::generate(), true),
    };

    request.extensions_mut().insert(token.clone());
    let mut response = next.run(request).await;

    if issued {
        match set_cookie_value(&token) {
            Some(value) => {
                debug!(client = %token, "Issued client cookie");
                response.headers_mut().append(SET_COOKIE, value);
            }
            None => warn!(client = %token, "Client token is not a valid header value"),
        }
    }
    response
}
