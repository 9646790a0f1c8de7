mod middleware;
mod public;
mod rpc;
mod selectors;
mod toasts;

pub use middleware::REQUEST_ID_HEADER;
pub use public::{HttpState, build_router, prerender_home};

use axum::http::{HeaderMap, header::AUTHORIZATION};
use axum_extra::extract::cookie::CookieJar;

use crate::application::procedures::ProcedureContext;

/// Session token from `Authorization: Bearer …`, falling back to the session
/// cookie.
pub(crate) fn session_token(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    CookieJar::from_headers(headers)
        .get(cookie_name)
        .map(|cookie| cookie.value().trim().to_string())
        .filter(|token| !token.is_empty())
}

/// Procedure context for the caller; unresolved identities call anonymously.
async fn procedure_context(state: &HttpState, headers: &HeaderMap) -> ProcedureContext {
    let token = session_token(headers, &state.auth.session_cookie);
    match state.identity.user_id(token.as_deref()).await {
        Some(user_id) => ProcedureContext::for_user(user_id),
        None => ProcedureContext::anonymous(),
    }
}
