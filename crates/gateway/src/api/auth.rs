//! Principal extraction and role guard.
//!
//! Token verification happens upstream (reverse proxy / auth service);
//! this middleware only consumes its result from trusted headers. The
//! core never assumes a caller role — DM-only routes are guarded here.

use axum::extract::Request;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use wr_domain::{Error, Principal, Role};

use super::error::ApiError;

pub const USER_HEADER: &str = "x-warroom-user";
pub const SESSION_HEADER: &str = "x-warroom-session";
pub const ORG_HEADER: &str = "x-warroom-org";
pub const ROLE_HEADER: &str = "x-warroom-role";

/// The authenticated caller, attached to request extensions.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub principal: Principal,
    pub role: Role,
}

pub fn parse_auth(headers: &HeaderMap) -> Result<AuthContext, Error> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_owned)
    };

    let user_id = header(USER_HEADER)
        .ok_or_else(|| Error::Unauthenticated("missing principal".to_owned()))?;
    let session_id = header(SESSION_HEADER)
        .ok_or_else(|| Error::Unauthenticated("missing session".to_owned()))?;

    let role = match header(ROLE_HEADER).as_deref() {
        Some("dm") => Role::Dm,
        _ => Role::Player,
    };

    Ok(AuthContext {
        principal: Principal {
            user_id,
            session_id,
            org_id: header(ORG_HEADER),
        },
        role,
    })
}

/// Reject requests without a verified principal; attach it for handlers.
pub async fn require_principal(mut request: Request, next: Next) -> Response {
    match parse_auth(request.headers()) {
        Ok(auth) => {
            request.extensions_mut().insert(auth);
            next.run(request).await
        }
        Err(error) => ApiError(error).into_response(),
    }
}

/// Gate DM-only routes. Runs inside `require_principal`.
pub async fn require_dm(request: Request, next: Next) -> Response {
    match request.extensions().get::<AuthContext>() {
        Some(auth) if auth.role.is_dm() => next.run(request).await,
        Some(_) => {
            ApiError(Error::PermissionDenied("DM role required".to_owned())).into_response()
        }
        None => ApiError(Error::Unauthenticated("missing principal".to_owned())).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(
                axum::http::HeaderName::try_from(*name).unwrap(),
                HeaderValue::from_str(value).unwrap(),
            );
        }
        map
    }

    #[test]
    fn full_principal_parses() {
        let auth = parse_auth(&headers(&[
            (USER_HEADER, "alice"),
            (SESSION_HEADER, "s-1"),
            (ORG_HEADER, "org-9"),
            (ROLE_HEADER, "dm"),
        ]))
        .unwrap();
        assert_eq!(auth.principal.user_id, "alice");
        assert_eq!(auth.principal.org_id.as_deref(), Some("org-9"));
        assert!(auth.role.is_dm());
    }

    #[test]
    fn missing_user_is_unauthenticated() {
        let err = parse_auth(&headers(&[(SESSION_HEADER, "s-1")])).unwrap_err();
        assert!(matches!(err, Error::Unauthenticated(_)));
    }

    #[test]
    fn empty_user_is_unauthenticated() {
        let err = parse_auth(&headers(&[
            (USER_HEADER, "  "),
            (SESSION_HEADER, "s-1"),
        ]))
        .unwrap_err();
        assert!(matches!(err, Error::Unauthenticated(_)));
    }

    #[test]
    fn unknown_role_defaults_to_player() {
        let auth = parse_auth(&headers(&[
            (USER_HEADER, "alice"),
            (SESSION_HEADER, "s-1"),
            (ROLE_HEADER, "wizard"),
        ]))
        .unwrap();
        assert!(!auth.role.is_dm());
    }
}
