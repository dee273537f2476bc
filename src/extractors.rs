use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{header, HeaderMap, HeaderValue};
use axum::response::Response;
use rusqlite::params;

use crate::db::models::USER_STATUS_ACTIVE;
use crate::error::AppError;
use crate::rbac;
use crate::sessions::{SessionStore, SESSION_COOKIE};
use crate::state::AppState;

/// Represents the currently authenticated member.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: i64,
    pub username: String,
    pub is_admin: bool,
}

impl CurrentUser {
    /// Checks a permission, turning a refusal into 403.
    pub fn require(&self, conn: &rusqlite::Connection, item: &str) -> Result<(), AppError> {
        if rbac::can(conn, self.id, item)? {
            Ok(())
        } else {
            Err(AppError::Forbidden)
        }
    }
}

/// Extractor that requires authentication.
/// Returns 401 if no valid session found.
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = cookie(&parts.headers, &state.config.auth.cookie_name)
            .ok_or(AppError::Unauthorized)?;

        let conn = state.db.get()?;
        let (id, username): (i64, String) = conn
            .query_row(
                "SELECT u.id, u.username FROM sessions s \
                 JOIN users u ON u.id = s.user_id \
                 WHERE s.token = ?1 AND s.expires_at > datetime('now') AND u.status = ?2",
                params![token, USER_STATUS_ACTIVE],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .map_err(|_| AppError::Unauthorized)?;
        let is_admin = rbac::can(&conn, id, rbac::ROLE_ADMIN)?;

        Ok(CurrentUser {
            id,
            username,
            is_admin,
        })
    }
}

/// Optional user extractor; guests get `None` instead of 401.
pub struct MaybeUser(pub Option<CurrentUser>);

impl MaybeUser {
    pub fn is_guest(&self) -> bool {
        self.0.is_none()
    }

    pub fn id(&self) -> Option<i64> {
        self.0.as_ref().map(|user| user.id)
    }
}

impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match CurrentUser::from_request_parts(parts, state).await {
            Ok(user) => Ok(MaybeUser(Some(user))),
            Err(AppError::Unauthorized) => Ok(MaybeUser(None)),
            Err(e) => Err(e),
        }
    }
}

/// Id of the client's server-side session. A client without one gets a
/// fresh id which `attach` hands out as a cookie.
#[derive(Debug, Clone)]
pub struct ClientSession {
    pub id: String,
    fresh: bool,
}

impl ClientSession {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        match cookie(headers, SESSION_COOKIE) {
            Some(id) if !id.is_empty() => Self {
                id: id.to_string(),
                fresh: false,
            },
            _ => Self {
                id: SessionStore::generate_id(),
                fresh: true,
            },
        }
    }

    pub fn attach(&self, mut response: Response) -> Response {
        if !self.fresh {
            return response;
        }
        let cookie = format!("{}={}; HttpOnly; SameSite=Lax; Path=/", SESSION_COOKIE, self.id);
        match HeaderValue::from_str(&cookie) {
            Ok(value) => {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
            Err(e) => tracing::warn!("Cannot set session cookie: {}", e),
        }
        response
    }
}

impl<S: Send + Sync> FromRequestParts<S> for ClientSession {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_headers(&parts.headers))
    }
}

/// Value of the named request cookie.
pub fn cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|s| s.split(';'))
        .map(|s| s.trim())
        .find_map(|cookie| {
            let mut split = cookie.splitn(2, '=');
            let key = split.next()?.trim();
            let val = split.next()?.trim();
            if key == name {
                Some(val)
            } else {
                None
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn cookie_finds_named_value() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; agora_session=abc123; agora_sid=s1"),
        );
        assert_eq!(cookie(&headers, "agora_session"), Some("abc123"));
        assert_eq!(cookie(&headers, "agora_sid"), Some("s1"));
        assert_eq!(cookie(&headers, "missing"), None);
    }

    #[test]
    fn client_session_reuses_cookie_or_issues_one() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("agora_sid=known"));
        let known = ClientSession::from_headers(&headers);
        assert_eq!(known.id, "known");
        let response = known.attach(Response::default());
        assert!(response.headers().get(header::SET_COOKIE).is_none());

        let fresh = ClientSession::from_headers(&HeaderMap::new());
        let response = fresh.attach(Response::default());
        let set = response.headers().get(header::SET_COOKIE).unwrap().to_str().unwrap();
        assert!(set.starts_with(&format!("agora_sid={}", fresh.id)));
    }
}
