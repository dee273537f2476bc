//! Maintenance mode: while the `maintenance_mode` setting is on, everyone
//! but administrators is sent to a notice page.

use askama::Template;
use axum::extract::{FromRequestParts, Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::Router;

use crate::error::AppResult;
use crate::extractors::MaybeUser;
use crate::routes::home::{Html, Layout};
use crate::state::AppState;
use crate::{maintenance, settings};

pub const NOTICE_PATH: &str = "/maintenance";

/// Paths that stay reachable while the forum is offline.
const OPEN_PATHS: &[&str] = &[NOTICE_PATH, "/login", "/logout", "/install", "/update", "/assets"];

pub fn router() -> Router<AppState> {
    Router::new().route(NOTICE_PATH, get(notice))
}

#[derive(Template)]
#[template(path = "maintenance.html")]
pub struct MaintenanceTemplate {
    pub layout: Layout,
}

fn is_open(path: &str) -> bool {
    OPEN_PATHS.iter().any(|open| {
        path == *open || path.strip_prefix(*open).is_some_and(|rest| rest.starts_with('/'))
    })
}

fn is_offline(state: &AppState) -> AppResult<bool> {
    let conn = state.db.get()?;
    Ok(maintenance::is_installed(&conn)? && settings::get_flag(&conn, settings::MAINTENANCE_MODE)?)
}

/// Middleware turning members and guests away while the forum is offline.
pub async fn gate(State(state): State<AppState>, request: Request, next: Next) -> AppResult<Response> {
    if is_open(request.uri().path()) || !is_offline(&state)? {
        return Ok(next.run(request).await);
    }

    let (mut parts, body) = request.into_parts();
    let user = MaybeUser::from_request_parts(&mut parts, &state).await?;
    if user.0.as_ref().is_some_and(|user| user.is_admin) {
        return Ok(next.run(Request::from_parts(parts, body)).await);
    }
    tracing::debug!(path = %parts.uri.path(), "Forum offline, showing the notice");
    Ok(Redirect::to(NOTICE_PATH).into_response())
}

async fn notice(State(state): State<AppState>, user: MaybeUser) -> AppResult<Response> {
    if !is_offline(&state)? {
        return Ok(Redirect::to("/").into_response());
    }
    let conn = state.db.get()?;
    let page = MaintenanceTemplate {
        layout: Layout::build(&conn, &state.cache, user.0.as_ref(), "Maintenance")?,
    };
    Ok((StatusCode::SERVICE_UNAVAILABLE, Html(page)).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_in_and_wizards_stay_reachable() {
        assert!(is_open("/login"));
        assert!(is_open("/install/next"));
        assert!(is_open("/assets/css/output.css"));
        assert!(is_open("/maintenance"));
        assert!(!is_open("/"));
        assert!(!is_open("/loginx"));
        assert!(!is_open("/forum/1/1/lounge"));
    }
}
