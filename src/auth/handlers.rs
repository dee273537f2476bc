use askama::Template;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Form;
use serde::Deserialize;

use crate::auth::{password, session};
use crate::config::AuthConfig;
use crate::error::{AppError, AppResult};
use crate::extractors::{cookie, MaybeUser};
use crate::routes::home::{Html, Layout};
use crate::state::AppState;

fn session_cookie(auth: &AuthConfig, token: &str) -> String {
    format!(
        "{}={}; HttpOnly; SameSite=Strict; Path=/; Max-Age={}",
        auth.cookie_name,
        token,
        auth.session_hours * 3600
    )
}

fn clear_session_cookie(auth: &AuthConfig) -> String {
    format!(
        "{}=; HttpOnly; SameSite=Strict; Path=/; Max-Age=0",
        auth.cookie_name
    )
}

#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginTemplate {
    pub layout: Layout,
    pub username: String,
    pub error: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

/// GET /login
pub async fn login_page(State(state): State<AppState>, user: MaybeUser) -> AppResult<Response> {
    if !user.is_guest() {
        return Ok(see_other("/", None));
    }
    let conn = state.db.get()?;
    let page = LoginTemplate {
        layout: Layout::build(&conn, &state.cache, None, "Sign in")?,
        username: String::new(),
        error: None,
    };
    Ok(Html(page).into_response())
}

/// POST /login — check credentials and start a session
pub async fn login(
    State(state): State<AppState>,
    Form(form): Form<LoginForm>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let user_id = password::authenticate(&conn, form.username.trim(), &form.password)
        .map_err(|e| AppError::Internal(e.to_string()))?;

    let Some(user_id) = user_id else {
        tracing::info!("Failed sign in for {}", form.username.trim());
        let page = LoginTemplate {
            layout: Layout::build(&conn, &state.cache, None, "Sign in")?,
            username: form.username,
            error: Some("Incorrect username or password.".into()),
        };
        return Ok((StatusCode::UNAUTHORIZED, Html(page)).into_response());
    };

    let token = session::create_session(&conn, user_id, state.config.auth.session_hours)?;
    tracing::info!("User #{} signed in", user_id);
    Ok(see_other("/", Some(session_cookie(&state.config.auth, &token))))
}

/// POST /logout — delete session and redirect
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> AppResult<Response> {
    if let Some(token) = cookie(&headers, &state.config.auth.cookie_name) {
        let conn = state.db.get()?;
        session::delete_session(&conn, token)?;
    }
    Ok(see_other("/", Some(clear_session_cookie(&state.config.auth))))
}

fn see_other(location: &str, cookie: Option<String>) -> Response {
    let mut response = (StatusCode::SEE_OTHER, [(header::LOCATION, location.to_string())], "")
        .into_response();
    if let Some(value) = cookie.and_then(|c| c.parse().ok()) {
        response.headers_mut().append(header::SET_COOKIE, value);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cookies_use_the_configured_name() {
        let auth = AuthConfig::default();
        let set = session_cookie(&auth, "tok");
        assert!(set.starts_with("agora_session=tok;"));
        assert!(set.contains(&format!("Max-Age={}", auth.session_hours * 3600)));
        assert!(clear_session_cookie(&auth).contains("Max-Age=0"));
    }
}
