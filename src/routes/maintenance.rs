//! Browser side of the installation and update wizards.
//!
//! Each POST advances the wizard by one step. The client's progress lives
//! in its server-side session and the session store lock is held for the
//! whole step, so parallel requests of one client run one after another.

use askama::Template;
use axum::extract::State;
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::error::{AppError, AppResult};
use crate::extractors::{ClientSession, CurrentUser};
use crate::maintenance::{self, Installation, Progress, StepResult, Update};
use crate::routes::home::{Html, Layout};
use crate::settings;
use crate::state::AppState;

const INSTALL_KEY: &str = "install";
const UPDATE_KEY: &str = "update";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/install", get(install_page))
        .route("/install/next", post(install_next))
        .route("/install/drop", post(install_drop))
        .route("/update", get(update_page))
        .route("/update/next", post(update_next))
}

#[derive(Template)]
#[template(path = "install.html")]
pub struct InstallTemplate {
    pub layout: Layout,
    pub version: &'static str,
}

#[derive(Template)]
#[template(path = "update.html")]
pub struct UpdateTemplate {
    pub layout: Layout,
    pub recorded: String,
    pub target: String,
    pub needed: bool,
}

/// Before installation anyone may drive the wizard. Once a version is
/// recorded only the client whose run is still under way may go on.
fn may_install(installed: bool, progress: Option<&Progress>) -> bool {
    !installed || progress.is_some_and(Progress::is_running)
}

async fn install_page(
    State(state): State<AppState>,
    session: ClientSession,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let installed = maintenance::is_installed(&conn)?;
    let mut store = state.sessions.lock().await;
    let progress: Option<Progress> = store.get_as(&session.id, INSTALL_KEY);
    if !may_install(installed, progress.as_ref()) {
        return Ok(Redirect::to("/").into_response());
    }
    // Opening the page starts the wizard over
    if !installed {
        store.set_from(&session.id, INSTALL_KEY, &Progress::new());
    }
    drop(store);

    let page = InstallTemplate {
        layout: Layout::bare("Installation"),
        version: settings::VERSION,
    };
    Ok(session.attach(Html(page).into_response()))
}

async fn install_next(
    State(state): State<AppState>,
    session: ClientSession,
) -> AppResult<Response> {
    advance_install(&state, &session, false).await
}

async fn install_drop(
    State(state): State<AppState>,
    session: ClientSession,
) -> AppResult<Response> {
    advance_install(&state, &session, true).await
}

async fn advance_install(
    state: &AppState,
    session: &ClientSession,
    drop_tables: bool,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let mut store = state.sessions.lock().await;
    let stored: Option<Progress> = store.get_as(&session.id, INSTALL_KEY);
    if !may_install(maintenance::is_installed(&conn)?, stored.as_ref()) {
        tracing::warn!("Installer request refused for session {}", session.id);
        return Err(AppError::Forbidden);
    }

    let mut progress = stored.unwrap_or_default();
    let installation = Installation::new(&conn, &state.config.install, state.identities.as_ref());
    let result: StepResult = if drop_tables {
        installation.next_drop(&mut progress)?
    } else {
        installation.next_step(&mut progress)?
    };
    if progress.is_complete() {
        tracing::info!("Installation run finished");
        store.remove(&session.id, INSTALL_KEY);
    } else {
        store.set_from(&session.id, INSTALL_KEY, &progress);
    }
    drop(store);

    Ok(session.attach(Json(result).into_response()))
}

async fn update_page(State(state): State<AppState>, user: CurrentUser) -> AppResult<Response> {
    if !user.is_admin {
        return Err(AppError::Forbidden);
    }
    let conn = state.db.get()?;
    let recorded = maintenance::recorded_version(&conn)?.unwrap_or_default();
    let update = Update::new(&conn);

    let page = UpdateTemplate {
        layout: Layout::build(&conn, &state.cache, Some(&user), "Update")?,
        needed: update.is_needed(&recorded),
        target: update.target().to_string(),
        recorded,
    };
    Ok(Html(page).into_response())
}

async fn update_next(
    State(state): State<AppState>,
    user: CurrentUser,
    session: ClientSession,
) -> AppResult<Response> {
    if !user.is_admin {
        return Err(AppError::Forbidden);
    }
    let conn = state.db.get()?;
    let mut store = state.sessions.lock().await;

    let mut progress = match store.get_as::<Progress>(&session.id, UPDATE_KEY) {
        Some(progress) => progress,
        None => Progress::for_version(maintenance::recorded_version(&conn)?.unwrap_or_default()),
    };
    let result = Update::new(&conn).next_step(&mut progress)?;
    if progress.is_complete() {
        store.remove(&session.id, UPDATE_KEY);
    } else {
        store.set_from(&session.id, UPDATE_KEY, &progress);
    }
    drop(store);

    Ok(session.attach(Json(result).into_response()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn installed_forums_only_admit_a_run_under_way() {
        let fresh = Progress::new();
        let mut running = Progress::new();
        running.current = 3;
        running.total = 24;
        let mut finished = running.clone();
        finished.current = 24;

        assert!(may_install(false, None));
        assert!(may_install(false, Some(&finished)));
        assert!(!may_install(true, None));
        assert!(!may_install(true, Some(&fresh)));
        assert!(!may_install(true, Some(&finished)));
        assert!(may_install(true, Some(&running)));
    }
}
