use askama::Template;
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::Router;

use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::forum::board;
use crate::forum::subscriptions::{self, SubscriptionView};
use crate::routes::home::{Html, Layout};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/subscriptions", get(list))
        .route("/subscriptions/{id}/remove", post(remove))
        .route("/subscriptions/{id}/seen", post(seen))
        .route("/subscriptions/{id}/unseen", post(unseen))
        .route("/subscribe/{thread_id}", post(subscribe))
}

#[derive(Template)]
#[template(path = "subscriptions.html")]
pub struct SubscriptionsTemplate {
    pub layout: Layout,
    pub subscriptions: Vec<SubscriptionView>,
}

async fn list(State(state): State<AppState>, user: CurrentUser) -> AppResult<Response> {
    let conn = state.db.get()?;
    let page = SubscriptionsTemplate {
        layout: Layout::build(&conn, &state.cache, Some(&user), "Subscriptions")?,
        subscriptions: subscriptions::list(&conn, user.id)?,
    };
    Ok(Html(page).into_response())
}

async fn remove(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<Redirect> {
    let conn = state.db.get()?;
    if subscriptions::remove(&conn, &state.cache, user.id, &[id])? == 0 {
        return Err(AppError::NotFound);
    }
    Ok(Redirect::to("/subscriptions"))
}

async fn seen(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<Redirect> {
    mark(&state, &user, id, true)
}

async fn unseen(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<Redirect> {
    mark(&state, &user, id, false)
}

fn mark(state: &AppState, user: &CurrentUser, id: i64, seen: bool) -> AppResult<Redirect> {
    let conn = state.db.get()?;
    if !subscriptions::mark(&conn, &state.cache, user.id, id, seen)? {
        return Err(AppError::NotFound);
    }
    Ok(Redirect::to("/subscriptions"))
}

async fn subscribe(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(thread_id): Path<i64>,
) -> AppResult<Redirect> {
    let conn = state.db.get()?;
    let thread = board::thread(&conn, thread_id)?.ok_or(AppError::NotFound)?;
    subscriptions::add(&conn, user.id, thread.id)?;
    Ok(Redirect::to(&format!("/last/{}", thread.id)))
}
