use askama::Template;
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use serde::Deserialize;

use crate::error::AppResult;
use crate::extractors::MaybeUser;
use crate::forum::search::{self, SearchHit};
use crate::forum::ForumError;
use crate::routes::home::{Html, Layout};
use crate::state::AppState;

const MAX_HITS: i64 = 50;

pub fn router() -> Router<AppState> {
    Router::new().route("/search", get(results))
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

#[derive(Template)]
#[template(path = "search.html")]
pub struct SearchTemplate {
    pub layout: Layout,
    pub query: String,
    pub hits: Vec<SearchHit>,
    pub notice: Option<String>,
}

async fn results(
    State(state): State<AppState>,
    user: MaybeUser,
    Query(query): Query<SearchQuery>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let (hits, notice) = if query.q.trim().is_empty() {
        (Vec::new(), None)
    } else {
        match search::search(&conn, &query.q, user.is_guest(), MAX_HITS) {
            Ok(hits) => (hits, None),
            Err(ForumError::Invalid(message)) => (Vec::new(), Some(message)),
            Err(e) => return Err(e.into()),
        }
    };

    let page = SearchTemplate {
        layout: Layout::build(&conn, &state.cache, user.0.as_ref(), "Search")?,
        query: query.q,
        hits,
        notice,
    };
    Ok(Html(page).into_response())
}
