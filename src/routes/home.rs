use std::borrow::Borrow;

use askama::Template;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use rusqlite::Connection;

use crate::cache::Cache;
use crate::db::models::{Category, Forum};
use crate::error::AppResult;
use crate::extractors::{CurrentUser, MaybeUser};
use crate::forum::board::{self, LatestPost, Totals};
use crate::forum::{messages, subscriptions};
use crate::maintenance;
use crate::settings;
use crate::state::AppState;

const LATEST_POSTS: i64 = 5;

/// Page chrome shared by every forum template.
pub struct Layout {
    pub title: String,
    pub forum_name: String,
    pub user: Option<CurrentUser>,
    pub new_messages: i64,
    pub unseen_subscriptions: i64,
    pub keywords: String,
    pub description: String,
    /// Maintenance mode is on; only administrators get this far.
    pub maintenance: bool,
}

impl Layout {
    pub fn build(
        conn: &Connection,
        cache: &Cache,
        user: Option<&CurrentUser>,
        title: impl Into<String>,
    ) -> AppResult<Self> {
        let forum_name = settings::get(conn, settings::NAME)?.unwrap_or_default();
        let (new_messages, unseen_subscriptions) = match user {
            Some(user) => (
                messages::new_count(conn, cache, user.id)?,
                subscriptions::unseen_count(conn, cache, user.id)?,
            ),
            None => (0, 0),
        };
        Ok(Self {
            title: title.into(),
            forum_name,
            user: user.cloned(),
            new_messages,
            unseen_subscriptions,
            keywords: settings::get(conn, settings::META_KEYWORDS)?.unwrap_or_default(),
            description: settings::get(conn, settings::META_DESCRIPTION)?.unwrap_or_default(),
            maintenance: settings::get_flag(conn, settings::MAINTENANCE_MODE)?,
        })
    }

    /// Overrides the meta tags with the non-blank values given. Call it
    /// from the outermost board level inwards.
    pub fn meta(mut self, keywords: Option<&str>, description: Option<&str>) -> Self {
        if let Some(keywords) = keywords.map(str::trim).filter(|k| !k.is_empty()) {
            self.keywords = keywords.to_string();
        }
        if let Some(description) = description.map(str::trim).filter(|d| !d.is_empty()) {
            self.description = description.to_string();
        }
        self
    }

    /// Chrome for pages rendered before the forum tables exist.
    pub fn bare(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            forum_name: String::new(),
            user: None,
            new_messages: 0,
            unseen_subscriptions: 0,
            keywords: String::new(),
            description: String::new(),
            maintenance: false,
        }
    }

    pub fn user_id(&self) -> i64 {
        self.user.as_ref().map_or(0, |user| user.id)
    }

    /// Renders a unix timestamp for display.
    pub fn when(&self, ts: impl Borrow<i64>) -> String {
        chrono::DateTime::from_timestamp(*ts.borrow(), 0)
            .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default()
    }
}

pub struct CategorySection {
    pub category: Category,
    pub forums: Vec<Forum>,
}

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub layout: Layout,
    pub sections: Vec<CategorySection>,
    pub totals: Totals,
    pub latest: Vec<LatestPost>,
}

/// Wrapper to render askama templates as axum responses
pub struct Html<T: Template>(pub T);

impl<T: Template> IntoResponse for Html<T> {
    fn into_response(self) -> Response {
        match self.0.render() {
            Ok(body) => (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
                body,
            )
                .into_response(),
            Err(e) => {
                tracing::error!("Template render error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Template error").into_response()
            }
        }
    }
}

pub async fn index(State(state): State<AppState>, user: MaybeUser) -> AppResult<Response> {
    let conn = state.db.get()?;
    // Fresh databases go straight to the installer
    if !maintenance::is_installed(&conn)? {
        return Ok(Redirect::to("/install").into_response());
    }

    let guest = user.is_guest();
    let sections = board::categories(&conn, guest)?
        .into_iter()
        .map(|category| {
            let forums = board::forums_in(&conn, category.id, guest)?;
            Ok(CategorySection { category, forums })
        })
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let page = IndexTemplate {
        layout: Layout::build(&conn, &state.cache, user.0.as_ref(), "Forums")?,
        sections,
        totals: board::totals(&conn, &state.cache)?,
        latest: board::latest_posts(&conn, &state.cache, guest, LATEST_POSTS)?,
    };
    Ok(Html(page).into_response())
}
