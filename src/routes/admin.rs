//! Minimal board management: members, categories, forums, moderators.

use askama::Template;
use axum::extract::State;
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Form, Router};
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::forum::{board, members, moderation};
use crate::routes::home::{CategorySection, Html, Layout};
use crate::state::AppState;
use crate::{rbac, settings};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/admin", get(overview))
        .route("/admin/settings", post(save_settings))
        .route("/admin/members", post(add_member))
        .route("/admin/categories", post(add_category))
        .route("/admin/forums", post(add_forum))
        .route("/admin/moderators", post(add_moderator))
}

#[derive(Template)]
#[template(path = "admin.html")]
pub struct AdminTemplate {
    pub layout: Layout,
    pub sections: Vec<CategorySection>,
    pub settings: SettingsForm,
}

/// Forum-wide settings editable from the overview page.
#[derive(Debug, Default, Deserialize)]
pub struct SettingsForm {
    pub name: String,
    #[serde(default)]
    pub meta_keywords: String,
    #[serde(default)]
    pub meta_description: String,
    pub maintenance_mode: Option<String>,
    pub merge_posts: Option<String>,
}

impl SettingsForm {
    fn load(conn: &rusqlite::Connection) -> rusqlite::Result<Self> {
        let text = |name: &str| settings::get(conn, name).map(Option::unwrap_or_default);
        let flag = |name: &str| settings::get_flag(conn, name).map(|on| on.then(|| "1".to_string()));
        Ok(Self {
            name: text(settings::NAME)?,
            meta_keywords: text(settings::META_KEYWORDS)?,
            meta_description: text(settings::META_DESCRIPTION)?,
            maintenance_mode: flag(settings::MAINTENANCE_MODE)?,
            merge_posts: flag(settings::MERGE_POSTS)?,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct MemberForm {
    pub username: String,
    pub email: Option<String>,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct CategoryForm {
    pub name: String,
    pub visible: Option<String>,
    pub keywords: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ForumForm {
    pub category_id: i64,
    pub name: String,
    pub sub: Option<String>,
    pub visible: Option<String>,
    pub keywords: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ModeratorForm {
    pub forum_id: i64,
    pub username: String,
}

fn not_blank(value: &str, what: &str) -> AppResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::BadRequest(format!("{} cannot be blank.", what)));
    }
    Ok(value.to_string())
}

async fn overview(State(state): State<AppState>, user: CurrentUser) -> AppResult<Response> {
    let conn = state.db.get()?;
    user.require(&conn, rbac::CHANGE_SETTINGS)?;

    let sections = board::categories(&conn, false)?
        .into_iter()
        .map(|category| {
            let forums = board::forums_in(&conn, category.id, false)?;
            Ok(CategorySection { category, forums })
        })
        .collect::<rusqlite::Result<Vec<_>>>()?;
    let page = AdminTemplate {
        layout: Layout::build(&conn, &state.cache, Some(&user), "Administration")?,
        sections,
        settings: SettingsForm::load(&conn)?,
    };
    Ok(Html(page).into_response())
}

async fn save_settings(
    State(state): State<AppState>,
    user: CurrentUser,
    Form(form): Form<SettingsForm>,
) -> AppResult<Redirect> {
    let conn = state.db.get()?;
    user.require(&conn, rbac::CHANGE_SETTINGS)?;

    let flag = |value: &Option<String>| if value.is_some() { "1" } else { "0" };
    settings::set(&conn, settings::NAME, &not_blank(&form.name, "Forum name")?)?;
    settings::set(&conn, settings::META_KEYWORDS, form.meta_keywords.trim())?;
    settings::set(&conn, settings::META_DESCRIPTION, form.meta_description.trim())?;
    settings::set(&conn, settings::MAINTENANCE_MODE, flag(&form.maintenance_mode))?;
    settings::set(&conn, settings::MERGE_POSTS, flag(&form.merge_posts))?;
    tracing::info!(
        maintenance = form.maintenance_mode.is_some(),
        "Settings saved by {}",
        user.username
    );
    Ok(Redirect::to("/admin"))
}

async fn add_member(
    State(state): State<AppState>,
    user: CurrentUser,
    Form(form): Form<MemberForm>,
) -> AppResult<Redirect> {
    let conn = state.db.get()?;
    user.require(&conn, rbac::CHANGE_SETTINGS)?;

    let username = not_blank(&form.username, "Username")?;
    if form.password.chars().count() < 6 {
        return Err(AppError::BadRequest(
            "Password must contain at least 6 characters.".into(),
        ));
    }
    if members::find_by_username(&conn, &username)?.is_some() {
        return Err(AppError::BadRequest(format!("{} is already taken.", username)));
    }
    let email = form.email.as_deref().map(str::trim).filter(|e| !e.is_empty());
    members::create_member(&conn, &username, email, &form.password)
        .map_err(|e| AppError::Internal(e.to_string()))?;
    Ok(Redirect::to("/admin"))
}

async fn add_category(
    State(state): State<AppState>,
    user: CurrentUser,
    Form(form): Form<CategoryForm>,
) -> AppResult<Redirect> {
    let conn = state.db.get()?;
    user.require(&conn, rbac::CHANGE_SETTINGS)?;
    let name = not_blank(&form.name, "Name")?;
    let id = board::create_category(&conn, &name, form.visible.is_some())?;
    board::describe_category(&conn, id, form.keywords.as_deref(), form.description.as_deref())?;
    Ok(Redirect::to("/admin"))
}

async fn add_forum(
    State(state): State<AppState>,
    user: CurrentUser,
    Form(form): Form<ForumForm>,
) -> AppResult<Redirect> {
    let conn = state.db.get()?;
    user.require(&conn, rbac::CHANGE_SETTINGS)?;
    let name = not_blank(&form.name, "Name")?;
    let sub = form.sub.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let id = board::create_forum(&conn, form.category_id, &name, sub, form.visible.is_some())?;
    board::describe_forum(&conn, id, form.keywords.as_deref(), form.description.as_deref())?;
    Ok(Redirect::to("/admin"))
}

async fn add_moderator(
    State(state): State<AppState>,
    user: CurrentUser,
    Form(form): Form<ModeratorForm>,
) -> AppResult<Redirect> {
    let conn = state.db.get()?;
    user.require(&conn, rbac::CHANGE_SETTINGS)?;
    let member = members::find_by_username(&conn, form.username.trim())?
        .ok_or(AppError::NotFound)?;
    board::forum_by_id(&conn, form.forum_id)?.ok_or(AppError::NotFound)?;
    moderation::add_moderator(&conn, form.forum_id, member.id)?;
    Ok(Redirect::to("/admin"))
}
