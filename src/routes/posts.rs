use askama::Template;
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use serde::{Deserialize, Serialize};

use crate::db::models::Post;
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::forum::board;
use crate::forum::posts::{PostDraft, PostManager, VOTE_LIMIT};
use crate::forum::{messages, moderation};
use crate::rbac;
use crate::routes::board::forum_url;
use crate::routes::home::{Html, Layout};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/new-thread/{forum_id}", get(new_thread_page).post(new_thread))
        .route("/reply/{thread_id}", post(reply))
        .route("/edit/{post_id}", get(edit_page).post(edit))
        .route("/delete/{post_id}", post(delete))
        .route("/thumb/{post_id}", post(thumb))
        .route("/report/{post_id}", get(report_page).post(report))
}

#[derive(Template)]
#[template(path = "post_form.html")]
pub struct PostFormTemplate {
    pub layout: Layout,
    pub action: String,
    pub heading: String,
    pub with_topic: bool,
    pub topic: String,
    pub content: String,
}

#[derive(Template)]
#[template(path = "report.html")]
pub struct ReportTemplate {
    pub layout: Layout,
    pub post: Post,
}

#[derive(Debug, Deserialize)]
pub struct NewThreadForm {
    pub topic: String,
    pub content: String,
    pub subscribe: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReplyForm {
    pub content: String,
    pub subscribe: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EditForm {
    pub content: String,
    pub topic: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ThumbForm {
    pub up: bool,
}

#[derive(Debug, Serialize)]
pub struct ThumbResponse {
    pub likes: i64,
    pub dislikes: i64,
}

#[derive(Debug, Deserialize)]
pub struct ReportForm {
    pub complaint: String,
}

fn manager<'a>(state: &'a AppState, conn: &'a rusqlite::Connection) -> PostManager<'a> {
    PostManager::new(conn, &state.cache, &state.config.server.base_url)
}

fn find_post(conn: &rusqlite::Connection, id: i64) -> AppResult<Post> {
    board::post(conn, id)?.ok_or(AppError::NotFound)
}

async fn new_thread_page(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(forum_id): Path<i64>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    user.require(&conn, rbac::CREATE_THREAD)?;
    let forum = board::forum_by_id(&conn, forum_id)?.ok_or(AppError::NotFound)?;

    let page = PostFormTemplate {
        layout: Layout::build(&conn, &state.cache, Some(&user), "New thread")?,
        action: format!("/new-thread/{}", forum.id),
        heading: format!("New thread in {}", forum.name),
        with_topic: true,
        topic: String::new(),
        content: String::new(),
    };
    Ok(Html(page).into_response())
}

async fn new_thread(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(forum_id): Path<i64>,
    Form(form): Form<NewThreadForm>,
) -> AppResult<Redirect> {
    let conn = state.db.get()?;
    user.require(&conn, rbac::CREATE_THREAD)?;
    let forum = board::forum_by_id(&conn, forum_id)?.ok_or(AppError::NotFound)?;

    let draft = PostDraft::new(&form.content)?
        .with_topic(&form.topic)?
        .subscribe(form.subscribe.is_some());
    let thread_id = manager(&state, &conn)
        .create_thread(&forum, user.id, &draft)?
        .ok_or_else(|| AppError::Internal("Thread could not be created".into()))?;
    Ok(Redirect::to(&format!("/last/{}", thread_id)))
}

async fn reply(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(thread_id): Path<i64>,
    Form(form): Form<ReplyForm>,
) -> AppResult<Redirect> {
    let conn = state.db.get()?;
    user.require(&conn, rbac::CREATE_POST)?;
    let thread = board::thread(&conn, thread_id)?.ok_or(AppError::NotFound)?;
    if thread.locked && !moderation::is_moderator(&conn, thread.forum_id, user.id)? {
        return Err(AppError::Forbidden);
    }

    let draft = PostDraft::new(&form.content)?.subscribe(form.subscribe.is_some());
    if !manager(&state, &conn).create_post(&thread, user.id, &draft)? {
        return Err(AppError::Internal("Post could not be saved".into()));
    }
    Ok(Redirect::to(&format!("/last/{}", thread.id)))
}

async fn edit_page(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(post_id): Path<i64>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let post = find_post(&conn, post_id)?;
    if !moderation::may_edit(&conn, user.id, &post)? {
        return Err(AppError::Forbidden);
    }
    let thread = board::thread(&conn, post.thread_id)?.ok_or(AppError::NotFound)?;
    let first = board::first_post_id(&conn, thread.id)? == Some(post.id);

    let page = PostFormTemplate {
        layout: Layout::build(&conn, &state.cache, Some(&user), "Edit post")?,
        action: format!("/edit/{}", post.id),
        heading: format!("Edit post in {}", thread.name),
        with_topic: first,
        topic: if first { thread.name } else { String::new() },
        content: post.content,
    };
    Ok(Html(page).into_response())
}

async fn edit(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(post_id): Path<i64>,
    Form(form): Form<EditForm>,
) -> AppResult<Redirect> {
    let conn = state.db.get()?;
    let post = find_post(&conn, post_id)?;
    if !moderation::may_edit(&conn, user.id, &post)? {
        return Err(AppError::Forbidden);
    }

    let mut draft = PostDraft::new(&form.content)?;
    if let Some(topic) = form.topic.as_deref().filter(|t| !t.trim().is_empty()) {
        draft = draft.with_topic(topic)?;
    }
    if !manager(&state, &conn).edit_post(&post, user.id, &draft)? {
        return Err(AppError::Internal("Post could not be saved".into()));
    }
    Ok(Redirect::to(&format!("/show/{}", post.id)))
}

async fn delete(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(post_id): Path<i64>,
) -> AppResult<Redirect> {
    let conn = state.db.get()?;
    let post = find_post(&conn, post_id)?;
    if !moderation::may_delete(&conn, user.id, &post)? {
        return Err(AppError::Forbidden);
    }
    if !manager(&state, &conn).delete_post(&post)? {
        return Err(AppError::Internal("Post could not be deleted".into()));
    }

    // The thread goes away with its last post
    if board::thread(&conn, post.thread_id)?.is_some() {
        return Ok(Redirect::to(&format!("/last/{}", post.thread_id)));
    }
    let forum = board::forum_by_id(&conn, post.forum_id)?.ok_or(AppError::NotFound)?;
    Ok(Redirect::to(&forum_url(&forum)))
}

async fn thumb(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(post_id): Path<i64>,
    Form(form): Form<ThumbForm>,
) -> AppResult<Json<ThumbResponse>> {
    let conn = state.db.get()?;
    let post = find_post(&conn, post_id)?;
    let posts = manager(&state, &conn);
    if posts.votes_cast(user.id) >= VOTE_LIMIT {
        return Err(AppError::TooManyRequests(
            "You have reached the vote limit, try again in an hour.".into(),
        ));
    }
    if !posts.thumb(&post, user.id, form.up)? {
        return Err(AppError::Internal("Vote could not be saved".into()));
    }

    let post = find_post(&conn, post_id)?;
    Ok(Json(ThumbResponse {
        likes: post.likes,
        dislikes: post.dislikes,
    }))
}

async fn report_page(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(post_id): Path<i64>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let post = find_post(&conn, post_id)?;
    let page = ReportTemplate {
        layout: Layout::build(&conn, &state.cache, Some(&user), "Report post")?,
        post,
    };
    Ok(Html(page).into_response())
}

async fn report(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(post_id): Path<i64>,
    Form(form): Form<ReportForm>,
) -> AppResult<Redirect> {
    let conn = state.db.get()?;
    let post = find_post(&conn, post_id)?;
    if !messages::report(&conn, &state.cache, user.id, &post, &form.complaint)? {
        return Err(AppError::Internal("Report could not be sent".into()));
    }
    Ok(Redirect::to(&format!("/show/{}", post.id)))
}
