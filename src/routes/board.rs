use askama::Template;
use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::Router;
use serde::Deserialize;

use crate::db::models::{Category, Forum, Post, Thread, User};
use crate::error::{AppError, AppResult};
use crate::extractors::{ClientSession, MaybeUser};
use crate::forum::board::{self, AuthoredPost, PostView, ThreadFilters, UnreadThread};
use crate::forum::{members, moderation, posts, subscriptions};
use crate::routes::home::{Html, Layout};
use crate::state::AppState;
use crate::{rbac, settings};

/// Session key of the reader's thread list toggles.
const FILTERS_KEY: &str = "forum-filters";

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/category/{id}/{slug}", get(category))
        .route("/forum/{category_id}/{id}/{slug}", get(forum))
        .route(
            "/thread/{category_id}/{forum_id}/{id}/{slug}",
            get(thread),
        )
        .route("/last/{thread_id}", get(last_post))
        .route("/show/{post_id}", get(show_post))
        .route("/unread-posts", get(unread_posts))
        .route("/member/{id}/posts", get(member_posts))
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ForumQuery {
    pub page: Option<i64>,
    pub toggle: Option<String>,
}

impl PageQuery {
    fn clamp(&self, pages: i64) -> i64 {
        self.page.unwrap_or(1).clamp(1, pages.max(1))
    }
}

pub fn thread_url(thread: &Thread) -> String {
    format!(
        "/thread/{}/{}/{}/{}",
        thread.category_id, thread.forum_id, thread.id, thread.slug
    )
}

pub fn forum_url(forum: &Forum) -> String {
    format!("/forum/{}/{}/{}", forum.category_id, forum.id, forum.slug)
}

#[derive(Template)]
#[template(path = "category.html")]
pub struct CategoryTemplate {
    pub layout: Layout,
    pub category: Category,
    pub forums: Vec<Forum>,
}

#[derive(Template)]
#[template(path = "forum.html")]
pub struct ForumTemplate {
    pub layout: Layout,
    pub forum: Forum,
    pub threads: Vec<Thread>,
    pub filters: ThreadFilters,
    pub page: i64,
    pub pages: i64,
    pub can_create: bool,
}

#[derive(Template)]
#[template(path = "unread.html")]
pub struct UnreadTemplate {
    pub layout: Layout,
    pub threads: Vec<UnreadThread>,
    pub page: i64,
    pub pages: i64,
}

#[derive(Template)]
#[template(path = "member_posts.html")]
pub struct MemberPostsTemplate {
    pub layout: Layout,
    pub member: User,
    pub posts: Vec<AuthoredPost>,
    pub total: i64,
    pub page: i64,
    pub pages: i64,
}

#[derive(Template)]
#[template(path = "thread.html")]
pub struct ThreadTemplate {
    pub layout: Layout,
    pub forum: Forum,
    pub thread: Thread,
    pub posts: Vec<PostView>,
    pub page: i64,
    pub pages: i64,
    pub is_moderator: bool,
    pub can_reply: bool,
    pub subscribed: bool,
}

/// Layout with the meta tags of the forum, falling back to its category.
fn forum_layout(
    conn: &rusqlite::Connection,
    state: &AppState,
    user: &MaybeUser,
    forum: &Forum,
    title: String,
) -> AppResult<Layout> {
    let layout = Layout::build(conn, &state.cache, user.0.as_ref(), title)?;
    let layout = match board::category_by_id(conn, forum.category_id)? {
        Some(category) => layout.meta(category.keywords.as_deref(), category.description.as_deref()),
        None => layout,
    };
    Ok(layout.meta(forum.keywords.as_deref(), forum.description.as_deref()))
}

async fn category(
    State(state): State<AppState>,
    user: MaybeUser,
    Path((id, slug)): Path<(i64, String)>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let guest = user.is_guest();
    let category = board::category(&conn, id, &slug, guest)?.ok_or(AppError::NotFound)?;
    let forums = board::forums_in(&conn, category.id, guest)?;

    let layout = Layout::build(&conn, &state.cache, user.0.as_ref(), category.name.clone())?
        .meta(category.keywords.as_deref(), category.description.as_deref());
    let page = CategoryTemplate {
        layout,
        category,
        forums,
    };
    Ok(Html(page).into_response())
}

async fn forum(
    State(state): State<AppState>,
    user: MaybeUser,
    session: ClientSession,
    Path((category_id, id, slug)): Path<(i64, i64, String)>,
    Query(query): Query<ForumQuery>,
) -> AppResult<Response> {
    if let Some(toggle) = query.toggle.as_deref() {
        let mut store = state.sessions.lock().await;
        let mut filters: ThreadFilters = store.get_as(&session.id, FILTERS_KEY).unwrap_or_default();
        if filters.toggle(toggle) {
            store.set_from(&session.id, FILTERS_KEY, &filters);
        }
        drop(store);
        let back = format!("/forum/{}/{}/{}", category_id, id, slug);
        return Ok(session.attach(Redirect::to(&back).into_response()));
    }

    let conn = state.db.get()?;
    let forum = board::forum(&conn, category_id, id, &slug, user.is_guest())?
        .ok_or(AppError::NotFound)?;
    let filters: ThreadFilters = state
        .sessions
        .lock()
        .await
        .get_as(&session.id, FILTERS_KEY)
        .unwrap_or_default();

    let pages = board::page_count(board::count_threads(&conn, forum.id, &filters, user.id())?);
    let page = PageQuery { page: query.page }.clamp(pages);
    let threads = board::threads_page(&conn, forum.id, &filters, user.id(), page)?;
    let can_create = match user.id() {
        Some(id) => rbac::can(&conn, id, rbac::CREATE_THREAD)?,
        None => false,
    };

    let view = ForumTemplate {
        layout: forum_layout(&conn, &state, &user, &forum, forum.name.clone())?,
        forum,
        threads,
        filters,
        page,
        pages,
        can_create,
    };
    Ok(session.attach(Html(view).into_response()))
}

async fn thread(
    State(state): State<AppState>,
    user: MaybeUser,
    Path((category_id, forum_id, id, slug)): Path<(i64, i64, i64, String)>,
    Query(query): Query<PageQuery>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let thread = board::thread_in(&conn, category_id, forum_id, id, &slug, user.is_guest())?
        .ok_or(AppError::NotFound)?;
    let forum = board::forum_by_id(&conn, thread.forum_id)?.ok_or(AppError::NotFound)?;

    let pages = board::page_count(thread.posts);
    let page = query.clamp(pages);
    let views = board::posts_page(&conn, thread.id, page)?;

    let (is_moderator, can_reply, subscribed) = match user.id() {
        Some(user_id) => {
            // The newest post on the page counts as seen
            if let Some(last) = views.last() {
                if let Some(post) = board::post(&conn, last.id)? {
                    posts::mark_seen(&conn, &state.cache, user_id, &post, true)?;
                }
            }
            let is_moderator = moderation::is_moderator(&conn, forum.id, user_id)?;
            let can_reply = rbac::can(&conn, user_id, rbac::CREATE_POST)?
                && (!thread.locked || is_moderator);
            (
                is_moderator,
                can_reply,
                subscriptions::exists(&conn, user_id, thread.id)?,
            )
        }
        None => (false, false, false),
    };

    let view = ThreadTemplate {
        layout: forum_layout(&conn, &state, &user, &forum, thread.name.clone())?,
        forum,
        thread,
        posts: views,
        page,
        pages,
        is_moderator,
        can_reply,
        subscribed,
    };
    Ok(Html(view).into_response())
}

async fn last_post(
    State(state): State<AppState>,
    user: MaybeUser,
    Path(thread_id): Path<i64>,
) -> AppResult<Redirect> {
    let conn = state.db.get()?;
    let post_id = board::last_post_id(&conn, thread_id)?.ok_or(AppError::NotFound)?;
    let post = board::post(&conn, post_id)?.ok_or(AppError::NotFound)?;
    redirect_to_post(&conn, &post, user.is_guest())
}

async fn show_post(
    State(state): State<AppState>,
    user: MaybeUser,
    Path(post_id): Path<i64>,
) -> AppResult<Redirect> {
    let conn = state.db.get()?;
    let post = board::post(&conn, post_id)?.ok_or(AppError::NotFound)?;
    redirect_to_post(&conn, &post, user.is_guest())
}

async fn unread_posts(
    State(state): State<AppState>,
    user: MaybeUser,
    Query(query): Query<PageQuery>,
) -> AppResult<Response> {
    let Some(member) = user.0 else {
        return Ok(Redirect::to("/login").into_response());
    };
    let conn = state.db.get()?;
    let pages = board::page_count(board::count_unread_threads(&conn, member.id)?);
    let page = query.clamp(pages);

    let view = UnreadTemplate {
        threads: board::unread_threads(&conn, member.id, page)?,
        layout: Layout::build(&conn, &state.cache, Some(&member), "Unread posts")?,
        page,
        pages,
    };
    Ok(Html(view).into_response())
}

async fn member_posts(
    State(state): State<AppState>,
    user: MaybeUser,
    Path(id): Path<i64>,
    Query(query): Query<PageQuery>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let guest = user.is_guest();
    if guest && !settings::get_flag(&conn, settings::MEMBERS_VISIBLE)? {
        return Err(AppError::Unauthorized);
    }
    let member = members::find(&conn, id)?.ok_or(AppError::NotFound)?;

    let total = board::count_posts_by_user(&conn, member.id, guest)?;
    let pages = board::page_count(total);
    let page = query.clamp(pages);
    let view = MemberPostsTemplate {
        layout: Layout::build(
            &conn,
            &state.cache,
            user.0.as_ref(),
            format!("Posts by {}", member.username),
        )?,
        posts: board::posts_by_user(&conn, member.id, guest, page)?,
        member,
        total,
        page,
        pages,
    };
    Ok(Html(view).into_response())
}

fn redirect_to_post(conn: &rusqlite::Connection, post: &Post, guest: bool) -> AppResult<Redirect> {
    if guest && !board::forum_visible(conn, post.forum_id)? {
        return Err(AppError::NotFound);
    }
    let thread = board::thread(conn, post.thread_id)?.ok_or(AppError::NotFound)?;
    let page = board::page_of_post(conn, post)?;
    Ok(Redirect::to(&format!(
        "{}?page={}#post{}",
        thread_url(&thread),
        page,
        post.id
    )))
}
