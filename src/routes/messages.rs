use askama::Template;
use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Form, Router};
use serde::Deserialize;

use crate::db::models::Message;
use crate::db::unix_now;
use crate::error::{AppError, AppResult};
use crate::extractors::{ClientSession, CurrentUser};
use crate::forum::members;
use crate::forum::messages::{self, InboxEntry, MessageDraft, MessageView};
use crate::rbac;
use crate::routes::home::{Html, Layout};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/messages", get(mailbox))
        .route("/messages/new", get(compose).post(send))
        .route("/messages/{id}", get(read))
        .route("/messages/{id}/remove", post(remove))
}

#[derive(Template)]
#[template(path = "messages.html")]
pub struct MailboxTemplate {
    pub layout: Layout,
    pub inbox: Vec<InboxEntry>,
    pub sent: Vec<Message>,
}

#[derive(Template)]
#[template(path = "message.html")]
pub struct MessageTemplate {
    pub layout: Layout,
    pub view: MessageView,
}

#[derive(Template)]
#[template(path = "message_form.html")]
pub struct ComposeTemplate {
    pub layout: Layout,
    pub to: String,
    pub topic: String,
    pub replyto: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ComposeQuery {
    pub reply: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct SendForm {
    /// Comma separated usernames.
    pub to: String,
    pub topic: String,
    pub content: String,
    pub replyto: Option<i64>,
}

async fn mailbox(State(state): State<AppState>, user: CurrentUser) -> AppResult<Response> {
    let conn = state.db.get()?;
    let page = MailboxTemplate {
        layout: Layout::build(&conn, &state.cache, Some(&user), "Messages")?,
        inbox: messages::inbox(&conn, user.id)?,
        sent: messages::sent(&conn, user.id)?,
    };
    Ok(Html(page).into_response())
}

async fn compose(
    State(state): State<AppState>,
    user: CurrentUser,
    Query(query): Query<ComposeQuery>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    user.require(&conn, rbac::SEND_MESSAGE)?;

    let (to, topic) = match query.reply {
        Some(id) => {
            let original = messages::view(&conn, user.id, id)?.ok_or(AppError::NotFound)?;
            (original.sender, format!("Re: {}", original.message.topic))
        }
        None => (String::new(), String::new()),
    };
    let page = ComposeTemplate {
        layout: Layout::build(&conn, &state.cache, Some(&user), "New message")?,
        to,
        topic,
        replyto: query.reply,
    };
    Ok(Html(page).into_response())
}

async fn send(
    State(state): State<AppState>,
    user: CurrentUser,
    session: ClientSession,
    Form(form): Form<SendForm>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    user.require(&conn, rbac::SEND_MESSAGE)?;

    let mut receivers = Vec::new();
    for name in form.to.split(',').map(str::trim).filter(|n| !n.is_empty()) {
        let member = members::find_by_username(&conn, name)?
            .ok_or_else(|| AppError::BadRequest(format!("Unknown member {}", name)))?;
        receivers.push(member.id);
    }
    let mut draft = MessageDraft::new(&form.topic, &form.content, receivers)?;
    if let Some(replyto) = form.replyto {
        draft = draft.reply_to(replyto);
    }

    let mut store = state.sessions.lock().await;
    let now = unix_now();
    if messages::too_many(&mut store, &session.id, user.id, now) {
        return Err(AppError::TooManyRequests(
            "You are sending messages too fast, wait a minute.".into(),
        ));
    }
    let message_id = messages::send(&conn, &state.cache, user.id, &draft)?
        .ok_or_else(|| AppError::BadRequest("Message could not be delivered".into()))?;
    messages::record_sent(&mut store, &session.id, user.id, now);
    drop(store);

    let response = Redirect::to(&format!("/messages/{}", message_id)).into_response();
    Ok(session.attach(response))
}

async fn read(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let view = messages::view(&conn, user.id, id)?.ok_or(AppError::NotFound)?;
    if let Some(row) = view.receiver_row {
        messages::mark_read(&conn, &state.cache, user.id, row)?;
    }

    let page = MessageTemplate {
        layout: Layout::build(&conn, &state.cache, Some(&user), view.message.topic.clone())?,
        view,
    };
    Ok(Html(page).into_response())
}

async fn remove(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<Redirect> {
    let conn = state.db.get()?;
    let view = messages::view(&conn, user.id, id)?.ok_or(AppError::NotFound)?;
    let removed = match view.receiver_row {
        Some(row) => messages::remove_received(&conn, &state.cache, user.id, row)?,
        None => messages::remove_sent(&conn, user.id, id)?,
    };
    if !removed {
        return Err(AppError::Internal("Message could not be removed".into()));
    }
    Ok(Redirect::to("/messages"))
}
