pub mod admin;
pub mod assets;
pub mod auth;
pub mod board;
pub mod home;
pub mod maintenance;
pub mod messages;
pub mod offline;
pub mod posts;
pub mod search;
pub mod subscriptions;

use axum::routing::get;
use axum::Router;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(home::index))
        .route("/assets/{*path}", get(assets::serve))
        .merge(auth::router())
        .merge(maintenance::router())
        .merge(board::router())
        .merge(posts::router())
        .merge(search::router())
        .merge(subscriptions::router())
        .merge(messages::router())
        .merge(admin::router())
        .merge(offline::router())
}
