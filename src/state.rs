use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use tokio::sync::Mutex;

use crate::auth::identity::IdentitySource;
use crate::cache::Cache;
use crate::config::Config;
use crate::sessions::SessionStore;

pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: Config,
    pub cache: Arc<Cache>,
    pub sessions: Arc<Mutex<SessionStore>>,
    pub identities: Arc<dyn IdentitySource>,
}
