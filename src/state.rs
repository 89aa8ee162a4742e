//! Application state: workspaces, catalog, prompts, paper header and the model client.
//!
//! This module owns:
//!   - one `Workspace` per user session (config, Question Set, chat)
//!   - the read-only curriculum catalog
//!   - the prompts and paper header (from TOML or defaults)
//!   - optional generation client
//!
//! Each workspace sits behind its own mutex; locks are never held across a
//! model call. Workspaces untouched for `WORKSPACE_IDLE_SECS` are evicted by
//! a periodic sweep unless a generation or chat turn is still running.

use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::catalog::Catalog;
use crate::chat::ChatSession;
use crate::config::{load_exam_config_from_env, PaperMeta, Prompts};
use crate::domain::{ExamConfig, Question};
use crate::gemini::Gemini;
use crate::model::{ChatHandle, ExamModel};

/// One user's exam session. Never persisted.
pub struct Workspace {
    pub id: String,
    pub config: ExamConfig,
    pub questions: Vec<Question>,
    pub show_answers: bool,
    pub loading: bool,
    pub chat: ChatSession,
    pub chat_handle: Option<Arc<dyn ChatHandle>>,
}

impl Workspace {
    pub fn new(id: String) -> Self {
        Self {
            id,
            config: ExamConfig::initial(),
            questions: Vec::new(),
            show_answers: false,
            loading: false,
            chat: ChatSession::new(),
            chat_handle: None,
        }
    }

    fn is_busy(&self) -> bool {
        self.loading || self.chat.is_busy()
    }
}

pub type SharedWorkspace = Arc<Mutex<Workspace>>;

const DEFAULT_IDLE_SECS: u64 = 3600;
const SWEEP_EVERY: Duration = Duration::from_secs(60);

struct Slot {
    ws: SharedWorkspace,
    last_seen: Instant,
}

#[derive(Clone)]
pub struct AppState {
    workspaces: Arc<RwLock<HashMap<String, Slot>>>,
    pub catalog: Arc<Catalog>,
    pub prompts: Prompts,
    pub paper: PaperMeta,
    pub model: Option<Arc<dyn ExamModel>>,
}

impl AppState {
    /// Build state from env: load config, build the catalog, init the Gemini client.
    #[instrument(level = "info", skip_all)]
    pub fn new() -> Self {
        let cfg = load_exam_config_from_env().unwrap_or_default();
        let catalog = Catalog::from_config(&cfg.chapters);
        let topics: usize = catalog.chapters().iter().map(|c| c.topics.len()).sum();
        info!(target: "mathgen", chapters = catalog.chapters().len(), topics, "Curriculum catalog ready");

        let model: Option<Arc<dyn ExamModel>> = match Gemini::from_env() {
            Some(g) => {
                info!(target: "mathgen", base_url = %g.base_url, model = %g.model, "Gemini enabled.");
                Some(Arc::new(g))
            }
            None => {
                info!(target: "mathgen", "Gemini disabled (no GEMINI_API_KEY). Generation and chat will report failures.");
                None
            }
        };

        Self::with_parts(catalog, cfg.prompts, cfg.paper, model)
    }

    pub fn with_parts(catalog: Catalog, prompts: Prompts, paper: PaperMeta, model: Option<Arc<dyn ExamModel>>) -> Self {
        Self {
            workspaces: Arc::new(RwLock::new(HashMap::new())),
            catalog: Arc::new(catalog),
            prompts,
            paper,
            model,
        }
    }

    /// Create a fresh workspace with default configuration.
    #[instrument(level = "debug", skip(self))]
    pub async fn create_workspace(&self) -> (String, SharedWorkspace) {
        let id = Uuid::new_v4().to_string();
        let ws = Arc::new(Mutex::new(Workspace::new(id.clone())));
        self.workspaces
            .write()
            .await
            .insert(id.clone(), Slot { ws: ws.clone(), last_seen: Instant::now() });
        info!(target: "mathgen", workspace = %id, "Workspace created");
        (id, ws)
    }

    /// Look up a workspace and mark it as recently used.
    pub async fn workspace(&self, id: &str) -> Option<SharedWorkspace> {
        let mut map = self.workspaces.write().await;
        let slot = map.get_mut(id)?;
        slot.last_seen = Instant::now();
        Some(slot.ws.clone())
    }

    /// Mark a connection-owned workspace as used, re-registering it if a sweep
    /// removed it while the socket sat quiet.
    pub async fn keep_alive(&self, id: &str, ws: &SharedWorkspace) {
        let mut map = self.workspaces.write().await;
        let slot = map
            .entry(id.to_string())
            .or_insert_with(|| Slot { ws: ws.clone(), last_seen: Instant::now() });
        slot.last_seen = Instant::now();
    }

    #[instrument(level = "debug", skip(self))]
    pub async fn drop_workspace(&self, id: &str) {
        if self.workspaces.write().await.remove(id).is_some() {
            info!(target: "mathgen", workspace = %id, "Workspace dropped");
        }
    }

    /// Remove workspaces idle for at least `max_idle`. Busy or locked ones stay.
    pub async fn evict_idle(&self, max_idle: Duration) -> usize {
        let mut map = self.workspaces.write().await;
        let before = map.len();
        map.retain(|id, slot| {
            if slot.last_seen.elapsed() < max_idle {
                return true;
            }
            let busy = slot.ws.try_lock().map(|w| w.is_busy()).unwrap_or(true);
            if !busy {
                debug!(target: "mathgen", workspace = %id, "Evicting idle workspace");
            }
            busy
        });
        let evicted = before - map.len();
        if evicted > 0 {
            info!(target: "mathgen", evicted, remaining = map.len(), "Idle workspaces evicted");
        }
        evicted
    }
}

/// Idle limit from `WORKSPACE_IDLE_SECS` (default one hour).
pub fn idle_limit_from_env() -> Duration {
    let secs = std::env::var("WORKSPACE_IDLE_SECS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(DEFAULT_IDLE_SECS);
    Duration::from_secs(secs)
}

/// Background sweep evicting idle workspaces for the life of the process.
pub fn spawn_idle_sweeper(state: Arc<AppState>, max_idle: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(SWEEP_EVERY.min(max_idle.max(Duration::from_secs(1))));
        loop {
            tick.tick().await;
            state.evict_idle(max_idle).await;
        }
    })
}
