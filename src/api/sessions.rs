use crate::agents::AgentTeam;
use crate::types::Result;
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tracing::{debug, info};

/// Sessions kept when no explicit capacity is given.
pub const DEFAULT_MAX_SESSIONS: usize = 256;

/// Builds a fresh team for a new session.
pub type TeamFactory = dyn Fn() -> Result<AgentTeam> + Send + Sync;

/// Agent teams keyed by session id.
///
/// The pool holds at most `capacity` teams. Creating a team beyond that drops
/// the least recently used session, whose conversation is then lost. A request
/// still running on a dropped team keeps its own `Arc` until it finishes.
pub struct SessionPool {
    factory: Box<TeamFactory>,
    teams: Mutex<LruCache<String, Arc<AgentTeam>>>,
}

impl SessionPool {
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn() -> Result<AgentTeam> + Send + Sync + 'static,
    {
        Self::with_capacity(DEFAULT_MAX_SESSIONS, factory)
    }

    /// A pool keeping at most `capacity` sessions (at least one).
    pub fn with_capacity<F>(capacity: usize, factory: F) -> Self
    where
        F: Fn() -> Result<AgentTeam> + Send + Sync + 'static,
    {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            factory: Box::new(factory),
            teams: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// The team for `session_id`, created on first use.
    pub fn get_or_create(&self, session_id: &str) -> Result<Arc<AgentTeam>> {
        let mut teams = self.teams.lock();
        if let Some(team) = teams.get(session_id) {
            return Ok(Arc::clone(team));
        }
        let team = Arc::new((self.factory)()?);
        if let Some((evicted, _)) = teams.push(session_id.to_string(), Arc::clone(&team)) {
            debug!(session_id = %evicted, "Session evicted");
        }
        info!(session_id, sessions = teams.len(), "Session created");
        Ok(team)
    }

    /// Whether `session_id` currently has a team.
    pub fn contains(&self, session_id: &str) -> bool {
        self.teams.lock().contains(session_id)
    }

    pub fn capacity(&self) -> usize {
        self.teams.lock().cap().get()
    }

    pub fn len(&self) -> usize {
        self.teams.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.teams.lock().is_empty()
    }
}
