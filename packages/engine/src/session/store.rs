use std::collections::HashMap;
use std::sync::Arc;

use affectmode_algo::SessionState;
use parking_lot::RwLock;
use tokio::sync::Mutex;

use crate::error::EngineError;

pub type SessionHandle = Arc<Mutex<SessionState>>;

/// Keyed store of live sessions, `learner_id -> SessionState`.
///
/// The map lock is only held to look up or swap handles. Each session has
/// its own async mutex, so one learner's question is processed start to
/// finish before the next one starts while other learners proceed freely.
#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, SessionHandle>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self, state: SessionState) -> Result<SessionHandle, EngineError> {
        let mut sessions = self.sessions.write();
        if sessions.contains_key(&state.learner_id) {
            return Err(EngineError::SessionExists(state.learner_id));
        }
        let learner_id = state.learner_id.clone();
        let handle = Arc::new(Mutex::new(state));
        sessions.insert(learner_id, Arc::clone(&handle));
        Ok(handle)
    }

    pub fn get(&self, learner_id: &str) -> Option<SessionHandle> {
        self.sessions.read().get(learner_id).cloned()
    }

    pub fn remove(&self, learner_id: &str) -> Option<SessionHandle> {
        self.sessions.write().remove(learner_id)
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    /// Sorted learner ids of all live sessions
    pub fn learner_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.sessions.read().keys().cloned().collect();
        ids.sort();
        ids
    }
}
