//! Registry of recording sessions in arrival order

use super::session::RecordingSession;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

/// Sessions kept before settled ones are pruned
pub const DEFAULT_CAPACITY: usize = 32;

/// Sessions known to the coordinator.
///
/// Only the coordinator inserts or removes. Removing an unknown id is a no-op.
#[derive(Debug)]
pub struct SessionRegistry {
    order: Vec<Uuid>,
    sessions: HashMap<Uuid, Arc<RecordingSession>>,
    capacity: usize,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            order: Vec::new(),
            sessions: HashMap::new(),
            capacity,
        }
    }

    /// Register a session. Inserting the same session twice keeps one entry.
    pub fn insert(&mut self, session: Arc<RecordingSession>) {
        let id = session.id();
        if self.sessions.insert(id, session).is_none() {
            self.order.push(id);
        }
    }

    /// Remove a session, returning it if it was registered
    pub fn remove(&mut self, id: Uuid) -> Option<Arc<RecordingSession>> {
        let session = self.sessions.remove(&id)?;
        self.order.retain(|other| *other != id);
        Some(session)
    }

    /// Look up a session by id
    pub fn get(&self, id: Uuid) -> Option<&Arc<RecordingSession>> {
        self.sessions.get(&id)
    }

    /// Sessions oldest first
    pub fn iter(&self) -> impl Iterator<Item = &Arc<RecordingSession>> {
        self.order.iter().filter_map(|id| self.get(*id))
    }

    /// Whether another session is capturing to `output_path`
    pub fn has_active(&self, output_path: &Path, except: Uuid) -> bool {
        self.iter()
            .any(|s| s.id() != except && s.is_active() && s.output_path() == output_path)
    }

    /// Snapshot of sessions with a running capture process
    pub fn active(&self) -> Vec<Arc<RecordingSession>> {
        self.iter().filter(|s| s.is_active()).cloned().collect()
    }

    /// Number of registered sessions
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether no session is registered
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Drop the oldest inactive sessions until the registry fits its capacity.
    /// Active sessions are never pruned.
    pub fn prune(&mut self) {
        let excess = self.len().saturating_sub(self.capacity);
        if excess == 0 {
            return;
        }
        let stale: Vec<Uuid> = self
            .iter()
            .filter(|s| !s.is_active())
            .map(|s| s.id())
            .take(excess)
            .collect();
        for id in stale {
            self.remove(id);
        }
        tracing::debug!("Pruned session registry to {} entries", self.len());
    }
}
