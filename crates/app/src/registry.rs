//! Per-viewer selection sessions. Each browser tab gets its own three
//! selection containers; only the read-only join keys are shared.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use chrono::{DateTime, Utc};
use dashboard::{LinkedSelection, SelectionLinks, SelectionSnapshot, UserEvent};
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

struct ViewerSession {
    created_at: DateTime<Utc>,
    selection: LinkedSelection,
}

#[derive(Serialize)]
pub(crate) struct SessionCreated {
    pub(crate) id: Uuid,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) snapshot: SelectionSnapshot,
}

#[derive(Clone)]
pub(crate) struct SessionRegistry {
    links: Arc<SelectionLinks>,
    sessions: Arc<Mutex<HashMap<Uuid, ViewerSession>>>,
}

impl SessionRegistry {
    pub(crate) fn new(links: Arc<SelectionLinks>) -> Self {
        Self {
            links,
            sessions: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub(crate) fn create(&self) -> Option<SessionCreated> {
        let id = Uuid::new_v4();
        let session = ViewerSession {
            created_at: Utc::now(),
            selection: LinkedSelection::new(self.links.clone()),
        };
        let created = SessionCreated {
            id,
            created_at: session.created_at,
            snapshot: session.selection.snapshot(),
        };
        let mut sessions = self.sessions.lock().ok()?;
        sessions.insert(id, session);
        metrics::gauge!("dashboard_sessions_active").set(sessions.len() as f64);
        debug!("Opened viewer session {id}");
        Some(created)
    }

    pub(crate) fn snapshot(&self, id: &Uuid) -> Option<SelectionSnapshot> {
        let sessions = self.sessions.lock().ok()?;
        sessions.get(id).map(|s| s.selection.snapshot())
    }

    /// Run one event to completion against the session's selection state.
    pub(crate) fn apply(&self, id: &Uuid, event: UserEvent) -> Option<SelectionSnapshot> {
        let mut sessions = self.sessions.lock().ok()?;
        sessions.get_mut(id).map(|s| s.selection.apply(event))
    }

    pub(crate) fn remove(&self, id: &Uuid) -> bool {
        match self.sessions.lock() {
            Ok(mut sessions) => {
                let removed = sessions.remove(id).is_some();
                metrics::gauge!("dashboard_sessions_active").set(sessions.len() as f64);
                if removed {
                    debug!("Closed viewer session {id}");
                }
                removed
            }
            Err(_) => false,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.sessions.lock().map(|s| s.len()).unwrap_or(0)
    }
}
