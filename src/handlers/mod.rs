// handlers/mod.rs - HTTP handlers
//
// policies: the three tunnel-backed policy routes
// system:   service info and liveness, no upstream contact

pub mod credentials;
pub mod policies;
pub mod system;

use std::sync::Arc;

use crate::gateway::SessionOpener;

/// Shared handler state. Holds only the session opener; sessions themselves
/// are created and closed inside each request.
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<dyn SessionOpener>,
}

impl AppState {
    pub fn new(sessions: Arc<dyn SessionOpener>) -> Self {
        Self { sessions }
    }
}
