//! Execution Context
//!
//! The IMN callback arrives with no authenticated user, but recording a
//! payment entry is a privileged write. `SessionContext` tracks the current
//! principal; `elevate` switches it to the system principal and hands back a
//! guard that restores the previous principal when dropped, on every exit
//! path including failure.
//!
//! Elevation is re-entrant: callbacks can be delivered concurrently, so
//! overlapping guards stack, and only the last guard to drop restores the
//! base principal.

use std::sync::{Arc, Mutex};

/// Principal privileged writes run under
pub const SYSTEM_USER: &str = "Administrator";

/// Principal unauthenticated requests start as
pub const GUEST_USER: &str = "Guest";

struct SessionState {
    user: String,
    /// Principal to restore once every guard has dropped
    saved: Option<String>,
    /// Live elevation guards
    depth: usize,
}

/// Current execution principal for a request
pub struct SessionContext {
    state: Mutex<SessionState>,
}

impl SessionContext {
    pub fn new(user: impl Into<String>) -> Self {
        Self {
            state: Mutex::new(SessionState {
                user: user.into(),
                saved: None,
                depth: 0,
            }),
        }
    }

    /// Context for an unauthenticated caller
    pub fn guest() -> Self {
        Self::new(GUEST_USER)
    }

    pub fn current_user(&self) -> String {
        self.state.lock().unwrap().user.clone()
    }

    /// Switch to the system principal for the lifetime of the guard.
    ///
    /// Nested or overlapping elevations are counted; the base principal is
    /// saved by the first guard and restored when the count returns to zero.
    pub fn elevate(self: &Arc<Self>) -> ElevatedGuard {
        let mut state = self.state.lock().unwrap();
        if state.depth == 0 {
            let previous = std::mem::replace(&mut state.user, SYSTEM_USER.to_string());
            tracing::debug!(from = %previous, "Elevated session to system principal");
            state.saved = Some(previous);
        }
        state.depth += 1;
        ElevatedGuard {
            session: Arc::clone(self),
        }
    }
}

/// Restores the pre-elevation principal once all guards have dropped
pub struct ElevatedGuard {
    session: Arc<SessionContext>,
}

impl Drop for ElevatedGuard {
    fn drop(&mut self) {
        let mut state = self.session.state.lock().unwrap();
        state.depth -= 1;
        if state.depth == 0 {
            if let Some(previous) = state.saved.take() {
                state.user = previous;
            }
        }
    }
}
