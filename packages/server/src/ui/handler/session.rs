//! Per-connection session state.
//!
//! ```text
//! AwaitingConnect --connect--> Connected(userId) --EOF/error/timeout--> Closed
//!                                  |    ^
//!                                  +----+ connect (rebind)
//! ```

use kadai_shared::protocol::Action;

use crate::domain::UserId;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Accepted, no `connect` processed yet
    #[default]
    AwaitingConnect,
    /// Bound to a user id and routable
    Connected(UserId),
    Closed,
}

impl SessionState {
    pub fn user_id(&self) -> Option<&UserId> {
        match self {
            SessionState::Connected(user_id) => Some(user_id),
            _ => None,
        }
    }

    /// Check whether `action` may be executed in the current state.
    ///
    /// Only `connect` is accepted before the session is bound.
    pub fn admit(&self, action: Action) -> Result<(), String> {
        match (self, action) {
            (SessionState::Closed, _) => Err("Connection is closed".to_string()),
            (SessionState::AwaitingConnect, Action::Connect) => Ok(()),
            (SessionState::AwaitingConnect, _) => Err(format!(
                "Validation error: send 'connect' with a userId before '{}'",
                action
            )),
            (SessionState::Connected(_), _) => Ok(()),
        }
    }

    /// Bind the session to `user_id`, returning the previous binding.
    pub fn bind(&mut self, user_id: UserId) -> Option<UserId> {
        match std::mem::replace(self, SessionState::Connected(user_id)) {
            SessionState::Connected(previous) => Some(previous),
            _ => None,
        }
    }

    /// Move to `Closed`, returning the binding that has to be released.
    pub fn close(&mut self) -> Option<UserId> {
        match std::mem::replace(self, SessionState::Closed) {
            SessionState::Connected(user_id) => Some(user_id),
            _ => None,
        }
    }
}
