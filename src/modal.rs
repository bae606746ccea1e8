//! Modal name-entry state machine.
//!
//! One instance per surface. `open` starts a session carrying a completion
//! token `C` that says what the collected text is for; `close` surrenders the
//! token, close reason, and final text exactly once. Opening while a session
//! is visible is rejected instead of silently replacing the pending
//! completion.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    Confirm,
    Cancel,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("text entry is already open")]
pub struct AlreadyOpen;

#[derive(Debug)]
struct Session<C> {
    token: C,
    text: String,
}

#[derive(Debug)]
pub struct TextEntry<C> {
    session: Option<Session<C>>,
}

impl<C> Default for TextEntry<C> {
    fn default() -> Self {
        Self { session: None }
    }
}

impl<C> TextEntry<C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    pub fn open(&mut self, initial: &str, token: C) -> Result<(), AlreadyOpen> {
        if self.session.is_some() {
            return Err(AlreadyOpen);
        }
        self.session = Some(Session {
            token,
            text: initial.to_string(),
        });
        Ok(())
    }

    /// Buffer a text level while visible. Text events while hidden belong to
    /// no session and are ignored.
    pub fn set_text(&mut self, text: &str) {
        if let Some(session) = &mut self.session {
            session.text = text.to_string();
        }
    }

    pub fn text(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.text.as_str())
    }

    /// End the session, surrendering its completion. `None` when no session
    /// is open (e.g. a stray Cancel press).
    pub fn close(&mut self, reason: CloseReason) -> Option<(C, CloseReason, String)> {
        self.session
            .take()
            .map(|session| (session.token, reason, session.text))
    }
}
