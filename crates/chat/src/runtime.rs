//! Hooks into the environment surrounding the chat engine.
//!
//! A front end implements [`ChatRuntime`] to play cues and to prompt the
//! user for a new credential; tests can provide a recording mock.

use async_trait::async_trait;

/// Audible/visual cue points in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatEvent {
    /// The user's message was appended.
    Sent,
    /// A reply was appended.
    Received,
    /// A reaction was toggled.
    Reaction,
}

#[async_trait]
pub trait ChatRuntime: Send + Sync {
    async fn emit(&self, event: ChatEvent);

    /// The generation service rejected the current key; ask the user to
    /// pick another one. Fired once per failed send.
    async fn request_credential_reselect(&self);
}

/// Runtime that ignores every hook.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopRuntime;

#[async_trait]
impl ChatRuntime for NoopRuntime {
    async fn emit(&self, _event: ChatEvent) {}

    async fn request_credential_reselect(&self) {}
}
