//! Conversation pipeline: turns one outgoing message into an updated log
//! through a single text or image generation call.

pub mod error;
pub mod pipeline;
pub mod runtime;
pub mod service;
pub mod transcript;

pub use {
    error::{Error, ErrorKind, Result},
    pipeline::{ConversationPipeline, PipelineOptions, SendOutcome, SendRequest, toggle_reaction},
    runtime::{ChatEvent, ChatRuntime, NoopRuntime},
    service::ChatService,
    transcript::{Persona, build_transcript, system_instruction},
};
