use std::sync::Arc;

use tracing::{debug, info, warn};

use {
    sapfire_config::ChatConfig,
    sapfire_providers::{GenerationProvider, TextRequest},
    sapfire_sessions::{Attachment, Message, Sender},
};

use crate::{
    error::{Error, ErrorKind},
    runtime::{ChatEvent, ChatRuntime},
    transcript::{Persona, build_transcript, system_instruction},
};

pub const IMAGE_REPLY_COLOR: &str = "#10b981";
pub const TEXT_REPLY_COLOR: &str = "#ec4899";

/// Wording and command settings for the pipeline.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub image_prefix: String,
    pub greeting: String,
    pub fallback_reply: String,
    pub image_failure_reply: String,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self::from(&ChatConfig::default())
    }
}

impl From<&ChatConfig> for PipelineOptions {
    fn from(config: &ChatConfig) -> Self {
        Self {
            image_prefix: config.image_prefix.clone(),
            greeting: config.greeting.clone(),
            fallback_reply: config.fallback_reply.clone(),
            image_failure_reply: config.image_failure_reply.clone(),
        }
    }
}

/// One outgoing message and the identities around it.
#[derive(Debug, Clone)]
pub struct SendRequest {
    pub text: String,
    pub sender: Sender,
    pub persona: Persona,
    /// Reply language hint, e.g. `ru`.
    pub language: String,
}

/// Full replacement log plus the error surfaced by the send, if any.
#[derive(Debug)]
pub struct SendOutcome {
    pub messages: Vec<Message>,
    pub error: Option<Error>,
}

impl SendOutcome {
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// The appended reply, when the send produced one.
    #[must_use]
    pub fn reply(&self, previous_len: usize) -> Option<&Message> {
        self.messages.get(previous_len + 1)
    }
}

/// Stateless send pipeline. Every call reads the log it is given and
/// returns a new one.
pub struct ConversationPipeline {
    provider: Arc<dyn GenerationProvider>,
    runtime: Arc<dyn ChatRuntime>,
    options: PipelineOptions,
}

impl ConversationPipeline {
    pub fn new(
        provider: Arc<dyn GenerationProvider>,
        runtime: Arc<dyn ChatRuntime>,
        options: PipelineOptions,
    ) -> Self {
        Self {
            provider,
            runtime,
            options,
        }
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Send one message against `log`.
    ///
    /// Blank text returns `log` untouched. Otherwise the trimmed user
    /// message is appended, followed by at most one reply; transport
    /// failures leave only the user message appended.
    pub async fn send(&self, log: &[Message], request: SendRequest) -> SendOutcome {
        let text = request.text.trim();
        if text.is_empty() {
            return SendOutcome {
                messages: log.to_vec(),
                error: Some(Error::EmptyMessage),
            };
        }

        let mut working = log.to_vec();
        working.push(
            Message::user(text)
                .with_sender(&request.sender)
                .with_views(0),
        );
        self.runtime.emit(ChatEvent::Sent).await;

        let result = match image_prompt(text, &self.options.image_prefix) {
            Some("") => Err(Error::EmptyImagePrompt),
            Some(prompt) => self.generate_image_reply(prompt, &request.persona).await,
            None => self.generate_text_reply(&working, &request).await,
        };

        let error = match result {
            Ok(reply) => {
                working.push(reply);
                self.runtime.emit(ChatEvent::Received).await;
                None
            },
            Err(err) => {
                if err.kind() == ErrorKind::Credential {
                    warn!(
                        persona = %request.persona.id,
                        "credential rejected by generation service"
                    );
                    self.runtime.request_credential_reselect().await;
                } else {
                    debug!(persona = %request.persona.id, error = %err, "send failed");
                }
                Some(err)
            },
        };

        SendOutcome {
            messages: working,
            error,
        }
    }

    async fn generate_image_reply(
        &self,
        prompt: &str,
        persona: &Persona,
    ) -> Result<Message, Error> {
        info!(
            provider = self.provider.name(),
            model = self.provider.image_model(),
            persona = %persona.id,
            "generating image"
        );
        let response = self
            .provider
            .generate_image(prompt)
            .await
            .map_err(|e| Error::from_generation(&e))?;

        let reply_sender = Sender::new(&persona.id, &persona.name, IMAGE_REPLY_COLOR);
        let reply = match response.image {
            Some(image) => Message::model(format!("Generated: \"{prompt}\""))
                .with_attachment(Attachment::image(image.data_url())),
            None => {
                debug!(prompt, "image response carried no image");
                Message::model(self.options.image_failure_reply.clone())
            },
        };
        Ok(reply.with_sender(&reply_sender))
    }

    async fn generate_text_reply(
        &self,
        working: &[Message],
        request: &SendRequest,
    ) -> Result<Message, Error> {
        let turns = build_transcript(working, &self.options.greeting);
        let text_request = TextRequest {
            turns,
            system_instruction: Some(system_instruction(&request.persona, &request.language)),
        };
        info!(
            provider = self.provider.name(),
            model = self.provider.text_model(),
            persona = %request.persona.id,
            turns = text_request.turns.len(),
            "generating reply"
        );

        let response = self
            .provider
            .generate_text(&text_request)
            .await
            .map_err(|e| Error::from_generation(&e))?;

        let content = response
            .text
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| self.options.fallback_reply.clone());
        let reply_sender = Sender::new(
            &request.persona.id,
            &request.persona.name,
            TEXT_REPLY_COLOR,
        );
        Ok(Message::model(content).with_sender(&reply_sender))
    }
}

/// The prompt after `prefix`, when `text` is an image command.
///
/// The prefix matches case-insensitively and must be followed by whitespace
/// or the end of the text; the returned prompt is trimmed.
fn image_prompt<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    if prefix.is_empty() {
        return None;
    }
    let head = text.get(..prefix.len())?;
    if head.to_lowercase() != prefix.to_lowercase() {
        return None;
    }
    let rest = &text[prefix.len()..];
    if rest.is_empty() || rest.starts_with(char::is_whitespace) {
        Some(rest.trim())
    } else {
        None
    }
}

/// Toggle `emoji` on the message with `message_id`: strip every occurrence
/// if present, add one otherwise. Unknown ids leave the log unchanged.
pub fn toggle_reaction(log: &[Message], message_id: &str, emoji: &str) -> Vec<Message> {
    log.iter()
        .map(|m| {
            let mut m = m.clone();
            if m.id == message_id {
                m.toggle_reaction(emoji);
            }
            m
        })
        .collect()
}
