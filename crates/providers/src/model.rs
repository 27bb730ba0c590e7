use {
    async_trait::async_trait,
    serde::{Deserialize, Serialize},
};

// ── Typed transcript ────────────────────────────────────────────────────────

/// Speaker of a transcript turn, as the generation API understands it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Model,
}

impl TurnRole {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Model => "model",
        }
    }
}

/// One entry of the transcript sent to the model.
///
/// Only carries what the API consumes; ids, timestamps and sender metadata
/// of stored messages never reach a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub role: TurnRole,
    pub text: String,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            text: text.into(),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Model,
            text: text.into(),
        }
    }
}

/// A conversational text generation request.
#[derive(Debug, Clone, Default)]
pub struct TextRequest {
    pub turns: Vec<Turn>,
    pub system_instruction: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Usage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

#[derive(Debug, Clone, Default)]
pub struct TextResponse {
    /// `None` when the model produced no text parts.
    pub text: Option<String>,
    pub usage: Usage,
}

/// Base64 image payload returned inline by the API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineImage {
    pub mime_type: String,
    pub data: String,
}

impl InlineImage {
    /// Render as a `data:` URL suitable for an attachment.
    #[must_use]
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ImageResponse {
    /// First inline image of the first candidate, if any.
    pub image: Option<InlineImage>,
    pub text: Option<String>,
    pub usage: Usage,
}

/// Text and image generation backend.
///
/// Each call issues exactly one upstream request. Failures surface as
/// `anyhow::Error` carrying the upstream message; callers classify them.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Model used by [`GenerationProvider::generate_text`].
    fn text_model(&self) -> &str;

    /// Model used by [`GenerationProvider::generate_image`].
    fn image_model(&self) -> &str;

    async fn generate_text(&self, request: &TextRequest) -> anyhow::Result<TextResponse>;

    async fn generate_image(&self, prompt: &str) -> anyhow::Result<ImageResponse>;
}
