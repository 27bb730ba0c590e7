//! Generation API boundary: the provider trait and its Gemini implementation.

pub mod gemini;
pub mod model;

pub use {
    gemini::{GeminiModelInfo, GeminiProvider, list_models},
    model::{
        GenerationProvider, ImageResponse, InlineImage, TextRequest, TextResponse, Turn,
        TurnRole, Usage,
    },
};
