use thiserror::Error;

/// Upstream message that means the configured key no longer resolves.
pub const CREDENTIAL_SIGNATURE: &str = "Requested entity was not found";

const CREDENTIAL_NOTICE: &str = "API Key synchronization error. Please re-select your key.";
const TRANSPORT_FALLBACK: &str = "Connection lost in the pulse. Check your API key.";

/// Coarse classification used by callers to decide how to react.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Rejected before any external call.
    Validation,
    /// The generation call failed.
    Transport,
    /// The generation call failed because the credential is stale.
    Credential,
    /// Contact lookup, permission, concurrency or storage failure.
    Service,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("message is empty")]
    EmptyMessage,

    #[error("image prompt is empty")]
    EmptyImagePrompt,

    #[error("{message}")]
    Generation { message: String },

    #[error("{message}")]
    Credential { message: String },

    #[error("unknown contact: {id}")]
    UnknownContact { id: String },

    #[error("only the owner of {contact} can post there")]
    PostingNotAllowed { contact: String },

    #[error("a send is already in flight for {contact}")]
    Busy { contact: String },

    #[error("cannot create community: {reason}")]
    InvalidCommunity { reason: String },

    #[error(transparent)]
    Sessions(#[from] sapfire_sessions::Error),
}

impl Error {
    /// Classify a provider failure, singling out the stale-credential case.
    #[must_use]
    pub fn from_generation(err: &anyhow::Error) -> Self {
        let message = format!("{err:#}");
        if message.contains(CREDENTIAL_SIGNATURE) {
            Self::Credential { message }
        } else {
            Self::Generation { message }
        }
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::EmptyMessage | Self::EmptyImagePrompt | Self::InvalidCommunity { .. } => {
                ErrorKind::Validation
            },
            Self::Generation { .. } => ErrorKind::Transport,
            Self::Credential { .. } => ErrorKind::Credential,
            Self::UnknownContact { .. }
            | Self::PostingNotAllowed { .. }
            | Self::Busy { .. }
            | Self::Sessions(_) => ErrorKind::Service,
        }
    }

    /// Text shown to the user for this error.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Credential { .. } => CREDENTIAL_NOTICE.to_string(),
            Self::Generation { message } if message.trim().is_empty() => {
                TRANSPORT_FALLBACK.to_string()
            },
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
