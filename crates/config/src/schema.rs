//! Config schema types (user identity, generation provider, chat, settings).
//!
//! Every concern gets its own closed struct; unknown keys are reported by
//! [`crate::validate`] rather than silently collected into a catch-all map.
use std::path::PathBuf;

use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SapfireConfig {
    pub user: UserProfile,
    pub providers: ProvidersConfig,
    pub chat: ChatConfig,
    pub settings: SettingsConfig,
    pub storage: StorageConfig,
}

/// The local user. Supplied to the chat pipeline as the sender identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UserProfile {
    pub id: String,
    pub name: String,
    pub username: String,
    /// Bubble color used for the user's own messages.
    pub color: String,
}

impl Default for UserProfile {
    fn default() -> Self {
        Self {
            id: "me".into(),
            name: "Sapfire User".into(),
            username: "sapfire_user".into(),
            color: "#3b82f6".into(),
        }
    }
}

/// Generation provider settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub gemini: GeminiConfig,
}

pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_TEXT_MODEL: &str = "gemini-3-flash-preview";
pub const DEFAULT_IMAGE_MODEL: &str = "gemini-2.5-flash-image";

/// Gemini (Generative Language API) endpoint configuration.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeminiConfig {
    /// API key; `GEMINI_API_KEY` / `API_KEY` are consulted when unset.
    #[serde(
        default,
        serialize_with = "serialize_option_secret",
        skip_serializing_if = "Option::is_none"
    )]
    pub api_key: Option<Secret<String>>,
    pub base_url: String,
    /// Model used for conversational replies.
    pub text_model: String,
    /// Model used for `/image` requests.
    pub image_model: String,
    pub image_aspect_ratio: String,
}

impl GeminiConfig {
    /// Whether an API key is configured directly in the file.
    #[must_use]
    pub fn has_api_key(&self) -> bool {
        self.api_key
            .as_ref()
            .is_some_and(|k| !k.expose_secret().trim().is_empty())
    }
}

impl std::fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("base_url", &self.base_url)
            .field("text_model", &self.text_model)
            .field("image_model", &self.image_model)
            .field("image_aspect_ratio", &self.image_aspect_ratio)
            .finish()
    }
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_GEMINI_BASE_URL.into(),
            text_model: DEFAULT_TEXT_MODEL.into(),
            image_model: DEFAULT_IMAGE_MODEL.into(),
            image_aspect_ratio: "1:1".into(),
        }
    }
}

fn serialize_option_secret<S: serde::Serializer>(
    secret: &Option<Secret<String>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match secret {
        Some(s) => serializer.serialize_some(s.expose_secret()),
        None => serializer.serialize_none(),
    }
}

/// Chat pipeline wording and commands.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Reserved prefix that turns a message into an image request.
    pub image_prefix: String,
    /// Synthetic opening user turn when history starts on the model side.
    pub greeting: String,
    /// Reply text when the model returns no text.
    pub fallback_reply: String,
    /// Reply text when an image request yields no image.
    pub image_failure_reply: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            image_prefix: "/image".into(),
            greeting: "Greetings".into(),
            fallback_reply: "Core sync error.".into(),
            image_failure_reply: "Failed to materialize image.".into(),
        }
    }
}

/// Persisted user preferences, grouped per concern.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsConfig {
    pub appearance: AppearanceSettings,
    pub notifications: NotificationSettings,
    pub privacy: PrivacySettings,
    pub locale: LocaleSettings,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Cyber,
    Magma,
    Emerald,
    Magic,
    Noir,
    Aether,
    Cosmos,
    Liquid,
    Neon,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppearanceSettings {
    pub theme: Theme,
    pub accent_color: String,
    pub animations_enabled: bool,
    pub compact_mode: bool,
    pub font_size: u8,
    /// Recolor the theme from the user's mood status.
    pub mood_theme: bool,
}

impl Default for AppearanceSettings {
    fn default() -> Self {
        Self {
            theme: Theme::Cyber,
            accent_color: "#3b82f6".into(),
            animations_enabled: true,
            compact_mode: false,
            font_size: 14,
            mood_theme: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationSettings {
    pub sound: bool,
    pub preview: bool,
    pub vibrate: bool,
    pub stories: bool,
    pub calls: bool,
    pub groups: bool,
    /// Do not disturb.
    pub dnd: bool,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            sound: true,
            preview: true,
            vibrate: true,
            stories: true,
            calls: true,
            groups: true,
            dnd: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Everyone,
    Contacts,
    Nobody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PrivacySettings {
    pub last_seen: Visibility,
    pub read_receipts: bool,
    pub profile_visibility: bool,
    pub incognito_chat: bool,
    pub ghost_mode: bool,
    pub hide_phone_number: bool,
    /// Contact ids the user has blocked.
    pub block_list: Vec<String>,
}

impl Default for PrivacySettings {
    fn default() -> Self {
        Self {
            last_seen: Visibility::Everyone,
            read_receipts: true,
            profile_visibility: true,
            incognito_chat: false,
            ghost_mode: false,
            hide_phone_number: false,
            block_list: Vec::new(),
        }
    }
}

/// Reply language hint passed to the model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    Ru,
    En,
}

impl Language {
    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            Self::Ru => "ru",
            Self::En => "en",
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeFormat {
    #[serde(rename = "12h")]
    TwelveHour,
    #[default]
    #[serde(rename = "24h")]
    TwentyFourHour,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocaleSettings {
    pub language: Language,
    pub time_format: TimeFormat,
    /// IANA zone name, or "Auto" to follow the system.
    pub timezone: String,
}

impl Default for LocaleSettings {
    fn default() -> Self {
        Self {
            language: Language::Ru,
            time_format: TimeFormat::TwentyFourHour,
            timezone: "Auto".into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Overrides the platform data directory.
    pub data_dir: Option<PathBuf>,
}
