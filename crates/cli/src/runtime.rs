use std::{
    io::Write,
    path::{Path, PathBuf},
};

use {
    async_trait::async_trait,
    sapfire_chat::{ChatEvent, ChatRuntime},
    sapfire_config::SapfireConfig,
    tracing::debug,
};

/// Terminal stand-in for the app shell: rings the bell for incoming
/// replies and tells the user how to swap a rejected key.
pub struct TerminalRuntime {
    sound: bool,
    config_path: PathBuf,
}

impl TerminalRuntime {
    /// `config_path` is the file the user should edit to swap keys.
    pub fn new(config: &SapfireConfig, config_path: &Path) -> Self {
        let notifications = &config.settings.notifications;
        Self {
            sound: notifications.sound && !notifications.dnd,
            config_path: config_path.to_path_buf(),
        }
    }

    fn reselect_hint(&self) -> String {
        format!(
            "Select a new key: set providers.gemini.api_key in {} or export GEMINI_API_KEY, then \
             retry.",
            self.config_path.display()
        )
    }
}

#[async_trait]
impl ChatRuntime for TerminalRuntime {
    async fn emit(&self, event: ChatEvent) {
        debug!(?event, "chat event");
        if self.sound && event == ChatEvent::Received {
            let mut stderr = std::io::stderr();
            let _ = stderr.write_all(b"\x07");
            let _ = stderr.flush();
        }
    }

    async fn request_credential_reselect(&self) {
        eprintln!("{}", self.reselect_hint());
    }
}
