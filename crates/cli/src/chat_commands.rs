use std::sync::Arc;

use {
    anyhow::Result,
    async_trait::async_trait,
    sapfire_chat::{
        ChatRuntime, ChatService, ConversationPipeline, PipelineOptions, SendOutcome,
    },
    sapfire_providers::{
        GeminiProvider, GenerationProvider, ImageResponse, TextRequest, TextResponse,
    },
    sapfire_sessions::{ContactKind, ContactStore, ConversationStore, Message, Role, Sender},
    tokio::io::{AsyncBufReadExt, BufReader},
    tracing::warn,
};

use crate::{LoadedConfig, runtime::TerminalRuntime};

/// Stands in for the Gemini client when no key is configured, so that
/// read-only commands still work.
struct OfflineProvider {
    reason: String,
}

#[async_trait]
impl GenerationProvider for OfflineProvider {
    fn name(&self) -> &str {
        "offline"
    }

    fn text_model(&self) -> &str {
        ""
    }

    fn image_model(&self) -> &str {
        ""
    }

    async fn generate_text(&self, _request: &TextRequest) -> Result<TextResponse> {
        anyhow::bail!("{}", self.reason)
    }

    async fn generate_image(&self, _prompt: &str) -> Result<ImageResponse> {
        anyhow::bail!("{}", self.reason)
    }
}

/// Build the chat service. With `require_provider` a missing key is an error,
/// otherwise generation calls fail with the same message.
async fn build_service(loaded: &LoadedConfig, require_provider: bool) -> Result<ChatService> {
    let config = &loaded.config;
    let provider: Arc<dyn GenerationProvider> =
        match GeminiProvider::from_config(&config.providers.gemini) {
            Ok(provider) => Arc::new(provider),
            Err(e) if require_provider => return Err(e),
            Err(e) => Arc::new(OfflineProvider {
                reason: e.to_string(),
            }),
        };

    let runtime: Arc<dyn ChatRuntime> = Arc::new(TerminalRuntime::new(config, &loaded.path));
    let pipeline = ConversationPipeline::new(
        provider,
        Arc::clone(&runtime),
        PipelineOptions::from(&config.chat),
    );

    let data_dir = sapfire_config::data_dir(config);
    let user = Sender::new(&config.user.id, &config.user.name, &config.user.color);
    let service = ChatService::new(
        pipeline,
        runtime,
        ConversationStore::in_data_dir(&data_dir),
        ContactStore::in_data_dir(&data_dir),
        user,
        config.settings.locale.language.code(),
    );
    service.seed_defaults().await?;
    Ok(service)
}

fn sender_label(message: &Message) -> String {
    match (&message.sender_name, message.role) {
        (Some(name), _) => name.clone(),
        (None, Role::User) => "you".to_string(),
        (None, role) => role.to_string(),
    }
}

fn print_message(message: &Message) {
    if message.role == Role::System {
        println!("  -- {} --", message.content);
        return;
    }
    println!("[{}] {}: {}", message.id, sender_label(message), message.content);
    if let Some(ref attachment) = message.attachment {
        let size = attachment.url.len();
        println!("    attachment: {:?} ({size} bytes)", attachment.kind);
    }
    if !message.reactions.is_empty() {
        println!("    reactions: {}", message.reactions.join(" "));
    }
    if let Some(views) = message.views.filter(|v| *v > 0) {
        println!("    views: {views}");
    }
}

/// Print the reply (if any) and turn a surfaced error into a failure.
fn report(outcome: &SendOutcome, previous_len: usize) -> Result<()> {
    if let Some(reply) = outcome.reply(previous_len) {
        print_message(reply);
    }
    match outcome.error {
        Some(ref err) => anyhow::bail!("{}", err.user_message()),
        None => Ok(()),
    }
}

pub async fn send(loaded: &LoadedConfig, contact_id: &str, text: &str) -> Result<()> {
    let service = build_service(loaded, true).await?;
    let previous_len = service.history(contact_id).await?.len();
    let outcome = service.send(contact_id, text).await?;
    report(&outcome, previous_len)
}

pub async fn interactive(loaded: &LoadedConfig, contact_id: &str) -> Result<()> {
    let service = build_service(loaded, true).await?;
    let contact = service.contact(contact_id).await?;
    for message in service.history(contact_id).await? {
        print_message(&message);
    }
    if !contact.can_post(&loaded.config.user.id) {
        println!("{} is read-only for you.", contact.name);
        return Ok(());
    }
    eprintln!("Chatting with {}. /quit to leave.", contact.name);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if matches!(line, "/quit" | "/exit") {
            break;
        }
        let previous_len = service.history(contact_id).await?.len();
        match service.send(contact_id, line).await {
            Ok(outcome) => {
                if let Err(e) = report(&outcome, previous_len) {
                    eprintln!("{e}");
                }
            },
            Err(e) => {
                warn!(contact = contact_id, error = %e, "send rejected");
                eprintln!("{}", e.user_message());
            },
        }
    }
    Ok(())
}

pub async fn history(
    loaded: &LoadedConfig,
    contact_id: &str,
    last: Option<usize>,
    json: bool,
) -> Result<()> {
    let service = build_service(loaded, false).await?;
    let messages = match last {
        Some(n) => service.recent(contact_id, n).await?,
        None => service.history(contact_id).await?,
    };
    for message in &messages {
        if json {
            println!("{}", serde_json::to_string(message)?);
        } else {
            print_message(message);
        }
    }
    Ok(())
}

pub async fn react(
    loaded: &LoadedConfig,
    contact_id: &str,
    message_id: &str,
    emoji: &str,
) -> Result<()> {
    let service = build_service(loaded, false).await?;
    let updated = service.react(contact_id, message_id, emoji).await?;
    match updated.iter().find(|m| m.id == message_id) {
        Some(message) => print_message(message),
        None => eprintln!("No message {message_id} in {contact_id}."),
    }
    Ok(())
}

pub async fn contacts(loaded: &LoadedConfig) -> Result<()> {
    let service = build_service(loaded, false).await?;
    for contact in service.contacts().await? {
        let access = if contact.can_post(&loaded.config.user.id) {
            ""
        } else {
            " (read-only)"
        };
        println!(
            "{:<6} {:<8} {}{access}",
            contact.id,
            contact.kind.as_str(),
            contact.name
        );
        if let Some(ref last) = contact.last_message {
            println!("       {last}");
        }
    }
    Ok(())
}

/// Create a group or channel and print it.
pub async fn create(
    loaded: &LoadedConfig,
    kind: ContactKind,
    name: &str,
    description: &str,
    members: &[String],
) -> Result<()> {
    let service = build_service(loaded, false).await?;
    let contact = service
        .create_community(kind, name, description, members)
        .await?;
    println!(
        "Created {} {} ({}): @{}",
        contact.kind.as_str(),
        contact.name,
        contact.id,
        contact.username
    );
    Ok(())
}
