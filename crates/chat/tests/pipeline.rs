use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};

use {
    async_trait::async_trait,
    sapfire_chat::{
        ChatEvent, ChatRuntime, ChatService, ConversationPipeline, Error, ErrorKind,
        PipelineOptions, Persona, SendRequest,
    },
    sapfire_providers::{
        GenerationProvider, ImageResponse, InlineImage, TextRequest, TextResponse, TurnRole,
    },
    sapfire_sessions::{
        AttachmentKind, ContactKind, ContactStore, ConversationStore, Message, Role, Sender,
    },
    tokio::sync::Notify,
};

// ── Test doubles ────────────────────────────────────────────────────────────

#[derive(Clone)]
enum Behavior {
    Text(Option<String>),
    Image(Option<InlineImage>),
    Fail(String),
}

#[derive(Debug, Clone)]
enum Call {
    Text(TextRequest),
    Image(String),
}

/// Pauses a call until released, for in-flight tests.
struct Gate {
    entered: Notify,
    release: Notify,
}

struct MockProvider {
    behavior: Behavior,
    calls: Mutex<Vec<Call>>,
    gate: Option<Arc<Gate>>,
}

impl MockProvider {
    fn new(behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            calls: Mutex::new(Vec::new()),
            gate: None,
        })
    }

    fn gated(behavior: Behavior, gate: Arc<Gate>) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            calls: Mutex::new(Vec::new()),
            gate: Some(gate),
        })
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    async fn wait_gate(&self) {
        if let Some(gate) = &self.gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }
    }
}

#[async_trait]
impl GenerationProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    fn text_model(&self) -> &str {
        "mock-text"
    }

    fn image_model(&self) -> &str {
        "mock-image"
    }

    async fn generate_text(&self, request: &TextRequest) -> anyhow::Result<TextResponse> {
        self.calls.lock().unwrap().push(Call::Text(request.clone()));
        self.wait_gate().await;
        match &self.behavior {
            Behavior::Text(text) => Ok(TextResponse {
                text: text.clone(),
                ..Default::default()
            }),
            Behavior::Image(_) => Ok(TextResponse::default()),
            Behavior::Fail(msg) => Err(anyhow::anyhow!("{msg}")),
        }
    }

    async fn generate_image(&self, prompt: &str) -> anyhow::Result<ImageResponse> {
        self.calls
            .lock()
            .unwrap()
            .push(Call::Image(prompt.to_string()));
        self.wait_gate().await;
        match &self.behavior {
            Behavior::Image(image) => Ok(ImageResponse {
                image: image.clone(),
                ..Default::default()
            }),
            Behavior::Text(_) => Ok(ImageResponse::default()),
            Behavior::Fail(msg) => Err(anyhow::anyhow!("{msg}")),
        }
    }
}

#[derive(Default)]
struct RecordingRuntime {
    events: Mutex<Vec<ChatEvent>>,
    reselects: AtomicUsize,
}

impl RecordingRuntime {
    fn events(&self) -> Vec<ChatEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatRuntime for RecordingRuntime {
    async fn emit(&self, event: ChatEvent) {
        self.events.lock().unwrap().push(event);
    }

    async fn request_credential_reselect(&self) {
        self.reselects.fetch_add(1, Ordering::SeqCst);
    }
}

fn pipeline(
    provider: Arc<MockProvider>,
) -> (ConversationPipeline, Arc<RecordingRuntime>) {
    let runtime = Arc::new(RecordingRuntime::default());
    let pipeline = ConversationPipeline::new(provider, runtime.clone(), PipelineOptions::default());
    (pipeline, runtime)
}

fn persona() -> Persona {
    Persona {
        id: "c1".into(),
        name: "Alexander".into(),
        bio: "AI researcher.".into(),
    }
}

fn request(text: &str) -> SendRequest {
    SendRequest {
        text: text.into(),
        sender: Sender::new("me", "Sapfire User", "#3b82f6"),
        persona: persona(),
        language: "ru".into(),
    }
}

fn initial_log() -> Vec<Message> {
    vec![Message::user("hi").with_id("m1")]
}

fn png() -> InlineImage {
    InlineImage {
        mime_type: "image/png".into(),
        data: "iVBORw0KGgo=".into(),
    }
}

// ── Pipeline ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn text_reply_appends_two_messages() {
    let provider = MockProvider::new(Behavior::Text(Some("Signal received.".into())));
    let (pipeline, runtime) = pipeline(provider.clone());
    let log = initial_log();

    let outcome = pipeline.send(&log, request("  how are you?  ")).await;

    assert!(outcome.is_ok());
    assert_eq!(outcome.messages.len(), log.len() + 2);
    assert_eq!(&outcome.messages[..1], &log[..]);

    let user = &outcome.messages[1];
    assert_eq!(user.role, Role::User);
    assert_eq!(user.content, "how are you?");
    assert_eq!(user.sender_color.as_deref(), Some("#3b82f6"));
    assert_eq!(user.views, Some(0));

    let reply = outcome.reply(log.len()).unwrap();
    assert_eq!(reply.role, Role::Model);
    assert_eq!(reply.content, "Signal received.");
    assert_eq!(reply.sender_name.as_deref(), Some("Alexander"));
    assert_eq!(reply.sender_color.as_deref(), Some("#ec4899"));

    let calls = provider.calls();
    assert_eq!(calls.len(), 1);
    let Call::Text(sent) = &calls[0] else {
        panic!("expected a text call, got {calls:?}");
    };
    assert_eq!(sent.turns.len(), 1);
    assert_eq!(sent.turns[0].role, TurnRole::User);
    assert_eq!(sent.turns[0].text, "hi\nhow are you?");
    let instruction = sent.system_instruction.as_deref().unwrap();
    assert!(instruction.starts_with("You are Alexander, a core inhabitant of Sapfire."));
    assert!(instruction.ends_with("Language: ru."));

    assert_eq!(runtime.events(), vec![ChatEvent::Sent, ChatEvent::Received]);
}

#[tokio::test]
async fn transport_error_appends_only_user_message() {
    let provider = MockProvider::new(Behavior::Fail("quota exceeded".into()));
    let (pipeline, runtime) = pipeline(provider.clone());
    let log = initial_log();

    let outcome = pipeline.send(&log, request("hello")).await;

    assert_eq!(outcome.messages.len(), log.len() + 1);
    assert_eq!(outcome.messages[1].content, "hello");
    let err = outcome.error.unwrap();
    assert_eq!(err.kind(), ErrorKind::Transport);
    assert_eq!(err.user_message(), "quota exceeded");
    assert_eq!(runtime.reselects.load(Ordering::SeqCst), 0);
    assert_eq!(runtime.events(), vec![ChatEvent::Sent]);
}

#[tokio::test]
async fn credential_error_requests_reselect() {
    let provider = MockProvider::new(Behavior::Fail(
        "Gemini API error HTTP 404 Not Found: Requested entity was not found.".into(),
    ));
    let (pipeline, runtime) = pipeline(provider);
    let log = initial_log();

    let outcome = pipeline.send(&log, request("hello")).await;

    assert_eq!(outcome.messages.len(), log.len() + 1);
    let err = outcome.error.unwrap();
    assert_eq!(err.kind(), ErrorKind::Credential);
    assert_eq!(
        err.user_message(),
        "API Key synchronization error. Please re-select your key."
    );
    assert_eq!(runtime.reselects.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn whitespace_only_is_a_no_op() {
    let provider = MockProvider::new(Behavior::Text(Some("unused".into())));
    let (pipeline, runtime) = pipeline(provider.clone());
    let log = initial_log();

    let outcome = pipeline.send(&log, request("   ")).await;

    assert_eq!(outcome.messages, log);
    assert!(matches!(outcome.error, Some(Error::EmptyMessage)));
    assert!(provider.calls().is_empty());
    assert!(runtime.events().is_empty());
}

#[tokio::test]
async fn empty_image_prompt_is_rejected_without_a_call() {
    let provider = MockProvider::new(Behavior::Image(Some(png())));
    let (pipeline, _runtime) = pipeline(provider.clone());
    let log = initial_log();

    let outcome = pipeline.send(&log, request("/image    ")).await;

    assert_eq!(outcome.messages.len(), log.len() + 1);
    assert_eq!(outcome.messages[1].content, "/image");
    let err = outcome.error.unwrap();
    assert!(matches!(err, Error::EmptyImagePrompt));
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(provider.calls().is_empty());
}

#[tokio::test]
async fn image_command_attaches_generated_image() {
    let provider = MockProvider::new(Behavior::Image(Some(png())));
    let (pipeline, runtime) = pipeline(provider.clone());
    let log = initial_log();

    let outcome = pipeline.send(&log, request("/image a red cube")).await;

    assert!(outcome.is_ok());
    assert_eq!(outcome.messages.len(), 3);
    assert_eq!(outcome.messages[1].role, Role::User);
    assert_eq!(outcome.messages[1].content, "/image a red cube");

    let reply = &outcome.messages[2];
    assert_eq!(reply.role, Role::Model);
    assert_eq!(reply.content, "Generated: \"a red cube\"");
    assert_eq!(reply.sender_color.as_deref(), Some("#10b981"));
    let attachment = reply.attachment.as_ref().unwrap();
    assert_eq!(attachment.kind, AttachmentKind::Image);
    assert_eq!(attachment.url, "data:image/png;base64,iVBORw0KGgo=");

    match provider.calls().as_slice() {
        [Call::Image(prompt)] => assert_eq!(prompt, "a red cube"),
        other => panic!("unexpected calls: {other:?}"),
    }
    assert_eq!(runtime.events(), vec![ChatEvent::Sent, ChatEvent::Received]);
}

#[tokio::test]
async fn image_prefix_is_case_insensitive() {
    let provider = MockProvider::new(Behavior::Image(Some(png())));
    let (pipeline, _runtime) = pipeline(provider.clone());

    let outcome = pipeline.send(&[], request("/Image neon city")).await;

    assert!(outcome.is_ok());
    assert!(matches!(provider.calls().as_slice(), [Call::Image(p)] if p == "neon city"));
}

#[tokio::test]
async fn missing_image_is_a_soft_failure() {
    let provider = MockProvider::new(Behavior::Image(None));
    let (pipeline, _runtime) = pipeline(provider);
    let log = initial_log();

    let outcome = pipeline.send(&log, request("/image void")).await;

    assert!(outcome.is_ok());
    assert_eq!(outcome.messages.len(), 3);
    assert_eq!(outcome.messages[2].content, "Failed to materialize image.");
    assert!(outcome.messages[2].attachment.is_none());
}

#[tokio::test]
async fn empty_text_reply_uses_fallback() {
    let provider = MockProvider::new(Behavior::Text(None));
    let (pipeline, _runtime) = pipeline(provider);

    let outcome = pipeline.send(&initial_log(), request("ping")).await;

    assert!(outcome.is_ok());
    assert_eq!(outcome.messages[2].content, "Core sync error.");
}

#[tokio::test]
async fn transcript_alternates_and_starts_with_user() {
    let provider = MockProvider::new(Behavior::Text(Some("ok".into())));
    let (pipeline, _runtime) = pipeline(provider.clone());
    let log = vec![
        Message::system("Канал создан"),
        Message::new(Role::Admin, "update is live"),
        Message::model("ask me anything"),
        Message::user(""),
    ];

    let outcome = pipeline.send(&log, request("what changed?")).await;
    assert!(outcome.is_ok());
    assert_eq!(&outcome.messages[..log.len()], &log[..]);

    let calls = provider.calls();
    let Call::Text(sent) = &calls[0] else {
        panic!("expected a text call");
    };
    let roles: Vec<_> = sent.turns.iter().map(|t| t.role).collect();
    assert_eq!(roles, vec![TurnRole::User, TurnRole::Model, TurnRole::User]);
    assert_eq!(sent.turns[0].text, "Greetings");
    assert_eq!(sent.turns[1].text, "update is live\nask me anything");
    assert_eq!(sent.turns[2].text, "what changed?");
}

// ── Service ─────────────────────────────────────────────────────────────────

fn service(
    provider: Arc<MockProvider>,
    dir: &std::path::Path,
) -> (ChatService, Arc<RecordingRuntime>) {
    let runtime = Arc::new(RecordingRuntime::default());
    let pipeline = ConversationPipeline::new(provider, runtime.clone(), PipelineOptions::default());
    let service = ChatService::new(
        pipeline,
        runtime.clone(),
        ConversationStore::in_data_dir(dir),
        ContactStore::in_data_dir(dir),
        Sender::new("me", "Sapfire User", "#3b82f6"),
        "en",
    );
    (service, runtime)
}

#[tokio::test]
async fn service_persists_log_and_preview() {
    let dir = tempfile::tempdir().unwrap();
    let provider = MockProvider::new(Behavior::Text(Some("Hello, traveller.".into())));
    let (service, _runtime) = service(provider, dir.path());
    service.seed_defaults().await.unwrap();

    let outcome = service.send("c1", "hello").await.unwrap();
    assert!(outcome.is_ok());

    let stored = service.history("c1").await.unwrap();
    assert_eq!(stored, outcome.messages);
    assert_eq!(stored.len(), 2);

    let c1 = service.contact("c1").await.unwrap();
    assert_eq!(c1.last_message.as_deref(), Some("Hello, traveller."));
}

#[tokio::test]
async fn service_keeps_user_message_on_failure() {
    let dir = tempfile::tempdir().unwrap();
    let provider = MockProvider::new(Behavior::Fail("boom".into()));
    let (service, _runtime) = service(provider, dir.path());

    let outcome = service.send("c2", "are you there?").await.unwrap();
    assert!(outcome.error.is_some());

    let stored = service.history("c2").await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].content, "are you there?");
}

#[tokio::test]
async fn service_seeds_opening_conversations() {
    let dir = tempfile::tempdir().unwrap();
    let provider = MockProvider::new(Behavior::Text(Some("ok".into())));
    let (service, _runtime) = service(provider, dir.path());
    service.seed_defaults().await.unwrap();
    service.seed_defaults().await.unwrap();

    let group = service.history("g1").await.unwrap();
    assert_eq!(group.len(), 2);
    assert_eq!(group[0].role, Role::System);
    assert_eq!(service.contacts().await.unwrap().len(), 4);
}

#[tokio::test]
async fn service_blocks_posting_to_foreign_channel() {
    let dir = tempfile::tempdir().unwrap();
    let provider = MockProvider::new(Behavior::Text(Some("ok".into())));
    let (service, _runtime) = service(provider.clone(), dir.path());
    service.seed_defaults().await.unwrap();

    let err = service.send("ch1", "hi").await.unwrap_err();
    assert!(matches!(err, Error::PostingNotAllowed { .. }));
    assert!(provider.calls().is_empty());
    assert_eq!(service.history("ch1").await.unwrap().len(), 2);
}

#[tokio::test]
async fn service_rejects_unknown_contact() {
    let dir = tempfile::tempdir().unwrap();
    let provider = MockProvider::new(Behavior::Text(Some("ok".into())));
    let (service, _runtime) = service(provider, dir.path());

    let err = service.send("ghost", "hi").await.unwrap_err();
    assert!(matches!(err, Error::UnknownContact { ref id } if id == "ghost"));
}

#[tokio::test]
async fn service_allows_one_send_per_conversation() {
    let dir = tempfile::tempdir().unwrap();
    let gate = Arc::new(Gate {
        entered: Notify::new(),
        release: Notify::new(),
    });
    let provider = MockProvider::gated(Behavior::Text(Some("done".into())), gate.clone());
    let (service, _runtime) = service(provider, dir.path());
    let service = Arc::new(service);

    let first = tokio::spawn({
        let service = service.clone();
        async move { service.send("c1", "first").await }
    });
    gate.entered.notified().await;

    let err = service.send("c1", "second").await.unwrap_err();
    assert!(matches!(err, Error::Busy { .. }));

    gate.release.notify_one();
    let outcome = first.await.unwrap().unwrap();
    assert!(outcome.is_ok());

    gate.release.notify_one();
    let again = tokio::spawn({
        let service = service.clone();
        async move { service.send("c1", "third").await }
    });
    let outcome = again.await.unwrap().unwrap();
    assert!(outcome.is_ok());
    assert_eq!(service.history("c1").await.unwrap().len(), 4);
}

#[tokio::test]
async fn service_react_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let provider = MockProvider::new(Behavior::Text(Some("ok".into())));
    let (service, runtime) = service(provider, dir.path());
    service.seed_defaults().await.unwrap();

    let once = service.react("g1", "m1", "🔥").await.unwrap();
    assert_eq!(once[1].reactions, vec!["🔥"]);
    assert_eq!(service.history("g1").await.unwrap()[1].reactions, vec!["🔥"]);

    let twice = service.react("g1", "m1", "🔥").await.unwrap();
    assert!(twice[1].reactions.is_empty());
    assert_eq!(
        runtime.events(),
        vec![ChatEvent::Reaction, ChatEvent::Reaction]
    );
}

#[tokio::test]
async fn owner_can_post_to_created_channel() {
    let dir = tempfile::tempdir().unwrap();
    let provider = MockProvider::new(Behavior::Text(Some("Broadcast noted.".into())));
    let (service, _runtime) = service(provider.clone(), dir.path());
    service.seed_defaults().await.unwrap();

    let channel = service
        .create_community(ContactKind::Channel, "Night Owls", "", &["c1".to_string()])
        .await
        .unwrap();
    assert_eq!(channel.kind, ContactKind::Channel);
    assert_eq!(channel.owner_id.as_deref(), Some("me"));
    assert_eq!(channel.participant_ids, vec!["me"]);
    assert_eq!(channel.username, "night_owls");
    assert_eq!(channel.bio, "Official channel of Night Owls.");

    let contacts = service.contacts().await.unwrap();
    assert_eq!(contacts.len(), 5);
    assert_eq!(contacts[0].id, channel.id);

    let opening = service.history(&channel.id).await.unwrap();
    assert_eq!(opening.len(), 1);
    assert_eq!(opening[0].role, Role::System);
    assert_eq!(opening[0].content, "Вы создали канал \"Night Owls\"");

    let outcome = service.send(&channel.id, "first post").await.unwrap();
    assert!(outcome.is_ok());
    assert_eq!(service.history(&channel.id).await.unwrap().len(), 3);
    assert_eq!(provider.calls().len(), 1);
}

#[tokio::test]
async fn created_group_lists_owner_and_members() {
    let dir = tempfile::tempdir().unwrap();
    let provider = MockProvider::new(Behavior::Text(Some("ok".into())));
    let (service, _runtime) = service(provider, dir.path());
    service.seed_defaults().await.unwrap();

    let members = ["c1".to_string(), "c2".to_string(), "c1".to_string()];
    let group = service
        .create_community(ContactKind::Group, "Crew", "Weekend plans", &members)
        .await
        .unwrap();
    assert_eq!(group.participant_ids, vec!["me", "c1", "c2"]);
    assert_eq!(group.bio, "Weekend plans");
    assert_eq!(
        service.contact(&group.id).await.unwrap().last_message.as_deref(),
        Some("Вы создали группу \"Crew\"")
    );
}

#[tokio::test]
async fn community_creation_is_validated() {
    let dir = tempfile::tempdir().unwrap();
    let provider = MockProvider::new(Behavior::Text(Some("ok".into())));
    let (service, _runtime) = service(provider, dir.path());
    service.seed_defaults().await.unwrap();

    let err = service
        .create_community(ContactKind::Group, "   ", "", &[])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let err = service
        .create_community(ContactKind::Direct, "Solo", "", &[])
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidCommunity { .. }));

    let err = service
        .create_community(ContactKind::Group, "Crew", "", &["ghost".to_string()])
        .await
        .unwrap_err();
    assert!(matches!(err, Error::UnknownContact { ref id } if id == "ghost"));

    let err = service
        .create_community(ContactKind::Group, "Crew", "", &["ch1".to_string()])
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidCommunity { .. }));

    assert_eq!(service.contacts().await.unwrap().len(), 4);
}

#[tokio::test]
async fn recent_returns_the_tail() {
    let dir = tempfile::tempdir().unwrap();
    let provider = MockProvider::new(Behavior::Text(Some("ok".into())));
    let (service, _runtime) = service(provider, dir.path());
    service.seed_defaults().await.unwrap();

    let tail = service.recent("ch1", 1).await.unwrap();
    assert_eq!(tail.len(), 1);
    assert_eq!(tail[0].id, "cm1");
    assert_eq!(service.recent("ch1", 10).await.unwrap().len(), 2);
    assert!(matches!(
        service.recent("ghost", 1).await.unwrap_err(),
        Error::UnknownContact { .. }
    ));
}
