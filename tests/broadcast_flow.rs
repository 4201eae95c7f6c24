//! End-to-end: drive the dispatcher the way a chat operator would, against
//! a scripted transport and a file-backed store.

use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use adbot::auth::AuthManager;
use adbot::broadcast::{BroadcastConfig, BroadcastManager};
use adbot::dispatch::{Dispatcher, READY_BANNER};
use adbot::error::TransportError;
use adbot::operator::{ConversationState, OperatorId};
use adbot::store::{JsonFileBackend, SessionStore};
use adbot::transport::{ChallengeToken, SignInOutcome, Transport, TransportSession};

const OP: OperatorId = OperatorId(5550001);
const CODE: &str = "24680";

// ── Scripted transport ──────────────────────────────────────────────

#[derive(Default)]
struct Script {
    authorized: HashSet<OperatorId>,
    sends: Vec<(OperatorId, String, String)>,
}

#[derive(Clone, Default)]
struct ScriptedTransport {
    script: Arc<Mutex<Script>>,
}

impl ScriptedTransport {
    fn sends(&self) -> Vec<(String, String)> {
        self.script
            .lock()
            .unwrap()
            .sends
            .iter()
            .map(|(_, d, t)| (d.clone(), t.clone()))
            .collect()
    }

    fn is_authorized(&self, operator: OperatorId) -> bool {
        self.script.lock().unwrap().authorized.contains(&operator)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn connect(
        &self,
        operator: OperatorId,
    ) -> Result<Box<dyn TransportSession>, TransportError> {
        Ok(Box::new(ScriptedSession {
            operator,
            script: Arc::clone(&self.script),
            challenge: None,
        }))
    }

    async fn remove_session(&self, operator: OperatorId) -> Result<bool, TransportError> {
        Ok(self.script.lock().unwrap().authorized.remove(&operator))
    }
}

struct ScriptedSession {
    operator: OperatorId,
    script: Arc<Mutex<Script>>,
    challenge: Option<String>,
}

#[async_trait]
impl TransportSession for ScriptedSession {
    async fn request_code(&mut self, phone: &str) -> Result<ChallengeToken, TransportError> {
        if !phone.starts_with('+') {
            return Err(TransportError::InvalidPhone("PHONE_NUMBER_INVALID".into()));
        }
        self.challenge = Some(format!("hash-{phone}"));
        Ok(ChallengeToken::new(format!("hash-{phone}")))
    }

    async fn sign_in(
        &mut self,
        _phone: &str,
        code: &str,
        challenge: &ChallengeToken,
    ) -> Result<SignInOutcome, TransportError> {
        // A fresh session after a restart never issued this challenge.
        if self.challenge.as_deref() != Some(challenge.as_str()) || code != CODE {
            return Err(TransportError::Rejected("PHONE_CODE_INVALID".into()));
        }
        self.script.lock().unwrap().authorized.insert(self.operator);
        Ok(SignInOutcome::SignedIn)
    }

    async fn sign_in_with_password(&mut self, _password: &str) -> Result<(), TransportError> {
        Err(TransportError::Rejected("PASSWORD_HASH_INVALID".into()))
    }

    async fn is_authorized(&self) -> Result<bool, TransportError> {
        Ok(self.script.lock().unwrap().authorized.contains(&self.operator))
    }

    async fn send_message(&self, destination: &str, text: &str) -> Result<(), TransportError> {
        let mut script = self.script.lock().unwrap();
        if !script.authorized.contains(&self.operator) {
            return Err(TransportError::Unauthorized {
                operator: self.operator,
            });
        }
        script
            .sends
            .push((self.operator, destination.into(), text.into()));
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
}

// ── Harness ─────────────────────────────────────────────────────────

struct App {
    dispatcher: Dispatcher,
    broadcast: Arc<BroadcastManager>,
    store: Arc<SessionStore>,
}

async fn boot(data_file: &Path, transport: &ScriptedTransport) -> App {
    let store = Arc::new(
        SessionStore::open(Arc::new(JsonFileBackend::new(data_file)))
            .await
            .unwrap(),
    );
    let transport: Arc<dyn Transport> = Arc::new(transport.clone());
    let auth = Arc::new(AuthManager::new(Arc::clone(&store), Arc::clone(&transport)));
    let broadcast = Arc::new(BroadcastManager::new(
        Arc::clone(&store),
        transport,
        BroadcastConfig::default(),
    ));
    App {
        dispatcher: Dispatcher::new(Arc::clone(&store), auth, Arc::clone(&broadcast)),
        broadcast,
        store,
    }
}

impl App {
    async fn say(&self, text: &str) -> String {
        self.dispatcher.on_event(OP, text).await.text
    }

    async fn state(&self) -> ConversationState {
        self.store.get(OP).await.unwrap().conversation_state
    }
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}

// ── Scenarios ───────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn login_configure_and_broadcast() {
    let dir = tempfile::tempdir().unwrap();
    let transport = ScriptedTransport::default();
    let app = boot(&dir.path().join("data.json"), &transport).await;

    assert_eq!(app.dispatcher.on_start(OP).await.text, READY_BANNER);

    assert_eq!(app.say("📱 Login").await, "Send your phone number (+91xxxx)");
    assert_eq!(app.say("+10000000000").await, "Send OTP like: code12345");
    assert_eq!(app.state().await, ConversationState::AwaitingOtp);
    assert_eq!(app.say(&format!("code{CODE}")).await, "✅ Login successful");
    assert_eq!(app.state().await, ConversationState::None);
    assert!(transport.is_authorized(OP));

    app.say("➕ Add Chat").await;
    app.say("@a").await;
    app.say("➕ Add Chat").await;
    app.say("@b").await;
    app.say("📝 Set Message").await;
    app.say("hi").await;
    app.say("⏱ Interval").await;
    assert_eq!(app.say("5").await, "✅ Interval updated to 5s");

    assert_eq!(app.say("▶ Start Ads").await, "✅ Ads started");
    settle().await;
    assert_eq!(
        transport.sends(),
        vec![("@a".into(), "hi".into()), ("@b".into(), "hi".into())]
    );

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(transport.sends().len(), 4);

    let status = app.say("📊 Status").await;
    assert!(status.starts_with("Chats: 2\nInterval: 5s\nRunning: true\nMessage:\nhi"));
    assert!(status.contains("Sent: 4"));

    assert_eq!(app.say("⏹ Stop Ads").await, "✅ Ads stopped");
    settle().await;
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(transport.sends().len(), 4);
    assert!(!app.broadcast.is_running(OP).await);
}

#[tokio::test]
async fn restart_between_code_request_and_code_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let data_file = dir.path().join("data.json");
    let transport = ScriptedTransport::default();

    {
        let app = boot(&data_file, &transport).await;
        app.say("/login").await;
        app.say("+10000000000").await;
        assert_eq!(app.state().await, ConversationState::AwaitingOtp);
    }

    let app = boot(&data_file, &transport).await;
    assert_eq!(app.state().await, ConversationState::AwaitingOtp);
    let reply = app.say(&format!("code{CODE}")).await;
    assert!(reply.starts_with("❌ Login failed"), "got {reply}");
    assert_eq!(app.state().await, ConversationState::None);
    assert!(app.store.get(OP).await.unwrap().phone.is_none());
    assert!(!transport.is_authorized(OP));
}

#[tokio::test(start_paused = true)]
async fn broadcasting_resumes_after_restart() {
    let dir = tempfile::tempdir().unwrap();
    let data_file = dir.path().join("data.json");
    let transport = ScriptedTransport::default();
    transport.script.lock().unwrap().authorized.insert(OP);

    {
        let app = boot(&data_file, &transport).await;
        app.say("/add").await;
        app.say("@channel").await;
        app.say("/startads").await;
        settle().await;
        app.broadcast.shutdown().await;
    }
    assert_eq!(transport.sends().len(), 1);

    let app = boot(&data_file, &transport).await;
    assert!(app.store.get(OP).await.unwrap().broadcasting);
    assert_eq!(app.broadcast.resume_all().await.unwrap(), 1);
    settle().await;
    assert_eq!(transport.sends().len(), 2);
}

#[tokio::test]
async fn logout_keeps_profile_and_broadcast_flag() {
    let dir = tempfile::tempdir().unwrap();
    let transport = ScriptedTransport::default();
    let app = boot(&dir.path().join("data.json"), &transport).await;

    app.say("/login").await;
    app.say("+10000000000").await;
    app.say(&format!("code{CODE}")).await;
    app.say("/add").await;
    app.say("@x").await;
    app.say("/startads").await;

    assert_eq!(app.say("🚪 Logout").await, "Logged out");
    assert!(!transport.is_authorized(OP));
    let profile = app.store.get(OP).await.unwrap();
    assert_eq!(profile.destinations, vec!["@x".to_string()]);
    assert!(profile.broadcasting);

    app.broadcast.shutdown().await;
}

#[tokio::test]
async fn invalid_phone_resets_login() {
    let dir = tempfile::tempdir().unwrap();
    let transport = ScriptedTransport::default();
    let app = boot(&dir.path().join("data.json"), &transport).await;

    app.say("📱 Login").await;
    let reply = app.say("0000").await;
    assert!(reply.contains("Invalid phone number"), "got {reply}");
    assert_eq!(app.state().await, ConversationState::None);
}
