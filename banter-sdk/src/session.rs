//! Session protocol: the login handshake, the bearer-token lifecycle, and
//! the listeners that route decoded envelopes to the UI collaborator.
//!
//! The token moves `unset → pending (login sent) → set`, falls back to
//! `pending` on every disconnect, and is re-fetched after every reconnect.
//! No post-message or online-users request is meaningful while the token is
//! unset; callers gate on [`Session::login_and_await_token`] at startup.

use std::sync::{Arc, Mutex, RwLock};

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::bus::EventBus;
use crate::clock::Clock;
use crate::error::{SessionError, TransportError};
use crate::handoff::Handoff;
use crate::message::{
    ChatMessage, Envelope, LoginRequest, LoginResponse, MsgType, OnlineUsersRequest,
    OnlineUsersResponse, PostMessageRequest, PostMessageResponse, Status,
};
use crate::transport::{RETRY_DELAY, ServerLink};

/// Where the session currently is in its connection/login lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Connecting,
    /// Connected; a login request is outstanding and no valid token is held.
    Authenticating,
    /// Logged in with a bearer token.
    Ready,
}

/// Terminal UI collaborator. Implementations queue the work onto their own
/// event loop; neither call blocks the protocol layer.
pub trait ChatUi: Send + Sync {
    /// Print one chat line. `is_system` selects the system styling.
    fn print_to_chat_box(&self, nickname: &str, text: &str, is_system: bool) -> anyhow::Result<()>;

    /// Replace the online-users list. An empty list clears the display.
    fn push_online_users(&self, users: Vec<String>);
}

/// Blocking stdin collaborator driving the name-collision retry loop.
pub trait NicknamePrompt: Send + Sync {
    /// Ask for a new nickname; re-prompts until the input is valid.
    fn ask_nickname(&self) -> String;
}

/// One session per process, tied to one connection.
pub struct Session {
    link: Arc<dyn ServerLink>,
    clock: Arc<dyn Clock>,
    prompt: Arc<dyn NicknamePrompt>,
    ui: RwLock<Option<Arc<dyn ChatUi>>>,
    nickname: Mutex<String>,
    token: RwLock<String>,
    state: Mutex<LinkState>,
    handoff: Handoff<String>,
}

impl Session {
    pub fn new(
        link: Arc<dyn ServerLink>,
        clock: Arc<dyn Clock>,
        prompt: Arc<dyn NicknamePrompt>,
        nickname: &str,
    ) -> Arc<Self> {
        Arc::new(Self {
            link,
            clock,
            prompt,
            ui: RwLock::new(None),
            nickname: Mutex::new(nickname.to_string()),
            token: RwLock::new(String::new()),
            state: Mutex::new(LinkState::Disconnected),
            handoff: Handoff::new(),
        })
    }

    /// Register every session listener on the bus. Must run before the
    /// receive loop starts consuming; registration during active dispatch
    /// is out of contract.
    pub async fn install_handlers(self: &Arc<Self>, bus: &EventBus) {
        let sess = Arc::clone(self);
        bus.add_response_listener(Box::new(move |envelope| {
            let sess = Arc::clone(&sess);
            Box::pin(async move { sess.on_login_response(envelope).await })
        }))
        .await;

        let sess = Arc::clone(self);
        bus.add_response_listener(Box::new(move |envelope| {
            let sess = Arc::clone(&sess);
            Box::pin(async move { sess.on_chat_message(envelope).await })
        }))
        .await;

        let sess = Arc::clone(self);
        bus.add_response_listener(Box::new(move |envelope| {
            let sess = Arc::clone(&sess);
            Box::pin(async move { sess.on_post_message_response(envelope).await })
        }))
        .await;

        let sess = Arc::clone(self);
        bus.add_response_listener(Box::new(move |envelope| {
            let sess = Arc::clone(&sess);
            Box::pin(async move { sess.on_online_users(envelope).await })
        }))
        .await;

        let sess = Arc::clone(self);
        bus.add_disconnect_listener(Box::new(move |error| {
            let sess = Arc::clone(&sess);
            Box::pin(async move { sess.on_disconnect(error).await })
        }))
        .await;
    }

    /// Attach the terminal UI once it is running.
    pub fn attach_ui(&self, ui: Arc<dyn ChatUi>) {
        *self.ui.write().unwrap() = Some(ui);
    }

    /// Establish the connection, tracking the lifecycle state.
    pub async fn connect(&self) {
        self.set_state(LinkState::Connecting);
        self.link.connect().await;
        self.set_state(LinkState::Authenticating);
    }

    /// Send a login request with the current nickname. Non-blocking: the
    /// response arrives through the login-response listener.
    pub async fn login(&self) -> Result<(), SessionError> {
        let nickname = self.nickname.lock().unwrap().clone();
        let request = serde_json::to_value(LoginRequest::new(nickname))?;
        self.link.send_json(request).await?;
        Ok(())
    }

    /// Send a login request and block until the hand-off delivers a token.
    /// Used once at startup to gate the rest of the session.
    pub async fn login_and_await_token(&self) -> Result<(), SessionError> {
        let rx = self.handoff.arm();
        self.login().await?;
        let token = rx.await.map_err(|_| SessionError::HandoffDropped)?;
        self.set_token(token);
        Ok(())
    }

    /// Fire-and-forget post-message request. Failures are logged, never
    /// surfaced; the server's status lands in the response listener.
    pub async fn post_message(&self, text: &str) {
        let request = PostMessageRequest::new(self.token(), text);
        self.send_logged(&request, "send post message request").await;
    }

    /// Fire-and-forget online-users request.
    pub async fn request_online_users(&self) {
        let request = OnlineUsersRequest::new(self.token());
        self.send_logged(&request, "send online users request").await;
    }

    pub fn nickname(&self) -> String {
        self.nickname.lock().unwrap().clone()
    }

    pub fn state(&self) -> LinkState {
        *self.state.lock().unwrap()
    }

    pub fn is_ready(&self) -> bool {
        self.state() == LinkState::Ready
    }

    async fn on_login_response(&self, envelope: Envelope) {
        if envelope.msg_type() != Some(MsgType::LoginResponse) {
            return;
        }
        let resp: LoginResponse = match envelope.decode() {
            Ok(r) => r,
            Err(e) => {
                error!(error = %e, "decode login response");
                return;
            }
        };
        match resp.status {
            Status::Ok => {
                info!("login successful");
                if !self.handoff.offer(resp.token) {
                    warn!("login token arrived with no waiter armed");
                }
            }
            Status::NameTaken => {
                warn!("name is already taken");
                let prompt = Arc::clone(&self.prompt);
                let nickname = match tokio::task::spawn_blocking(move || prompt.ask_nickname()).await
                {
                    Ok(n) => n,
                    Err(e) => {
                        error!(error = %e, "nickname prompt");
                        return;
                    }
                };
                *self.nickname.lock().unwrap() = nickname;
                if let Err(e) = self.login().await {
                    error!(error = %e, "send login request");
                }
            }
            status => error!(?status, "login failed"),
        }
    }

    async fn on_chat_message(&self, envelope: Envelope) {
        if envelope.msg_type() != Some(MsgType::ChatMessage) {
            return;
        }
        let msg: ChatMessage = match envelope.decode() {
            Ok(m) => m,
            Err(e) => {
                error!(error = %e, "decode chat message");
                return;
            }
        };
        let Some(ui) = self.ui() else {
            debug!("chat message received before the UI is attached");
            return;
        };
        if let Err(e) = ui.print_to_chat_box(&msg.nickname, &msg.msg, msg.is_system) {
            error!(error = %e, "print message to chat box");
        }
    }

    async fn on_post_message_response(&self, envelope: Envelope) {
        if envelope.msg_type() != Some(MsgType::PostMessageResponse) {
            return;
        }
        let resp: PostMessageResponse = match envelope.decode() {
            Ok(r) => r,
            Err(e) => {
                error!(error = %e, "decode post message response");
                return;
            }
        };
        if !resp.status.is_ok() {
            error!(status = ?resp.status, "post message failed");
        }
    }

    async fn on_online_users(&self, envelope: Envelope) {
        if envelope.msg_type() != Some(MsgType::OnlineUsersResponse) {
            return;
        }
        let resp: OnlineUsersResponse = match envelope.decode() {
            Ok(r) => r,
            Err(e) => {
                error!(error = %e, "decode online users response");
                return;
            }
        };
        if resp.status.is_ok() {
            if let Some(ui) = self.ui() {
                ui.push_online_users(resp.users);
            }
        } else {
            error!(status = ?resp.status, "get online users failed");
        }
    }

    /// Reconnect sequence, run inline on the receive-loop task so a second
    /// disconnect cannot overlap a reconnect already in flight.
    async fn on_disconnect(self: Arc<Self>, error: Arc<TransportError>) {
        warn!(error = %error, "lost connection to server, retrying in 5 seconds");
        self.set_state(LinkState::Disconnected);
        if let Some(ui) = self.ui() {
            ui.push_online_users(Vec::new());
        }
        self.clock.sleep(RETRY_DELAY).await;
        self.connect().await;

        // Arm before the request goes out so the response cannot race the
        // waiter.
        let rx = self.handoff.arm();
        if let Err(e) = self.login().await {
            error!(error = %e, "send login request");
        }
        let sess = Arc::clone(&self);
        tokio::spawn(async move {
            if let Ok(token) = rx.await {
                sess.set_token(token);
            }
        });
    }

    async fn send_logged<T: Serialize>(&self, message: &T, context: &str) {
        let value = match serde_json::to_value(message) {
            Ok(v) => v,
            Err(e) => {
                error!(error = %e, "{context}");
                return;
            }
        };
        if let Err(e) = self.link.send_json(value).await {
            error!(error = %e, "{context}");
        }
    }

    fn ui(&self) -> Option<Arc<dyn ChatUi>> {
        self.ui.read().unwrap().clone()
    }

    fn token(&self) -> String {
        self.token.read().unwrap().clone()
    }

    fn set_token(&self, token: String) {
        *self.token.write().unwrap() = token;
        self.set_state(LinkState::Ready);
    }

    fn set_state(&self, state: LinkState) {
        *self.state.lock().unwrap() = state;
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::time::Duration;

    use async_trait::async_trait;
    use serde_json::Value;

    use super::*;

    /// Records everything the session puts on the wire, in order, into a
    /// shared event log alongside UI activity.
    struct FakeLink {
        log: Arc<Mutex<Vec<String>>>,
        sent: Mutex<Vec<Value>>,
    }

    impl FakeLink {
        fn new(log: Arc<Mutex<Vec<String>>>) -> Arc<Self> {
            Arc::new(Self {
                log,
                sent: Mutex::new(Vec::new()),
            })
        }

        fn sent(&self) -> Vec<Value> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ServerLink for FakeLink {
        async fn send_json(&self, message: Value) -> Result<(), TransportError> {
            self.log
                .lock()
                .unwrap()
                .push(format!("send type {}", message["type"]));
            self.sent.lock().unwrap().push(message);
            Ok(())
        }

        async fn connect(&self) {
            self.log.lock().unwrap().push("connect".to_string());
        }
    }

    struct FakeClock;

    #[async_trait]
    impl Clock for FakeClock {
        async fn sleep(&self, _duration: Duration) {}
    }

    struct FakeUi {
        log: Arc<Mutex<Vec<String>>>,
        lines: Mutex<Vec<(String, String, bool)>>,
        online: Mutex<Vec<Vec<String>>>,
    }

    impl FakeUi {
        fn new(log: Arc<Mutex<Vec<String>>>) -> Arc<Self> {
            Arc::new(Self {
                log,
                lines: Mutex::new(Vec::new()),
                online: Mutex::new(Vec::new()),
            })
        }
    }

    impl ChatUi for FakeUi {
        fn print_to_chat_box(
            &self,
            nickname: &str,
            text: &str,
            is_system: bool,
        ) -> anyhow::Result<()> {
            self.lines
                .lock()
                .unwrap()
                .push((nickname.to_string(), text.to_string(), is_system));
            Ok(())
        }

        fn push_online_users(&self, users: Vec<String>) {
            self.log
                .lock()
                .unwrap()
                .push(format!("online {}", users.len()));
            self.online.lock().unwrap().push(users);
        }
    }

    struct ScriptedPrompt {
        names: Mutex<VecDeque<String>>,
    }

    impl ScriptedPrompt {
        fn new(names: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                names: Mutex::new(names.iter().map(|n| n.to_string()).collect()),
            })
        }
    }

    impl NicknamePrompt for ScriptedPrompt {
        fn ask_nickname(&self) -> String {
            self.names
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| "fallback".to_string())
        }
    }

    fn make_session(
        link: Arc<FakeLink>,
        prompt: Arc<ScriptedPrompt>,
        nickname: &str,
    ) -> Arc<Session> {
        Session::new(link, Arc::new(FakeClock), prompt, nickname)
    }

    fn response(json: &str) -> Envelope {
        Envelope::from_json(json).unwrap()
    }

    #[tokio::test]
    async fn login_sends_current_nickname() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let link = FakeLink::new(Arc::clone(&log));
        let session = make_session(Arc::clone(&link), ScriptedPrompt::new(&[]), "alice");

        session.login().await.unwrap();

        let sent = link.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0]["type"], 1);
        assert_eq!(sent[0]["nickname"], "alice");
    }

    #[tokio::test]
    async fn ok_login_delivers_token_to_the_single_waiter() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let link = FakeLink::new(Arc::clone(&log));
        let session = make_session(Arc::clone(&link), ScriptedPrompt::new(&[]), "alice");

        let waiter = Arc::clone(&session);
        let handle = tokio::spawn(async move { waiter.login_and_await_token().await });
        tokio::task::yield_now().await;

        session
            .on_login_response(response(r#"{"type":2,"token":"tok-1","status":1}"#))
            .await;

        handle.await.unwrap().unwrap();
        assert!(session.is_ready());
        assert_eq!(session.token(), "tok-1");
    }

    #[tokio::test]
    async fn name_taken_reprompts_and_sends_one_new_login() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let link = FakeLink::new(Arc::clone(&log));
        let session = make_session(Arc::clone(&link), ScriptedPrompt::new(&["bob2"]), "bob");

        session
            .on_login_response(response(r#"{"type":2,"token":"","status":3}"#))
            .await;

        let sent = link.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0]["type"], 1);
        assert_eq!(sent[0]["nickname"], "bob2");
        assert_eq!(session.nickname(), "bob2");
    }

    #[tokio::test]
    async fn other_login_rejections_are_terminal() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let link = FakeLink::new(Arc::clone(&log));
        let session = make_session(Arc::clone(&link), ScriptedPrompt::new(&["unused"]), "x");

        session
            .on_login_response(response(r#"{"type":2,"token":"","status":5}"#))
            .await;

        // No retry, no token: the session stays pending.
        assert!(link.sent().is_empty());
        assert!(!session.is_ready());
    }

    #[tokio::test]
    async fn chat_message_is_forwarded_verbatim_to_the_ui() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let link = FakeLink::new(Arc::clone(&log));
        let ui = FakeUi::new(Arc::clone(&log));
        let session = make_session(Arc::clone(&link), ScriptedPrompt::new(&[]), "alice");
        session.attach_ui(Arc::clone(&ui) as Arc<dyn ChatUi>);

        session
            .on_chat_message(response(
                r#"{"type":5,"nickname":"alice","msg":"hi","isSystem":false}"#,
            ))
            .await;

        assert_eq!(
            *ui.lines.lock().unwrap(),
            vec![("alice".to_string(), "hi".to_string(), false)]
        );
    }

    #[tokio::test]
    async fn non_ok_online_users_response_is_not_forwarded() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let link = FakeLink::new(Arc::clone(&log));
        let ui = FakeUi::new(Arc::clone(&log));
        let session = make_session(Arc::clone(&link), ScriptedPrompt::new(&[]), "alice");
        session.attach_ui(Arc::clone(&ui) as Arc<dyn ChatUi>);

        session
            .on_online_users(response(r#"{"type":7,"status":3,"users":[]}"#))
            .await;

        assert!(ui.online.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn ok_online_users_response_reaches_the_ui() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let link = FakeLink::new(Arc::clone(&log));
        let ui = FakeUi::new(Arc::clone(&log));
        let session = make_session(Arc::clone(&link), ScriptedPrompt::new(&[]), "alice");
        session.attach_ui(Arc::clone(&ui) as Arc<dyn ChatUi>);

        session
            .on_online_users(response(r#"{"type":7,"status":1,"users":["a","b"]}"#))
            .await;

        assert_eq!(
            *ui.online.lock().unwrap(),
            vec![vec!["a".to_string(), "b".to_string()]]
        );
    }

    #[tokio::test]
    async fn disconnect_clears_online_users_before_reconnect_login() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let link = FakeLink::new(Arc::clone(&log));
        let ui = FakeUi::new(Arc::clone(&log));
        let session = make_session(Arc::clone(&link), ScriptedPrompt::new(&[]), "alice");
        session.attach_ui(Arc::clone(&ui) as Arc<dyn ChatUi>);

        Arc::clone(&session)
            .on_disconnect(Arc::new(TransportError::Closed))
            .await;

        // Empty list first, then reconnect, then the login request.
        assert_eq!(
            *log.lock().unwrap(),
            vec!["online 0", "connect", "send type 1"]
        );
        assert_eq!(*ui.online.lock().unwrap(), vec![Vec::<String>::new()]);
    }

    #[tokio::test]
    async fn consecutive_disconnects_keep_the_handoff_single_slot() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let link = FakeLink::new(Arc::clone(&log));
        let session = make_session(Arc::clone(&link), ScriptedPrompt::new(&[]), "alice");

        Arc::clone(&session)
            .on_disconnect(Arc::new(TransportError::Closed))
            .await;
        Arc::clone(&session)
            .on_disconnect(Arc::new(TransportError::Closed))
            .await;

        // Two full reconnect sequences ran back to back, never overlapped.
        assert_eq!(
            *log.lock().unwrap(),
            vec!["connect", "send type 1", "connect", "send type 1"]
        );

        // Only the waiter armed by the second sequence receives the token.
        session
            .on_login_response(response(r#"{"type":2,"token":"tok-2","status":1}"#))
            .await;
        tokio::task::yield_now().await;
        assert!(session.is_ready());
        assert_eq!(session.token(), "tok-2");

        // A duplicate response finds the slot consumed and is dropped.
        session
            .on_login_response(response(r#"{"type":2,"token":"tok-3","status":1}"#))
            .await;
        tokio::task::yield_now().await;
        assert_eq!(session.token(), "tok-2");
    }

    #[tokio::test]
    async fn post_message_carries_the_session_token() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let link = FakeLink::new(Arc::clone(&log));
        let session = make_session(Arc::clone(&link), ScriptedPrompt::new(&[]), "alice");
        session.set_token("tok-9".to_string());

        session.post_message("hello").await;
        session.request_online_users().await;

        let sent = link.sent();
        assert_eq!(sent[0]["type"], 3);
        assert_eq!(sent[0]["token"], "tok-9");
        assert_eq!(sent[0]["msg"], "hello");
        assert_eq!(sent[1]["type"], 6);
        assert_eq!(sent[1]["token"], "tok-9");
    }

    #[tokio::test]
    async fn listeners_ignore_envelopes_of_other_types() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let link = FakeLink::new(Arc::clone(&log));
        let ui = FakeUi::new(Arc::clone(&log));
        let session = make_session(Arc::clone(&link), ScriptedPrompt::new(&[]), "alice");
        session.attach_ui(Arc::clone(&ui) as Arc<dyn ChatUi>);

        let chat = response(r#"{"type":5,"nickname":"a","msg":"m","isSystem":true}"#);
        session.on_login_response(chat.clone()).await;
        session.on_online_users(chat.clone()).await;
        session.on_post_message_response(chat).await;

        assert!(link.sent().is_empty());
        assert!(ui.online.lock().unwrap().is_empty());
    }
}
