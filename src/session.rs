//! The streaming request/response lifecycle.
//!
//! A [`StreamSessionController`] turns one prompt into one outbound request and
//! drives the reply through the [`FrameDecoder`], the [`ResponseAccumulator`]
//! and the [`ScrollPolicy`] into a [`Renderer`], until the stream completes,
//! fails, or is cancelled through a [`SessionHandle`].
//!
//! Starting a session and running it are separate steps so the caller can
//! hold on to the handle (for a Ctrl+C handler, say) while the reply streams.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Instant;

use futures::StreamExt;

use crate::cancel::CancellationToken;
use crate::client::{GenerationRequest, OutgoingRequest};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::format::{FormattedText, ResponseAccumulator};
use crate::observability::{
    SESSIONS_CANCELLED, SESSIONS_COMPLETED, SESSIONS_FAILED, SESSIONS_REJECTED, SESSIONS_STARTED,
    STREAM_DELTAS, STREAM_DURATION, STREAM_MALFORMED, STREAM_TTFB,
};
use crate::render::Renderer;
use crate::scroll::ScrollPolicy;
use crate::sse::{Delta, FrameDecoder};

/// A prompt that is known to be worth sending.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Prompt(String);

impl Prompt {
    /// Trims `text` and rejects it if nothing is left.
    pub fn new(text: &str) -> Result<Self> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(Error::invalid_input("prompt is empty"));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// The trimmed prompt text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Prompt {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Prompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where a session is in its lifecycle.
///
/// `Completed`, `Failed` and `Cancelled` are terminal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// Created but not yet started.
    Idle,
    /// Waiting on or reading the reply.
    Active,
    /// The reply streamed to the end.
    Completed,
    /// The request or the stream failed.
    Failed(String),
    /// The user cancelled the reply.
    Cancelled,
}

impl SessionState {
    /// Returns true for states a session never leaves.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionState::Completed | SessionState::Failed(_) | SessionState::Cancelled
        )
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Idle => f.write_str("idle"),
            SessionState::Active => f.write_str("active"),
            SessionState::Completed => f.write_str("completed"),
            SessionState::Failed(message) => write!(f, "failed: {message}"),
            SessionState::Cancelled => f.write_str("cancelled"),
        }
    }
}

/// A reference to a session that can cancel it from anywhere.
#[derive(Clone, Debug)]
pub struct SessionHandle {
    id: u64,
    token: CancellationToken,
}

impl SessionHandle {
    /// The id of the session this handle refers to.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Requests cancellation. Returns false if it was already requested.
    pub fn cancel(&self) -> bool {
        self.token.cancel()
    }

    /// Returns true once cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Generation parameters sent with every request.
#[derive(Clone, Debug, PartialEq)]
pub struct GenerationParams {
    /// Model identifier.
    pub model: String,
    /// Upper bound on generated tokens.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
}

impl GenerationParams {
    /// Takes the generation parameters out of a resolved configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        }
    }
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// One request/response cycle.
#[derive(Debug)]
pub struct Session {
    id: u64,
    prompt: Prompt,
    accumulator: ResponseAccumulator,
    state: SessionState,
    error: Option<Error>,
    token: Option<CancellationToken>,
    guard: Option<ActiveGuard>,
    scroll: ScrollPolicy,
    content_deltas: u64,
    malformed_records: u64,
    bytes_received: u64,
}

impl Session {
    fn new(id: u64, prompt: Prompt) -> Self {
        Self {
            id,
            prompt,
            accumulator: ResponseAccumulator::new(),
            state: SessionState::Idle,
            error: None,
            token: None,
            guard: None,
            scroll: ScrollPolicy::new(),
            content_deltas: 0,
            malformed_records: 0,
            bytes_received: 0,
        }
    }

    /// The session id, unique per controller.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The prompt this session sends.
    pub fn prompt(&self) -> &Prompt {
        &self.prompt
    }

    /// The reply text received so far.
    pub fn text(&self) -> &str {
        self.accumulator.text()
    }

    /// The reply received so far, formatted for display.
    pub fn formatted(&self) -> FormattedText {
        self.accumulator.formatted()
    }

    /// The current lifecycle state.
    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// The error that failed the session, if it failed.
    pub fn error(&self) -> Option<&Error> {
        self.error.as_ref()
    }

    /// Returns true once the session can make no further progress.
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// A handle that cancels this session, or `None` once it is terminal.
    pub fn handle(&self) -> Option<SessionHandle> {
        self.token.as_ref().map(|token| SessionHandle {
            id: self.id,
            token: token.clone(),
        })
    }

    /// Number of content deltas applied.
    pub fn content_deltas(&self) -> u64 {
        self.content_deltas
    }

    /// Number of records skipped because they could not be parsed.
    pub fn malformed_records(&self) -> u64 {
        self.malformed_records
    }

    /// Number of body bytes read from the backend.
    pub fn bytes_received(&self) -> u64 {
        self.bytes_received
    }

    /// Converts a terminal session into its reply text or the reason there is
    /// none.
    pub fn into_result(self) -> Result<String> {
        match self.state {
            SessionState::Completed => Ok(self.accumulator.text().to_string()),
            SessionState::Cancelled => Err(Error::abort("message interrupted")),
            SessionState::Failed(message) => {
                Err(self.error.unwrap_or_else(|| Error::streaming(message, None)))
            }
            SessionState::Idle | SessionState::Active => {
                Err(Error::invalid_input("session has not finished"))
            }
        }
    }
}

type ActiveSlot = Mutex<Option<SessionHandle>>;

/// A started session's claim on its controller's active slot.
///
/// Dropping it releases the slot if the session still holds it. A session
/// dropped before it finished is cancelled as well.
#[derive(Debug)]
struct ActiveGuard {
    slot: Weak<ActiveSlot>,
    handle: SessionHandle,
    finished: bool,
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        if !self.finished && self.handle.cancel() {
            tracing::debug!(session = self.handle.id, "session dropped before it finished");
        }
        if let Some(slot) = self.slot.upgrade() {
            let mut active = lock(&slot);
            if active.as_ref().is_some_and(|handle| handle.id == self.handle.id) {
                *active = None;
            }
        }
    }
}

enum Outcome {
    Completed,
    Failed(Error),
    Cancelled,
}

/// Drives sessions against one backend.
///
/// At most one session is active at a time: starting a new one cancels the
/// previous one. `start` and `cancel` take `&self`, so the controller can be
/// shared (behind an `Arc`) with whatever observes user interrupts.
pub struct StreamSessionController<B: OutgoingRequest> {
    backend: B,
    params: Mutex<GenerationParams>,
    active: Arc<ActiveSlot>,
    next_id: AtomicU64,
}

impl<B: OutgoingRequest> StreamSessionController<B> {
    /// Creates a controller with default generation parameters.
    pub fn new(backend: B) -> Self {
        Self::with_params(backend, GenerationParams::default())
    }

    /// Creates a controller with the given generation parameters.
    pub fn with_params(backend: B, params: GenerationParams) -> Self {
        Self {
            backend,
            params: Mutex::new(params),
            active: Arc::new(Mutex::new(None)),
            next_id: AtomicU64::new(1),
        }
    }

    /// The backend requests are sent to.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// The parameters the next request will carry.
    pub fn params(&self) -> GenerationParams {
        lock(&self.params).clone()
    }

    /// Replaces the parameters for subsequent requests.
    pub fn set_params(&self, params: GenerationParams) {
        *lock(&self.params) = params;
    }

    /// The handle of the active session, if any.
    pub fn active(&self) -> Option<SessionHandle> {
        lock(&self.active).clone()
    }

    /// Validates `prompt` and creates an active session for it.
    ///
    /// Any session still active is cancelled first. No request is issued
    /// until [`Self::run`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the prompt is empty after trimming.
    pub fn start(&self, prompt: &str) -> Result<Session> {
        let prompt = Prompt::new(prompt).inspect_err(|_| {
            SESSIONS_REJECTED.click();
            tracing::debug!("rejected empty prompt");
        })?;
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();
        let handle = SessionHandle {
            id,
            token: token.clone(),
        };
        if let Some(prior) = lock(&self.active).replace(handle.clone())
            && prior.cancel()
        {
            tracing::debug!(session = prior.id, "cancelled superseded session");
        }
        let mut session = Session::new(id, prompt);
        session.token = Some(token);
        session.guard = Some(ActiveGuard {
            slot: Arc::downgrade(&self.active),
            handle,
            finished: false,
        });
        session.state = SessionState::Active;
        SESSIONS_STARTED.click();
        tracing::debug!(session = id, "session started");
        Ok(session)
    }

    /// Issues the session's request and streams the reply into `renderer`
    /// until the session reaches a terminal state.
    ///
    /// A session that is not active is returned unchanged.
    pub async fn run<R: Renderer + ?Sized>(&self, mut session: Session, renderer: &mut R) -> Session {
        if session.state != SessionState::Active {
            return session;
        }
        let Some(token) = session.token.clone() else {
            return session;
        };

        renderer.set_send_control_mode(true);
        renderer.set_input_enabled(false);
        renderer.show_user_message(session.prompt.as_str());
        renderer.show_assistant_placeholder();
        session.scroll.on_new_message();

        let started = Instant::now();
        let outcome = self.drive(&mut session, &token, renderer).await;
        STREAM_DURATION.add(started.elapsed().as_secs_f64());
        self.finish(&mut session, outcome, renderer);
        session
    }

    /// Starts a session for `prompt` and runs it to completion.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the prompt is empty after trimming.
    /// Failures after the session starts are reported through its state.
    pub async fn send<R: Renderer + ?Sized>(&self, prompt: &str, renderer: &mut R) -> Result<Session> {
        let session = self.start(prompt)?;
        Ok(self.run(session, renderer).await)
    }

    /// Cancels the session behind `handle`. Calling it again, or on a session
    /// that already finished, does nothing.
    pub fn cancel(&self, handle: &SessionHandle) {
        if handle.cancel() {
            tracing::debug!(session = handle.id, "cancellation requested");
        }
    }

    /// Cancels whichever session is active. Returns true if there was one.
    pub fn cancel_active(&self) -> bool {
        match self.active() {
            Some(handle) => {
                self.cancel(&handle);
                true
            }
            None => false,
        }
    }

    async fn drive<R: Renderer + ?Sized>(
        &self,
        session: &mut Session,
        token: &CancellationToken,
        renderer: &mut R,
    ) -> Outcome {
        if token.is_cancelled() {
            return Outcome::Cancelled;
        }
        let params = self.params();
        let request = GenerationRequest {
            prompt: session.prompt.as_str().to_string(),
            model: params.model,
            max_tokens: params.max_tokens,
            temperature: params.temperature,
        };
        let started = Instant::now();
        let mut stream = tokio::select! {
            biased;
            _ = token.cancelled() => return Outcome::Cancelled,
            result = self.backend.send(&request) => match result {
                Ok(stream) => stream,
                Err(err) => return Outcome::Failed(err),
            },
        };

        let mut decoder = FrameDecoder::new();
        let mut first_chunk = true;
        loop {
            let chunk = tokio::select! {
                biased;
                _ = token.cancelled() => return Outcome::Cancelled,
                chunk = stream.next() => chunk,
            };
            let bytes = match chunk {
                Some(Ok(bytes)) => bytes,
                Some(Err(err)) => return Outcome::Failed(err),
                None => break,
            };
            if first_chunk {
                STREAM_TTFB.add(started.elapsed().as_secs_f64());
                first_chunk = false;
            }
            session.bytes_received += bytes.len() as u64;
            for delta in decoder.feed(&bytes) {
                if let Some(outcome) = apply(session, delta, token, renderer) {
                    return outcome;
                }
            }
        }
        drop(stream);
        for delta in decoder.finish() {
            if let Some(outcome) = apply(session, delta, token, renderer) {
                return outcome;
            }
        }
        Outcome::Completed
    }

    fn finish<R: Renderer + ?Sized>(&self, session: &mut Session, outcome: Outcome, renderer: &mut R) {
        match outcome {
            Outcome::Completed => {
                SESSIONS_COMPLETED.click();
                tracing::debug!(
                    session = session.id,
                    deltas = session.content_deltas,
                    bytes = session.bytes_received,
                    "session completed"
                );
                session.state = SessionState::Completed;
                renderer.finish_response();
            }
            Outcome::Failed(err) => {
                SESSIONS_FAILED.click();
                tracing::error!(session = session.id, error = %err, "session failed");
                let message = err.to_string();
                renderer.show_assistant_error(&message);
                session.state = SessionState::Failed(message);
                session.error = Some(err);
            }
            Outcome::Cancelled => {
                SESSIONS_CANCELLED.click();
                tracing::debug!(
                    session = session.id,
                    kept = session.accumulator.text().len(),
                    "session cancelled"
                );
                session.state = SessionState::Cancelled;
                renderer.show_cancelled_notice();
            }
        }
        renderer.set_input_enabled(true);
        renderer.set_send_control_mode(false);

        session.token = None;
        if let Some(mut guard) = session.guard.take() {
            guard.finished = true;
        }
    }
}

/// Applies one delta. Returns the outcome if the session is over.
fn apply<R: Renderer + ?Sized>(
    session: &mut Session,
    delta: Delta,
    token: &CancellationToken,
    renderer: &mut R,
) -> Option<Outcome> {
    if token.is_cancelled() {
        return Some(Outcome::Cancelled);
    }
    match delta {
        Delta::Content(text) => {
            session.content_deltas += 1;
            STREAM_DELTAS.click();
            let formatted = session.accumulator.append(&text);
            if renderer.take_user_scroll() {
                session.scroll.on_user_scroll(&renderer.viewport_state());
            }
            renderer.update_assistant_message(&formatted, session.scroll.follows());
            None
        }
        Delta::Done => {
            if session.content_deltas == 0 && session.malformed_records > 0 {
                Some(Outcome::Failed(Error::stream_parse(format!(
                    "stream ended after {} malformed record(s) and no content",
                    session.malformed_records
                ))))
            } else {
                Some(Outcome::Completed)
            }
        }
        Delta::Error(err) if err.is_recoverable() => {
            session.malformed_records += 1;
            STREAM_MALFORMED.click();
            tracing::warn!(session = session.id, error = %err, "skipping malformed record");
            None
        }
        Delta::Error(err) => Some(Outcome::Failed(Error::streaming(
            format!("backend reported: {}", err.message),
            None,
        ))),
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;

    use bytes::Bytes;
    use futures::stream;

    use super::*;
    use crate::client::ByteStream;
    use crate::scroll::ViewportState;

    #[derive(Default)]
    struct Chunks {
        chunks: Vec<&'static str>,
        calls: Arc<AtomicUsize>,
        prompts: Arc<Mutex<Vec<String>>>,
    }

    impl Chunks {
        fn new(chunks: Vec<&'static str>) -> Self {
            Self {
                chunks,
                ..Self::default()
            }
        }
    }

    #[async_trait::async_trait]
    impl OutgoingRequest for Chunks {
        async fn send(&self, request: &GenerationRequest) -> Result<ByteStream> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            lock(&self.prompts).push(request.prompt.clone());
            let items = self
                .chunks
                .iter()
                .map(|chunk| Ok(Bytes::from_static(chunk.as_bytes())))
                .collect::<Vec<Result<Bytes>>>();
            Ok(Box::pin(stream::iter(items)))
        }
    }

    #[derive(Default)]
    struct Log {
        calls: Vec<String>,
        scrolled: Option<ViewportState>,
    }

    impl Renderer for Log {
        fn show_user_message(&mut self, text: &str) {
            self.calls.push(format!("user:{text}"));
        }

        fn show_assistant_placeholder(&mut self) {
            self.calls.push("placeholder".to_string());
        }

        fn update_assistant_message(&mut self, text: &FormattedText, follow: bool) {
            self.calls.push(format!("update:{text}:{follow}"));
        }

        fn finish_response(&mut self) {
            self.calls.push("finish".to_string());
        }

        fn show_assistant_error(&mut self, message: &str) {
            self.calls.push(format!("error:{message}"));
        }

        fn show_cancelled_notice(&mut self) {
            self.calls.push("cancelled".to_string());
        }

        fn set_input_enabled(&mut self, enabled: bool) {
            self.calls.push(format!("input:{enabled}"));
        }

        fn set_send_control_mode(&mut self, sending: bool) {
            self.calls.push(format!("sending:{sending}"));
        }

        fn viewport_state(&self) -> ViewportState {
            self.scrolled.unwrap_or_default()
        }

        fn take_user_scroll(&mut self) -> bool {
            self.scrolled.is_some()
        }
    }

    #[test]
    fn prompt_is_trimmed() {
        assert_eq!(Prompt::new("  hi \n").unwrap().as_str(), "hi");
        assert!(Prompt::new(" \t\n").unwrap_err().is_invalid_input());
        assert!(Prompt::new("").unwrap_err().is_invalid_input());
    }

    #[test]
    fn terminal_states() {
        assert!(!SessionState::Idle.is_terminal());
        assert!(!SessionState::Active.is_terminal());
        assert!(SessionState::Completed.is_terminal());
        assert!(SessionState::Failed("x".to_string()).is_terminal());
        assert!(SessionState::Cancelled.is_terminal());
    }

    #[test]
    fn start_rejects_blank_prompt_without_request() {
        let backend = Chunks::default();
        let calls = backend.calls.clone();
        let controller = StreamSessionController::new(backend);
        assert!(controller.start("   ").unwrap_err().is_invalid_input());
        assert!(controller.active().is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn start_supersedes_active_session() {
        let controller = StreamSessionController::new(Chunks::default());
        let first = controller.start("one").unwrap();
        let first_handle = first.handle().unwrap();
        let second = controller.start("two").unwrap();
        assert!(first_handle.is_cancelled());
        assert_ne!(first.id(), second.id());
        assert_eq!(controller.active().unwrap().id(), second.id());
        assert_eq!(second.state(), &SessionState::Active);
    }

    #[tokio::test]
    async fn streams_to_completion_in_order() {
        let backend = Chunks::new(vec![
            "data: {\"content\":\"Hi\"}\n\n",
            "data: {\"content\":\" there\"}\n\ndata: [DONE]\n\n",
        ]);
        let calls = backend.calls.clone();
        let prompts = backend.prompts.clone();
        let controller = StreamSessionController::new(backend);
        let mut log = Log::default();
        let session = controller.send("  hello ", &mut log).await.unwrap();

        assert_eq!(session.state(), &SessionState::Completed);
        assert_eq!(session.text(), "Hi there");
        assert!(session.handle().is_none());
        assert!(controller.active().is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(*lock(&prompts), vec!["hello".to_string()]);
        assert_eq!(
            log.calls,
            vec![
                "sending:true",
                "input:false",
                "user:hello",
                "placeholder",
                "update:Hi:true",
                "update:Hi there:true",
                "finish",
                "input:true",
                "sending:false",
            ]
        );
    }

    #[tokio::test]
    async fn backend_error_record_fails_session() {
        let backend = Chunks::new(vec![
            "data: {\"content\":\"par\"}\n",
            "data: {\"error\":{\"message\":\"overloaded\"}}\n",
            "data: {\"content\":\"never\"}\n",
        ]);
        let controller = StreamSessionController::new(backend);
        let mut log = Log::default();
        let session = controller.send("q", &mut log).await.unwrap();
        match session.state() {
            SessionState::Failed(message) => assert!(message.contains("overloaded")),
            other => panic!("unexpected state {other:?}"),
        }
        assert_eq!(session.text(), "par");
        assert!(log.calls.iter().any(|call| call.starts_with("error:")));
        assert_eq!(log.calls.last().map(String::as_str), Some("sending:false"));
    }

    #[tokio::test]
    async fn malformed_records_are_skipped() {
        let backend = Chunks::new(vec!["data: {oops\ndata: {\"content\":\"ok\"}\n"]);
        let controller = StreamSessionController::new(backend);
        let session = controller.send("q", &mut Log::default()).await.unwrap();
        assert_eq!(session.state(), &SessionState::Completed);
        assert_eq!(session.text(), "ok");
        assert_eq!(session.malformed_records(), 1);
    }

    #[tokio::test]
    async fn only_malformed_records_fails() {
        let backend = Chunks::new(vec!["data: nope\n\ndata: {also nope\n\n"]);
        let controller = StreamSessionController::new(backend);
        let session = controller.send("q", &mut Log::default()).await.unwrap();
        assert!(session.error().unwrap().is_stream_parse());
        assert!(matches!(session.state(), SessionState::Failed(_)));
    }

    #[tokio::test]
    async fn empty_stream_completes_empty() {
        let controller = StreamSessionController::new(Chunks::default());
        let session = controller.send("q", &mut Log::default()).await.unwrap();
        assert_eq!(session.state(), &SessionState::Completed);
        assert_eq!(session.text(), "");
        assert_eq!(session.into_result().unwrap(), "");
    }

    #[tokio::test]
    async fn cancelled_before_run_sends_nothing() {
        let backend = Chunks::new(vec!["data: {\"content\":\"x\"}\n"]);
        let calls = backend.calls.clone();
        let controller = StreamSessionController::new(backend);
        let session = controller.start("q").unwrap();
        controller.cancel(&session.handle().unwrap());
        let mut log = Log::default();
        let session = controller.run(session, &mut log).await;
        assert_eq!(session.state(), &SessionState::Cancelled);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(log.calls.contains(&"cancelled".to_string()));
        assert!(session.into_result().unwrap_err().is_abort());
    }

    #[tokio::test]
    async fn run_ignores_finished_session() {
        let controller = StreamSessionController::new(Chunks::default());
        let session = controller.send("q", &mut Log::default()).await.unwrap();
        let mut log = Log::default();
        let session = controller.run(session, &mut log).await;
        assert_eq!(session.state(), &SessionState::Completed);
        assert!(log.calls.is_empty());
    }

    #[tokio::test]
    async fn user_scroll_stops_following() {
        let backend = Chunks::new(vec!["data: {\"content\":\"a\"}\n"]);
        let controller = StreamSessionController::new(backend);
        let mut log = Log {
            scrolled: Some(ViewportState::new(0.0, 1000.0, 200.0)),
            ..Log::default()
        };
        controller.send("q", &mut log).await.unwrap();
        assert!(log.calls.contains(&"update:a:false".to_string()));
    }

    #[tokio::test]
    async fn params_are_sent() {
        struct Capture(Arc<Mutex<Option<GenerationRequest>>>);

        #[async_trait::async_trait]
        impl OutgoingRequest for Capture {
            async fn send(&self, request: &GenerationRequest) -> Result<ByteStream> {
                *lock(&self.0) = Some(request.clone());
                Ok(Box::pin(stream::empty::<Result<Bytes>>()))
            }
        }

        let seen = Arc::new(Mutex::new(None));
        let controller = StreamSessionController::new(Capture(seen.clone()));
        controller.set_params(GenerationParams {
            model: "tiny".to_string(),
            max_tokens: 32,
            temperature: 0.1,
        });
        controller.send("q", &mut Log::default()).await.unwrap();
        let request = lock(&seen).clone().unwrap();
        assert_eq!(request.model, "tiny");
        assert_eq!(request.max_tokens, 32);
        assert_eq!(request.temperature, 0.1);
    }
}
