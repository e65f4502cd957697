use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use shared::domain::{Epsilon, ImageKind};
use tokio::sync::{broadcast, oneshot};
use tracing::{debug, info, warn};

use crate::{
    error::SessionError,
    input::{InputController, SelectedImage},
    preview::PreviewRegistry,
    types::{AttackRequest, AttackResult},
    AttackService,
};

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const SESSION_EVENT_CAPACITY: usize = 64;

/// What the rendering surface shows. Exactly one of these is current.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SessionStatus {
    #[default]
    Idle,
    AwaitingResponse,
    Succeeded(AttackResult),
    Failed(SessionError),
}

impl SessionStatus {
    pub fn is_awaiting(&self) -> bool {
        matches!(self, SessionStatus::AwaitingResponse)
    }

    pub fn result(&self) -> Option<&AttackResult> {
        match self {
            SessionStatus::Succeeded(result) => Some(result),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&SessionError> {
        match self {
            SessionStatus::Failed(err) => Some(err),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    StatusChanged(SessionStatus),
    ImageSelected { name: String, preview_uri: String },
    EpsilonChanged(Epsilon),
    /// A submit arrived while a request was already in flight.
    SubmitIgnored,
}

#[derive(Debug, Clone, Copy)]
pub struct SessionOptions {
    /// `None` waits for the service indefinitely.
    pub request_timeout: Option<Duration>,
    pub initial_epsilon: Epsilon,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            request_timeout: Some(DEFAULT_REQUEST_TIMEOUT),
            initial_epsilon: Epsilon::DEFAULT,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageSummary {
    pub name: String,
    pub kind: ImageKind,
    pub size_bytes: usize,
    pub preview_uri: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub status: SessionStatus,
    pub epsilon: Epsilon,
    pub image: Option<ImageSummary>,
    pub can_submit: bool,
}

struct SessionState {
    input: InputController,
    status: SessionStatus,
    /// Bumped on every submit and cancellation; responses carrying an older
    /// ticket are dropped.
    generation: u64,
    cancel: Option<oneshot::Sender<()>>,
}

/// Runs one submit-and-await cycle at a time against an [`AttackService`].
pub struct AttackSession {
    service: Arc<dyn AttackService>,
    previews: PreviewRegistry,
    options: SessionOptions,
    inner: Mutex<SessionState>,
    events: broadcast::Sender<SessionEvent>,
}

impl AttackSession {
    pub fn new(service: Arc<dyn AttackService>, options: SessionOptions) -> Arc<Self> {
        Self::new_with_previews(service, PreviewRegistry::new(), options)
    }

    pub fn new_with_previews(
        service: Arc<dyn AttackService>,
        previews: PreviewRegistry,
        options: SessionOptions,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(SESSION_EVENT_CAPACITY);
        Arc::new(Self {
            service,
            previews,
            options,
            inner: Mutex::new(SessionState {
                input: InputController::new(options.initial_epsilon),
                status: SessionStatus::Idle,
                generation: 0,
                cancel: None,
            }),
            events,
        })
    }

    pub fn previews(&self) -> &PreviewRegistry {
        &self.previews
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Takes a new image. Any shown result or error is cleared, and a request
    /// still in flight for the old image is cancelled.
    pub fn select_image(&self, name: impl Into<String>, kind: ImageKind, bytes: Vec<u8>) {
        let image = SelectedImage::new(&self.previews, name, kind, bytes);
        let event = SessionEvent::ImageSelected {
            name: image.name().to_string(),
            preview_uri: image.preview().uri().to_string(),
        };

        let mut state = self.lock_state();
        if abort_in_flight(&mut state) {
            info!("attack: in-flight request cancelled by new image selection");
        }
        state.input.select_image(image);
        let _ = self.events.send(event);
        self.set_status(&mut state, SessionStatus::Idle);
    }

    /// Does not affect a request already in flight.
    pub fn set_epsilon(&self, value: f64) {
        let mut state = self.lock_state();
        state.input.set_epsilon(value);
        let _ = self
            .events
            .send(SessionEvent::EpsilonChanged(state.input.epsilon()));
    }

    pub fn epsilon(&self) -> Epsilon {
        self.lock_state().input.epsilon()
    }

    pub fn status(&self) -> SessionStatus {
        self.lock_state().status.clone()
    }

    pub fn can_submit(&self) -> bool {
        let state = self.lock_state();
        state.input.can_submit(state.status.is_awaiting())
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.lock_state();
        SessionSnapshot {
            status: state.status.clone(),
            epsilon: state.input.epsilon(),
            image: state.input.selected().map(|image| ImageSummary {
                name: image.name().to_string(),
                kind: image.kind(),
                size_bytes: image.bytes().len(),
                preview_uri: image.preview().uri().to_string(),
            }),
            can_submit: state.input.can_submit(state.status.is_awaiting()),
        }
    }

    /// Aborts the in-flight request, if any, and returns to `Idle`.
    pub fn cancel(&self) -> bool {
        let mut state = self.lock_state();
        if !abort_in_flight(&mut state) {
            return false;
        }
        info!("attack: in-flight request cancelled");
        self.set_status(&mut state, SessionStatus::Idle);
        true
    }

    /// Submits the current input and waits for the outcome.
    ///
    /// While a request is in flight this is a no-op that returns the current
    /// status. Without an image it fails validation without touching the
    /// service.
    pub async fn submit(&self) -> SessionStatus {
        let (request, ticket, cancelled) = match self.begin_submit() {
            Ok(started) => started,
            Err(status) => return status,
        };
        let request_id = request.request_id();
        let guard = InFlightGuard {
            session: self,
            ticket,
            armed: true,
        };

        info!(
            %request_id,
            epsilon = %request.epsilon(),
            image = request.image_name(),
            bytes = request.image().len(),
            "attack: submitting request"
        );

        // A finished response always reaches `finish`, where the generation
        // ticket decides whether it is still current.
        let outcome = tokio::select! {
            biased;
            result = self.call_service(request) => Some(result),
            _ = cancelled => None,
        };

        let status = match outcome {
            Some(Ok(result)) => {
                info!(
                    %request_id,
                    attack_success = result.attack_success,
                    clean = %result.clean_prediction,
                    adversarial = %result.adversarial_prediction,
                    "attack: request succeeded"
                );
                SessionStatus::Succeeded(result)
            }
            Some(Err(err)) => {
                warn!(%request_id, kind = ?err.kind(), error = ?err, "attack: request failed");
                SessionStatus::Failed(err)
            }
            None => {
                debug!(%request_id, "attack: response abandoned after cancellation");
                return guard.release();
            }
        };
        guard.finish(status)
    }

    fn begin_submit(
        &self,
    ) -> Result<(AttackRequest, u64, oneshot::Receiver<()>), SessionStatus> {
        let mut state = self.lock_state();
        if state.status.is_awaiting() {
            debug!("attack: submit ignored while a request is in flight");
            let _ = self.events.send(SessionEvent::SubmitIgnored);
            return Err(state.status.clone());
        }

        let Some(request) = state.input.build_request() else {
            warn!("attack: submit without a selected image");
            self.set_status(
                &mut state,
                SessionStatus::Failed(SessionError::NoImageSelected),
            );
            return Err(state.status.clone());
        };

        state.generation += 1;
        let (cancel_tx, cancel_rx) = oneshot::channel();
        state.cancel = Some(cancel_tx);
        self.set_status(&mut state, SessionStatus::AwaitingResponse);
        Ok((request, state.generation, cancel_rx))
    }

    async fn call_service(&self, request: AttackRequest) -> Result<AttackResult, SessionError> {
        let call = self.service.attack(request);
        match self.options.request_timeout {
            Some(after) => match tokio::time::timeout(after, call).await {
                Ok(result) => result.map_err(SessionError::from),
                Err(_) => Err(SessionError::TimedOut { after }),
            },
            None => call.await.map_err(SessionError::from),
        }
    }

    fn set_status(&self, state: &mut SessionState, status: SessionStatus) {
        state.status = status;
        let _ = self
            .events
            .send(SessionEvent::StatusChanged(state.status.clone()));
    }

    fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn abort_in_flight(state: &mut SessionState) -> bool {
    if !state.status.is_awaiting() {
        return false;
    }
    state.generation += 1;
    if let Some(cancel) = state.cancel.take() {
        let _ = cancel.send(());
    }
    true
}

/// Clears `AwaitingResponse` for its ticket however the submit future ends,
/// including when the caller drops it mid-flight.
struct InFlightGuard<'a> {
    session: &'a AttackSession,
    ticket: u64,
    armed: bool,
}

impl InFlightGuard<'_> {
    fn finish(mut self, status: SessionStatus) -> SessionStatus {
        self.armed = false;
        let mut state = self.session.lock_state();
        if state.generation == self.ticket {
            state.cancel = None;
            self.session.set_status(&mut state, status);
        }
        state.status.clone()
    }

    fn release(mut self) -> SessionStatus {
        self.armed = false;
        self.session.status()
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut state = self.session.lock_state();
        if state.generation == self.ticket && state.status.is_awaiting() {
            state.cancel = None;
            debug!("attack: submit dropped while awaiting response");
            self.session.set_status(&mut state, SessionStatus::Idle);
        }
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
