//! The verification state machine.
//!
//! [`VerificationOrchestrator`] runs as one tokio task. Its inputs are scan
//! notices from the [`ScanDecoder`], completions of its own timers and remote
//! calls, and operator commands sent through an [`OrchestratorHandle`]. Each
//! input is handled to completion before the next is looked at, so the
//! session needs no locking.
//!
//! Timers and remote calls carry the epoch they were started in. A reset
//! bumps the epoch, so a completion that arrives for an earlier session is
//! recognised and ignored.

use std::sync::Arc;
use std::time::{Duration, Instant};

use kiosk_camera::CameraResource;
use kiosk_capture::{AutoCapture, CaptureError, CapturePipeline};
use kiosk_scan::{CodeDecoder, ScanDecoder, ScanNotice};
use kiosk_types::{redact_token, CapturedImage, ScanEvent, VerificationOutcome};
use kiosk_utils::ScheduledTask;
use kiosk_verifier::{CredentialGrant, FailureCause, RemoteVerifier, VerifierError};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;

use crate::{
    KioskEvent, KioskMetrics, Session, SessionConfig, SessionError, SessionSnapshot, SessionState,
    VerificationFlow,
};

const EVENT_CAPACITY: usize = 64;
const SCAN_QUEUE: usize = 4;

enum Command {
    Dismiss,
    Retake,
    Shutdown(oneshot::Sender<()>),
}

enum Input {
    CredentialChecked {
        epoch: u64,
        result: Result<CredentialGrant, VerifierError>,
        elapsed: Duration,
    },
    CaptureFired {
        epoch: u64,
        result: Result<CapturedImage, CaptureError>,
    },
    FaceChecked {
        epoch: u64,
        result: Result<VerificationOutcome, VerifierError>,
        elapsed: Duration,
    },
    CooldownElapsed {
        epoch: u64,
    },
    ResetDue {
        epoch: u64,
    },
}

/// Everything scheduled on behalf of the current session.
#[derive(Default)]
struct Timers {
    cooldown: Option<ScheduledTask>,
    reset: Option<ScheduledTask>,
    auto_capture: Option<AutoCapture>,
    credential_call: Option<ScheduledTask>,
    face_call: Option<ScheduledTask>,
    /// Background face calls of finished sessions, left running so their
    /// outcome still gets logged.
    detached: Vec<ScheduledTask>,
}

impl Timers {
    fn clear(&mut self, detach_face_call: bool) {
        for mut task in [
            self.cooldown.take(),
            self.reset.take(),
            self.credential_call.take(),
        ]
        .into_iter()
        .flatten()
        {
            task.cancel();
        }
        if let Some(mut auto) = self.auto_capture.take() {
            auto.cancel();
        }
        self.detached.retain(|task| !task.is_finished());
        if let Some(mut call) = self.face_call.take() {
            if detach_face_call && !call.is_finished() {
                self.detached.push(call);
            } else {
                call.cancel();
            }
        }
    }

    fn shutdown(&mut self) {
        self.clear(false);
        for mut task in self.detached.drain(..) {
            task.cancel();
        }
    }
}

/// Sequences scan, credential check, face capture, face check and reset.
pub struct VerificationOrchestrator {
    config: SessionConfig,
    verifier: Arc<dyn RemoteVerifier>,
    scanner: ScanDecoder,
    capture: CapturePipeline,
    metrics: Arc<KioskMetrics>,
    session: Session,
    epoch: u64,
    events: broadcast::Sender<KioskEvent>,
    snapshot: watch::Sender<SessionSnapshot>,
    inputs: mpsc::UnboundedSender<Input>,
    scan_tx: mpsc::Sender<ScanNotice>,
    timers: Timers,
}

impl VerificationOrchestrator {
    /// Start the orchestrator on the current runtime.
    ///
    /// The scanner and the capture pipeline share `camera` and take turns
    /// holding it. The orchestrator stops when
    /// [`OrchestratorHandle::shutdown`] is called or every handle is dropped.
    pub fn spawn(
        config: SessionConfig,
        camera: CameraResource,
        decoder: Arc<dyn CodeDecoder>,
        verifier: Arc<dyn RemoteVerifier>,
        metrics: Arc<KioskMetrics>,
    ) -> (OrchestratorHandle, JoinHandle<()>) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (input_tx, input_rx) = mpsc::unbounded_channel();
        let (scan_tx, scan_rx) = mpsc::channel(SCAN_QUEUE);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let session = Session::new();
        let (snapshot_tx, snapshot_rx) = watch::channel(session.snapshot(0));

        let scanner = ScanDecoder::new(camera.clone(), decoder, config.scan_interval());
        let capture = CapturePipeline::new(camera, config.constraints.clone(), config.jpeg_quality);

        let orchestrator = Self {
            config,
            verifier,
            scanner,
            capture,
            metrics: metrics.clone(),
            session,
            epoch: 0,
            events: events.clone(),
            snapshot: snapshot_tx,
            inputs: input_tx,
            scan_tx,
            timers: Timers::default(),
        };
        let handle = OrchestratorHandle {
            commands: command_tx,
            events,
            snapshot: snapshot_rx,
            metrics,
        };
        let task = tokio::spawn(orchestrator.run(command_rx, input_rx, scan_rx));
        (handle, task)
    }

    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut inputs: mpsc::UnboundedReceiver<Input>,
        mut scans: mpsc::Receiver<ScanNotice>,
    ) {
        tracing::info!(
            variant = self.variant(),
            flow = ?self.config.flow,
            "verification orchestrator started"
        );
        self.start_scanner();
        self.publish();

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(Command::Dismiss) => self.reset("operator").await,
                    Some(Command::Retake) => self.retake(),
                    Some(Command::Shutdown(done)) => {
                        self.shutdown().await;
                        let _ = done.send(());
                        return;
                    }
                    None => {
                        self.shutdown().await;
                        return;
                    }
                },
                Some(input) = inputs.recv() => self.on_input(input).await,
                Some(notice) = scans.recv() => self.on_scan_notice(notice).await,
            }
        }
    }

    fn variant(&self) -> &'static str {
        if self.config.block_on_face_result {
            "foreground"
        } else {
            "background"
        }
    }

    fn is_current(&self, epoch: u64) -> bool {
        epoch == self.epoch
    }

    async fn on_input(&mut self, input: Input) {
        match input {
            Input::CredentialChecked {
                epoch,
                result,
                elapsed,
            } => self.on_credential_checked(epoch, result, elapsed).await,
            Input::CaptureFired { epoch, result } => self.on_capture_fired(epoch, result),
            Input::FaceChecked {
                epoch,
                result,
                elapsed,
            } => self.on_face_checked(epoch, result, elapsed),
            Input::CooldownElapsed { epoch } => self.on_cooldown_elapsed(epoch),
            Input::ResetDue { epoch } => {
                if self.is_current(epoch) {
                    self.reset("timer").await;
                }
            }
        }
    }

    // ── Scanning and the credential check ──────────────────────────────

    async fn on_scan_notice(&mut self, notice: ScanNotice) {
        match notice {
            ScanNotice::Scan(event) => self.on_scan(event).await,
            ScanNotice::Fault(e) => {
                tracing::warn!(error = %e, "scanner fault");
                self.emit(KioskEvent::CameraFault {
                    reason: e.to_string(),
                });
            }
        }
    }

    async fn on_scan(&mut self, event: ScanEvent) {
        if self.session.state != SessionState::AwaitingCredential || self.session.scan_paused {
            self.metrics.scans_dropped.inc();
            tracing::debug!(
                token = %event.redacted(),
                state = %self.session.state,
                "scan dropped"
            );
            return;
        }

        self.metrics.scans_accepted.inc();
        let token = event.raw_value;
        tracing::info!(token = %redact_token(&token), epoch = self.epoch, "scan accepted");
        self.set_scan_paused(true);
        self.session.credential_token = Some(token.clone());
        self.session.last_error = None;
        self.emit(KioskEvent::ScanAccepted {
            token: redact_token(&token),
        });

        match self.config.flow {
            VerificationFlow::TwoPhase => self.start_credential_check(token),
            VerificationFlow::Combined => self.enter_awaiting_face().await,
        }
        self.publish();
    }

    fn start_credential_check(&mut self, token: String) {
        let verifier = self.verifier.clone();
        let inputs = self.inputs.clone();
        let epoch = self.epoch;
        self.timers.credential_call = Some(ScheduledTask::spawn("credential-check", async move {
            let started = Instant::now();
            let result = verifier.verify_credential(&token).await;
            let _ = inputs.send(Input::CredentialChecked {
                epoch,
                result,
                elapsed: started.elapsed(),
            });
        }));
    }

    async fn on_credential_checked(
        &mut self,
        epoch: u64,
        result: Result<CredentialGrant, VerifierError>,
        elapsed: Duration,
    ) {
        self.metrics.observe_remote_call("credential", elapsed);
        if !self.is_current(epoch) || self.session.state != SessionState::AwaitingCredential {
            tracing::debug!(epoch, current = self.epoch, "stale credential result ignored");
            return;
        }
        self.timers.credential_call = None;

        match result {
            Ok(grant) => {
                self.metrics.credentials_granted.inc();
                tracing::info!(
                    subject_id = %grant.subject.id,
                    epoch,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "credential accepted"
                );
                self.session.subject = Some(grant.subject.clone());
                self.emit(KioskEvent::SubjectIdentified {
                    subject: grant.subject,
                });
                // The scanner stays paused: a re-read of the same badge must
                // not start a second session.
                self.enter_awaiting_face().await;
            }
            Err(e) => {
                self.metrics.credentials_rejected.inc();
                tracing::info!(cause = %e.cause(), reason = e.reason(), epoch, "credential rejected");
                self.session.last_error = Some(e.reason().to_owned());
                self.emit(KioskEvent::CredentialRejected {
                    reason: e.reason().to_owned(),
                });
                let inputs = self.inputs.clone();
                self.timers.cooldown = Some(ScheduledTask::after(
                    "cooldown",
                    self.config.cooldown(),
                    async move {
                        let _ = inputs.send(Input::CooldownElapsed { epoch });
                    },
                ));
            }
        }
        self.publish();
    }

    fn on_cooldown_elapsed(&mut self, epoch: u64) {
        if !self.is_current(epoch) || self.session.state != SessionState::AwaitingCredential {
            return;
        }
        self.timers.cooldown = None;
        self.session.credential_token = None;
        // The rejected code may be presented again and must be re-checked.
        self.scanner.reset();
        self.set_scan_paused(false);
        tracing::debug!(epoch, "cooldown elapsed, scanning resumed");
        self.publish();
    }

    // ── Face capture ────────────────────────────────────────────────────

    async fn enter_awaiting_face(&mut self) {
        if !self.advance(SessionState::AwaitingFace) {
            return;
        }
        // Hand the camera over: the scanner's handle is released before the
        // capture pipeline opens its own.
        self.scanner.stop().await;
        match self.capture.start() {
            Ok(()) => self.arm_capture(),
            Err(e) => self.capture_failed(e),
        }
    }

    fn arm_capture(&mut self) {
        let inputs = self.inputs.clone();
        let epoch = self.epoch;
        let armed = self
            .capture
            .arm_automatic_capture(self.config.capture_delay(), move |result| {
                let _ = inputs.send(Input::CaptureFired { epoch, result });
            });
        match armed {
            Ok(auto) => self.timers.auto_capture = Some(auto),
            Err(e) => self.capture_failed(e),
        }
    }

    fn capture_failed(&mut self, error: CaptureError) {
        self.metrics.capture_failures.inc();
        tracing::warn!(error = %error, epoch = self.epoch, "face capture failed");
        self.capture.teardown();
        let reason = error.to_string();
        self.session.last_error = Some(reason.clone());
        self.emit(KioskEvent::CameraFault { reason });
        if !self.config.block_on_face_result {
            self.schedule_reset(self.config.reset_delay());
        }
    }

    /// Operator re-entry into capture after a camera fault or to replace the
    /// pending shot.
    fn retake(&mut self) {
        if self.session.state != SessionState::AwaitingFace {
            tracing::debug!(state = %self.session.state, "retake ignored");
            return;
        }
        if let Some(mut auto) = self.timers.auto_capture.take() {
            auto.cancel();
        }
        if let Some(mut reset) = self.timers.reset.take() {
            reset.cancel();
        }
        self.session.last_error = None;
        tracing::info!(epoch = self.epoch, "capture retake");
        match self.capture.retake() {
            Ok(()) => self.arm_capture(),
            Err(e) => self.capture_failed(e),
        }
        self.publish();
    }

    fn on_capture_fired(&mut self, epoch: u64, result: Result<CapturedImage, CaptureError>) {
        if !self.is_current(epoch) || self.session.state != SessionState::AwaitingFace {
            tracing::debug!(epoch, current = self.epoch, "stale capture ignored");
            return;
        }
        self.timers.auto_capture = None;

        let image = match result.and_then(|_| self.capture.confirm()) {
            Ok(image) => image,
            Err(e) => {
                self.capture_failed(e);
                self.publish();
                return;
            }
        };
        tracing::info!(bytes = image.len(), epoch, "face captured");
        self.emit(KioskEvent::CaptureTaken { bytes: image.len() });
        self.session.captured_image = Some(image.clone());

        if self.advance(SessionState::VerifyingFace) {
            self.start_face_check(image);
            if !self.config.block_on_face_result {
                self.schedule_reset(self.config.reset_delay());
            }
        }
        self.publish();
    }

    // ── Face check and result ───────────────────────────────────────────

    fn start_face_check(&mut self, image: CapturedImage) {
        let verifier = self.verifier.clone();
        let inputs = self.inputs.clone();
        let epoch = self.epoch;
        let flow = self.config.flow;
        let subject = self.session.subject_id();
        let token = self.session.credential_token.clone();

        self.timers.face_call = Some(ScheduledTask::spawn("face-check", async move {
            let started = Instant::now();
            let result = match (flow, subject, token) {
                (VerificationFlow::TwoPhase, Some(subject), _) => {
                    verifier.verify_face(subject, &image).await
                }
                (VerificationFlow::Combined, _, Some(token)) => verifier.verify(&token, &image).await,
                _ => Err(VerifierError::face(
                    FailureCause::Malformed,
                    Some("No subject to verify".to_owned()),
                )),
            };
            let _ = inputs.send(Input::FaceChecked {
                epoch,
                result,
                elapsed: started.elapsed(),
            });
        }));
    }

    fn on_face_checked(
        &mut self,
        epoch: u64,
        result: Result<VerificationOutcome, VerifierError>,
        elapsed: Duration,
    ) {
        self.metrics.observe_remote_call("face", elapsed);
        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::info!(cause = %e.cause(), reason = e.reason(), epoch, "face verification failed");
                VerificationOutcome::denied(e.reason())
            }
        };
        if outcome.ok {
            self.metrics.faces_granted.inc();
        } else {
            self.metrics.faces_denied.inc();
        }
        tracing::info!(
            granted = outcome.ok,
            subject_id = ?outcome.subject.as_ref().map(|s| s.id.get()),
            epoch,
            elapsed_ms = elapsed.as_millis() as u64,
            "face verification finished"
        );

        if !self.is_current(epoch) || self.session.state != SessionState::VerifyingFace {
            return;
        }
        self.timers.face_call = None;
        self.session.result = Some(outcome.clone());
        self.emit(KioskEvent::FaceResult { outcome });

        if self.config.block_on_face_result && self.advance(SessionState::Result) {
            if let Some(display) = self.config.result_display() {
                self.schedule_reset(display);
            }
        }
        self.publish();
    }

    // ── Reset and teardown ──────────────────────────────────────────────

    fn schedule_reset(&mut self, delay: Duration) {
        let inputs = self.inputs.clone();
        let epoch = self.epoch;
        self.timers.reset = Some(ScheduledTask::after("reset", delay, async move {
            let _ = inputs.send(Input::ResetDue { epoch });
        }));
    }

    /// Discard the session and return to scanning.
    async fn reset(&mut self, trigger: &'static str) {
        let from = self.session.state;
        self.timers.clear(!self.config.block_on_face_result);
        self.capture.teardown();

        self.epoch += 1;
        self.session = Session::new();
        self.metrics.resets.inc();
        tracing::info!(trigger, from = %from, epoch = self.epoch, "session reset");
        self.emit(KioskEvent::Reset { epoch: self.epoch });
        if from != SessionState::AwaitingCredential {
            self.emit(KioskEvent::StateChanged {
                from,
                to: SessionState::AwaitingCredential,
            });
        }

        self.scanner.reset();
        self.scanner.pause(false);
        self.start_scanner();
        self.publish();
    }

    async fn shutdown(&mut self) {
        self.timers.shutdown();
        self.capture.teardown();
        self.scanner.stop().await;
        tracing::info!(epoch = self.epoch, "verification orchestrator stopped");
    }

    fn start_scanner(&mut self) {
        if let Err(e) = self
            .scanner
            .start(&self.config.constraints, self.scan_tx.clone())
        {
            tracing::warn!(error = %e, "scanner could not start");
            let reason = e.to_string();
            self.session.last_error = Some(reason.clone());
            self.emit(KioskEvent::CameraFault { reason });
        }
    }

    // ── Helpers ─────────────────────────────────────────────────────────

    fn advance(&mut self, next: SessionState) -> bool {
        match self.session.advance(next) {
            Ok(from) => {
                tracing::info!(from = %from, to = %next, epoch = self.epoch, "session transition");
                self.emit(KioskEvent::StateChanged { from, to: next });
                true
            }
            Err(e) => {
                tracing::error!(error = %e, epoch = self.epoch, "session transition refused");
                false
            }
        }
    }

    fn set_scan_paused(&mut self, paused: bool) {
        self.session.scan_paused = paused;
        self.scanner.pause(paused);
    }

    fn emit(&self, event: KioskEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn publish(&self) {
        self.snapshot.send_replace(self.session.snapshot(self.epoch));
    }
}

/// Control and observation of a running orchestrator. Cheap to clone.
#[derive(Clone)]
pub struct OrchestratorHandle {
    commands: mpsc::UnboundedSender<Command>,
    events: broadcast::Sender<KioskEvent>,
    snapshot: watch::Receiver<SessionSnapshot>,
    metrics: Arc<KioskMetrics>,
}

impl OrchestratorHandle {
    /// Reset the session from whatever state it is in.
    pub fn dismiss(&self) -> Result<(), SessionError> {
        self.commands
            .send(Command::Dismiss)
            .map_err(|_| SessionError::Stopped)
    }

    /// Re-acquire the capture camera and re-arm the automatic capture.
    /// Ignored outside `AwaitingFace`.
    pub fn retake(&self) -> Result<(), SessionError> {
        self.commands
            .send(Command::Retake)
            .map_err(|_| SessionError::Stopped)
    }

    /// Cancel every timer and call, release the camera, and stop.
    pub async fn shutdown(&self) -> Result<(), SessionError> {
        let (done, stopped) = oneshot::channel();
        self.commands
            .send(Command::Shutdown(done))
            .map_err(|_| SessionError::Stopped)?;
        stopped.await.map_err(|_| SessionError::Stopped)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<KioskEvent> {
        self.events.subscribe()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot.clone()
    }

    pub fn metrics(&self) -> &Arc<KioskMetrics> {
        &self.metrics
    }
}
