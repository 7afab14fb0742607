//! Execution session: state machine, actor loop, and auto-advance timer.
//!
//! [`SessionState`] holds every mutable field of one running quiz and exposes
//! the transitions as plain synchronous methods. A single actor task owns the
//! state and applies commands from its mailbox one at a time, so client
//! messages, disconnects, and timer ticks are totally ordered and every
//! broadcast sees a fully applied transition.

use std::collections::HashMap;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use metrics::counter;
use quizzer_core::{ConnectionId, ParticipantId, Question, QuestionId, Quiz, User};
use quizzer_settings::ExecutionSettings;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::broadcast;
use crate::connection::{ClientConnection, QUIZ_END, QUIZ_EXPIRED};
use crate::error::{ExecutionError, Result};
use crate::metrics::AUTO_ADVANCE_TOTAL;
use crate::protocol::ClientMessage;
use crate::scorer;

/// Session phase.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Waiting for the host to start.
    #[default]
    Lobby,
    /// Accepting answers for the current question.
    Question,
    /// Showing tallies for the questions completed so far.
    Results,
    /// Torn down.
    Closed,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Lobby => "lobby",
            Self::Question => "question",
            Self::Results => "results",
            Self::Closed => "closed",
        })
    }
}

/// Who triggered a transition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Origin {
    /// A client connection.
    Connection(ConnectionId),
    /// The auto-advance timer.
    Timer,
}

/// A joined player.
#[derive(Debug)]
pub struct Participant {
    /// Client-supplied id.
    pub id: ParticipantId,
    /// Display name.
    pub name: String,
    /// The participant's connection.
    pub conn: Arc<ClientConnection>,
    /// Submitted answers by question. Entries are never removed.
    pub answers: HashMap<QuestionId, String>,
}

/// What a departing connection was bound to.
#[derive(Debug, PartialEq, Eq)]
pub enum Departure {
    /// The host connection.
    Host,
    /// A participant, now removed.
    Participant(ParticipantId),
    /// Nothing: the connection never joined.
    Unbound,
}

/// Read-only summary of a session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    /// Join code.
    pub code: String,
    /// Current phase.
    pub phase: Phase,
    /// Number of completed questions.
    pub current_index: usize,
    /// Number of questions in the quiz.
    pub total_questions: usize,
    /// Participant names in join order.
    pub participant_names: Vec<String>,
    /// Whether a host connection is bound.
    pub host_connected: bool,
    /// Whether the session has been torn down.
    pub done: bool,
}

/// All mutable state of one session.
#[derive(Debug)]
pub struct SessionState {
    code: String,
    quiz: Quiz,
    questions: Vec<Question>,
    host: User,
    host_conn: Option<Arc<ClientConnection>>,
    participants: Vec<Participant>,
    phase: Phase,
    current_index: usize,
}

impl SessionState {
    /// A fresh session in `Lobby`.
    pub fn new(code: String, quiz: Quiz, questions: Vec<Question>, host: User) -> Self {
        Self {
            code,
            quiz,
            questions,
            host,
            host_conn: None,
            participants: Vec::new(),
            phase: Phase::Lobby,
            current_index: 0,
        }
    }

    /// Join code.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// The quiz being played.
    pub fn quiz(&self) -> &Quiz {
        &self.quiz
    }

    /// Questions in play order.
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    /// The host user.
    pub fn host(&self) -> &User {
        &self.host
    }

    /// The bound host connection, if any.
    pub fn host_conn(&self) -> Option<&Arc<ClientConnection>> {
        self.host_conn.as_ref()
    }

    /// Participants in join order.
    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Number of completed questions; also the index of the question shown
    /// in the next `Question` phase.
    pub fn current_index(&self) -> usize {
        self.current_index
    }

    /// The question currently (or next) on display.
    pub fn current_question(&self) -> Option<&Question> {
        self.questions.get(self.current_index)
    }

    /// Correct answers of `participant` among completed questions.
    pub fn score(&self, participant: &Participant) -> usize {
        scorer::score(&self.questions, self.current_index, &participant.answers)
    }

    /// Participants that answered the current question.
    pub fn answered_count(&self) -> usize {
        let Some(question) = self.current_question() else {
            return 0;
        };
        self.participants
            .iter()
            .filter(|p| p.answers.contains_key(&question.id))
            .count()
    }

    /// Whether every participant answered the current question. False when
    /// there are no participants.
    pub fn all_answered(&self) -> bool {
        !self.participants.is_empty() && self.answered_count() == self.participants.len()
    }

    fn is_host(&self, conn_id: &ConnectionId) -> bool {
        self.host_conn.as_ref().is_some_and(|c| c.id == *conn_id)
    }

    fn is_bound(&self, conn_id: &ConnectionId) -> bool {
        self.is_host(conn_id) || self.participants.iter().any(|p| p.conn.id == *conn_id)
    }

    fn require_host(&self, conn_id: &ConnectionId, action: &str) -> Result<()> {
        if self.is_host(conn_id) {
            Ok(())
        } else {
            Err(ExecutionError::Forbidden(format!(
                "only the host can {action}"
            )))
        }
    }

    /// Bind `conn` as host, or add a participant.
    pub fn join(
        &mut self,
        conn: &Arc<ClientConnection>,
        id: ParticipantId,
        username: String,
    ) -> Result<()> {
        if id.is_user(&self.host.id) {
            if self.host_conn.is_some() || self.is_bound(&conn.id) {
                return Err(ExecutionError::AlreadyJoined(id));
            }
            self.host_conn = Some(Arc::clone(conn));
            info!(code = %self.code, conn_id = %conn.id, "host bound");
            return Ok(());
        }

        if self.participants.iter().any(|p| p.id == id) || self.is_bound(&conn.id) {
            return Err(ExecutionError::AlreadyJoined(id));
        }
        if self.phase != Phase::Lobby {
            return Err(ExecutionError::InvalidState(
                "the quiz has already started".into(),
            ));
        }

        info!(code = %self.code, conn_id = %conn.id, participant_id = %id, "participant joined");
        self.participants.push(Participant {
            id,
            name: username,
            conn: Arc::clone(conn),
            answers: HashMap::new(),
        });
        Ok(())
    }

    /// `Lobby` → `Question`.
    pub fn start(&mut self, conn_id: &ConnectionId) -> Result<()> {
        self.require_host(conn_id, "start the quiz")?;
        if self.phase != Phase::Lobby {
            return Err(ExecutionError::InvalidState(format!(
                "cannot start from {}",
                self.phase
            )));
        }
        if self.questions.is_empty() {
            return Err(ExecutionError::InvalidState("the quiz has no questions".into()));
        }
        self.phase = Phase::Question;
        Ok(())
    }

    /// `Question` → `Results`, completing the current question.
    pub fn finish_question(&mut self, origin: &Origin) -> Result<()> {
        if let Origin::Connection(conn_id) = origin {
            self.require_host(conn_id, "finish a question")?;
        }
        if self.phase != Phase::Question {
            return Err(ExecutionError::InvalidState("not in question phase".into()));
        }
        self.phase = Phase::Results;
        self.current_index += 1;
        Ok(())
    }

    /// `Results` → `Question` for the next question.
    pub fn next_question(&mut self, conn_id: &ConnectionId) -> Result<()> {
        self.require_host(conn_id, "move to the next question")?;
        if self.phase != Phase::Results {
            return Err(ExecutionError::InvalidState("not in results phase".into()));
        }
        if self.current_index >= self.questions.len() {
            return Err(ExecutionError::InvalidState("no more questions".into()));
        }
        self.phase = Phase::Question;
        Ok(())
    }

    /// Record (or overwrite) `id`'s answer to the current question.
    pub fn answer(&mut self, conn_id: &ConnectionId, id: &ParticipantId, answer: String) -> Result<()> {
        let Some(pos) = self.participants.iter().position(|p| p.id == *id) else {
            return Err(ExecutionError::NotFound {
                entity: "participant",
                id: id.to_string(),
            });
        };
        if self.participants[pos].conn.id != *conn_id {
            return Err(ExecutionError::Forbidden(
                "cannot answer for another participant".into(),
            ));
        }
        if self.phase != Phase::Question {
            return Err(ExecutionError::InvalidState("not in question phase".into()));
        }
        let Some(question_id) = self.current_question().map(|q| q.id.clone()) else {
            return Err(ExecutionError::InvalidState("no current question".into()));
        };
        let _ = self.participants[pos].answers.insert(question_id, answer);
        Ok(())
    }

    /// Check that `conn_id` may end the session.
    pub fn authorize_end(&self, conn_id: &ConnectionId) -> Result<()> {
        self.require_host(conn_id, "end the quiz")
    }

    /// Forget whatever `conn_id` was bound to.
    pub fn remove_connection(&mut self, conn_id: &ConnectionId) -> Departure {
        if self.is_host(conn_id) {
            return Departure::Host;
        }
        match self.participants.iter().position(|p| p.conn.id == *conn_id) {
            Some(pos) => Departure::Participant(self.participants.remove(pos).id),
            None => Departure::Unbound,
        }
    }

    /// Close every connection and enter `Closed`. Returns how many
    /// connections were closed by this call.
    pub fn close_all(&mut self, reason: &'static str) -> usize {
        self.phase = Phase::Closed;
        self.host_conn
            .iter()
            .chain(self.participants.iter().map(|p| &p.conn))
            .filter(|conn| conn.close(reason))
            .count()
    }

    /// Read-only summary.
    pub fn snapshot(&self, done: bool) -> SessionSnapshot {
        SessionSnapshot {
            code: self.code.clone(),
            phase: self.phase,
            current_index: self.current_index,
            total_questions: self.questions.len(),
            participant_names: self.participants.iter().map(|p| p.name.clone()).collect(),
            host_connected: self.host_conn.is_some(),
            done,
        }
    }

    fn apply(&mut self, conn: &Arc<ClientConnection>, message: ClientMessage) -> Result<Effect> {
        let applied = match message {
            ClientMessage::Join { id, username } => self.join(conn, id, username),
            ClientMessage::Start => self.start(&conn.id),
            ClientMessage::FinishQuestion => {
                self.finish_question(&Origin::Connection(conn.id.clone()))
            }
            ClientMessage::NextQuestion => self.next_question(&conn.id),
            ClientMessage::AnswerQuestion { id, answer } => self.answer(&conn.id, &id, answer),
            ClientMessage::End => {
                self.authorize_end(&conn.id)?;
                return Ok(Effect::Teardown);
            }
        };
        applied.map(|()| Effect::Broadcast)
    }
}

enum Effect {
    Broadcast,
    Teardown,
}

pub(crate) enum SessionCommand {
    Client {
        conn: Arc<ClientConnection>,
        message: ClientMessage,
        reply: oneshot::Sender<Result<()>>,
    },
    Disconnected {
        conn_id: ConnectionId,
    },
    AutoAdvance,
    Snapshot {
        reply: oneshot::Sender<SessionSnapshot>,
    },
    Shutdown {
        reason: &'static str,
    },
}

struct SessionActor {
    state: SessionState,
    rx: mpsc::Receiver<SessionCommand>,
    cancel: CancellationToken,
    done: Arc<AtomicBool>,
}

impl SessionActor {
    #[instrument(skip_all, fields(code = %self.state.code))]
    async fn run(mut self) {
        debug!("session actor started");
        loop {
            let command = tokio::select! {
                biased;
                command = self.rx.recv() => command,
                () = self.cancel.cancelled() => None,
            };
            let Some(command) = command else {
                self.teardown(QUIZ_EXPIRED);
                break;
            };
            if self.handle(command).is_break() {
                break;
            }
        }
        debug!("session actor stopped");
    }

    fn handle(&mut self, command: SessionCommand) -> ControlFlow<()> {
        match command {
            SessionCommand::Client {
                conn,
                message,
                reply,
            } => {
                let kind = message.kind();
                let outcome = self.state.apply(&conn, message);
                let flow = match &outcome {
                    Ok(Effect::Broadcast) => {
                        debug!(conn_id = %conn.id, kind, phase = %self.state.phase, index = self.state.current_index, "transition applied");
                        self.broadcast();
                        ControlFlow::Continue(())
                    }
                    Ok(Effect::Teardown) => {
                        info!(conn_id = %conn.id, "host ended the quiz");
                        self.teardown(QUIZ_END);
                        ControlFlow::Break(())
                    }
                    Err(e) => {
                        debug!(conn_id = %conn.id, kind, code = e.code(), error = %e, "message rejected");
                        let _ = conn.send_json(&e.to_payload());
                        ControlFlow::Continue(())
                    }
                };
                let _ = reply.send(outcome.map(|_| ()));
                flow
            }
            SessionCommand::Disconnected { conn_id } => match self.state.remove_connection(&conn_id) {
                Departure::Host => {
                    info!(conn_id = %conn_id, "host disconnected, ending quiz");
                    self.teardown(QUIZ_END);
                    ControlFlow::Break(())
                }
                Departure::Participant(participant_id) => {
                    info!(conn_id = %conn_id, participant_id = %participant_id, "participant left");
                    self.broadcast();
                    ControlFlow::Continue(())
                }
                Departure::Unbound => ControlFlow::Continue(()),
            },
            SessionCommand::AutoAdvance => {
                if self.state.phase == Phase::Question
                    && self.state.all_answered()
                    && self.state.finish_question(&Origin::Timer).is_ok()
                {
                    counter!(AUTO_ADVANCE_TOTAL).increment(1);
                    info!(index = self.state.current_index, "all participants answered, question finished");
                    self.broadcast();
                }
                ControlFlow::Continue(())
            }
            SessionCommand::Snapshot { reply } => {
                let _ = reply.send(self.state.snapshot(false));
                ControlFlow::Continue(())
            }
            SessionCommand::Shutdown { reason } => {
                self.teardown(reason);
                ControlFlow::Break(())
            }
        }
    }

    fn broadcast(&self) {
        let report = broadcast::broadcast(&self.state);
        if report.failed > 0 {
            warn!(delivered = report.delivered, failed = report.failed, "broadcast partially failed");
        }
    }

    fn teardown(&mut self, reason: &'static str) {
        self.done.store(true, Ordering::Release);
        let closed = self.state.close_all(reason);
        self.cancel.cancel();
        info!(reason, closed, "session closed");
    }
}

async fn run_auto_advance(
    tx: mpsc::Sender<SessionCommand>,
    cancel: CancellationToken,
    period: Duration,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            _ = ticker.tick() => match tx.try_send(SessionCommand::AutoAdvance) {
                Ok(()) | Err(mpsc::error::TrySendError::Full(_)) => {}
                Err(mpsc::error::TrySendError::Closed(_)) => break,
            },
        }
    }
}

/// Cloneable handle to a running session actor.
#[derive(Clone, Debug)]
pub struct SessionHandle {
    code: Arc<str>,
    tx: mpsc::Sender<SessionCommand>,
    cancel: CancellationToken,
    done: Arc<AtomicBool>,
    created_at: Instant,
}

impl SessionHandle {
    /// Spawn the actor and its auto-advance timer.
    pub fn spawn(state: SessionState, settings: &ExecutionSettings) -> Self {
        let (tx, rx) = mpsc::channel(settings.mailbox_capacity.max(1));
        let cancel = CancellationToken::new();
        let done = Arc::new(AtomicBool::new(false));
        let code: Arc<str> = Arc::from(state.code.as_str());

        let actor = SessionActor {
            state,
            rx,
            cancel: cancel.clone(),
            done: Arc::clone(&done),
        };
        drop(tokio::spawn(actor.run()));
        drop(tokio::spawn(run_auto_advance(
            tx.clone(),
            cancel.clone(),
            settings.auto_advance_interval(),
        )));

        Self {
            code,
            tx,
            cancel,
            done,
            created_at: Instant::now(),
        }
    }

    /// Join code.
    pub fn code(&self) -> &str {
        &self.code
    }

    fn closed(&self) -> ExecutionError {
        ExecutionError::Closed(self.code.to_string())
    }

    /// Apply `message` on behalf of `conn` and wait for the outcome.
    ///
    /// Rejections are also sent to `conn` as an error payload.
    pub async fn submit(&self, conn: Arc<ClientConnection>, message: ClientMessage) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(SessionCommand::Client {
                conn,
                message,
                reply,
            })
            .await
            .map_err(|_| self.closed())?;
        rx.await.map_err(|_| self.closed())?
    }

    /// Report that `conn_id` went away.
    pub async fn disconnect(&self, conn_id: ConnectionId) {
        if self
            .tx
            .send(SessionCommand::Disconnected { conn_id })
            .await
            .is_err()
        {
            debug!(code = %self.code, "disconnect after session closed");
        }
    }

    /// Current state summary.
    pub async fn snapshot(&self) -> Result<SessionSnapshot> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(SessionCommand::Snapshot { reply })
            .await
            .map_err(|_| self.closed())?;
        rx.await.map_err(|_| self.closed())
    }

    /// Close every connection with `reason` and stop the session.
    pub async fn close(&self, reason: &'static str) -> Result<()> {
        self.tx
            .send(SessionCommand::Shutdown { reason })
            .await
            .map_err(|_| self.closed())
    }

    /// Whether the session has been torn down.
    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire) || self.cancel.is_cancelled()
    }

    /// Time since creation.
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Token cancelled on teardown.
    pub fn cancelled(&self) -> &CancellationToken {
        &self.cancel
    }
}
