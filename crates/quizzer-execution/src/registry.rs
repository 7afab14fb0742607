//! Registry of live sessions keyed by join code.

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use metrics::{counter, gauge};
use quizzer_core::{QuizId, QuizStore, UserId};
use quizzer_settings::ExecutionSettings;
use rand::Rng;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::connection::QUIZ_EXPIRED;
use crate::error::{ExecutionError, Result};
use crate::metrics::{EXECUTIONS_ACTIVE, EXECUTIONS_CREATED_TOTAL, EXECUTIONS_SWEPT_TOTAL};
use crate::session::{SessionHandle, SessionState};

/// Source of candidate join codes.
pub trait CodeSource: Send + Sync {
    /// Draw one candidate code.
    fn draw(&self) -> String;
}

/// Uniform random numeric codes of a fixed width.
#[derive(Clone, Copy, Debug)]
pub struct RandomCodes {
    digits: u32,
}

impl RandomCodes {
    /// Codes of `digits` decimal digits, without a leading zero.
    pub fn new(digits: u32) -> Self {
        Self {
            digits: digits.clamp(1, 18),
        }
    }
}

impl CodeSource for RandomCodes {
    fn draw(&self) -> String {
        let low = 10_u64.pow(self.digits - 1);
        let high = 10_u64.pow(self.digits);
        rand::rng().random_range(low..high).to_string()
    }
}

/// Process-wide map of join code to session.
pub struct ExecutionRegistry {
    sessions: DashMap<String, SessionHandle>,
    store: Arc<dyn QuizStore>,
    settings: ExecutionSettings,
    codes: Box<dyn CodeSource>,
    shutdown: CancellationToken,
}

impl ExecutionRegistry {
    /// Registry drawing random codes of `settings.code_digits` digits.
    pub fn new(store: Arc<dyn QuizStore>, settings: ExecutionSettings) -> Self {
        let codes = RandomCodes::new(settings.code_digits);
        Self::with_code_source(store, settings, Box::new(codes))
    }

    /// Registry drawing codes from `codes`.
    pub fn with_code_source(
        store: Arc<dyn QuizStore>,
        settings: ExecutionSettings,
        codes: Box<dyn CodeSource>,
    ) -> Self {
        Self {
            sessions: DashMap::new(),
            store,
            settings,
            codes,
            shutdown: CancellationToken::new(),
        }
    }

    /// Fetch the quiz, its questions, and the host, then start a session
    /// under a fresh join code.
    #[instrument(skip(self), fields(quiz_id = %quiz_id, host_id = %host_id))]
    pub async fn create_execution(&self, quiz_id: &QuizId, host_id: &UserId) -> Result<String> {
        let quiz = self.store.get_quiz(quiz_id).await?;
        let questions = self.store.list_questions(quiz_id).await?;
        let host = self.store.get_user(host_id).await?;

        let attempts = self.settings.code_attempts;
        for attempt in 1..=attempts {
            let code = self.codes.draw();
            let Entry::Vacant(slot) = self.sessions.entry(code.clone()) else {
                debug!(attempt, "join code collision, redrawing");
                continue;
            };
            let state = SessionState::new(code.clone(), quiz, questions, host);
            let _ = slot.insert(SessionHandle::spawn(state, &self.settings));

            counter!(EXECUTIONS_CREATED_TOTAL).increment(1);
            self.record_active();
            info!(code, attempt, "execution created");
            return Ok(code);
        }

        warn!(attempts, "join code space exhausted");
        Err(ExecutionError::CodeExhausted { attempts })
    }

    /// Look up a live session.
    pub fn get_execution(&self, code: &str) -> Result<SessionHandle> {
        self.sessions
            .get(code)
            .filter(|handle| !handle.is_done())
            .map(|handle| handle.clone())
            .ok_or_else(|| ExecutionError::execution_not_found(code))
    }

    /// Remove sessions that are done or older than the TTL, closing the
    /// connections of those still running. Returns how many were removed.
    pub async fn sweep(&self) -> usize {
        let ttl = self.settings.session_ttl();
        let stale: Vec<String> = self
            .sessions
            .iter()
            .filter(|entry| entry.is_done() || entry.age() > ttl)
            .map(|entry| entry.key().clone())
            .collect();

        let mut removed = 0;
        for code in stale {
            let Some((code, handle)) = self.sessions.remove(&code) else {
                continue;
            };
            removed += 1;
            if handle.is_done() {
                debug!(code, "swept finished execution");
                continue;
            }
            info!(code, age_secs = handle.age().as_secs(), "execution expired");
            if let Err(e) = handle.close(QUIZ_EXPIRED).await {
                warn!(code, error = %e, "failed to close expired execution");
            }
        }

        if removed > 0 {
            counter!(EXECUTIONS_SWEPT_TOTAL).increment(removed as u64);
            self.record_active();
        }
        removed
    }

    /// Run [`sweep`](Self::sweep) every `sweep_interval` until
    /// [`shutdown`](Self::shutdown).
    pub fn spawn_sweeper(self: &Arc<Self>) -> JoinHandle<()> {
        let registry = Arc::clone(self);
        let period = self.settings.sweep_interval();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    () = registry.shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        let removed = registry.sweep().await;
                        if removed > 0 {
                            debug!(removed, remaining = registry.len(), "sweep complete");
                        }
                    }
                }
            }
            debug!("sweeper stopped");
        })
    }

    /// Stop the sweeper. Running sessions are left alone.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Whether [`shutdown`](Self::shutdown) was called.
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Number of registered sessions, including finished ones not yet swept.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether no sessions are registered.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    #[allow(clippy::cast_precision_loss)]
    fn record_active(&self) {
        gauge!(EXECUTIONS_ACTIVE).set(self.sessions.len() as f64);
    }
}
