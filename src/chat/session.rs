//! One user conversation: condense, retrieve, synthesize, record.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::condenser::QuestionCondenser;
use super::persona::Persona;
use super::retriever::ContextRetriever;
use super::synthesizer::AnswerSynthesizer;
use super::turn::{History, Turn};
use crate::core::errors::ApiError;
use crate::history::HistoryBackend;

const MAX_QUESTION_CHARS: usize = 4000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Idle,
    AwaitingCondense,
    AwaitingRetrieval,
    AwaitingSynthesis,
}

/// Reject questions before any remote call is made. Returns the trimmed text.
pub fn validate_question(question: &str) -> Result<&str, ApiError> {
    let trimmed = question.trim();
    if trimmed.is_empty() {
        return Err(ApiError::InvalidInput("question must not be empty".to_string()));
    }
    if trimmed.chars().count() > MAX_QUESTION_CHARS {
        return Err(ApiError::InvalidInput(format!(
            "question must be at most {} characters",
            MAX_QUESTION_CHARS
        )));
    }
    Ok(trimmed)
}

/// The three stages every session runs, shared by all sessions.
pub struct ChatPipeline {
    pub condenser: QuestionCondenser,
    pub retriever: ContextRetriever,
    pub synthesizer: AnswerSynthesizer,
}

pub struct ConversationSession {
    id: String,
    persona: Persona,
    history: History,
    phase: SessionPhase,
    pipeline: Arc<ChatPipeline>,
    durable: Option<Arc<dyn HistoryBackend>>,
}

impl ConversationSession {
    pub fn new(
        id: String,
        persona: Persona,
        pipeline: Arc<ChatPipeline>,
        durable: Option<Arc<dyn HistoryBackend>>,
    ) -> Self {
        Self::with_history(id, persona, History::new(), pipeline, durable)
    }

    pub fn with_history(
        id: String,
        persona: Persona,
        history: History,
        pipeline: Arc<ChatPipeline>,
        durable: Option<Arc<dyn HistoryBackend>>,
    ) -> Self {
        Self {
            id,
            persona,
            history,
            phase: SessionPhase::Idle,
            pipeline,
            durable,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn persona(&self) -> &Persona {
        &self.persona
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Run one exchange. On success the new turn is recorded and returned;
    /// on any failure the history is left exactly as it was.
    pub async fn ask(&mut self, question: &str) -> Result<Turn, ApiError> {
        let question = validate_question(question)?.to_string();

        if self.phase != SessionPhase::Idle {
            // the previous exchange was dropped mid-flight, possibly after
            // its turn was committed durably
            warn!(session_id = %self.id, phase = ?self.phase, "resetting interrupted session");
            if let Some(durable) = &self.durable {
                self.history = History::from_turns(durable.load_turns(&self.id).await?);
            }
            self.phase = SessionPhase::Idle;
        }

        let started = Instant::now();
        let result = self.run_exchange(&question).await;
        self.phase = SessionPhase::Idle;

        match result {
            Ok(turn) => {
                info!(
                    session_id = %self.id,
                    turns = self.history.len(),
                    chunks = turn.sources.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "turn completed"
                );
                Ok(turn)
            }
            Err(e) => {
                warn!(session_id = %self.id, kind = e.kind(), error = %e, "turn failed");
                Err(e)
            }
        }
    }

    async fn run_exchange(&mut self, question: &str) -> Result<Turn, ApiError> {
        self.enter(SessionPhase::AwaitingCondense);
        let condensed = self
            .pipeline
            .condenser
            .condense(&self.history, question)
            .await?;

        self.enter(SessionPhase::AwaitingRetrieval);
        let context = self.pipeline.retriever.retrieve(&condensed).await?;

        self.enter(SessionPhase::AwaitingSynthesis);
        let answer = self
            .pipeline
            .synthesizer
            .synthesize(&self.persona, &condensed, context)
            .await?;

        let turn = Turn {
            question: question.to_string(),
            condensed_question: condensed,
            answer: answer.text,
            sources: answer.sources,
            created_at: Utc::now(),
        };

        if let Some(durable) = &self.durable {
            durable.append_turn(&self.id, &turn).await?;
        }
        self.history.append(turn.clone());
        Ok(turn)
    }

    fn enter(&mut self, phase: SessionPhase) {
        debug!(session_id = %self.id, phase = ?phase, "session phase");
        self.phase = phase;
    }
}
