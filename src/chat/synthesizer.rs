use serde::Serialize;

use super::persona::Persona;
use super::prompts::{decline_message, system_prompt};
use crate::core::errors::ApiError;
use crate::llm::{ChatMessage, LlmService};
use crate::rag::{ContextBuilder, RetrievalResult};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    pub text: String,
    /// The chunks that were placed in the prompt.
    pub sources: RetrievalResult,
}

/// Stateless: one instance serves every session.
pub struct AnswerSynthesizer {
    llm: LlmService,
    context_builder: ContextBuilder,
}

impl AnswerSynthesizer {
    pub fn new(llm: LlmService, context_builder: ContextBuilder) -> Self {
        Self {
            llm,
            context_builder,
        }
    }

    pub async fn synthesize(
        &self,
        persona: &Persona,
        question: &str,
        context: RetrievalResult,
    ) -> Result<Answer, ApiError> {
        if context.is_empty() {
            return Ok(Answer {
                text: decline_message(persona),
                sources: context,
            });
        }

        let built = self.context_builder.build(&context);
        let messages = vec![
            ChatMessage::system(system_prompt(persona, &built.text)),
            ChatMessage::user(question),
        ];
        let text = self.llm.generate(messages).await?;
        if text.is_empty() {
            return Err(ApiError::model("answer model returned an empty reply"));
        }

        Ok(Answer {
            text,
            sources: built.used,
        })
    }
}
