use super::prompts::condense_prompt;
use super::turn::History;
use crate::core::errors::ApiError;
use crate::llm::{ChatMessage, LlmService};

/// Rewrites a follow-up question into one that stands on its own.
#[derive(Clone)]
pub struct QuestionCondenser {
    llm: LlmService,
}

impl QuestionCondenser {
    pub fn new(llm: LlmService) -> Self {
        Self { llm }
    }

    /// With no prior turns the question is returned untouched and the model
    /// is not called.
    pub async fn condense(&self, history: &History, question: &str) -> Result<String, ApiError> {
        if history.is_empty() {
            return Ok(question.to_string());
        }

        let prompt = condense_prompt(&history.transcript(), question);
        let condensed = self.llm.generate(vec![ChatMessage::user(prompt)]).await?;
        if condensed.is_empty() {
            return Err(ApiError::model("condensation returned an empty question"));
        }

        tracing::debug!(turns = history.len(), condensed = %condensed, "question condensed");
        Ok(condensed)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use chrono::Utc;

    use super::*;
    use crate::chat::turn::Turn;
    use crate::llm::testing::ScriptedProvider;
    use crate::rag::RetrievalResult;

    fn condenser(provider: Arc<ScriptedProvider>) -> QuestionCondenser {
        QuestionCondenser::new(LlmService::new(provider, "m", "e", Duration::from_secs(5), 1))
    }

    fn one_turn_history() -> History {
        History::from_turns(vec![Turn {
            question: "What is HPA?".to_string(),
            condensed_question: "What is HPA?".to_string(),
            answer: "The horizontal pod autoscaler.".to_string(),
            sources: RetrievalResult::empty(),
            created_at: Utc::now(),
        }])
    }

    #[tokio::test]
    async fn empty_history_is_a_no_op() {
        let provider = Arc::new(ScriptedProvider::constant("should not be used"));
        let condensed = condenser(provider.clone())
            .condense(&History::new(), "How does TechNibbana explain autoscaling?")
            .await
            .unwrap();
        assert_eq!(condensed, "How does TechNibbana explain autoscaling?");
        assert_eq!(provider.chat_calls(), 0);
    }

    #[tokio::test]
    async fn history_goes_into_the_prompt() {
        let provider = Arc::new(ScriptedProvider::constant(" How does HPA decide to scale? "));
        let condensed = condenser(provider.clone())
            .condense(&one_turn_history(), "How does it decide?")
            .await
            .unwrap();
        assert_eq!(condensed, "How does HPA decide to scale?");

        let requests = provider.requests();
        assert_eq!(requests.len(), 1);
        let prompt = &requests[0].messages[0].content;
        assert!(prompt.contains("Human: What is HPA?"));
        assert!(prompt.ends_with("Followup question: How does it decide?"));
        assert!(requests[0].is_deterministic());
    }

    #[tokio::test]
    async fn blank_reply_is_a_model_error() {
        let provider = Arc::new(ScriptedProvider::constant("   "));
        let err = condenser(provider)
            .condense(&one_turn_history(), "and?")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::ModelInvocation(_)));
    }
}
