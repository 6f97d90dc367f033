use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
    pub max_tokens: Option<i32>,
    pub seed: Option<u64>,
    pub stop: Option<Vec<String>>,
}

impl ChatRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            temperature: None,
            top_p: None,
            max_tokens: None,
            seed: None,
            stop: None,
        }
    }

    /// Zero temperature plus a fixed seed: identical prompts give identical replies.
    pub fn deterministic(mut self, seed: u64) -> Self {
        self.temperature = Some(0.0);
        self.seed = Some(seed);
        self
    }

    pub fn is_deterministic(&self) -> bool {
        self.temperature == Some(0.0) && self.seed.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_pins_temperature_and_seed() {
        let request = ChatRequest::new(vec![ChatMessage::user("hi")]);
        assert!(!request.is_deterministic());

        let request = request.deterministic(7);
        assert_eq!(request.temperature, Some(0.0));
        assert_eq!(request.seed, Some(7));
        assert!(request.is_deterministic());
    }
}
