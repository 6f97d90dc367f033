//! Conversational answering over the blog index.

mod condenser;
mod persona;
pub mod prompts;
mod registry;
mod retriever;
pub mod session;
mod synthesizer;
mod turn;

pub use condenser::QuestionCondenser;
pub use persona::Persona;
pub use registry::{SessionRegistry, SharedSession};
pub use retriever::ContextRetriever;
pub use session::{validate_question, ChatPipeline, ConversationSession, SessionPhase};
pub use synthesizer::{Answer, AnswerSynthesizer};
pub use turn::{History, Turn};
