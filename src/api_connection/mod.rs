pub mod connection;
pub mod endpoints;

pub use endpoints::{ChatCompletionRequest, ChatCompletionResponse, ChatMessage, Provider};
