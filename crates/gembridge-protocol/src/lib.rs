pub mod event;
pub mod gemini;
pub mod openai;
pub mod sse;
