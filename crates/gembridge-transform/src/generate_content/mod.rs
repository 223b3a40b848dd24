pub mod gemini2openai_chat_completions;
pub mod openai_chat_completions2gemini;
