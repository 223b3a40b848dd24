pub mod create_chat_completions;
