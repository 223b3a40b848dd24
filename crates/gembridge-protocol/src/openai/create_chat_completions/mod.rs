pub mod types;
pub mod request;
pub mod stream;

pub use request::{CreateChatCompletionRequest, NativeToolsPriority, StopConfiguration};
pub use stream::{
    ChatCompletionChunkObjectType, ChatCompletionStreamChoice, CreateChatCompletionStreamResponse,
};
pub use types::*;
