pub mod manager;
pub mod response;

pub use manager::{
    NativeTool, NativeToolsConfiguration, NativeToolsManager, NativeToolsRequestParams,
    ToolPriority, ToolType,
};
pub use response::url_context_response;
