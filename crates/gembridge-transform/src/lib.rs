pub mod citations;
pub mod generate_content;
pub mod native_tools;
pub mod settings;

pub use citations::{Annotator, CitationsProcessor};
pub use settings::{Settings, SettingsError, ToolsPriority};
