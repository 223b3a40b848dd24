use serde::Serialize;
use tracing::debug;

use gembridge_protocol::gemini::generate_content::{JsonObject, Tool};
use gembridge_protocol::openai::create_chat_completions::{
    ChatCompletionTool, CreateChatCompletionRequest, NativeToolsPriority,
};

use crate::settings::{Settings, ToolsPriority};

/// Server-side tools Gemini runs itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NativeTool {
    GoogleSearch,
    UrlContext,
}

impl NativeTool {
    pub fn to_gemini_tool(self) -> Tool {
        match self {
            Self::GoogleSearch => Tool {
                google_search: Some(JsonObject::new()),
                ..Tool::default()
            },
            Self::UrlContext => Tool {
                url_context: Some(JsonObject::new()),
                ..Tool::default()
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolPriority {
    Native,
    Custom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolType {
    SearchAndUrl,
    CustomOnly,
}

/// Which tools end up in the upstream request.
#[derive(Debug, Clone, PartialEq)]
pub struct NativeToolsConfiguration {
    pub use_native_tools: bool,
    pub use_custom_tools: bool,
    pub native_tools: Vec<NativeTool>,
    pub custom_tools: Option<Vec<ChatCompletionTool>>,
    pub priority: ToolPriority,
    pub tool_type: ToolType,
}

impl NativeToolsConfiguration {
    pub fn custom_only(custom_tools: Vec<ChatCompletionTool>) -> Self {
        Self {
            use_native_tools: false,
            use_custom_tools: true,
            native_tools: Vec::new(),
            custom_tools: Some(custom_tools),
            priority: ToolPriority::Custom,
            tool_type: ToolType::CustomOnly,
        }
    }

    fn native(native_tools: Vec<NativeTool>) -> Self {
        Self {
            use_native_tools: true,
            use_custom_tools: false,
            native_tools,
            custom_tools: None,
            priority: ToolPriority::Native,
            tool_type: ToolType::SearchAndUrl,
        }
    }
}

/// Per-request tool switches carried as extra fields of the chat request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NativeToolsRequestParams {
    pub enable_search: Option<bool>,
    pub enable_url_context: Option<bool>,
    pub enable_native_tools: Option<bool>,
    pub native_tools_priority: Option<NativeToolsPriority>,
}

impl From<&CreateChatCompletionRequest> for NativeToolsRequestParams {
    fn from(request: &CreateChatCompletionRequest) -> Self {
        Self {
            enable_search: request.enable_search,
            enable_url_context: request.enable_url_context,
            enable_native_tools: request.enable_native_tools,
            native_tools_priority: request.native_tools_priority,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NativeToolsManager {
    settings: Settings,
}

impl NativeToolsManager {
    pub fn new(settings: Settings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn determine_tool_configuration(
        &self,
        custom_tools: Vec<ChatCompletionTool>,
        params: NativeToolsRequestParams,
        model: &str,
    ) -> NativeToolsConfiguration {
        let params = self.effective_params(params);
        if !self.settings.enable_native_tools {
            return NativeToolsConfiguration::custom_only(custom_tools);
        }
        if !self.search_enabled(&params) && !self.url_context_enabled(&params) {
            return NativeToolsConfiguration::custom_only(custom_tools);
        }

        let native_tools = self.create_native_tools_array(params, model);
        let wants_native = params.native_tools_priority == Some(NativeToolsPriority::Native);
        let config = match self.settings.priority {
            ToolsPriority::NativeFirst => NativeToolsConfiguration::native(native_tools),
            _ if wants_native => NativeToolsConfiguration::native(native_tools),
            ToolsPriority::CustomFirst if !custom_tools.is_empty() => {
                NativeToolsConfiguration::custom_only(custom_tools)
            }
            _ => NativeToolsConfiguration::native(native_tools),
        };
        debug!(
            model = %model,
            tool_type = ?config.tool_type,
            native = ?config.native_tools,
            "resolved tool configuration"
        );
        config
    }

    /// Google Search is skipped on legacy models; URL context is only sent
    /// when search is off.
    pub fn create_native_tools_array(
        &self,
        params: NativeToolsRequestParams,
        model: &str,
    ) -> Vec<NativeTool> {
        let params = self.effective_params(params);
        let search = self.search_enabled(&params);
        let mut tools = Vec::new();
        if search && !is_legacy_model(model) {
            tools.push(NativeTool::GoogleSearch);
        }
        if self.url_context_enabled(&params) && !search {
            tools.push(NativeTool::UrlContext);
        }
        tools
    }

    fn effective_params(&self, params: NativeToolsRequestParams) -> NativeToolsRequestParams {
        if self.settings.allow_request_control {
            params
        } else {
            NativeToolsRequestParams::default()
        }
    }

    fn search_enabled(&self, params: &NativeToolsRequestParams) -> bool {
        params
            .enable_search
            .unwrap_or(self.settings.enable_google_search)
    }

    fn url_context_enabled(&self, params: &NativeToolsRequestParams) -> bool {
        params
            .enable_url_context
            .unwrap_or(self.settings.enable_url_context)
    }
}

fn is_legacy_model(model: &str) -> bool {
    model.contains("gemini-1.5")
}

#[cfg(test)]
mod tests {
    use gembridge_protocol::openai::create_chat_completions::{
        ChatCompletionToolCallType, FunctionObject,
    };

    use super::*;

    fn settings() -> Settings {
        Settings {
            enable_native_tools: true,
            enable_google_search: true,
            ..Settings::default()
        }
    }

    fn custom_tool() -> ChatCompletionTool {
        ChatCompletionTool {
            r#type: ChatCompletionToolCallType::Function,
            function: FunctionObject {
                name: "get_weather".to_string(),
                description: None,
                parameters: None,
            },
        }
    }

    #[test]
    fn disabled_native_tools_keep_custom_tools() {
        let manager = NativeToolsManager::new(Settings::default());
        let config = manager.determine_tool_configuration(
            vec![custom_tool()],
            NativeToolsRequestParams {
                enable_search: Some(true),
                ..Default::default()
            },
            "gemini-2.5-flash",
        );
        assert_eq!(config, NativeToolsConfiguration::custom_only(vec![custom_tool()]));
    }

    #[test]
    fn native_first_uses_search() {
        let manager = NativeToolsManager::new(settings());
        let config = manager.determine_tool_configuration(
            vec![custom_tool()],
            NativeToolsRequestParams::default(),
            "gemini-2.5-flash",
        );
        assert!(config.use_native_tools);
        assert!(!config.use_custom_tools);
        assert_eq!(config.native_tools, vec![NativeTool::GoogleSearch]);
        assert_eq!(config.tool_type, ToolType::SearchAndUrl);
        assert_eq!(config.custom_tools, None);
    }

    #[test]
    fn nothing_requested_is_custom_only() {
        let manager = NativeToolsManager::new(Settings {
            enable_native_tools: true,
            ..Settings::default()
        });
        let config = manager.determine_tool_configuration(
            Vec::new(),
            NativeToolsRequestParams::default(),
            "gemini-2.5-flash",
        );
        assert_eq!(config.tool_type, ToolType::CustomOnly);
    }

    #[test]
    fn custom_first_prefers_custom_tools_when_present() {
        let manager = NativeToolsManager::new(Settings {
            priority: ToolsPriority::CustomFirst,
            ..settings()
        });
        let with_custom = manager.determine_tool_configuration(
            vec![custom_tool()],
            NativeToolsRequestParams::default(),
            "gemini-2.5-pro",
        );
        assert_eq!(with_custom.priority, ToolPriority::Custom);

        let without_custom = manager.determine_tool_configuration(
            Vec::new(),
            NativeToolsRequestParams::default(),
            "gemini-2.5-pro",
        );
        assert_eq!(without_custom.priority, ToolPriority::Native);

        let asked_native = manager.determine_tool_configuration(
            vec![custom_tool()],
            NativeToolsRequestParams {
                native_tools_priority: Some(NativeToolsPriority::Native),
                ..Default::default()
            },
            "gemini-2.5-pro",
        );
        assert_eq!(asked_native.priority, ToolPriority::Native);
    }

    #[test]
    fn user_choice_defaults_to_native() {
        let manager = NativeToolsManager::new(Settings {
            priority: ToolsPriority::UserChoice,
            ..settings()
        });
        let custom = manager.determine_tool_configuration(
            vec![custom_tool()],
            NativeToolsRequestParams {
                native_tools_priority: Some(NativeToolsPriority::Custom),
                ..Default::default()
            },
            "gemini-2.5-pro",
        );
        assert_eq!(custom.tool_type, ToolType::SearchAndUrl);
        assert_eq!(custom.native_tools, vec![NativeTool::GoogleSearch]);

        let unspecified = manager.determine_tool_configuration(
            vec![custom_tool()],
            NativeToolsRequestParams::default(),
            "gemini-2.5-pro",
        );
        assert_eq!(unspecified.tool_type, ToolType::SearchAndUrl);
    }

    #[test]
    fn request_flags_override_environment() {
        let manager = NativeToolsManager::new(settings());
        let tools = manager.create_native_tools_array(
            NativeToolsRequestParams {
                enable_search: Some(false),
                enable_url_context: Some(true),
                ..Default::default()
            },
            "gemini-2.5-pro",
        );
        assert_eq!(tools, vec![NativeTool::UrlContext]);
    }

    #[test]
    fn request_cannot_switch_off_native_tools_wholesale() {
        let manager = NativeToolsManager::new(settings());
        let config = manager.determine_tool_configuration(
            vec![custom_tool()],
            NativeToolsRequestParams {
                enable_native_tools: Some(false),
                ..Default::default()
            },
            "gemini-2.5-pro",
        );
        assert_eq!(config.tool_type, ToolType::SearchAndUrl);
    }

    #[test]
    fn request_flags_ignored_without_request_control() {
        let manager = NativeToolsManager::new(Settings {
            allow_request_control: false,
            ..settings()
        });
        let tools = manager.create_native_tools_array(
            NativeToolsRequestParams {
                enable_search: Some(false),
                ..Default::default()
            },
            "gemini-2.5-pro",
        );
        assert_eq!(tools, vec![NativeTool::GoogleSearch]);
    }

    #[test]
    fn url_context_is_dropped_alongside_search() {
        let manager = NativeToolsManager::new(Settings {
            enable_url_context: true,
            ..settings()
        });
        assert_eq!(
            manager.create_native_tools_array(NativeToolsRequestParams::default(), "gemini-2.5-pro"),
            vec![NativeTool::GoogleSearch]
        );
    }

    #[test]
    fn legacy_models_get_no_search() {
        let manager = NativeToolsManager::new(settings());
        assert!(
            manager
                .create_native_tools_array(NativeToolsRequestParams::default(), "gemini-1.5-pro")
                .is_empty()
        );
    }

    #[test]
    fn native_tools_render_as_gemini_entries() {
        let search = serde_json::to_value(NativeTool::GoogleSearch.to_gemini_tool()).unwrap();
        let url = serde_json::to_value(NativeTool::UrlContext.to_gemini_tool()).unwrap();
        assert_eq!(search, serde_json::json!({"googleSearch": {}}));
        assert_eq!(url, serde_json::json!({"urlContext": {}}));
    }
}
