use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ToolsPriority {
    #[default]
    NativeFirst,
    CustomFirst,
    UserChoice,
}

impl FromStr for ToolsPriority {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "native_first" => Ok(Self::NativeFirst),
            "custom_first" => Ok(Self::CustomFirst),
            "user_choice" => Ok(Self::UserChoice),
            _ => Err(()),
        }
    }
}

/// Feature switches read from the environment.
///
/// Flags named `enable_*` and `include_search_entry_point` are opt-in (only
/// the literal `"true"` turns them on); `allow_request_control` and
/// `include_grounding_metadata` are opt-out (anything but `"false"` keeps
/// them on).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub enable_native_tools: bool,
    pub enable_google_search: bool,
    pub enable_url_context: bool,
    pub priority: ToolsPriority,
    pub allow_request_control: bool,
    pub enable_inline_citations: bool,
    pub include_grounding_metadata: bool,
    pub include_search_entry_point: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            enable_native_tools: false,
            enable_google_search: false,
            enable_url_context: false,
            priority: ToolsPriority::default(),
            allow_request_control: true,
            enable_inline_citations: false,
            include_grounding_metadata: true,
            include_search_entry_point: false,
        }
    }
}

impl Settings {
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let opt_in = |key: &str| lookup(key).as_deref() == Some("true");
        let opt_out = |key: &str| lookup(key).as_deref() != Some("false");

        let priority = match lookup("GEMINI_TOOLS_PRIORITY") {
            None => ToolsPriority::default(),
            Some(value) if value.is_empty() => ToolsPriority::default(),
            Some(value) => value
                .parse::<ToolsPriority>()
                .map_err(|_| SettingsError::InvalidValue {
                    key: "GEMINI_TOOLS_PRIORITY",
                    value,
                })?,
        };

        Ok(Self {
            enable_native_tools: opt_in("ENABLE_GEMINI_NATIVE_TOOLS"),
            enable_google_search: opt_in("ENABLE_GOOGLE_SEARCH"),
            enable_url_context: opt_in("ENABLE_URL_CONTEXT"),
            priority,
            allow_request_control: opt_out("ALLOW_REQUEST_TOOL_CONTROL"),
            enable_inline_citations: opt_in("ENABLE_INLINE_CITATIONS"),
            include_grounding_metadata: opt_out("INCLUDE_GROUNDING_METADATA"),
            include_search_entry_point: opt_in("INCLUDE_SEARCH_ENTRY_POINT"),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn settings(pairs: &[(&str, &str)]) -> Result<Settings, SettingsError> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn empty_environment_matches_default() {
        assert_eq!(settings(&[]).unwrap(), Settings::default());
    }

    #[test]
    fn opt_in_flags_need_literal_true() {
        let parsed = settings(&[
            ("ENABLE_INLINE_CITATIONS", "true"),
            ("ENABLE_GOOGLE_SEARCH", "TRUE"),
            ("ENABLE_URL_CONTEXT", "1"),
        ])
        .unwrap();
        assert!(parsed.enable_inline_citations);
        assert!(!parsed.enable_google_search);
        assert!(!parsed.enable_url_context);
    }

    #[test]
    fn opt_out_flags_need_literal_false() {
        let parsed = settings(&[
            ("INCLUDE_GROUNDING_METADATA", "false"),
            ("ALLOW_REQUEST_TOOL_CONTROL", "no"),
        ])
        .unwrap();
        assert!(!parsed.include_grounding_metadata);
        assert!(parsed.allow_request_control);
    }

    #[test]
    fn priority_is_validated() {
        assert_eq!(
            settings(&[("GEMINI_TOOLS_PRIORITY", "custom_first")])
                .unwrap()
                .priority,
            ToolsPriority::CustomFirst
        );
        assert_eq!(
            settings(&[("GEMINI_TOOLS_PRIORITY", "whatever")]),
            Err(SettingsError::InvalidValue {
                key: "GEMINI_TOOLS_PRIORITY",
                value: "whatever".to_string(),
            })
        );
    }
}
