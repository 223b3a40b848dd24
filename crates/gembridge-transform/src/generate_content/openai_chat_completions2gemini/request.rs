use std::collections::HashMap;

use serde_json::{Value as JsonValue, json};
use tracing::warn;

use gembridge_protocol::gemini::generate_content::{
    Content, ContentRole, FunctionCall, FunctionDeclaration, FunctionResponse, GenerateContentPath,
    GenerateContentRequest, GenerateContentRequestBody, GenerationConfig, Part, ThinkingConfig,
    Tool,
};
use gembridge_protocol::openai::create_chat_completions::{
    ChatCompletionRequestMessage, ChatCompletionRole, ChatCompletionTool,
    CreateChatCompletionRequest,
};

use crate::native_tools::{NativeToolsConfiguration, NativeToolsManager, NativeToolsRequestParams};

/// Convert an OpenAI chat-completions request into a Gemini
/// stream-generate-content request, resolving tools through `manager`.
pub fn transform_request(
    mut request: CreateChatCompletionRequest,
    manager: &NativeToolsManager,
) -> GenerateContentRequest {
    let params = NativeToolsRequestParams::from(&request);
    let custom_tools = request.tools.take().unwrap_or_default();
    let model = request
        .model
        .strip_prefix("models/")
        .unwrap_or(&request.model)
        .to_string();
    let tools = manager.determine_tool_configuration(custom_tools, params, &model);

    let (system_instruction, contents) = transform_messages(&request.messages);
    let generation_config = generation_config(&request);

    GenerateContentRequest {
        path: GenerateContentPath { model },
        body: GenerateContentRequestBody {
            contents,
            system_instruction,
            tools: gemini_tools(&tools),
            generation_config: (!generation_config.is_empty()).then_some(generation_config),
        },
    }
}

fn transform_messages(messages: &[ChatCompletionRequestMessage]) -> (Option<Content>, Vec<Content>) {
    let mut system_parts = Vec::new();
    let mut contents: Vec<Content> = Vec::new();
    // tool_call_id -> function name, for tool result messages
    let mut call_names: HashMap<&str, &str> = HashMap::new();

    for message in messages {
        let text = message
            .content
            .as_ref()
            .map(|content| content.to_text())
            .unwrap_or_default();

        let (role, parts) = match message.role {
            ChatCompletionRole::System | ChatCompletionRole::Developer => {
                if !text.is_empty() {
                    system_parts.push(Part::text(text));
                }
                continue;
            }
            ChatCompletionRole::User => (ContentRole::User, vec![Part::text(text)]),
            ChatCompletionRole::Assistant => {
                let mut parts = Vec::new();
                if !text.is_empty() {
                    parts.push(Part::text(text));
                }
                for call in message.tool_calls.iter().flatten() {
                    call_names.insert(&call.id, &call.function.name);
                    parts.push(Part {
                        function_call: Some(FunctionCall {
                            id: None,
                            name: call.function.name.clone(),
                            args: Some(parse_arguments(&call.function.arguments)),
                        }),
                        ..Part::default()
                    });
                }
                (ContentRole::Model, parts)
            }
            ChatCompletionRole::Tool => {
                let name = message
                    .tool_call_id
                    .as_deref()
                    .and_then(|id| call_names.get(id).copied())
                    .or(message.name.as_deref())
                    .unwrap_or_default()
                    .to_string();
                let part = Part {
                    function_response: Some(FunctionResponse {
                        id: None,
                        name,
                        response: tool_result(text),
                    }),
                    ..Part::default()
                };
                (ContentRole::User, vec![part])
            }
        };
        if parts.is_empty() {
            continue;
        }

        match contents.last_mut() {
            Some(last) if last.role == Some(role) => last.parts.extend(parts),
            _ => contents.push(Content {
                role: Some(role),
                parts,
            }),
        }
    }

    let system_instruction = (!system_parts.is_empty()).then(|| Content {
        role: None,
        parts: system_parts,
    });
    (system_instruction, contents)
}

fn parse_arguments(arguments: &str) -> JsonValue {
    if arguments.trim().is_empty() {
        return json!({});
    }
    match serde_json::from_str::<JsonValue>(arguments) {
        Ok(value @ JsonValue::Object(_)) => value,
        Ok(other) => json!({ "value": other }),
        Err(err) => {
            warn!(error = %err, "tool call arguments are not valid json");
            json!({})
        }
    }
}

/// Gemini wants an object; plain-text results are wrapped.
fn tool_result(text: String) -> JsonValue {
    match serde_json::from_str::<JsonValue>(&text) {
        Ok(value @ JsonValue::Object(_)) => value,
        _ => json!({ "content": text }),
    }
}

fn gemini_tools(config: &NativeToolsConfiguration) -> Option<Vec<Tool>> {
    if config.use_native_tools {
        let tools: Vec<Tool> = config
            .native_tools
            .iter()
            .map(|tool| tool.to_gemini_tool())
            .collect();
        return (!tools.is_empty()).then_some(tools);
    }

    let declarations: Vec<FunctionDeclaration> = config
        .custom_tools
        .iter()
        .flatten()
        .map(function_declaration)
        .collect();
    (!declarations.is_empty()).then(|| {
        vec![Tool {
            function_declarations: Some(declarations),
            ..Tool::default()
        }]
    })
}

fn function_declaration(tool: &ChatCompletionTool) -> FunctionDeclaration {
    FunctionDeclaration {
        name: tool.function.name.clone(),
        description: tool.function.description.clone(),
        parameters: tool.function.parameters.clone(),
    }
}

fn generation_config(request: &CreateChatCompletionRequest) -> GenerationConfig {
    GenerationConfig {
        temperature: request.temperature,
        top_p: request.top_p,
        max_output_tokens: request.max_completion_tokens.or(request.max_tokens),
        stop_sequences: request.stop.clone().map(|stop| stop.into_vec()),
        thinking_config: request.include_reasoning.filter(|include| *include).map(|_| {
            ThinkingConfig {
                include_thoughts: Some(true),
                thinking_budget: None,
            }
        }),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::settings::Settings;

    use super::*;

    fn request(value: JsonValue) -> CreateChatCompletionRequest {
        serde_json::from_value(value).unwrap()
    }

    fn manager() -> NativeToolsManager {
        NativeToolsManager::new(Settings::default())
    }

    #[test]
    fn system_and_conversation_messages() {
        let translated = transform_request(
            request(json!({
                "model": "models/gemini-2.5-flash",
                "messages": [
                    {"role": "system", "content": "Be brief."},
                    {"role": "developer", "content": [{"type": "text", "text": "No emoji."}]},
                    {"role": "user", "content": "Hi"},
                    {"role": "assistant", "content": "Hello"},
                    {"role": "user", "content": "Weather?"}
                ],
                "temperature": 0.2,
                "max_tokens": 64,
                "stop": "END"
            })),
            &manager(),
        );

        assert_eq!(translated.path.model, "gemini-2.5-flash");
        assert_eq!(
            serde_json::to_value(&translated.body).unwrap(),
            json!({
                "contents": [
                    {"role": "user", "parts": [{"text": "Hi"}]},
                    {"role": "model", "parts": [{"text": "Hello"}]},
                    {"role": "user", "parts": [{"text": "Weather?"}]}
                ],
                "systemInstruction": {"parts": [{"text": "Be brief."}, {"text": "No emoji."}]},
                "generationConfig": {
                    "temperature": 0.2,
                    "maxOutputTokens": 64,
                    "stopSequences": ["END"]
                }
            })
        );
    }

    #[test]
    fn tool_round_trip_messages() {
        let translated = transform_request(
            request(json!({
                "model": "gemini-2.5-pro",
                "messages": [
                    {"role": "user", "content": "Weather in Oslo?"},
                    {"role": "assistant", "content": null, "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {"name": "get_weather", "arguments": "{\"city\":\"Oslo\"}"}
                    }]},
                    {"role": "tool", "tool_call_id": "call_1", "content": "sunny"}
                ]
            })),
            &manager(),
        );

        let contents = serde_json::to_value(&translated.body.contents).unwrap();
        assert_eq!(
            contents,
            json!([
                {"role": "user", "parts": [{"text": "Weather in Oslo?"}]},
                {"role": "model", "parts": [{"functionCall": {"name": "get_weather", "args": {"city": "Oslo"}}}]},
                {"role": "user", "parts": [{"functionResponse": {"name": "get_weather", "response": {"content": "sunny"}}}]}
            ])
        );
        assert!(translated.body.generation_config.is_none());
    }

    #[test]
    fn consecutive_same_role_messages_merge() {
        let translated = transform_request(
            request(json!({
                "model": "gemini-2.5-pro",
                "messages": [
                    {"role": "user", "content": "one"},
                    {"role": "user", "content": "two"}
                ]
            })),
            &manager(),
        );
        assert_eq!(translated.body.contents.len(), 1);
        assert_eq!(translated.body.contents[0].parts.len(), 2);
    }

    #[test]
    fn custom_tools_become_function_declarations() {
        let translated = transform_request(
            request(json!({
                "model": "gemini-2.5-pro",
                "messages": [{"role": "user", "content": "hi"}],
                "tools": [{"type": "function", "function": {
                    "name": "get_weather",
                    "description": "Current weather",
                    "parameters": {"type": "object"}
                }}]
            })),
            &manager(),
        );
        assert_eq!(
            serde_json::to_value(&translated.body.tools).unwrap(),
            json!([{"functionDeclarations": [{
                "name": "get_weather",
                "description": "Current weather",
                "parameters": {"type": "object"}
            }]}])
        );
    }

    #[test]
    fn native_search_replaces_custom_tools() {
        let manager = NativeToolsManager::new(Settings {
            enable_native_tools: true,
            ..Settings::default()
        });
        let translated = transform_request(
            request(json!({
                "model": "gemini-2.5-pro",
                "messages": [{"role": "user", "content": "news?"}],
                "enable_search": true,
                "include_reasoning": true,
                "tools": [{"type": "function", "function": {"name": "f"}}]
            })),
            &manager,
        );
        assert_eq!(
            serde_json::to_value(&translated.body.tools).unwrap(),
            json!([{"googleSearch": {}}])
        );
        assert_eq!(
            serde_json::to_value(&translated.body.generation_config).unwrap(),
            json!({"thinkingConfig": {"includeThoughts": true}})
        );
    }

    #[test]
    fn odd_tool_arguments_are_tolerated() {
        assert_eq!(parse_arguments(""), json!({}));
        assert_eq!(parse_arguments("not json"), json!({}));
        assert_eq!(parse_arguments("[1]"), json!({"value": [1]}));
        assert_eq!(tool_result("{\"ok\":true}".to_string()), json!({"ok": true}));
    }
}
