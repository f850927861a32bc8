//! Request and stream payload models.
//!
//! Response-side shapes reject unknown fields so that schema drift upstream
//! surfaces as a decode error instead of silently dropped data.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// `stream_mode` value selecting the concise Perplexity event format.
pub const STREAM_MODE_CONCISE: &str = "concise";

/// `object` of an incremental reasoning chunk.
pub const OBJECT_REASONING: &str = "chat.reasoning";
/// `object` of the chunk closing the reasoning phase.
pub const OBJECT_REASONING_DONE: &str = "chat.reasoning.done";
/// `object` of an incremental answer chunk.
pub const OBJECT_COMPLETION_CHUNK: &str = "chat.completion.chunk";
/// `object` of the final chunk carrying the full answer.
pub const OBJECT_COMPLETION_DONE: &str = "chat.completion.done";

/// Chat completion request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletionRequest {
    /// Model identifier
    pub model: String,

    /// Conversation messages
    pub messages: Vec<Message>,

    /// Whether to stream the response
    #[serde(default)]
    pub stream: bool,

    /// Perplexity stream format, `concise` or `full`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_mode: Option<String>,

    /// Sampling temperature
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,

    /// Nucleus sampling
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
}

impl ChatCompletionRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            stream: false,
            stream_mode: None,
            temperature: None,
            top_p: None,
        }
    }

    /// Index of the first message whose content is blank.
    pub fn first_blank_message(&self) -> Option<usize> {
        self.messages
            .iter()
            .position(|message| message.content.trim().is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A single message in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Read a JSON `null` as the field's default value.
///
/// Upstreams send `null` for empty lists and strings; only unknown fields
/// are treated as schema drift.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

// Perplexity concise stream

/// One chunk of a Perplexity `stream_mode: "concise"` stream.
///
/// `object` tells the phase apart: reasoning deltas, the reasoning summary,
/// answer deltas and the final answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConciseChunk {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub choices: Vec<ConciseChoice>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub search_results: Vec<SearchResult>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub images: Vec<ImageResult>,

    #[serde(default)]
    pub usage: Option<Usage>,
}

impl ConciseChunk {
    pub fn first_choice(&self) -> Option<&ConciseChoice> {
        self.choices.first()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConciseChoice {
    #[serde(default, deserialize_with = "null_as_default")]
    pub index: u32,

    /// Present on `chat.reasoning` and `chat.completion.chunk`
    #[serde(default)]
    pub delta: Option<ConciseDelta>,

    /// Present on `chat.reasoning.done` and `chat.completion.done`
    #[serde(default)]
    pub message: Option<ConciseMessage>,

    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConciseDelta {
    #[serde(default, deserialize_with = "null_as_default")]
    pub content: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub reasoning_steps: Vec<ReasoningStep>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConciseMessage {
    #[serde(default, deserialize_with = "null_as_default")]
    pub role: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub content: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub reasoning_steps: Vec<ReasoningStep>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReasoningStep {
    pub thought: String,

    #[serde(rename = "type")]
    pub step_type: String,

    #[serde(default)]
    pub web_search: Option<WebSearch>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WebSearch {
    #[serde(default, deserialize_with = "null_as_default")]
    pub search_keywords: Vec<String>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub search_results: Vec<SearchResult>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SearchResult {
    pub title: String,
    pub url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub snippet: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ImageResult {
    pub url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// Token usage statistics, shared by both stream shapes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Usage {
    #[serde(default, deserialize_with = "null_as_default")]
    pub prompt_tokens: u32,

    #[serde(default, deserialize_with = "null_as_default")]
    pub completion_tokens: u32,

    #[serde(default, deserialize_with = "null_as_default")]
    pub total_tokens: u32,

    /// `low`, `medium` or `high`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_context_size: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub citation_tokens: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_search_queries: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_tokens: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<Cost>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_tokens_details: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_tokens_details: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Cost {
    #[serde(default, deserialize_with = "null_as_default")]
    pub input_tokens_cost: f64,

    #[serde(default, deserialize_with = "null_as_default")]
    pub output_tokens_cost: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_tokens_cost: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub citation_tokens_cost: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_queries_cost: Option<f64>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub request_cost: f64,

    #[serde(default, deserialize_with = "null_as_default")]
    pub total_cost: f64,
}

// OpenAI-compatible stream

/// Streaming chunk of an OpenAI-compatible chat completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChatCompletionChunk {
    pub id: String,
    pub object: String,
    pub created: i64,
    pub model: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_fingerprint: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_tier: Option<String>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub choices: Vec<StreamChoice>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,

    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub citations: Vec<String>,

    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub search_results: Vec<SearchResult>,
}

impl ChatCompletionChunk {
    /// Content delta of the first choice, if any.
    pub fn delta_content(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|choice| choice.delta.content.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StreamChoice {
    #[serde(default, deserialize_with = "null_as_default")]
    pub index: u32,

    #[serde(default, deserialize_with = "null_as_default")]
    pub delta: Delta,

    #[serde(default)]
    pub finish_reason: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logprobs: Option<Value>,
}

/// Delta content in streaming responses.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Delta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refusal: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<Value>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_request_serialization_skips_unset_options() {
        let request = ChatCompletionRequest::new("sonar", vec![Message::user("Hello!")]);
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "model": "sonar",
                "messages": [{"role": "user", "content": "Hello!"}],
                "stream": false
            })
        );
    }

    #[test]
    fn test_request_with_sampling_params() {
        let mut request = ChatCompletionRequest::new("sonar", vec![Message::system("be brief")]);
        request.temperature = Some(0.2);
        request.top_p = Some(0.9);
        request.stream_mode = Some(STREAM_MODE_CONCISE.to_string());

        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("\"temperature\":0.2"));
        assert!(json.contains("\"top_p\":0.9"));
        assert!(json.contains("\"stream_mode\":\"concise\""));
        assert!(json.contains("\"role\":\"system\""));
    }

    #[test]
    fn test_first_blank_message() {
        let request = ChatCompletionRequest::new(
            "sonar",
            vec![Message::user("hi"), Message::assistant("  \n")],
        );
        assert_eq!(request.first_blank_message(), Some(1));

        let request = ChatCompletionRequest::new("sonar", vec![Message::user("hi")]);
        assert_eq!(request.first_blank_message(), None);
    }

    #[test]
    fn test_unknown_role_rejected() {
        let result = serde_json::from_str::<Message>(r#"{"role":"tool","content":"x"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_concise_reasoning_chunk() {
        let json = r#"{
            "id": "r1",
            "object": "chat.reasoning",
            "created": 1700000000,
            "model": "sonar-deep-research",
            "choices": [{
                "index": 0,
                "delta": {
                    "reasoning_steps": [{
                        "thought": "Look up the release date",
                        "type": "web_search",
                        "web_search": {
                            "search_keywords": ["rust 1.0 release"],
                            "search_results": [{
                                "title": "Announcing Rust 1.0",
                                "url": "https://blog.rust-lang.org/2015/05/15/Rust-1.0.html",
                                "date": "2015-05-15",
                                "snippet": "Today we are very proud...",
                                "source": "web"
                            }]
                        }
                    }]
                }
            }]
        }"#;

        let chunk: ConciseChunk = serde_json::from_str(json).unwrap();
        assert_eq!(chunk.object, OBJECT_REASONING);
        let delta = chunk.first_choice().and_then(|c| c.delta.as_ref()).unwrap();
        assert_eq!(delta.content, "");
        assert_eq!(delta.reasoning_steps[0].step_type, "web_search");
        let search = delta.reasoning_steps[0].web_search.as_ref().unwrap();
        assert_eq!(search.search_results[0].date.as_deref(), Some("2015-05-15"));
    }

    #[test]
    fn test_concise_done_chunk_with_usage() {
        let json = r#"{
            "id": "c1",
            "object": "chat.completion.done",
            "created": 1700000001,
            "model": "sonar",
            "choices": [{
                "index": 0,
                "message": {"role": "assistant", "content": "Answer"},
                "finish_reason": "stop"
            }],
            "search_results": [{"title": "t", "url": "https://example.com", "snippet": "s", "source": "web"}],
            "images": [{"url": "https://example.com/a.png"}],
            "usage": {
                "prompt_tokens": 5,
                "completion_tokens": 7,
                "total_tokens": 12,
                "search_context_size": "low",
                "cost": {"input_tokens_cost": 0.0, "output_tokens_cost": 0.001, "request_cost": 0.005, "total_cost": 0.006}
            }
        }"#;

        let chunk: ConciseChunk = serde_json::from_str(json).unwrap();
        let usage = chunk.usage.unwrap();
        assert_eq!(usage.total_tokens, 12);
        assert_eq!(usage.search_context_size.as_deref(), Some("low"));
        assert_eq!(usage.cost.unwrap().total_cost, 0.006);
        assert_eq!(chunk.images.len(), 1);
        assert_eq!(
            chunk.choices[0].message.as_ref().map(|m| m.content.as_str()),
            Some("Answer")
        );
    }

    #[test]
    fn test_concise_chunk_rejects_unknown_field() {
        let json = r#"{"id":"x","object":"chat.completion.chunk","created":1,"model":"sonar","surprise":true}"#;
        assert!(serde_json::from_str::<ConciseChunk>(json).is_err());
    }

    #[test]
    fn test_concise_chunk_reads_null_as_empty() {
        let json = r#"{
            "id": "c1",
            "object": "chat.completion.chunk",
            "created": 1,
            "model": "sonar",
            "search_results": null,
            "images": null,
            "choices": [{
                "index": 0,
                "delta": {"content": null, "reasoning_steps": null},
                "finish_reason": null
            }]
        }"#;

        let chunk: ConciseChunk = serde_json::from_str(json).unwrap();
        assert!(chunk.search_results.is_empty());
        assert!(chunk.images.is_empty());
        let delta = chunk.first_choice().and_then(|c| c.delta.as_ref()).unwrap();
        assert_eq!(delta.content, "");
        assert!(delta.reasoning_steps.is_empty());

        let json = r#"{"id":"x","object":"chat.reasoning.done","created":1,"model":"sonar","choices":null}"#;
        let chunk: ConciseChunk = serde_json::from_str(json).unwrap();
        assert!(chunk.first_choice().is_none());
    }

    #[test]
    fn test_null_fields_still_reject_unknown_keys() {
        let json = r#"{"id":"x","object":"chat.reasoning","created":1,"model":"sonar","choices":null,"surprise":null}"#;
        assert!(serde_json::from_str::<ConciseChunk>(json).is_err());
    }

    #[test]
    fn test_chat_completion_chunk_null_lists() {
        let json = r#"{"id":"x","object":"chat.completion.chunk","created":1,"model":"gpt-4o","choices":[{"index":0,"delta":null}],"citations":null,"search_results":null}"#;
        let chunk: ChatCompletionChunk = serde_json::from_str(json).unwrap();
        assert!(chunk.citations.is_empty());
        assert_eq!(chunk.choices[0].delta, Delta::default());
        assert_eq!(chunk.delta_content(), None);
    }

    #[test]
    fn test_chat_completion_chunk_delta_content() {
        let json = r#"{
            "id": "chatcmpl-1",
            "object": "chat.completion.chunk",
            "created": 1677858242,
            "model": "gpt-4o",
            "system_fingerprint": "fp_1",
            "choices": [{"index": 0, "delta": {"role": "assistant", "content": "Hi"}, "finish_reason": null, "logprobs": null}]
        }"#;

        let chunk: ChatCompletionChunk = serde_json::from_str(json).unwrap();
        assert_eq!(chunk.delta_content(), Some("Hi"));
        assert_eq!(chunk.choices[0].delta.role.as_deref(), Some("assistant"));
    }

    #[test]
    fn test_chat_completion_chunk_without_choices() {
        let json = r#"{
            "id": "chatcmpl-1",
            "object": "chat.completion.chunk",
            "created": 1,
            "model": "gpt-4o",
            "choices": [],
            "usage": {"prompt_tokens": 1, "completion_tokens": 2, "total_tokens": 3}
        }"#;

        let chunk: ChatCompletionChunk = serde_json::from_str(json).unwrap();
        assert_eq!(chunk.delta_content(), None);
        assert_eq!(chunk.usage.map(|u| u.total_tokens), Some(3));
    }

    #[test]
    fn test_delta_rejects_unknown_field() {
        assert!(serde_json::from_str::<Delta>(r#"{"content":"a","mystery":1}"#).is_err());
    }
}
