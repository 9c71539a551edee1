//! Prompt enhancement through a chat-completion deployment.

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;
use tracing::info;

use crate::client::VideoGenClient;
use crate::error::{VideoGenError, VideoGenResult};
use crate::transport::ApiRequest;
use crate::wire::{ChatMessage, ChatRequest, ChatResponse};

const SYSTEM_INSTRUCTION: &str = "You rewrite short ideas into detailed prompts for a text-to-video model. \
Describe the subject, setting, camera movement, lighting and mood in one paragraph. \
Reply with up to three alternative prompts as a numbered list and nothing else.";

const TEMPERATURE: f32 = 0.7;
const MAX_TOKENS: u32 = 800;

/// Result of enhancing a prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromptEnhancement {
    pub original: String,
    /// The first suggestion
    pub enhanced: String,
    pub suggestions: Vec<String>,
}

impl VideoGenClient {
    /// Ask the configured chat deployment for richer versions of `prompt`.
    pub async fn enhance_prompt(&self, prompt: &str) -> VideoGenResult<PromptEnhancement> {
        let deployment = self
            .config()
            .chat_deployment
            .as_deref()
            .ok_or_else(|| {
                VideoGenError::validation("chat_deployment", "No chat deployment is configured for prompt enhancement")
            })?;

        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(VideoGenError::validation("prompt", "Prompt cannot be empty"));
        }

        let request = ChatRequest {
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_INSTRUCTION,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
        };
        let body = serde_json::to_value(&request)
            .map_err(|e| VideoGenError::protocol(format!("Failed to encode chat request: {}", e)))?;

        let response = self
            .send("enhance_prompt", deployment, ApiRequest::post(self.chat_url(deployment), body))
            .await?;

        let parsed: ChatResponse = serde_json::from_slice(&response.body)
            .map_err(|e| VideoGenError::protocol(format!("Malformed chat response: {}", e)))?;
        let reply = parsed
            .choices
            .into_iter()
            .find_map(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| VideoGenError::protocol("Chat response contained no message content"))?;

        let suggestions = extract_suggestions(&reply);
        let enhanced = suggestions
            .first()
            .cloned()
            .unwrap_or_else(|| reply.trim().to_string());

        info!(deployment = %deployment, suggestions = suggestions.len(), "Enhanced prompt");

        Ok(PromptEnhancement {
            original: prompt.to_string(),
            enhanced,
            suggestions,
        })
    }
}

fn list_item_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^\s*(?:\d+[.)]|[-*•])\s+(.+?)\s*$").expect("list item pattern is valid")
    })
}

/// Pull list items out of a chat reply.
///
/// Recognizes numbered (`1.`, `2)`) and bulleted (`-`, `*`, `•`) lines.
/// Without any list items the whole trimmed reply is the only suggestion.
pub fn extract_suggestions(reply: &str) -> Vec<String> {
    let pattern = list_item_pattern();
    let items: Vec<String> = reply
        .lines()
        .filter_map(|line| pattern.captures(line))
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim_matches('"').trim().to_string())
        .filter(|item| !item.is_empty())
        .collect();

    if !items.is_empty() {
        return items;
    }

    let trimmed = reply.trim();
    if trimmed.is_empty() {
        Vec::new()
    } else {
        vec![trimmed.to_string()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numbered_items() {
        let reply = "Here are some options:\n1. A drone shot over misty pines at dawn\n2) Close-up of dew on a leaf, soft light\n";
        assert_eq!(
            extract_suggestions(reply),
            vec![
                "A drone shot over misty pines at dawn".to_string(),
                "Close-up of dew on a leaf, soft light".to_string(),
            ]
        );
    }

    #[test]
    fn test_bulleted_items() {
        let reply = "- First idea\n* Second idea\n• \"Third idea\"";
        assert_eq!(
            extract_suggestions(reply),
            vec!["First idea", "Second idea", "Third idea"]
        );
    }

    #[test]
    fn test_plain_reply_is_single_suggestion() {
        let reply = "  A slow pan across a neon-lit street in the rain.  ";
        assert_eq!(
            extract_suggestions(reply),
            vec!["A slow pan across a neon-lit street in the rain."]
        );
    }

    #[test]
    fn test_empty_reply() {
        assert!(extract_suggestions("   \n ").is_empty());
    }

    #[test]
    fn test_years_are_not_list_items() {
        // "2024" has no list marker after the digits
        let reply = "2024 was a good year for film";
        assert_eq!(extract_suggestions(reply), vec!["2024 was a good year for film"]);
    }
}
