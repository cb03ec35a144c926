//! Request and response types for the Messages API.
//!
//! This module owns the instruction sent to the model, the request body,
//! the response envelope, and the two-field result the model is asked for.

use crate::config::EndpointConfig;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How the model classified a text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    /// A subjective judgement.
    Opinion,
    /// A verifiable statement.
    Fact,
    /// A suggested course of action.
    Proposal,
}

impl Classification {
    /// All variants, in display order.
    pub const ALL: [Self; 3] = [Self::Opinion, Self::Fact, Self::Proposal];

    /// The lowercase name written to the output table.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Opinion => "opinion",
            Self::Fact => "fact",
            Self::Proposal => "proposal",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The structured reply the model is asked to produce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationResult {
    /// Category of the original text.
    pub classification: Classification,
    /// The text rewritten as an assertive opinion.
    pub transformed_text: String,
}

/// Build the instruction for one input text.
#[must_use]
pub fn build_prompt(text: &str) -> String {
    format!(
        r#"Analyze the following text and provide two outputs:

1. Classification: Determine if the text is an "opinion", "fact", or "proposal"
2. Transformed text:
   - If it's a fact or proposal, convert it to the most equivalent opinion
   - If it's already an opinion, intensify it
   - Make it the most assertive opinion possible
   - Keep it concise

Text to analyze: "{text}"

Respond with strict JSON only, with exactly these two fields:
{{
  "classification": "opinion|fact|proposal",
  "transformed_text": "your transformed text here"
}}"#
    )
}

/// A single chat message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Author role, always `user` for requests built here.
    pub role: String,
    /// Message text.
    pub content: String,
}

/// Body of a Messages API request.
#[derive(Debug, Clone, Serialize)]
pub struct MessagesRequest {
    /// Model identifier.
    pub model: String,
    /// Reply size cap in tokens.
    pub max_tokens: u32,
    /// Conversation, a single user message.
    pub messages: Vec<Message>,
}

impl MessagesRequest {
    /// Build the classification request for one text.
    #[must_use]
    pub fn for_text(endpoint: &EndpointConfig, text: &str) -> Self {
        Self {
            model: endpoint.model.clone(),
            max_tokens: endpoint.max_tokens,
            messages: vec![Message {
                role: "user".to_string(),
                content: build_prompt(text),
            }],
        }
    }
}

/// One block of a Messages API reply.
#[derive(Debug, Clone, Deserialize)]
pub struct ContentBlock {
    /// Block type, `text` for plain replies.
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    /// Block text.
    #[serde(default)]
    pub text: Option<String>,
}

/// Body of a successful Messages API response.
///
/// Only the fields this crate reads are modelled.
#[derive(Debug, Clone, Deserialize)]
pub struct MessagesResponse {
    /// Reply content blocks.
    #[serde(default)]
    pub content: Vec<ContentBlock>,
    /// Why generation stopped.
    #[serde(default)]
    pub stop_reason: Option<String>,
}

impl MessagesResponse {
    /// Text of the first content block, if any.
    #[must_use]
    pub fn first_text(&self) -> Option<&str> {
        self.content.first().and_then(|block| block.text.as_deref())
    }
}
