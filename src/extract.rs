//! Pulling the JSON payload out of a model reply.
//!
//! Models often wrap JSON in a fenced code block, with or without a `json`
//! language tag, and sometimes surround it with prose. [`ReplyShape`] names
//! the three forms this crate accepts.

use crate::error::{ForgeError, Result};
use crate::request::ClassificationResult;

const FENCE: &str = "```";
const JSON_FENCE: &str = "```json";

/// The wrapping found around a reply payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyShape {
    /// Payload follows the first "```json" marker.
    TaggedFence,
    /// Payload sits between the first pair of bare "```" markers.
    BareFence,
    /// No fence at all; the whole reply is the payload.
    Raw,
}

impl ReplyShape {
    /// Classify a reply and return the trimmed payload it carries.
    ///
    /// An unterminated fence runs to the end of the reply.
    #[must_use]
    pub fn detect(reply: &str) -> (Self, &str) {
        if let Some(start) = reply.find(JSON_FENCE) {
            let rest = &reply[start + JSON_FENCE.len()..];
            (Self::TaggedFence, until_fence(rest).trim())
        } else if let Some(start) = reply.find(FENCE) {
            let rest = &reply[start + FENCE.len()..];
            (Self::BareFence, until_fence(rest).trim())
        } else {
            (Self::Raw, reply.trim())
        }
    }
}

fn until_fence(s: &str) -> &str {
    s.find(FENCE).map_or(s, |end| &s[..end])
}

/// Extract the payload from a reply.
#[must_use]
pub fn extract_payload(reply: &str) -> &str {
    ReplyShape::detect(reply).1
}

/// Extract and parse a classification from a model reply.
pub fn parse_reply(reply: &str) -> Result<ClassificationResult> {
    let (shape, payload) = ReplyShape::detect(reply);
    tracing::trace!(?shape, "Extracted reply payload");

    serde_json::from_str(payload).map_err(|source| ForgeError::ReplyParse {
        payload: payload.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::Classification;

    const INNER: &str =
        r#"{"classification": "fact", "transformed_text": "The sky is unmistakably blue."}"#;

    #[test]
    fn test_three_shapes_parse_identically() {
        let raw = INNER.to_string();
        let tagged = format!("```json\n{INNER}\n```");
        let bare = format!("```\n{INNER}\n```");

        let expected = ClassificationResult {
            classification: Classification::Fact,
            transformed_text: "The sky is unmistakably blue.".to_string(),
        };

        assert_eq!(ReplyShape::detect(&raw).0, ReplyShape::Raw);
        assert_eq!(ReplyShape::detect(&tagged).0, ReplyShape::TaggedFence);
        assert_eq!(ReplyShape::detect(&bare).0, ReplyShape::BareFence);

        for reply in [raw, tagged, bare] {
            assert_eq!(parse_reply(&reply).unwrap(), expected);
        }
    }

    #[test]
    fn test_fence_with_surrounding_prose() {
        let reply = format!("Here is my analysis:\n```json\n{INNER}\n```\nHope that helps!");
        assert_eq!(extract_payload(&reply), INNER);
    }

    #[test]
    fn test_tagged_fence_wins_over_earlier_bare_fence() {
        let reply = format!("```\nnot this\n```\n```json\n{INNER}\n```");
        assert_eq!(ReplyShape::detect(&reply), (ReplyShape::TaggedFence, INNER));
    }

    #[test]
    fn test_unterminated_fence_runs_to_end() {
        let reply = format!("```json\n{INNER}\n");
        assert_eq!(extract_payload(&reply), INNER);
    }

    #[test]
    fn test_malformed_payload() {
        let err = parse_reply("I think this is a fact.").unwrap_err();
        match err {
            ForgeError::ReplyParse { payload, .. } => {
                assert_eq!(payload, "I think this is a fact.");
            }
            other => panic!("expected ReplyParse, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_field() {
        let err = parse_reply(r#"{"classification": "opinion"}"#).unwrap_err();
        assert!(matches!(err, ForgeError::ReplyParse { .. }));
        assert!(err.to_string().contains("transformed_text"));
    }

    #[test]
    fn test_unknown_classification() {
        let err =
            parse_reply(r#"{"classification": "question", "transformed_text": "Why?"}"#).unwrap_err();
        assert!(matches!(err, ForgeError::ReplyParse { .. }));
    }

    #[test]
    fn test_extra_fields_are_ignored() {
        let result = parse_reply(
            r#"{"classification": "proposal", "transformed_text": "We must act.", "confidence": 0.9}"#,
        )
        .unwrap();
        assert_eq!(result.classification, Classification::Proposal);
    }
}
