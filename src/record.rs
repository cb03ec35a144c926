//! Rows of the input and output tables.

use crate::request::ClassificationResult;
use serde::{Deserialize, Serialize};

/// Classification written for rows whose call failed.
pub const ERROR_SENTINEL: &str = "ERROR";

/// Columns every input table must provide.
pub const REQUIRED_COLUMNS: [&str; 2] = ["id", "text"];

/// Header of the output table, in column order.
pub const OUTPUT_HEADERS: [&str; 4] = ["id", "original_text", "classification", "transformed_text"];

/// One row of the input table. Extra columns are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputRecord {
    /// Row identifier, passed through untouched.
    pub id: String,
    /// Text to classify.
    pub text: String,
}

impl InputRecord {
    /// Create a record.
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
        }
    }
}

/// One row of the output table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputRecord {
    /// Identifier copied from the input row.
    pub id: String,
    /// Text copied from the input row.
    pub original_text: String,
    /// A classification name, or [`ERROR_SENTINEL`].
    pub classification: String,
    /// The rewritten text, or the error message for failed rows.
    pub transformed_text: String,
}

impl OutputRecord {
    /// Row for a successful classification.
    #[must_use]
    pub fn success(input: &InputRecord, result: ClassificationResult) -> Self {
        Self {
            id: input.id.clone(),
            original_text: input.text.clone(),
            classification: result.classification.as_str().to_string(),
            transformed_text: result.transformed_text,
        }
    }

    /// Row for a failed classification.
    pub fn failure(input: &InputRecord, error: impl ToString) -> Self {
        Self {
            id: input.id.clone(),
            original_text: input.text.clone(),
            classification: ERROR_SENTINEL.to_string(),
            transformed_text: error.to_string(),
        }
    }

    /// Whether this row records a failure.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.classification == ERROR_SENTINEL
    }

    /// Fields in [`OUTPUT_HEADERS`] order.
    #[must_use]
    pub fn fields(&self) -> [&str; 4] {
        [
            self.id.as_str(),
            self.original_text.as_str(),
            self.classification.as_str(),
            self.transformed_text.as_str(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ForgeError;
    use crate::request::Classification;

    #[test]
    fn test_success_row() {
        let input = InputRecord::new("1", "The sky is blue.");
        let row = OutputRecord::success(
            &input,
            ClassificationResult {
                classification: Classification::Fact,
                transformed_text: "The sky is unmistakably blue.".to_string(),
            },
        );

        assert_eq!(
            row.fields(),
            ["1", "The sky is blue.", "fact", "The sky is unmistakably blue."]
        );
        assert!(!row.is_error());
    }

    #[test]
    fn test_failure_row_carries_message() {
        let input = InputRecord::new("7", "Cats are better than dogs.");
        let err = ForgeError::EndpointError {
            status: 500,
            body: "overloaded".to_string(),
        };
        let message = err.to_string();
        let row = OutputRecord::failure(&input, err);

        assert!(row.is_error());
        assert_eq!(row.classification, "ERROR");
        assert_eq!(row.transformed_text, message);
        assert_eq!(row.original_text, "Cats are better than dogs.");
    }
}
