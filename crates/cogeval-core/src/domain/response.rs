//! Responses and their delimited string encoding.
//!
//! Recorded responses arrive as strings. A plain response splits on `/`
//! into sub-responses and each sub-response splits on `;` into tokens, so
//! `"a;b/c"` becomes `[["a", "b"], ["c"]]`. Multiple-choice responses add
//! an outer `|` split, one entry per selected alternative.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::DecodeError;

/// Response type whose encoding carries the extra `|` nesting level.
pub const MULTIPLE_CHOICE: &str = "multiple-choice";

const CHOICE_SEP: &str = "|";
const PART_SEP: &str = "/";
const TOKEN_SEP: &str = ";";

/// A response, either still string-encoded or decoded into nested tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Response {
    /// Raw delimited encoding as stored in a dataset.
    Encoded(String),

    /// Sub-responses, each a list of atomic tokens.
    Single(Vec<Vec<String>>),

    /// Selected alternatives, each a list of sub-responses.
    Multiple(Vec<Vec<Vec<String>>>),
}

impl Response {
    /// Decode a string-encoded response for the given response type.
    ///
    /// Already decoded responses are returned unchanged.
    pub fn decode(self, response_type: &str) -> Result<Response, DecodeError> {
        let raw = match self {
            Response::Encoded(raw) => raw,
            decoded => return Ok(decoded),
        };

        if response_type == MULTIPLE_CHOICE {
            return Ok(Response::Multiple(
                raw.split(CHOICE_SEP).map(split_parts).collect(),
            ));
        }

        if raw.contains(CHOICE_SEP) {
            return Err(DecodeError::UnexpectedChoiceSeparator {
                response_type: response_type.to_string(),
                raw,
            });
        }
        Ok(Response::Single(split_parts(&raw)))
    }

    /// Canonical display string using the inverse separators.
    pub fn encode(&self) -> String {
        match self {
            Response::Encoded(raw) => raw.clone(),
            Response::Single(parts) => join_parts(parts),
            Response::Multiple(choices) => choices
                .iter()
                .map(|parts| join_parts(parts))
                .collect::<Vec<_>>()
                .join(CHOICE_SEP),
        }
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl From<&str> for Response {
    fn from(raw: &str) -> Self {
        Response::Encoded(raw.to_string())
    }
}

/// Split one `/`-delimited segment group into `;`-delimited tokens.
///
/// Empty segments are kept as empty tokens.
pub(crate) fn split_parts(raw: &str) -> Vec<Vec<String>> {
    raw.split(PART_SEP)
        .map(|part| part.split(TOKEN_SEP).map(str::to_string).collect())
        .collect()
}

fn join_parts(parts: &[Vec<String>]) -> String {
    parts
        .iter()
        .map(|tokens| tokens.join(TOKEN_SEP))
        .collect::<Vec<_>>()
        .join(PART_SEP)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(parts: &[&[&str]]) -> Vec<Vec<String>> {
        parts
            .iter()
            .map(|p| p.iter().map(|t| t.to_string()).collect())
            .collect()
    }

    #[test]
    fn test_decode_plain_response() {
        let decoded = Response::from("a;b/c").decode("single-choice").unwrap();
        assert_eq!(decoded, Response::Single(tokens(&[&["a", "b"], &["c"]])));
    }

    #[test]
    fn test_decode_multiple_choice_response() {
        let decoded = Response::from("a/b|c").decode(MULTIPLE_CHOICE).unwrap();
        assert_eq!(
            decoded,
            Response::Multiple(vec![tokens(&[&["a"], &["b"]]), tokens(&[&["c"]])])
        );
    }

    #[test]
    fn test_decode_keeps_empty_segments() {
        let decoded = Response::from("a;;b//").decode("verify").unwrap();
        assert_eq!(
            decoded,
            Response::Single(tokens(&[&["a", "", "b"], &[""], &[""]]))
        );
        assert_eq!(decoded.encode(), "a;;b//");

        let empty = Response::from("").decode("verify").unwrap();
        assert_eq!(empty, Response::Single(tokens(&[&[""]])));
    }

    #[test]
    fn test_decode_is_idempotent() {
        let once = Response::from("All;a;b/Some;b;c").decode("single-choice").unwrap();
        let twice = once.clone().decode("single-choice").unwrap();
        assert_eq!(once, twice);

        // A decoded value is never re-split, whatever type is passed.
        let again = once.clone().decode(MULTIPLE_CHOICE).unwrap();
        assert_eq!(once, again);
    }

    #[test]
    fn test_choice_separator_rejected_outside_multiple_choice() {
        let err = Response::from("a|b").decode("single-choice").unwrap_err();
        assert_eq!(
            err,
            DecodeError::UnexpectedChoiceSeparator {
                response_type: "single-choice".to_string(),
                raw: "a|b".to_string(),
            }
        );
    }

    #[test]
    fn test_encode_roundtrip() {
        let samples = [
            (Response::Single(tokens(&[&["Aac"]])), "single-choice"),
            (Response::Single(tokens(&[&["x", "y"], &["z"]])), "verify"),
            (
                Response::Multiple(vec![
                    tokens(&[&["All", "a", "b"]]),
                    tokens(&[&["Some", "b"], &["c"]]),
                ]),
                MULTIPLE_CHOICE,
            ),
        ];
        for (response, response_type) in samples {
            let encoded = Response::Encoded(response.encode());
            assert_eq!(encoded.decode(response_type).unwrap(), response);
        }
    }

    #[test]
    fn test_display_matches_encode() {
        let response = Response::Multiple(vec![tokens(&[&["a"]]), tokens(&[&["b"]])]);
        assert_eq!(response.to_string(), "a|b");
        assert_eq!(Response::from("NVC").to_string(), "NVC");
    }

    #[test]
    fn test_serde_untagged_shapes() {
        let encoded: Response = serde_json::from_str("\"NVC\"").unwrap();
        assert_eq!(encoded, Response::from("NVC"));

        let single: Response = serde_json::from_str("[[\"a\",\"b\"]]").unwrap();
        assert_eq!(single, Response::Single(tokens(&[&["a", "b"]])));

        let multiple: Response = serde_json::from_str("[[[\"a\"]],[[\"b\"]]]").unwrap();
        assert_eq!(
            multiple,
            Response::Multiple(vec![tokens(&[&["a"]]), tokens(&[&["b"]])])
        );
    }
}
