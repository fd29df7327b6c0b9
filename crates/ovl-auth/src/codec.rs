//! String-list codec for single-column storage.
//!
//! Scopes, audiences, redirect URIs, and rotated secret hashes persist as a
//! single TEXT column. The wire shape is a JSON array, so values may contain
//! any character including separators that delimiter-joined encodings
//! corrupt. An empty or NULL column decodes to an empty list.

use crate::error::StoreResult;

/// Encodes a string list for storage in a single TEXT column.
pub fn to_field(values: &[String]) -> StoreResult<String> {
    Ok(serde_json::to_string(values)?)
}

/// Decodes a stored TEXT column back into a string list.
///
/// Empty input decodes to an empty list.
pub fn from_field(field: &str) -> StoreResult<Vec<String>> {
    if field.is_empty() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_str(field)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trips_plain_values() {
        let values = vec!["openid".to_string(), "photos".to_string()];
        let field = to_field(&values).unwrap();
        assert_eq!(from_field(&field).unwrap(), values);
    }

    #[test]
    fn test_values_containing_separators_survive() {
        let values = vec![
            "https://api.example.com/a;b".to_string(),
            "scope,with,commas".to_string(),
            "trailing;".to_string(),
        ];
        let field = to_field(&values).unwrap();
        assert_eq!(from_field(&field).unwrap(), values);
    }

    #[test]
    fn test_empty_list_round_trips() {
        let field = to_field(&[]).unwrap();
        assert_eq!(field, "[]");
        assert!(from_field(&field).unwrap().is_empty());
    }

    #[test]
    fn test_empty_column_decodes_to_empty_list() {
        assert!(from_field("").unwrap().is_empty());
    }

    #[test]
    fn test_malformed_field_is_a_serialization_error() {
        let err = from_field("openid;photos").unwrap_err();
        assert!(err.is_serialization());
    }
}
