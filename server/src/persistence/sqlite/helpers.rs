//! Shared encode/decode helpers for SQLite ↔ domain type conversions.

use std::path::{Path, PathBuf};

use crate::persistence::PersistenceError;

// ── Keyword lists ──────────────────────────────────────────────────────

/// Encode a keyword list for the `mandatory_list` / `deny_list` columns.
pub fn encode_keywords(keywords: &[String]) -> Result<String, PersistenceError> {
    Ok(serde_json::to_string(keywords)?)
}

/// Decode a keyword list column. Empty text is an empty list.
pub fn decode_keywords(key: &str, text: &str) -> Result<Vec<String>, PersistenceError> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(text).map_err(|e| PersistenceError::Invalid {
        key: key.to_string(),
        reason: format!("keyword list is not a JSON array of strings: {e}"),
    })
}

// ── Booleans ───────────────────────────────────────────────────────────

pub fn encode_bool(value: bool) -> i64 {
    i64::from(value)
}

pub fn decode_bool(value: i64) -> bool {
    value != 0
}

// ── Enumbers ───────────────────────────────────────────────────────────

pub fn decode_number(key: &str, value: i64) -> Result<u32, PersistenceError> {
    u32::try_from(value).map_err(|_| PersistenceError::Invalid {
        key: key.to_string(),
        reason: format!("number {value} out of range"),
    })
}

// ── Script paths ───────────────────────────────────────────────────────

/// Resolve a stored datamodel script path against the media root.
/// Absolute paths are kept as they are.
pub fn resolve_script(media_root: &Path, stored: &str) -> PathBuf {
    let path = Path::new(stored);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        media_root.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keywords_roundtrip() {
        let keywords = vec!["Right Join".to_string(), "MINUS".to_string()];
        let text = encode_keywords(&keywords).unwrap();
        assert_eq!(text, r#"["Right Join","MINUS"]"#);
        assert_eq!(decode_keywords("pc/1", &text).unwrap(), keywords);
    }

    #[test]
    fn blank_keyword_column_is_empty() {
        assert!(decode_keywords("pc/1", "").unwrap().is_empty());
        assert!(decode_keywords("pc/1", "[  ]").unwrap().is_empty());
    }

    #[test]
    fn malformed_keywords_name_the_exercise() {
        let err = decode_keywords("pc/7", "right join").unwrap_err();
        assert!(err.to_string().contains("pc/7"));
    }

    #[test]
    fn negative_numbers_are_invalid() {
        assert_eq!(decode_number("pc", 3).unwrap(), 3);
        assert!(decode_number("pc", -1).is_err());
    }

    #[test]
    fn relative_scripts_live_under_media_root() {
        let root = Path::new("/srv/media");
        assert_eq!(resolve_script(root, "pc/pc.sql"), PathBuf::from("/srv/media/pc/pc.sql"));
        assert_eq!(resolve_script(root, "/opt/pc.sql"), PathBuf::from("/opt/pc.sql"));
    }
}
