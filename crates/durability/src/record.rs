//! WAL record types
//!
//! Each record is one state-changing operation. The on-disk encoding is a
//! JSON object with an `op` discriminator field, one object per line:
//!
//! ```text
//! {"op":"set","key":"k","value":"v"}
//! {"op":"delete","key":"k","version":7}
//! {"op":"bulk_set","items":[["a","1"],["b","2"]]}
//! ```
//!
//! `version` is present only for writes coordinated by the quorum cluster;
//! single-node and primary-secondary writes omit it.

use serde::{Deserialize, Serialize};

/// A single durable mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum WalRecord {
    /// Write one key.
    Set {
        /// Key being written.
        key: String,
        /// Value being written.
        value: String,
        /// Coordinator-assigned version, if any.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        version: Option<u64>,
    },

    /// Delete one key.
    Delete {
        /// Key being deleted.
        key: String,
        /// Coordinator-assigned version, if any.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        version: Option<u64>,
    },

    /// Write a batch of keys atomically.
    ///
    /// Pairs apply in listed order; a later pair with the same key
    /// overrides an earlier one.
    BulkSet {
        /// Ordered `[key, value]` pairs.
        items: Vec<(String, String)>,
        /// Coordinator-assigned version shared by the whole batch, if any.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        version: Option<u64>,
    },
}

impl WalRecord {
    /// Coordinator version carried by this record, if any.
    pub fn version(&self) -> Option<u64> {
        match self {
            WalRecord::Set { version, .. } => *version,
            WalRecord::Delete { version, .. } => *version,
            WalRecord::BulkSet { version, .. } => *version,
        }
    }

    /// Number of keys this record touches.
    pub fn key_count(&self) -> usize {
        match self {
            WalRecord::Set { .. } | WalRecord::Delete { .. } => 1,
            WalRecord::BulkSet { items, .. } => items.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_encoding() {
        let record = WalRecord::Set {
            key: "k".to_string(),
            value: "v".to_string(),
            version: None,
        };
        let line = serde_json::to_string(&record).unwrap();
        assert_eq!(line, r#"{"op":"set","key":"k","value":"v"}"#);
    }

    #[test]
    fn test_set_with_version_encoding() {
        let record = WalRecord::Set {
            key: "k".to_string(),
            value: "v".to_string(),
            version: Some(7),
        };
        let line = serde_json::to_string(&record).unwrap();
        assert!(line.contains(r#""op":"set""#));
        assert!(line.contains(r#""version":7"#));
    }

    #[test]
    fn test_bulk_set_encoding() {
        let record = WalRecord::BulkSet {
            items: vec![
                ("a".to_string(), "1".to_string()),
                ("b".to_string(), "2".to_string()),
            ],
            version: None,
        };
        let line = serde_json::to_string(&record).unwrap();
        assert_eq!(line, r#"{"op":"bulk_set","items":[["a","1"],["b","2"]]}"#);
    }

    #[test]
    fn test_decode_round_trip() {
        let records = vec![
            WalRecord::Set {
                key: "k".to_string(),
                value: "line1\nline2".to_string(),
                version: Some(1),
            },
            WalRecord::Delete {
                key: "k".to_string(),
                version: None,
            },
            WalRecord::BulkSet {
                items: vec![("a".to_string(), "1".to_string())],
                version: Some(2),
            },
        ];
        for record in records {
            let line = serde_json::to_string(&record).unwrap();
            // The framing is line-delimited: no raw newline may appear.
            assert!(!line.contains('\n'));
            let back: WalRecord = serde_json::from_str(&line).unwrap();
            assert_eq!(back, record);
        }
    }

    #[test]
    fn test_truncated_line_fails_to_parse() {
        let torn = r#"{"op":"set","ke"#;
        assert!(serde_json::from_str::<WalRecord>(torn).is_err());
    }

    #[test]
    fn test_unknown_op_fails_to_parse() {
        let bad = r#"{"op":"compact","key":"k"}"#;
        assert!(serde_json::from_str::<WalRecord>(bad).is_err());
    }

    #[test]
    fn test_accessors() {
        let record = WalRecord::BulkSet {
            items: vec![
                ("a".to_string(), "1".to_string()),
                ("b".to_string(), "2".to_string()),
            ],
            version: Some(9),
        };
        assert_eq!(record.version(), Some(9));
        assert_eq!(record.key_count(), 2);

        let record = WalRecord::Delete {
            key: "k".to_string(),
            version: None,
        };
        assert_eq!(record.version(), None);
        assert_eq!(record.key_count(), 1);
    }
}
