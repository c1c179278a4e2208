//! Wire protocol types and request dispatch
//!
//! Requests and responses are JSON objects, one per LF-terminated line.
//! The request carries an `op` discriminator; the response always carries
//! `ok`, plus whichever payload field the operation produces. Absence of a
//! key on `get` is not an error — `ok` is true and `value` is simply
//! omitted.

use capstan_engine::Store;
use serde::{Deserialize, Serialize};

/// A client request frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    /// Write one key.
    Set {
        /// Key to write.
        key: String,
        /// Value to write.
        value: String,
    },
    /// Read one key.
    Get {
        /// Key to read.
        key: String,
    },
    /// Delete one key.
    Delete {
        /// Key to delete.
        key: String,
    },
    /// Write a batch atomically.
    BulkSet {
        /// Ordered `[key, value]` pairs.
        items: Vec<(String, String)>,
    },
    /// Keys whose value contains every query token.
    SearchFullText {
        /// Query text.
        query: String,
    },
    /// Top-K keys by embedding similarity.
    SearchEmbedding {
        /// Query text.
        query: String,
        /// Maximum result count; values at or below zero yield no results.
        top_k: i64,
    },
}

/// A server response frame. Fields irrelevant to the operation are omitted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Response {
    /// Whether the operation succeeded.
    pub ok: bool,
    /// Value, on a successful `get` of a present key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Whether the key existed, on `delete`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub existed: Option<bool>,
    /// Matching keys, on `search_full_text` (sorted for stable output).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keys: Option<Vec<String>>,
    /// Scored matches, on `search_embedding`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<(String, f64)>>,
    /// Failure description, when `ok` is false.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Response {
    fn success() -> Self {
        Response {
            ok: true,
            ..Default::default()
        }
    }

    /// Build a failure response.
    pub fn failure(error: impl Into<String>) -> Self {
        Response {
            ok: false,
            error: Some(error.into()),
            ..Default::default()
        }
    }
}

/// Execute one request against an engine. Total: engine errors become
/// failure responses, never panics or early returns.
pub fn dispatch(store: &Store, request: Request) -> Response {
    match request {
        Request::Set { key, value } => match store.set(&key, &value) {
            Ok(()) => Response::success(),
            Err(e) => Response::failure(e.to_string()),
        },
        Request::Get { key } => Response {
            value: store.get(&key),
            ..Response::success()
        },
        Request::Delete { key } => match store.delete(&key) {
            Ok(existed) => Response {
                existed: Some(existed),
                ..Response::success()
            },
            Err(e) => Response::failure(e.to_string()),
        },
        Request::BulkSet { items } => match store.bulk_set(&items) {
            Ok(()) => Response::success(),
            Err(e) => Response::failure(e.to_string()),
        },
        Request::SearchFullText { query } => {
            let mut keys: Vec<String> = store.search_full_text(&query).into_iter().collect();
            keys.sort();
            Response {
                keys: Some(keys),
                ..Response::success()
            }
        }
        Request::SearchEmbedding { query, top_k } => {
            let top_k = usize::try_from(top_k).unwrap_or(0);
            Response {
                results: Some(store.search_embedding(&query, top_k)),
                ..Response::success()
            }
        }
    }
}

/// Parse one frame and execute it. Malformed frames yield a protocol-error
/// response rather than dropping the connection.
pub fn dispatch_line(store: &Store, line: &str) -> Response {
    match serde_json::from_str::<Request>(line) {
        Ok(request) => dispatch(store, request),
        Err(e) => Response::failure(format!("protocol error: {e}")),
    }
}
