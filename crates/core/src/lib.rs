//! Core types and errors for Capstan
//!
//! This crate defines the foundation shared by every other crate in the
//! workspace:
//! - Key and node-id validation rules
//! - The unified [`Error`] type and [`Result`] alias
//! - Contract constants (embedding dimension)
//!
//! Keys and values are UTF-8 strings. Nothing here touches the disk or the
//! network; higher layers (durability, engine, cluster, server) build on
//! these definitions.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod key;

pub use error::{Error, Result};
pub use key::{validate_key, validate_node_id};

/// Number of dimensions in the bag-of-words embedding vector.
///
/// This is part of the storage contract: embedding vectors written by one
/// process must be comparable to vectors computed by another, so the
/// dimension is fixed here rather than configured per store.
pub const EMBEDDING_DIM: usize = 16;
