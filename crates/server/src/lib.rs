//! Wire adapter for Capstan
//!
//! Translates newline-delimited JSON frames into engine operations. One
//! request yields exactly one response; connections are reused for multiple
//! requests serially.

pub mod server;
pub mod wire;

pub use server::serve;
pub use wire::{dispatch, dispatch_line, Request, Response};
