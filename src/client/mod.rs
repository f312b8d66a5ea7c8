//! Client and request plumbing
//!
//! `Client` is the single entry point: it hands out builders and performs
//! their round trips through the configured `Transport`.

mod client;
mod context;

pub use client::Client;
pub use context::RequestContext;

pub(crate) use client::index_path;
