//! Shared Schemas
//!
//! Plain data shapes passed between fetcher, ranker, synthesizer and service.
//! All serialized structs use `serde(rename_all = "camelCase")`.

pub mod common;
pub mod digest;
pub mod news_item;

pub use common::*;
pub use digest::*;
pub use news_item::*;
