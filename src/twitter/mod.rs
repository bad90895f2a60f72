//! Twitter API integration module.
//!
//! This module contains the payload types, text parsing helpers and the
//! production HTTP client for the timeline, search and filtered-stream
//! endpoints.

mod api;
mod client;
mod model;
mod parsing;
mod stream;

pub use client::TwitterClient;
pub use model::{Entities, HashtagEntity, MentionEntity, StreamMessage, Tweet, User};
pub use parsing::{extract_hashtags, extract_mentions};
