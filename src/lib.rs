//! Topline - a news aggregation client
//!
//! This crate provides the client-side core of the Topline news reader.
//! It fetches categorized news and trending lists from the aggregator API
//! and drives an incrementally loaded card feed, with an in-memory
//! response cache and retrying fetch client underneath.

pub mod cache;
pub mod config;
pub mod error;
pub mod feed;
pub mod fetcher;
pub mod models;
