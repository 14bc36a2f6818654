pub mod api;
pub mod config;
pub mod error;
pub mod indexer;
pub mod pipeline;
pub mod tracker;
