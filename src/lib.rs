// src/lib.rs

//! IPO Board: metadata cache and query engine over scraped IPO artifacts

pub mod cache;
pub mod config;
pub mod dates;
pub mod error;
pub mod models;
pub mod project;
pub mod query;
pub mod slug;
pub mod storage;
