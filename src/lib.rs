// src/lib.rs

//! Comic ingestion library
//!
//! Mirrors xkcd comics together with their explainxkcd annotations into a
//! key-value store and answers next/previous/random queries over them.

pub mod config;
pub mod error;
#[cfg(feature = "lambda")]
pub mod lambda;
pub mod models;
pub mod pipeline;
pub mod service;
pub mod services;
pub mod storage;
pub mod utils;

pub use service::ComicService;
