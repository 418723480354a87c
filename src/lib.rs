//! # Bracket Engine
//!
//! Tournament progression and scheduling for racket-sport events.
//!
//! ## Architecture
//!
//! - **models**: Core records (tournaments, matches, round keys, standings)
//! - **engine**: Bracket generation, seeding, result cascade, resets and scheduling
//! - **storage**: JSONL table files behind a transactional in-memory store
//! - **api**: REST API endpoints
//! - **config**: Configuration loading and validation

pub mod api;
pub mod config;
pub mod engine;
pub mod models;
pub mod storage;

pub use models::*;
