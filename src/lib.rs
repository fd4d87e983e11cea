//! Symposium - a multi-persona conversation scheduler
//!
//! Several independently configured participants share one conversation.
//! The scheduler decides who responds next, how many respond at once, and
//! how those odds shift as participants speak and get mentioned.

pub mod config;
pub mod domain;
pub mod error;
pub mod id;
pub mod provider;
pub mod recovery;
pub mod runner;
pub mod scheduler;
pub mod storage;

pub use error::{Result, SymposiumError};
