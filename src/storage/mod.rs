//! Storage layer for Symposium - conversations and messages.
//!
//! `MessageStore` is the collaborator the scheduler writes through.
//! `MemoryStore` keeps everything in process; `JsonlStore` journals every
//! write to JSONL files and replays them on open.

mod jsonl;
mod memory;
mod traits;

pub use jsonl::JsonlStore;
pub use memory::MemoryStore;
pub use traits::MessageStore;
