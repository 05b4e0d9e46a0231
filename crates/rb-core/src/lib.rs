//! RotBlock Core Library
//!
//! This crate provides the incremental filtering engine for the RotBlock
//! video-listing filter. It never touches a browser API directly: the page is
//! reached through the [`PageNode`] and [`Host`] capability traits, so the same
//! engine runs inside the WebAssembly content script and against the in-memory
//! document used by tests and the CLI.
//!
//! # Architecture
//!
//! Listing items are discovered lazily. Mutation batches are coalesced by a
//! debouncer, candidate items are registered with a viewport watcher, and an
//! item is evaluated exactly once per configuration epoch when it comes near
//! the viewport. Hiding is class-based and always reversible.
//!
//! # Modules
//!
//! - `selector`: selector lists parsed and matched with the `selectors` crate
//! - `dom`: the `PageNode` capability trait
//! - `memory`: in-memory document and host
//! - `host`: the `Host` and `Timers` capability traits
//! - `config`: persisted settings, compiled config and the config slot
//! - `extract`: heuristic metadata extraction
//! - `filter`: keep/hide decisions for items and sections
//! - `visibility`: reversible hide/show and grid layout
//! - `scheduler`: debouncer and per-item scan state machine
//! - `engine`: lifecycle controller tying everything together
//! - `store`: key-value configuration store with defaults
//! - `message`: settings-surface messages
//! - `inject`: background injection policy
//! - `types`: shared type definitions

pub mod config;
pub mod dom;
pub mod engine;
pub mod error;
pub mod extract;
pub mod filter;
pub mod host;
pub mod inject;
pub mod memory;
pub mod message;
pub mod scheduler;
pub mod selector;
pub mod store;
pub mod types;
pub mod visibility;

// Re-export commonly used types
pub use config::{Config, ConfigSlot, Settings, ShelfCategories};
pub use dom::PageNode;
pub use engine::FilterEngine;
pub use error::Error;
pub use host::{Host, PageLocation, TimerHandle, Timers, ViewportOptions};
pub use memory::{MemoryHost, MemoryNode, NodeSpec};
pub use selector::{Selector, SelectorError};
pub use types::{Decision, HideReason, HideTarget, SectionInfo, SectionReason, VideoMetadata};
