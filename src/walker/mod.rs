//! Secret tree walker
//!
//! Discovers every leaf secret under a root path by listing directory-like
//! nodes (names ending in `/`) and recursing into them concurrently.
//!
//! # Architecture
//!
//! ```text
//!                     ┌─────────────────────────┐
//!                     │       TreeWalker        │
//!                     │  - LIST per directory   │
//!                     │  - visited set + depth  │
//!                     └───────────┬─────────────┘
//!                                 │ one future per sub-directory
//!       ┌─────────────────────────┼─────────────────────────┐
//!       │                         │                         │
//! ┌─────▼─────┐             ┌─────▼─────┐             ┌─────▼─────┐
//! │  /a/      │             │  /b/      │             │  /n/      │
//! │  LIST     │             │  LIST     │             │  LIST     │
//! └───────────┘             └───────────┘             └───────────┘
//! ```

pub mod tree;

pub use tree::{normalize_dir, TreeWalker};
