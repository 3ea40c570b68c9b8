//! The file module provides a sandboxed, read-only interface to one project
//! directory.
//!
//! ## Architecture
//!
//! ### resolver.rs
//! `PathGuard` maps caller-supplied paths onto the project root and is the only
//! security boundary:
//! - Lexical containment check, then existence probe, then a containment check on
//!   the canonical (symlink-resolved) path
//! - Containment compares whole path components, so `/root2` is never inside `/root`
//!
//! ### ignore.rs
//! Discovers every ignore file under the root and composes their rules into one
//! compiled `RuleSet`. Nested rule files are re-rooted at their directory. The
//! `IgnoreIndex` runs discovery in the background and publishes snapshots, so
//! early queries see a partial rule set rather than blocking.
//!
//! ### access.rs
//! `QueryEngine` owns the guard and the index and implements list, read and
//! read-range. The two search operations live in `search/`.
//!
//! Nothing in this module writes to the file system.

pub mod access;
pub mod config;
pub mod ignore;
pub mod resolver;
pub mod search;
