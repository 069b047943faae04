//! Shared test utilities for the kitsync workspace.
//!
//! Dev-dependency only, never published.
//!
//! # Modules
//!
//! - [`git`]: git repository fixtures
//! - [`kit`]: [`TestKit`](kit::TestKit), a source package plus an installed destination

pub mod git;
pub mod kit;

pub use kit::TestKit;
