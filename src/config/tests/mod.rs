//! Unit tests for towerline configuration types.
//!
//! - [`helpers`] - Shared fixtures and helper functions
//! - [`types_tests`] - Type defaults, TOML parsing and server lookup
//! - [`layer_precedence_tests`] - `MergeComposer` layer precedence

mod helpers;
