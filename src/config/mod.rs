// src/config/mod.rs

//! Configuration loading and validation for rebuildd.
//!
//! Responsibilities:
//! - Define the TOML-backed data model and the resolved [`Settings`] (`model.rs`).
//! - Load a config file from disk and layer CLI flags over it (`loader.rs`).
//! - Validate the merged values (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_from_path, resolve_settings};
pub use model::{BuildSection, RawConfigFile, RawSettings, ServerSection, Settings};
