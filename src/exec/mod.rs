// src/exec/mod.rs

//! Process execution layer.
//!
//! This module is responsible for actually running the external tools a
//! project depends on, using `tokio::process::Command`.
//!
//! - [`runner`] owns the single-flight [`ProcessRunner`] primitive.
//! - [`git`] and [`make`] are thin domain adapters over it.
//! - [`backend`] provides the `VersionControl` / `BuildTool` / `Toolchain`
//!   traits and the concrete `SystemToolchain` used in production, which
//!   tests can replace with a fake implementation.

pub mod backend;
pub mod git;
pub mod make;
pub mod runner;

pub use backend::{BoxFuture, BuildTool, SystemToolchain, Toolchain, VersionControl};
pub use git::Git;
pub use make::Make;
pub use runner::ProcessRunner;
