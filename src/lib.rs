//! # cxxpy - C/C++ Python Extension Builder
//!
//! cxxpy compiles a set of C/C++ sources into a native Python extension module.
//!
//! ## Features
//!
//! - **Incremental Builds**: Header dependency scanning plus modification-time checks
//! - **Parallel Builds**: Bounded worker pool with fail-fast cancellation
//! - **Two Compiler Families**: MSVC on Windows, GCC elsewhere
//! - **Feature Detection**: Check headers before committing to a library
//! - **Compilation Database**: `compile_commands.json` for editors and linters
//!
//! ## Quick Start
//!
//! ```bash
//! # Build the module described by ./pyproject.toml
//! cxxpy build
//! ```
//!
//! ## Module Organization
//!
//! - [`build`] - Scanning, scheduling, archiving and linking
//! - [`builder`] - The mutable build configuration and its frozen form
//! - [`config`] - Configuration parsing (`pyproject.toml`)
//! - [`toolchain`] - Compiler profiles and Python environment detection

/// Core build system with parallel compilation.
pub mod build;

/// Build configuration (`BuilderConfig`).
pub mod builder;

/// Configuration file parsing (`pyproject.toml`).
pub mod config;

/// Error types.
pub mod error;

/// Compiler profiles and Python environment detection.
pub mod toolchain;

/// Shared value types (macros, source files, libraries).
pub mod types;
