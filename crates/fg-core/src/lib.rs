//! # fg-core
//!
//! Core configuration for FileGate.
//!
//! This crate holds the settings shared by the upload library and the server:
//! - Server settings (bind address, request body ceiling)
//! - Upload defaults (destination, field name, categories, size limit)
//! - Environment loading and its error type

pub mod config;

pub use config::*;
