//! Argonaut: a live terminal dashboard for Argo CD applications.
//!
//! This library exposes the core modules for use by the binary and by tests.

pub mod argocd;
pub mod clipboard;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod selection;
pub mod sync;
pub mod sync_controller;
pub mod tree;
pub mod view;
pub mod app;
