//! Unit tests for tplcheck CLI
//!
//! These tests use mocked dependencies and run fast without external I/O.

mod bootstrap_service;
mod config_store;
