//! Infrastructure layer: concrete implementations of application port traits.
//!
//! This module contains all I/O-performing code: process execution, filesystem
//! access, cloud and hosting APIs, and configuration loading.
//!
//! Imports from `crate::domain` and `crate::application::ports` are allowed.
//! Imports from `crate::commands` or `crate::output` are forbidden.

pub mod clock;
pub mod command_runner;
pub mod config;
pub mod ec2;
pub mod fs;
pub mod github;
pub mod http_probe;
pub mod signal;
