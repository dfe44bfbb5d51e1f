//! Application services: use-case orchestration.
//!
//! Each service module implements a single use-case by composing domain logic
//! with port trait calls. Services import only from `crate::domain` and
//! `crate::application::ports`, never from `crate::infra`, `crate::commands`,
//! or `crate::output`.

pub mod bootstrap;
pub mod cleanup_service;
pub mod configure;
pub mod credentials;
pub mod deploy;
pub mod project;
pub mod provision;
pub mod verify;
