//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate unit-of-work and repository calls into use-case APIs.
//! - Keep CLI callers decoupled from storage details.

pub mod macro_service;
