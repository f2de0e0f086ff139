//! # GAVINHO Common Library
//!
//! Shared code for GAVINHO microservices including:
//! - Error type shared by database and configuration code
//! - Configuration loading and root folder resolution
//! - Database initialization (MQT schema)
//! - Event types and the broadcast EventBus

pub mod config;
pub mod db;
pub mod error;
pub mod events;

pub use error::{Error, Result};
