//! Core types for Blue Lender.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod permissions;
pub mod status;

pub use email::{Email, EmailError};
pub use id::*;
pub use permissions::{Capability, Permissions};
pub use status::*;
