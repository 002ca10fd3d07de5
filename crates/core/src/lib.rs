//! Blue Lender Core - Shared domain types.
//!
//! This crate provides the types shared by every Blue Lender component:
//! - `server` - Public intake endpoint and admin API
//! - `cli` - Command-line tools for migrations and account management
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no SMTP. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, the application ID generator, emails, statuses,
//!   and the admin permission model

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
