//! Shared error taxonomy and transfer types for client-side card encryption.

pub mod error;
pub mod protocol;

pub use error::CseError;
