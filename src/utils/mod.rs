//! Utilidades del sistema
//!
//! Error types for the HTTP edge and validation helpers for the payload DTOs.

pub mod errors;
pub mod validation;
