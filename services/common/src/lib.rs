//! Shared configuration, constants, and error types for the heap-lab services

pub mod config;
pub mod constants;
pub mod errors;

pub use config::*;
pub use constants::*;
pub use errors::*;
