//! Subcommand implementations.

pub mod assess;
pub mod compare;
pub mod fingerprint;
pub mod index;
