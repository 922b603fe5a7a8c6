//! Shared value types for the Fakt incremental generation engine.
//!
//! This crate provides the [`Contract`] description handed over by the
//! declaration analyzer and the [`Signature`] fingerprint used to decide
//! whether a contract needs regeneration.

#![warn(missing_docs)]

pub mod contract;
pub mod signature;

pub use contract::{Contract, ContractKind};
pub use signature::{ParseSignatureError, Signature, SignatureKind};
