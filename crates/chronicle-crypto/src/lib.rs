//! Cryptographic primitives for Chronicle.
//!
//! - [`ContentHasher`] — domain-separated BLAKE3 hashing
//! - [`SigningKey`] / [`VerifyingKey`] / [`Signature`] — Ed25519 authorship
//!   proofs with hex wire form
//! - [`keyfile`] — on-disk key material with lazy create-if-absent semantics

pub mod hasher;
pub mod keyfile;
pub mod signer;

pub use hasher::{ContentHasher, HasherError};
pub use keyfile::{KeyError, KEY_FILE};
pub use signer::{Signature, SignatureError, SigningKey, VerifyingKey};
