//! Shared value types for the identity workspace.
//!
//! Field elements ([`Hash`], [`ElemBytes`]) are 32-byte big-endian integers
//! that must stay below the BN254 scalar field modulus. Constructors that take
//! raw bytes reject out-of-range values with [`IdenError::FieldOverflow`].

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod constants;
pub mod error;
pub mod hash;
pub mod id;

pub use constants::*;
pub use error::{IdenError, IdenResult};
pub use hash::{check_in_field, ElemBytes, Hash};
pub use id::{Id, ID_TYPE_BJP0};
