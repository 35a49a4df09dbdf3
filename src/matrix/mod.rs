//! Matrix containers
//!
//! - `BitSupportMatrix`: sparse per-cell experiment bitsets for link support
//! - `NamedMatrix2` / `NamedMatrix3`: dense NaN-padded matrices with named axes

mod bit_support;
mod bitvector;
mod named;

pub use bit_support::BitSupportMatrix;
pub use bitvector::BitVector;
pub use named::{AxisNames, NamedMatrix2, NamedMatrix3};
