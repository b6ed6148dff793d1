//! ipctree variant layer: the values that cross the native/wire boundary.
//!
//! This layer knows nothing about nodes, interfaces, or transports. It provides:
//! - `Variant`: a closed dynamic value (integers, double, byte, bool, strings,
//!   object references, and recursive vector/tuple/map containers)
//! - `VariantType`: the shape of a `Variant`, needed when a container is empty
//! - `WireConvert`: the per-type conversion between native Rust values and
//!   `Variant`, plus the type descriptor for that native type
//! - `WireTuple`: positional argument packs (native tuples) for calls and signals
//!
//! # Example
//!
//! ```rust
//! use ipctree_variant::{from_variant, make_variant_type, to_variant, Variant, VariantType};
//!
//! let v = to_variant(&vec![1i32, 2, 3]);
//! assert_eq!(from_variant::<Vec<i32>>(&v).unwrap(), vec![1, 2, 3]);
//!
//! // Decoding never coerces between integer widths.
//! assert!(from_variant::<Vec<i64>>(&v).is_err());
//!
//! assert_eq!(make_variant_type::<Vec<i32>>().signature().unwrap(), "ai");
//! assert_ne!(make_variant_type::<Vec<i32>>(), make_variant_type::<(i32,)>());
//! # let _ = (Variant::Bool(true), VariantType::Bool);
//! ```

mod convert;
mod error;
mod object;
mod types;
mod value;

pub use convert::{from_variant, make_variant_type, to_variant, WireConvert, WireTuple};
pub use error::VariantError;
pub use object::{ObjectRef, WeakObjectRef};
pub use types::VariantType;
pub use value::{ObjectPath, Signature, Variant, VariantMap, VariantTuple};
