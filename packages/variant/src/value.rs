//! The Variant type - the closed dynamic value.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Deref;

use crate::object::ObjectRef;
use crate::types::VariantType;

/// An ordered mapping of variants to variants.
pub type VariantMap = BTreeMap<Variant, Variant>;

/// A positional pack of variants: call arguments, return values, signal payloads.
pub type VariantTuple = Vec<Variant>;

/// A dynamically-typed value that can cross the native/wire boundary.
///
/// The set of alternatives is closed. Containers hold the same sum type
/// recursively, so any nesting of vectors, tuples and maps is representable.
///
/// # Design Notes
///
/// - Equality and ordering are total: doubles compare with `total_cmp` and
///   object references compare by identity. This lets `Variant` key a `BTreeMap`.
/// - Integer widths are distinct alternatives. An `Int16` never equals an
///   `Int32` holding the same number.
/// - A `Vector` carries no element type. When it is empty the declared
///   `VariantType` is the only source of its shape.
#[derive(Clone, Debug)]
pub enum Variant {
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Int64(i64),
    UInt64(u64),
    Double(f64),
    Byte(u8),
    Bool(bool),
    String(String),
    /// A string with object address semantics.
    ObjectPath(ObjectPath),
    /// A string with type signature semantics.
    Signature(Signature),
    /// An opaque reference to an application object.
    Object(ObjectRef),
    /// Homogeneous sequence.
    Vector(Vec<Variant>),
    /// Heterogeneous fixed-length sequence.
    Tuple(VariantTuple),
    Map(VariantMap),
}

impl Variant {
    /// Short name of the stored alternative, for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Variant::Int16(_) => "int16",
            Variant::UInt16(_) => "uint16",
            Variant::Int32(_) => "int32",
            Variant::UInt32(_) => "uint32",
            Variant::Int64(_) => "int64",
            Variant::UInt64(_) => "uint64",
            Variant::Double(_) => "double",
            Variant::Byte(_) => "byte",
            Variant::Bool(_) => "bool",
            Variant::String(_) => "string",
            Variant::ObjectPath(_) => "object path",
            Variant::Signature(_) => "signature",
            Variant::Object(_) => "object",
            Variant::Vector(_) => "vector",
            Variant::Tuple(_) => "tuple",
            Variant::Map(_) => "map",
        }
    }

    /// Check that this value structurally matches a declared type.
    ///
    /// Every element of a vector, every field of a tuple and every key and
    /// value of a map must match recursively. Nothing matches the invalid type.
    pub fn matches(&self, ty: &VariantType) -> bool {
        match (self, ty) {
            (Variant::Int16(_), VariantType::Int16)
            | (Variant::UInt16(_), VariantType::UInt16)
            | (Variant::Int32(_), VariantType::Int32)
            | (Variant::UInt32(_), VariantType::UInt32)
            | (Variant::Int64(_), VariantType::Int64)
            | (Variant::UInt64(_), VariantType::UInt64)
            | (Variant::Double(_), VariantType::Double)
            | (Variant::Byte(_), VariantType::Byte)
            | (Variant::Bool(_), VariantType::Bool)
            | (Variant::String(_), VariantType::String)
            | (Variant::ObjectPath(_), VariantType::ObjectPath)
            | (Variant::Signature(_), VariantType::Signature)
            | (Variant::Object(_), VariantType::Object) => true,
            (Variant::Vector(items), VariantType::Vector(element)) => {
                element.is_valid() && items.iter().all(|item| item.matches(element))
            }
            (Variant::Tuple(items), VariantType::Tuple(types)) => {
                items.len() == types.len()
                    && items.iter().zip(types).all(|(item, ty)| item.matches(ty))
            }
            (Variant::Map(map), VariantType::Map(key, value)) => {
                key.is_valid()
                    && value.is_valid()
                    && map.iter().all(|(k, v)| k.matches(key) && v.matches(value))
            }
            _ => false,
        }
    }

    /// Borrow the string payload of `String`, `ObjectPath` or `Signature`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Variant::String(s) => Some(s),
            Variant::ObjectPath(p) => Some(p),
            Variant::Signature(s) => Some(s),
            _ => None,
        }
    }

    /// Check if this value is a container.
    pub fn is_container(&self) -> bool {
        matches!(self, Variant::Vector(_) | Variant::Tuple(_) | Variant::Map(_))
    }

    fn rank(&self) -> u8 {
        match self {
            Variant::Int16(_) => 0,
            Variant::UInt16(_) => 1,
            Variant::Int32(_) => 2,
            Variant::UInt32(_) => 3,
            Variant::Int64(_) => 4,
            Variant::UInt64(_) => 5,
            Variant::Double(_) => 6,
            Variant::Byte(_) => 7,
            Variant::Bool(_) => 8,
            Variant::String(_) => 9,
            Variant::ObjectPath(_) => 10,
            Variant::Signature(_) => 11,
            Variant::Object(_) => 12,
            Variant::Vector(_) => 13,
            Variant::Tuple(_) => 14,
            Variant::Map(_) => 15,
        }
    }
}

impl Ord for Variant {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Variant::Int16(a), Variant::Int16(b)) => a.cmp(b),
            (Variant::UInt16(a), Variant::UInt16(b)) => a.cmp(b),
            (Variant::Int32(a), Variant::Int32(b)) => a.cmp(b),
            (Variant::UInt32(a), Variant::UInt32(b)) => a.cmp(b),
            (Variant::Int64(a), Variant::Int64(b)) => a.cmp(b),
            (Variant::UInt64(a), Variant::UInt64(b)) => a.cmp(b),
            (Variant::Double(a), Variant::Double(b)) => a.total_cmp(b),
            (Variant::Byte(a), Variant::Byte(b)) => a.cmp(b),
            (Variant::Bool(a), Variant::Bool(b)) => a.cmp(b),
            (Variant::String(a), Variant::String(b)) => a.cmp(b),
            (Variant::ObjectPath(a), Variant::ObjectPath(b)) => a.cmp(b),
            (Variant::Signature(a), Variant::Signature(b)) => a.cmp(b),
            (Variant::Object(a), Variant::Object(b)) => a.cmp(b),
            (Variant::Vector(a), Variant::Vector(b)) | (Variant::Tuple(a), Variant::Tuple(b)) => {
                a.cmp(b)
            }
            (Variant::Map(a), Variant::Map(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for Variant {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Variant {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Variant {}

macro_rules! string_subtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(String);

        impl $name {
            pub fn new(s: impl Into<String>) -> Self {
                $name(s.into())
            }

            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl Deref for $name {
            type Target = str;

            fn deref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                $name(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                $name(s)
            }
        }
    };
}

string_subtype!(
    /// A string naming an object address.
    ObjectPath
);

string_subtype!(
    /// A string holding a type signature.
    Signature
);

// Conversion from common types

macro_rules! variant_from {
    ($($ty:ty => $alt:ident),* $(,)?) => {
        $(
            impl From<$ty> for Variant {
                fn from(v: $ty) -> Self {
                    Variant::$alt(v)
                }
            }
        )*
    };
}

variant_from!(
    i16 => Int16,
    u16 => UInt16,
    i32 => Int32,
    u32 => UInt32,
    i64 => Int64,
    u64 => UInt64,
    f64 => Double,
    u8 => Byte,
    bool => Bool,
    String => String,
    ObjectPath => ObjectPath,
    Signature => Signature,
    ObjectRef => Object,
    VariantMap => Map,
);

impl From<&str> for Variant {
    fn from(v: &str) -> Self {
        Variant::String(v.to_string())
    }
}
