//! Conversions between native Rust values and `Variant`.

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

use crate::error::VariantError;
use crate::object::ObjectRef;
use crate::types::VariantType;
use crate::value::{ObjectPath, Signature, Variant};

/// A native type that can cross the wire as a `Variant`.
///
/// Encoding is total: every value of an implementing type has a variant.
/// Decoding is partial: it fails with `TypeMismatch` unless the variant holds
/// exactly the alternative this type encodes to.
///
/// Implemented for the primitive integers (`i16`, `u16`, `i32`, `u32`, `i64`,
/// `u64`), `u8` (byte), `f64`, `bool`, `String`, [`ObjectPath`], [`Signature`],
/// [`ObjectRef`], and recursively for `Vec<T>`, `BTreeMap<K, V>`,
/// `HashMap<K, V>` and tuples of up to eight elements.
pub trait WireConvert: Sized {
    /// The type descriptor for this native type.
    fn variant_type() -> VariantType;

    /// Encode into a variant.
    fn to_variant(&self) -> Variant;

    /// Decode from a variant.
    fn from_variant(variant: &Variant) -> Result<Self, VariantError>;
}

/// A positional pack of wire-convertible values.
///
/// Native tuples (including `()`) are argument packs: a function taking
/// `(String, i32)` receives its arguments as a two-element `VariantTuple`.
/// Unlike `WireConvert::from_variant` on a tuple, a wrong element count is
/// reported as `ArityMismatch` rather than `TypeMismatch`.
pub trait WireTuple: Sized {
    /// Number of elements in the pack.
    const ARITY: usize;

    /// Type descriptors of each element, in order.
    fn variant_types() -> Vec<VariantType>;

    /// Encode each element, in order.
    fn to_variants(&self) -> Vec<Variant>;

    /// Decode a pack, checking arity before any element is decoded.
    fn from_variants(values: &[Variant]) -> Result<Self, VariantError>;
}

/// Encode a native value.
pub fn to_variant<T: WireConvert>(value: &T) -> Variant {
    value.to_variant()
}

/// Decode a native value, failing on any alternative mismatch.
pub fn from_variant<T: WireConvert>(variant: &Variant) -> Result<T, VariantError> {
    T::from_variant(variant)
}

/// The type descriptor of a native type.
pub fn make_variant_type<T: WireConvert>() -> VariantType {
    T::variant_type()
}

macro_rules! wire_primitive {
    ($($ty:ty => $alt:ident),* $(,)?) => {
        $(
            impl WireConvert for $ty {
                fn variant_type() -> VariantType {
                    VariantType::$alt
                }

                fn to_variant(&self) -> Variant {
                    Variant::$alt(self.clone())
                }

                fn from_variant(variant: &Variant) -> Result<Self, VariantError> {
                    match variant {
                        Variant::$alt(v) => Ok(v.clone()),
                        other => Err(VariantError::mismatch(Self::variant_type(), other)),
                    }
                }
            }
        )*
    };
}

wire_primitive!(
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
);

impl<T: WireConvert> WireConvert for Vec<T> {
    fn variant_type() -> VariantType {
        VariantType::vector(T::variant_type())
    }

    fn to_variant(&self) -> Variant {
        Variant::Vector(self.iter().map(T::to_variant).collect())
    }

    fn from_variant(variant: &Variant) -> Result<Self, VariantError> {
        match variant {
            Variant::Vector(items) => items.iter().map(T::from_variant).collect(),
            other => Err(VariantError::mismatch(Self::variant_type(), other)),
        }
    }
}

impl<K: WireConvert + Ord, V: WireConvert> WireConvert for BTreeMap<K, V> {
    fn variant_type() -> VariantType {
        VariantType::map(K::variant_type(), V::variant_type())
    }

    fn to_variant(&self) -> Variant {
        Variant::Map(
            self.iter()
                .map(|(k, v)| (k.to_variant(), v.to_variant()))
                .collect(),
        )
    }

    fn from_variant(variant: &Variant) -> Result<Self, VariantError> {
        match variant {
            Variant::Map(map) => map
                .iter()
                .map(|(k, v)| Ok((K::from_variant(k)?, V::from_variant(v)?)))
                .collect(),
            other => Err(VariantError::mismatch(Self::variant_type(), other)),
        }
    }
}

impl<K: WireConvert + Eq + Hash, V: WireConvert> WireConvert for HashMap<K, V> {
    fn variant_type() -> VariantType {
        VariantType::map(K::variant_type(), V::variant_type())
    }

    fn to_variant(&self) -> Variant {
        Variant::Map(
            self.iter()
                .map(|(k, v)| (k.to_variant(), v.to_variant()))
                .collect(),
        )
    }

    fn from_variant(variant: &Variant) -> Result<Self, VariantError> {
        match variant {
            Variant::Map(map) => map
                .iter()
                .map(|(k, v)| Ok((K::from_variant(k)?, V::from_variant(v)?)))
                .collect(),
            other => Err(VariantError::mismatch(Self::variant_type(), other)),
        }
    }
}

impl WireTuple for () {
    const ARITY: usize = 0;

    fn variant_types() -> Vec<VariantType> {
        Vec::new()
    }

    fn to_variants(&self) -> Vec<Variant> {
        Vec::new()
    }

    fn from_variants(values: &[Variant]) -> Result<Self, VariantError> {
        if values.is_empty() {
            Ok(())
        } else {
            Err(VariantError::ArityMismatch {
                expected: 0,
                found: values.len(),
            })
        }
    }
}

macro_rules! wire_tuple {
    ($arity:expr => $($name:ident : $idx:tt),+) => {
        impl<$($name: WireConvert),+> WireConvert for ($($name,)+) {
            fn variant_type() -> VariantType {
                VariantType::tuple(vec![$($name::variant_type()),+])
            }

            fn to_variant(&self) -> Variant {
                Variant::Tuple(vec![$(self.$idx.to_variant()),+])
            }

            fn from_variant(variant: &Variant) -> Result<Self, VariantError> {
                match variant {
                    Variant::Tuple(items) if items.len() == $arity => {
                        Ok(($($name::from_variant(&items[$idx])?,)+))
                    }
                    other => Err(VariantError::mismatch(Self::variant_type(), other)),
                }
            }
        }

        impl<$($name: WireConvert),+> WireTuple for ($($name,)+) {
            const ARITY: usize = $arity;

            fn variant_types() -> Vec<VariantType> {
                vec![$($name::variant_type()),+]
            }

            fn to_variants(&self) -> Vec<Variant> {
                vec![$(self.$idx.to_variant()),+]
            }

            fn from_variants(values: &[Variant]) -> Result<Self, VariantError> {
                if values.len() != $arity {
                    return Err(VariantError::ArityMismatch {
                        expected: $arity,
                        found: values.len(),
                    });
                }
                Ok(($($name::from_variant(&values[$idx])?,)+))
            }
        }
    };
}

wire_tuple!(1 => A: 0);
wire_tuple!(2 => A: 0, B: 1);
wire_tuple!(3 => A: 0, B: 1, C: 2);
wire_tuple!(4 => A: 0, B: 1, C: 2, D: 3);
wire_tuple!(5 => A: 0, B: 1, C: 2, D: 3, E: 4);
wire_tuple!(6 => A: 0, B: 1, C: 2, D: 3, E: 4, F: 5);
wire_tuple!(7 => A: 0, B: 1, C: 2, D: 3, E: 4, F: 5, G: 6);
wire_tuple!(8 => A: 0, B: 1, C: 2, D: 3, E: 4, F: 5, G: 6, H: 7);
