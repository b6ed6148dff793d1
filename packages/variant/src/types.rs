//! Variant type descriptors and their signature strings.

use std::fmt;
use std::iter::Peekable;
use std::str::{Chars, FromStr};

use serde::de::{self, Deserialize, Deserializer};
use serde::ser::{self, Serialize, Serializer};

use crate::error::VariantError;

/// The shape of a [`Variant`](crate::Variant).
///
/// A type is either a primitive or built from the `vector`, `map` and `tuple`
/// combinators. Equality is structural: a vector of `Int32` is not a one-element
/// tuple of `Int32`.
///
/// The default value is the invalid sentinel. It has no signature, matches no
/// value, and must never be used to encode.
///
/// # Signatures
///
/// Types render to a compact signature string:
///
/// | type | code | type | code |
/// |------|------|------|------|
/// | `Int16` | `n` | `UInt16` | `q` |
/// | `Int32` | `i` | `UInt32` | `u` |
/// | `Int64` | `x` | `UInt64` | `t` |
/// | `Double` | `d` | `Byte` | `y` |
/// | `Bool` | `b` | `String` | `s` |
/// | `ObjectPath` | `o` | `Signature` | `g` |
/// | `Object` | `o` | `Vector(T)` | `aT` |
/// | `Map(K, V)` | `a{KV}` | `Tuple(T...)` | `(T...)` |
///
/// An object reference travels as the address of its managing node, so it
/// shares the `o` code with `ObjectPath`. Parsing `o` yields `ObjectPath`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum VariantType {
    #[default]
    Invalid,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Double,
    Byte,
    Bool,
    String,
    ObjectPath,
    Signature,
    Object,
    Vector(Box<VariantType>),
    Map(Box<VariantType>, Box<VariantType>),
    Tuple(Vec<VariantType>),
}

impl VariantType {
    /// Homogeneous sequence of `element`.
    pub fn vector(element: VariantType) -> Self {
        VariantType::Vector(Box::new(element))
    }

    /// Mapping from `key` to `value`.
    pub fn map(key: VariantType, value: VariantType) -> Self {
        VariantType::Map(Box::new(key), Box::new(value))
    }

    /// Fixed-length heterogeneous sequence.
    pub fn tuple(items: Vec<VariantType>) -> Self {
        VariantType::Tuple(items)
    }

    /// Check that neither this type nor any nested type is the invalid sentinel.
    pub fn is_valid(&self) -> bool {
        match self {
            VariantType::Invalid => false,
            VariantType::Vector(element) => element.is_valid(),
            VariantType::Map(key, value) => key.is_valid() && value.is_valid(),
            VariantType::Tuple(items) => items.iter().all(VariantType::is_valid),
            _ => true,
        }
    }

    /// Check if this is a primitive (non-container) type.
    pub fn is_primitive(&self) -> bool {
        !matches!(
            self,
            VariantType::Invalid
                | VariantType::Vector(_)
                | VariantType::Map(_, _)
                | VariantType::Tuple(_)
        )
    }

    /// Render the signature string.
    ///
    /// Fails with `InvalidType` if the type is or contains the invalid sentinel,
    /// or a map whose key is a container.
    pub fn signature(&self) -> Result<String, VariantError> {
        let mut out = String::new();
        self.write_signature(&mut out)?;
        Ok(out)
    }

    fn write_signature(&self, out: &mut String) -> Result<(), VariantError> {
        let code = match self {
            VariantType::Invalid => return Err(VariantError::InvalidType),
            VariantType::Int16 => 'n',
            VariantType::UInt16 => 'q',
            VariantType::Int32 => 'i',
            VariantType::UInt32 => 'u',
            VariantType::Int64 => 'x',
            VariantType::UInt64 => 't',
            VariantType::Double => 'd',
            VariantType::Byte => 'y',
            VariantType::Bool => 'b',
            VariantType::String => 's',
            VariantType::ObjectPath | VariantType::Object => 'o',
            VariantType::Signature => 'g',
            VariantType::Vector(element) => {
                out.push('a');
                return element.write_signature(out);
            }
            VariantType::Map(key, value) => {
                if !key.is_primitive() {
                    return Err(VariantError::InvalidType);
                }
                out.push_str("a{");
                key.write_signature(out)?;
                value.write_signature(out)?;
                out.push('}');
                return Ok(());
            }
            VariantType::Tuple(items) => {
                out.push('(');
                for item in items {
                    item.write_signature(out)?;
                }
                out.push(')');
                return Ok(());
            }
        };
        out.push(code);
        Ok(())
    }
}

impl fmt::Display for VariantType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.signature() {
            Ok(signature) => f.write_str(&signature),
            Err(_) => f.write_str("<invalid>"),
        }
    }
}

impl FromStr for VariantType {
    type Err = VariantError;

    /// Parse exactly one complete type from a signature string.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars().peekable();
        let ty = parse_one(s, &mut chars)?;
        if chars.peek().is_some() {
            return Err(VariantError::signature(s, "trailing characters"));
        }
        Ok(ty)
    }
}

fn parse_one(source: &str, chars: &mut Peekable<Chars<'_>>) -> Result<VariantType, VariantError> {
    let c = chars
        .next()
        .ok_or_else(|| VariantError::signature(source, "unexpected end of signature"))?;

    let ty = match c {
        'n' => VariantType::Int16,
        'q' => VariantType::UInt16,
        'i' => VariantType::Int32,
        'u' => VariantType::UInt32,
        'x' => VariantType::Int64,
        't' => VariantType::UInt64,
        'd' => VariantType::Double,
        'y' => VariantType::Byte,
        'b' => VariantType::Bool,
        's' => VariantType::String,
        'o' => VariantType::ObjectPath,
        'g' => VariantType::Signature,
        'a' if chars.peek() == Some(&'{') => {
            chars.next();
            let key = parse_one(source, chars)?;
            if !key.is_primitive() {
                return Err(VariantError::signature(source, "map key must be a primitive"));
            }
            let value = parse_one(source, chars)?;
            if chars.next() != Some('}') {
                return Err(VariantError::signature(source, "unterminated map entry"));
            }
            VariantType::map(key, value)
        }
        'a' => VariantType::vector(parse_one(source, chars)?),
        '(' => {
            let mut items = Vec::new();
            loop {
                match chars.peek() {
                    Some(')') => {
                        chars.next();
                        break;
                    }
                    Some(_) => items.push(parse_one(source, chars)?),
                    None => return Err(VariantError::signature(source, "unterminated tuple")),
                }
            }
            VariantType::tuple(items)
        }
        other => {
            return Err(VariantError::signature(
                source,
                format!("unknown type code '{}'", other),
            ))
        }
    };
    Ok(ty)
}

impl Serialize for VariantType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let signature = self.signature().map_err(ser::Error::custom)?;
        serializer.serialize_str(&signature)
    }
}

impl<'de> Deserialize<'de> for VariantType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let signature = String::deserialize(deserializer)?;
        signature.parse().map_err(de::Error::custom)
    }
}
