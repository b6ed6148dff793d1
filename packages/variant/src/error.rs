//! Error types for the variant layer.

use thiserror::Error;

use crate::types::VariantType;
use crate::value::Variant;

/// Errors raised while decoding variants or handling type descriptors.
///
/// Decoding is strict: the stored alternative must be exactly the one the
/// native type maps to. There is no numeric widening or narrowing.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum VariantError {
    /// The variant holds a different alternative than the one requested.
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: VariantType,
        found: &'static str,
    },

    /// A positional pack has the wrong number of elements.
    #[error("arity mismatch: expected {expected} values, found {found}")]
    ArityMismatch { expected: usize, found: usize },

    /// A signature string could not be parsed.
    #[error("invalid signature '{signature}': {message}")]
    InvalidSignature { signature: String, message: String },

    /// The invalid sentinel type was used where a real type is required.
    #[error("invalid variant type")]
    InvalidType,
}

impl VariantError {
    /// Build a `TypeMismatch` for a variant that failed to decode.
    pub fn mismatch(expected: VariantType, found: &Variant) -> Self {
        VariantError::TypeMismatch {
            expected,
            found: found.type_name(),
        }
    }

    pub(crate) fn signature(signature: &str, message: impl Into<String>) -> Self {
        VariantError::InvalidSignature {
            signature: signature.to_string(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mismatch_names_both_sides() {
        let e = VariantError::mismatch(VariantType::Int32, &Variant::Int16(3));
        let display = e.to_string();
        assert!(display.contains("expected i"));
        assert!(display.contains("found int16"));
    }

    #[test]
    fn mismatch_with_invalid_expected() {
        let e = VariantError::mismatch(VariantType::Invalid, &Variant::Bool(true));
        assert!(e.to_string().contains("<invalid>"));
    }

    #[test]
    fn arity_display() {
        let e = VariantError::ArityMismatch {
            expected: 2,
            found: 3,
        };
        assert_eq!(e.to_string(), "arity mismatch: expected 2 values, found 3");
    }

    #[test]
    fn signature_display() {
        let e = VariantError::signature("a{", "unterminated map");
        let display = e.to_string();
        assert!(display.contains("a{"));
        assert!(display.contains("unterminated map"));
    }
}
