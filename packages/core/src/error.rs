//! Error types for the core layer.

use std::fmt;

use ipctree_variant::{VariantError, VariantType};
use thiserror::Error;

/// What kind of member a lookup failed to find.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberKind {
    Object,
    Interface,
    Function,
    Property,
    Signal,
}

impl fmt::Display for MemberKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MemberKind::Object => "object",
            MemberKind::Interface => "interface",
            MemberKind::Function => "function",
            MemberKind::Property => "property",
            MemberKind::Signal => "signal",
        };
        f.write_str(name)
    }
}

/// Errors at the core layer.
///
/// All of these are synchronous and local: they are returned to the immediate
/// caller and nothing retries internally. Mapping them to wire-level fault
/// codes is the transport's job.
#[derive(Debug, Error)]
pub enum Error {
    /// A variant held the wrong alternative during decode.
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: VariantType,
        found: &'static str,
    },

    /// A positional pack had the wrong number of values.
    #[error("argument count mismatch: expected {expected}, found {found}")]
    ArgumentCountMismatch { expected: usize, found: usize },

    /// A property access violated its permission mask.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// No such object, interface or member.
    #[error("unknown {kind}: {name}")]
    UnknownMember { kind: MemberKind, name: String },

    /// A name collided on attach.
    #[error("duplicate registration: {0}")]
    DuplicateRegistration(String),

    /// The backing target of a function or property is gone.
    #[error("null target: {0}")]
    NullTarget(String),

    /// Signature or type descriptor problem.
    #[error(transparent)]
    Variant(VariantError),

    /// Error returned by a wrapped native callable, passed through untouched.
    #[error("callable failed: {0}")]
    Callable(Box<dyn std::error::Error + Send + Sync>),

    /// A transport refused a registration.
    #[error("transport error: {0}")]
    Transport(Box<dyn std::error::Error + Send + Sync>),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Build an `UnknownMember` error.
    pub fn unknown(kind: MemberKind, name: impl Into<String>) -> Self {
        Error::UnknownMember {
            kind,
            name: name.into(),
        }
    }

    /// Wrap a transport-specific failure.
    pub fn transport(e: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Error::Transport(e.into())
    }
}

impl From<VariantError> for Error {
    fn from(e: VariantError) -> Self {
        match e {
            VariantError::TypeMismatch { expected, found } => {
                Error::TypeMismatch { expected, found }
            }
            VariantError::ArityMismatch { expected, found } => {
                Error::ArgumentCountMismatch { expected, found }
            }
            other => Error::Variant(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as StdError;

    #[test]
    fn variant_errors_flatten() {
        let e: Error = VariantError::ArityMismatch {
            expected: 1,
            found: 2,
        }
        .into();
        assert!(matches!(
            e,
            Error::ArgumentCountMismatch {
                expected: 1,
                found: 2
            }
        ));

        let e: Error = VariantError::mismatch(VariantType::Bool, &ipctree_variant::Variant::Byte(1)).into();
        assert!(matches!(e, Error::TypeMismatch { found: "byte", .. }));

        let e: Error = VariantError::InvalidType.into();
        assert!(matches!(e, Error::Variant(VariantError::InvalidType)));
    }

    #[test]
    fn unknown_member_display() {
        let e = Error::unknown(MemberKind::Property, "volume");
        assert_eq!(e.to_string(), "unknown property: volume");
    }

    #[test]
    fn transport_error_keeps_source_message() {
        let io = std::io::Error::other("bus gone");
        let e = Error::transport(io);
        assert!(e.to_string().contains("bus gone"));
        assert!(StdError::source(&e).is_none());
    }

    #[test]
    fn permission_denied_display() {
        let e = Error::PermissionDenied("property not writeable".to_string());
        assert!(e.to_string().starts_with("permission denied"));
    }
}
