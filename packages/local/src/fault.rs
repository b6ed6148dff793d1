//! Wire-level faults reported to remote callers.

use ipctree_core::{Error, MemberKind};
use thiserror::Error;

/// The reply a caller gets when dispatch fails.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Fault {
    #[error("no object at '{0}'")]
    UnknownObject(String),

    #[error("no interface '{0}'")]
    UnknownInterface(String),

    #[error("no method '{0}'")]
    UnknownMethod(String),

    #[error("no property '{0}'")]
    UnknownProperty(String),

    /// An argument or value had the wrong type.
    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    /// Wrong number of arguments.
    #[error("invalid arguments: {0}")]
    InvalidArgs(String),

    #[error("access denied: {0}")]
    AccessDenied(String),

    #[error("transport is not running")]
    NotRunning,

    /// Anything else, including errors raised by the callee.
    #[error("failed: {0}")]
    Failed(String),
}

impl Fault {
    /// The conventional error name for this fault.
    pub fn name(&self) -> &'static str {
        match self {
            Fault::UnknownObject(_) => "org.freedesktop.DBus.Error.UnknownObject",
            Fault::UnknownInterface(_) => "org.freedesktop.DBus.Error.UnknownInterface",
            Fault::UnknownMethod(_) => "org.freedesktop.DBus.Error.UnknownMethod",
            Fault::UnknownProperty(_) => "org.freedesktop.DBus.Error.UnknownProperty",
            Fault::InvalidSignature(_) => "org.freedesktop.DBus.Error.InvalidSignature",
            Fault::InvalidArgs(_) => "org.freedesktop.DBus.Error.InvalidArgs",
            Fault::AccessDenied(_) => "org.freedesktop.DBus.Error.PropertyReadOnly",
            Fault::NotRunning => "org.freedesktop.DBus.Error.Disconnected",
            Fault::Failed(_) => "org.freedesktop.DBus.Error.Failed",
        }
    }
}

impl From<Error> for Fault {
    fn from(e: Error) -> Self {
        match e {
            Error::TypeMismatch { .. } => Fault::InvalidSignature(e.to_string()),
            Error::ArgumentCountMismatch { .. } => Fault::InvalidArgs(e.to_string()),
            Error::PermissionDenied(message) => Fault::AccessDenied(message),
            Error::UnknownMember { kind, name } => match kind {
                MemberKind::Object => Fault::UnknownObject(name),
                MemberKind::Interface => Fault::UnknownInterface(name),
                MemberKind::Function => Fault::UnknownMethod(name),
                MemberKind::Property => Fault::UnknownProperty(name),
                MemberKind::Signal => Fault::Failed(format!("unknown signal {}", name)),
            },
            other => Fault::Failed(other.to_string()),
        }
    }
}
