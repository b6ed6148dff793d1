//! ipctree core: the transport-independent object model.
//!
//! This layer turns native Rust state and callables into a hierarchical,
//! named address space that any number of transports can expose at once:
//! - `Function`: a native callable erased to tuple-in/tuple-out over `Variant`
//! - `Property`: lock-guarded storage with read/write permissions and validation
//! - `Signal`: the declared shape of a notification
//! - `Interface`: a named, fixed bundle of functions, properties and signals
//! - `Node`: an entry in the address tree, owning interface registrations and
//!   tracking the transports it is bound to
//! - `Transport`: the protocol-specific collaborator that makes registrations
//!   reachable
//!
//! # Example
//!
//! ```rust
//! use ipctree_core::{Function, Interface, Node, Property, Permissions, shared, make_signal};
//!
//! let volume = shared(5u32);
//! let iface = Interface::builder("org.example.Player")
//!     .function("echo", Function::new(|s: String| s, &["input"], &["output"]))
//!     .property("volume", Property::new(&volume, Permissions::FULL))
//!     .signal("stopped", make_signal::<(String,)>(&["reason"]))
//!     .build();
//!
//! let root = Node::make_root("player");
//! let iface = root.make_interface(iface).unwrap();
//! assert!(iface.is_attached());
//! ```

mod error;
mod function;
mod interface;
mod introspect;
mod node;
mod property;
mod signal;
mod transport;

pub use error::{Error, MemberKind, Result};
pub use function::{Callable, Function, Method, WireReturn};
pub use interface::{AsInterface, FunctionTable, Interface, InterfaceBuilder, PropertyTable, SignalTable};
pub use introspect::{ArgInfo, FunctionInfo, InterfaceInfo, NodeInfo, PropertyInfo, SignalInfo};
pub use node::Node;
pub use property::{shared, Permissions, Property, Shared};
pub use signal::{make_signal, Signal};
pub use transport::Transport;

// Re-export the variant layer for convenience
pub use ipctree_variant::{
    from_variant, make_variant_type, to_variant, ObjectPath, ObjectRef, Signature, Variant,
    VariantError, VariantMap, VariantTuple, VariantType, WeakObjectRef, WireConvert, WireTuple,
};
