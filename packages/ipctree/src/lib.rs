//! ipctree: a transport-independent IPC object model.
//!
//! Native Rust state and callables are bundled into named interfaces,
//! attached to nodes of an address tree, and exposed through any number of
//! transports at once. The object model is re-exported at the top level;
//! the layers are also reachable by name:
//! - [`variant`]: dynamically typed values and their type descriptors
//! - [`local`]: an in-process transport for embedding and tests
//!
//! ```rust
//! use std::sync::Arc;
//! use ipctree::local::{LocalConfig, LocalTransport};
//! use ipctree::{shared, Interface, Node, Permissions, Property, Variant};
//!
//! let transport = Arc::new(LocalTransport::new(LocalConfig::default()).unwrap());
//! transport.start();
//!
//! let volume = shared(5u32);
//! let root = Node::make_root("player");
//! root.add_server(transport.clone()).unwrap();
//! let _iface = root
//!     .make_interface(
//!         Interface::builder("org.example.Player")
//!             .property("volume", Property::new(&volume, Permissions::FULL))
//!             .build(),
//!     )
//!     .unwrap();
//!
//! transport
//!     .set_property("/player", "org.example.Player", "volume", &Variant::UInt32(7))
//!     .unwrap();
//! assert_eq!(*volume.lock().unwrap(), 7);
//! ```

pub use ipctree_local as local;
pub use ipctree_variant as variant;

pub use ipctree_core::*;
