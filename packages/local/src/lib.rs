//! An in-process transport for ipctree.
//!
//! `LocalTransport` implements the core `Transport` trait without any wire
//! protocol. It keeps an address registry of bound interfaces and lets code
//! in the same process call methods, read and write properties, introspect
//! nodes and subscribe to signals. Addresses follow the bus convention:
//! absolute, `/`-separated, components of `[A-Za-z0-9_]`.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use ipctree_core::{Function, Interface, Node, Variant};
//! use ipctree_local::{LocalConfig, LocalTransport};
//!
//! let transport = Arc::new(LocalTransport::new(LocalConfig::new("demo", "/org/example")).unwrap());
//! transport.start();
//!
//! let root = Node::make_root("player");
//! root.add_server(transport.clone()).unwrap();
//! let _iface = root
//!     .make_interface(
//!         Interface::builder("org.example.Player")
//!             .function("echo", Function::new(|s: String| s, &["input"], &["output"]))
//!             .build(),
//!     )
//!     .unwrap();
//!
//! let reply = transport
//!     .call("/org/example/player", "org.example.Player", "echo", &[Variant::from("hi")])
//!     .unwrap();
//! assert_eq!(reply, vec![Variant::from("hi")]);
//! ```

mod address;
mod config;
mod fault;
mod registry;
mod transport;

pub use address::{Address, AddressError};
pub use config::{ConfigError, LocalConfig};
pub use fault::Fault;
pub use registry::{AddressTrie, AddressTrieIter};
pub use transport::{LocalTransport, SignalEvent};
