//! The contract between the object model and a wire transport.

use ipctree_variant::{Variant, VariantType, WeakObjectRef};

use crate::error::Result;
use crate::interface::Interface;
use crate::node::Node;

/// A protocol-specific binding that makes registrations reachable.
///
/// Nodes call into a transport while holding their tree lock, so an
/// implementation must not block on anything that itself takes the tree lock
/// from another thread. Calling back into the same tree from the calling
/// thread is fine: the lock is reentrant.
///
/// A transport must treat every address, interface and member it is asked
/// about as possibly gone. It keeps only weak references to nodes.
pub trait Transport: Send + Sync {
    /// Address prefix under which this transport publishes its nodes.
    fn root(&self) -> &str;

    /// Register `interface` at the current address of `node`.
    ///
    /// Fails if the address already carries an interface with that name.
    fn add_interface(&self, node: &Node, interface: &Interface) -> Result<()>;

    /// Unregister an interface. Best effort; returns whether it was present.
    fn drop_interface(&self, address: &str, interface: &str) -> bool;

    /// Broadcast a signal. Failures are reported, never retried.
    fn emit_signal(
        &self,
        address: &str,
        interface: &str,
        signal: &str,
        args: &[Variant],
        args_type: &VariantType,
    ) -> Result<()>;

    /// Associate an application object with the address of `node`, or clear
    /// the association.
    fn set_managing(&self, node: &Node, object: Option<WeakObjectRef>);
}
