//! Interfaces: named bundles of functions, properties and signals.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use ipctree_variant::{Variant, VariantTuple, VariantType, WireTuple};
use parking_lot::Mutex;

use crate::error::{Error, MemberKind, Result};
use crate::function::Function;
use crate::introspect::{self, FunctionInfo, InterfaceInfo, PropertyInfo, SignalInfo};
use crate::node::{Node, NodeLink};
use crate::property::Property;
use crate::signal::Signal;

pub type FunctionTable = BTreeMap<String, Function>;
pub type PropertyTable = BTreeMap<String, Property>;
pub type SignalTable = BTreeMap<String, Signal>;

/// A named, fixed set of functions, properties and signals.
///
/// The function and signal tables never change after construction. The
/// property table can be edited until the interface is attached; after that
/// only property values change.
///
/// # Ownership
///
/// The application owns interfaces. [`Node::make_interface`] moves the value
/// into an `Arc` and hands it back; the node keeps only a weak reference.
/// Dropping the last `Arc` detaches the interface from its node and every
/// transport. Destroying the node detaches, but does not destroy, the
/// interfaces still held elsewhere.
///
/// A clone is always detached. Only the registered instance can emit signals.
pub struct Interface {
    name: String,
    functions: FunctionTable,
    properties: PropertyTable,
    signals: SignalTable,
    owner: Mutex<Option<NodeLink>>,
}

impl Interface {
    pub fn new(
        name: impl Into<String>,
        functions: FunctionTable,
        properties: PropertyTable,
        signals: SignalTable,
    ) -> Self {
        Self {
            name: name.into(),
            functions,
            properties,
            signals,
            owner: Mutex::new(None),
        }
    }

    pub fn builder(name: impl Into<String>) -> InterfaceBuilder {
        InterfaceBuilder {
            name: name.into(),
            functions: FunctionTable::new(),
            properties: PropertyTable::new(),
            signals: SignalTable::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn functions(&self) -> &FunctionTable {
        &self.functions
    }

    pub fn properties(&self) -> &PropertyTable {
        &self.properties
    }

    /// Mutable access to the property table of a detached interface.
    ///
    /// Returns `None` once the interface is attached.
    pub fn properties_mut(&mut self) -> Option<&mut PropertyTable> {
        if self.owner.get_mut().is_some() {
            return None;
        }
        Some(&mut self.properties)
    }

    pub fn signals(&self) -> &SignalTable {
        &self.signals
    }

    pub fn function(&self, name: &str) -> Result<&Function> {
        self.functions
            .get(name)
            .ok_or_else(|| Error::unknown(MemberKind::Function, name))
    }

    pub fn get_property(&self, name: &str) -> Result<&Property> {
        self.properties
            .get(name)
            .ok_or_else(|| Error::unknown(MemberKind::Property, name))
    }

    pub fn signal(&self, name: &str) -> Result<&Signal> {
        self.signals
            .get(name)
            .ok_or_else(|| Error::unknown(MemberKind::Signal, name))
    }

    /// Check whether a node currently owns this interface.
    pub fn is_attached(&self) -> bool {
        self.owner.lock().is_some()
    }

    /// The owning node, if attached and still alive.
    pub fn node(&self) -> Option<Arc<Node>> {
        let link = self.owner.lock().clone()?;
        link.node()
    }

    pub(crate) fn set_owner(&self, owner: Option<NodeLink>) {
        *self.owner.lock() = owner;
    }

    /// Emit a declared signal with a native argument tuple.
    ///
    /// Does nothing while the interface is detached.
    ///
    /// # Panics
    ///
    /// Panics if the signal is undeclared, the arity or any argument type
    /// differs from the declaration, or this is not the registered instance
    /// of an attached interface.
    pub fn emit_signal<Args: WireTuple>(&self, signal: &str, args: Args) {
        let declared = self.declared_signal(signal);
        let types = Args::variant_types();
        if types.len() != declared.types().len() {
            panic!(
                "signal '{}' on '{}' takes {} arguments, emitted with {}",
                signal,
                self.name,
                declared.types().len(),
                types.len()
            );
        }
        if types != declared.types() {
            panic!(
                "signal '{}' on '{}' declared as {}, emitted as {}",
                signal,
                self.name,
                declared.args_type(),
                VariantType::tuple(types)
            );
        }

        self.forward(signal, &args.to_variants(), &declared.args_type());
    }

    /// Emit a declared signal with already-encoded arguments.
    ///
    /// # Panics
    ///
    /// Same conditions as [`Interface::emit_signal`], with each value checked
    /// structurally against its declared type.
    pub fn emit_variants(&self, signal: &str, args: &[Variant]) {
        let declared = self.declared_signal(signal);
        if args.len() != declared.types().len() {
            panic!(
                "signal '{}' on '{}' takes {} arguments, emitted with {}",
                signal,
                self.name,
                declared.types().len(),
                args.len()
            );
        }
        if let Some(position) = args
            .iter()
            .zip(declared.types())
            .position(|(value, ty)| !value.matches(ty))
        {
            panic!(
                "signal '{}' on '{}' argument {} must be {}, emitted a {}",
                signal,
                self.name,
                position,
                declared.types()[position],
                args[position].type_name()
            );
        }

        self.forward(signal, args, &declared.args_type());
    }

    fn declared_signal(&self, signal: &str) -> &Signal {
        match self.signals.get(signal) {
            Some(declared) => declared,
            None => panic!("signal '{}' is not declared on '{}'", signal, self.name),
        }
    }

    fn forward(&self, signal: &str, args: &[Variant], args_type: &VariantType) {
        let link = self.owner.lock().clone();
        if let Some(link) = link {
            link.emit_signal(self, signal, args, args_type);
        }
    }

    /// Describe every member, for introspection.
    pub fn describe(&self) -> InterfaceInfo {
        InterfaceInfo {
            name: self.name.clone(),
            functions: self
                .functions
                .iter()
                .map(|(name, f)| FunctionInfo {
                    name: name.clone(),
                    inputs: introspect::args(f.arg_names(), f.arg_types()),
                    outputs: introspect::args(f.return_names(), f.return_types()),
                })
                .collect(),
            properties: self
                .properties
                .iter()
                .map(|(name, p)| PropertyInfo {
                    name: name.clone(),
                    variant_type: p.variant_type().clone(),
                    readable: p.readable(),
                    writeable: p.writeable(),
                })
                .collect(),
            signals: self
                .signals
                .iter()
                .map(|(name, s)| SignalInfo {
                    name: name.clone(),
                    args: introspect::args(s.names(), s.types()),
                })
                .collect(),
        }
    }

    /// Call a function by name.
    pub fn call(&self, function: &str, args: &[Variant]) -> Result<VariantTuple> {
        self.function(function)?.call(args)
    }
}

impl Clone for Interface {
    fn clone(&self) -> Self {
        Self::new(
            self.name.clone(),
            self.functions.clone(),
            self.properties.clone(),
            self.signals.clone(),
        )
    }
}

impl Drop for Interface {
    fn drop(&mut self) {
        if let Some(link) = self.owner.get_mut().take() {
            link.release(self);
        }
    }
}

impl fmt::Debug for Interface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Interface")
            .field("name", &self.name)
            .field("functions", &self.functions.keys().collect::<Vec<_>>())
            .field("properties", &self.properties.keys().collect::<Vec<_>>())
            .field("signals", &self.signals.keys().collect::<Vec<_>>())
            .field("attached", &self.is_attached())
            .finish()
    }
}

/// Builder for [`Interface`].
#[derive(Debug)]
pub struct InterfaceBuilder {
    name: String,
    functions: FunctionTable,
    properties: PropertyTable,
    signals: SignalTable,
}

impl InterfaceBuilder {
    pub fn function(mut self, name: impl Into<String>, function: Function) -> Self {
        self.functions.insert(name.into(), function);
        self
    }

    pub fn property(mut self, name: impl Into<String>, property: Property) -> Self {
        self.properties.insert(name.into(), property);
        self
    }

    pub fn signal(mut self, name: impl Into<String>, signal: Signal) -> Self {
        self.signals.insert(name.into(), signal);
        self
    }

    pub fn build(self) -> Interface {
        Interface::new(self.name, self.functions, self.properties, self.signals)
    }
}

/// Application types that carry an [`Interface`].
///
/// Implement this to attach a type that holds its own state next to its
/// interface, then reach that state through the `Arc` returned by
/// [`Node::make_interface`].
pub trait AsInterface: Send + Sync + 'static {
    fn interface(&self) -> &Interface;
}

impl AsInterface for Interface {
    fn interface(&self) -> &Interface {
        self
    }
}
