//! An in-process transport.
//!
//! `LocalTransport` keeps the registry a bus connection would keep, and
//! dispatches calls, property access and signal delivery entirely within
//! the process. Object references cross it as the address of the node that
//! manages them.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Weak};

use ipctree_core::{
    AsInterface, Error, Interface, Node, NodeInfo, ObjectPath, ObjectRef, Result, Transport,
    Variant, VariantMap, VariantTuple, VariantType, WeakObjectRef,
};
use parking_lot::Mutex;

use crate::address::Address;
use crate::config::{ConfigError, LocalConfig};
use crate::fault::Fault;
use crate::registry::AddressTrie;

/// A signal as delivered to subscribers.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalEvent {
    pub address: String,
    pub interface: String,
    pub signal: String,
    pub args: VariantTuple,
    pub args_type: VariantType,
}

struct Registration {
    node: Weak<Node>,
    interfaces: BTreeSet<String>,
}

#[derive(Default)]
struct State {
    objects: AddressTrie<Registration>,
    managed: BTreeMap<Address, WeakObjectRef>,
    subscribers: Vec<Sender<SignalEvent>>,
}

/// A transport whose remote surface is this process.
///
/// The registry lock is never held while calling into the node tree, so a
/// node may call back into the transport at any time.
pub struct LocalTransport {
    name: String,
    root: String,
    state: Mutex<State>,
    running: AtomicBool,
}

impl LocalTransport {
    /// Create a stopped transport.
    pub fn new(config: LocalConfig) -> std::result::Result<Self, ConfigError> {
        let root = config.root_address()?.to_string();
        Ok(Self {
            name: config.name,
            root,
            state: Mutex::new(State::default()),
            running: AtomicBool::new(false),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Start serving calls and delivering signals.
    pub fn start(&self) {
        if !self.running.swap(true, Ordering::SeqCst) {
            log::debug!("{}: started", self.name);
        }
    }

    /// Stop serving. Registrations are kept.
    pub fn stop(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            log::debug!("{}: stopped", self.name);
        }
    }

    pub fn running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Receive every signal emitted while running.
    ///
    /// Dropping the receiver unsubscribes.
    pub fn subscribe(&self) -> Receiver<SignalEvent> {
        let (tx, rx) = mpsc::channel();
        self.state.lock().subscribers.push(tx);
        rx
    }

    /// Invoke a method.
    pub fn call(
        &self,
        address: &str,
        interface: &str,
        method: &str,
        args: &[Variant],
    ) -> std::result::Result<VariantTuple, Fault> {
        self.ensure_running()?;
        let object = self.resolve(address, interface)?;
        let function = object.interface().function(method)?;

        let args = self.import_all(args, function.arg_types())?;
        let returns = function.call(&args)?;
        returns.iter().map(|v| self.export(v)).collect()
    }

    /// Read a property.
    pub fn get_property(
        &self,
        address: &str,
        interface: &str,
        property: &str,
    ) -> std::result::Result<Variant, Fault> {
        self.ensure_running()?;
        let object = self.resolve(address, interface)?;
        let value = object.interface().get_property(property)?.get()?;
        self.export(&value)
    }

    /// Write a property. Returns whether the value was applied.
    pub fn set_property(
        &self,
        address: &str,
        interface: &str,
        property: &str,
        value: &Variant,
    ) -> std::result::Result<bool, Fault> {
        self.ensure_running()?;
        let object = self.resolve(address, interface)?;
        let target = object.interface().get_property(property)?;
        let value = self.import(value, target.variant_type())?;
        Ok(target.set(&value)?)
    }

    /// Read every readable property of an interface.
    pub fn get_all(
        &self,
        address: &str,
        interface: &str,
    ) -> std::result::Result<BTreeMap<String, Variant>, Fault> {
        self.ensure_running()?;
        let object = self.resolve(address, interface)?;
        let mut values = BTreeMap::new();
        for (name, property) in object.interface().properties() {
            if property.readable() {
                values.insert(name.clone(), self.export(&property.get()?)?);
            }
        }
        Ok(values)
    }

    /// Describe the interfaces and direct children at an address.
    pub fn introspect(&self, address: &str) -> std::result::Result<NodeInfo, Fault> {
        let parsed = parse(address)?;
        let (node, children) = {
            let state = self.state.lock();
            let node = state.objects.get(&parsed).map(|r| r.node.clone());
            if node.is_none() && !state.objects.contains_branch(&parsed) {
                return Err(Fault::UnknownObject(address.to_string()));
            }
            (node, state.objects.child_names(&parsed))
        };

        let interfaces = match node.and_then(|n| n.upgrade()) {
            Some(node) => node
                .interfaces()
                .values()
                .map(|object| object.interface().describe())
                .collect(),
            None => Vec::new(),
        };

        Ok(NodeInfo {
            address: parsed.to_string(),
            interfaces,
            children,
        })
    }

    /// The address of the node managing `object`, if any.
    pub fn resolve_object(&self, object: &ObjectRef) -> Option<String> {
        let state = self.state.lock();
        state
            .managed
            .iter()
            .find(|(_, weak)| weak.refers_to(object) && !weak.is_expired())
            .map(|(address, _)| address.to_string())
    }

    /// The live object managed at `address`, if any.
    pub fn object_at(&self, address: &str) -> Option<ObjectRef> {
        let address = Address::parse(address).ok()?;
        let weak = self.state.lock().managed.get(&address).cloned()?;
        weak.upgrade()
    }

    /// Every address with at least one registered interface.
    pub fn addresses(&self) -> Vec<String> {
        self.state
            .lock()
            .objects
            .iter()
            .map(|(address, _)| address.to_string())
            .collect()
    }

    /// Interface names registered at an address.
    pub fn interfaces_at(&self, address: &str) -> Vec<String> {
        let Ok(address) = Address::parse(address) else {
            return Vec::new();
        };
        self.state
            .lock()
            .objects
            .get(&address)
            .map(|r| r.interfaces.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn ensure_running(&self) -> std::result::Result<(), Fault> {
        if self.running() {
            Ok(())
        } else {
            Err(Fault::NotRunning)
        }
    }

    fn resolve(
        &self,
        address: &str,
        interface: &str,
    ) -> std::result::Result<Arc<dyn AsInterface>, Fault> {
        let parsed = parse(address)?;
        let node = {
            let state = self.state.lock();
            let registration = state
                .objects
                .get(&parsed)
                .ok_or_else(|| Fault::UnknownObject(address.to_string()))?;
            if !registration.interfaces.contains(interface) {
                return Err(Fault::UnknownInterface(interface.to_string()));
            }
            registration.node.clone()
        };

        let node = node
            .upgrade()
            .ok_or_else(|| Fault::UnknownObject(address.to_string()))?;
        node.interface(interface)
            .ok_or_else(|| Fault::UnknownInterface(interface.to_string()))
    }

    // Object references leave as the address of their managing node.
    fn export(&self, value: &Variant) -> std::result::Result<Variant, Fault> {
        Ok(match value {
            Variant::Object(object) => {
                let address = self.resolve_object(object).ok_or_else(|| {
                    Fault::Failed("object is not managed by any node".to_string())
                })?;
                Variant::ObjectPath(ObjectPath::new(address))
            }
            Variant::Vector(items) => Variant::Vector(self.export_all(items)?),
            Variant::Tuple(items) => Variant::Tuple(self.export_all(items)?),
            Variant::Map(map) => Variant::Map(
                map.iter()
                    .map(|(k, v)| Ok((self.export(k)?, self.export(v)?)))
                    .collect::<std::result::Result<VariantMap, Fault>>()?,
            ),
            other => other.clone(),
        })
    }

    fn export_all(&self, values: &[Variant]) -> std::result::Result<Vec<Variant>, Fault> {
        values.iter().map(|v| self.export(v)).collect()
    }

    // Addresses arrive where an object reference is declared.
    fn import(&self, value: &Variant, ty: &VariantType) -> std::result::Result<Variant, Fault> {
        Ok(match (value, ty) {
            (Variant::ObjectPath(path), VariantType::Object) => {
                let object = self
                    .object_at(path)
                    .ok_or_else(|| Fault::UnknownObject(path.to_string()))?;
                Variant::Object(object)
            }
            (Variant::Vector(items), VariantType::Vector(element)) => Variant::Vector(
                items
                    .iter()
                    .map(|item| self.import(item, element))
                    .collect::<std::result::Result<_, _>>()?,
            ),
            (Variant::Tuple(items), VariantType::Tuple(types)) if items.len() == types.len() => {
                Variant::Tuple(self.import_all(items, types)?)
            }
            (Variant::Map(map), VariantType::Map(key, val)) => Variant::Map(
                map.iter()
                    .map(|(k, v)| Ok((self.import(k, key)?, self.import(v, val)?)))
                    .collect::<std::result::Result<VariantMap, Fault>>()?,
            ),
            (other, _) => other.clone(),
        })
    }

    fn import_all(
        &self,
        values: &[Variant],
        types: &[VariantType],
    ) -> std::result::Result<Vec<Variant>, Fault> {
        // Arity is the function's to check; extra values pass through.
        values
            .iter()
            .enumerate()
            .map(|(i, value)| match types.get(i) {
                Some(ty) => self.import(value, ty),
                None => Ok(value.clone()),
            })
            .collect()
    }
}

fn parse(address: &str) -> std::result::Result<Address, Fault> {
    Address::parse(address).map_err(|_| Fault::UnknownObject(address.to_string()))
}

impl Transport for LocalTransport {
    fn root(&self) -> &str {
        &self.root
    }

    fn add_interface(&self, node: &Node, interface: &Interface) -> Result<()> {
        let address = Address::parse(&node.full_name(self)).map_err(Error::transport)?;
        let handle = node.weak();

        let mut state = self.state.lock();
        let registration = state.objects.get_or_insert_with(&address, || Registration {
            node: handle.clone(),
            interfaces: BTreeSet::new(),
        });

        if !Weak::ptr_eq(&registration.node, &handle) {
            if registration.node.strong_count() > 0 && !registration.interfaces.is_empty() {
                return Err(Error::DuplicateRegistration(format!(
                    "{} is in use by another node",
                    address
                )));
            }
            registration.node = handle;
            registration.interfaces.clear();
        }
        if !registration.interfaces.insert(interface.name().to_string()) {
            return Err(Error::DuplicateRegistration(format!(
                "{} already registered at {}",
                interface.name(),
                address
            )));
        }

        log::debug!("{}: registered {} at {}", self.name, interface.name(), address);
        Ok(())
    }

    fn drop_interface(&self, address: &str, interface: &str) -> bool {
        let Ok(address) = Address::parse(address) else {
            return false;
        };

        let mut state = self.state.lock();
        let Some(registration) = state.objects.get_mut(&address) else {
            return false;
        };
        let removed = registration.interfaces.remove(interface);
        if registration.interfaces.is_empty() {
            state.objects.remove(&address);
        }

        if removed {
            log::debug!("{}: unregistered {} at {}", self.name, interface, address);
        }
        removed
    }

    fn emit_signal(
        &self,
        address: &str,
        interface: &str,
        signal: &str,
        args: &[Variant],
        args_type: &VariantType,
    ) -> Result<()> {
        if !self.running() {
            return Err(Error::transport(Fault::NotRunning));
        }
        let args = self.export_all(args).map_err(Error::transport)?;
        let event = SignalEvent {
            address: address.to_string(),
            interface: interface.to_string(),
            signal: signal.to_string(),
            args,
            args_type: args_type.clone(),
        };

        let mut state = self.state.lock();
        let before = state.subscribers.len();
        state
            .subscribers
            .retain(|subscriber| subscriber.send(event.clone()).is_ok());
        if state.subscribers.len() < before {
            log::debug!(
                "{}: pruned {} closed subscribers",
                self.name,
                before - state.subscribers.len()
            );
        }
        Ok(())
    }

    fn set_managing(&self, node: &Node, object: Option<WeakObjectRef>) {
        let address = match Address::parse(&node.full_name(self)) {
            Ok(address) => address,
            Err(e) => {
                log::warn!("{}: cannot manage object at {}: {}", self.name, node.tree_name(), e);
                return;
            }
        };

        let mut state = self.state.lock();
        match object {
            Some(object) => {
                state.managed.insert(address, object);
            }
            None => {
                state.managed.remove(&address);
            }
        }
    }
}

impl std::fmt::Debug for LocalTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalTransport")
            .field("name", &self.name)
            .field("root", &self.root)
            .field("running", &self.running())
            .finish()
    }
}
