//! A recording transport for exercising the node tree.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use ipctree_core::{Error, Interface, Node, Result, Transport, Variant, VariantType, WeakObjectRef};

#[derive(Debug, Clone, PartialEq)]
pub struct Emitted {
    pub address: String,
    pub interface: String,
    pub signal: String,
    pub args: Vec<Variant>,
    pub args_type: VariantType,
}

/// Records registrations and emissions; can be told to fail.
#[derive(Default)]
pub struct MockTransport {
    root: String,
    registered: Mutex<BTreeSet<(String, String)>>,
    emitted: Mutex<Vec<Emitted>>,
    managing: Mutex<BTreeMap<String, WeakObjectRef>>,
    fail_add: AtomicBool,
    fail_emit: AtomicBool,
    drop_hook: Mutex<Option<DropHook>>,
}

type DropHook = (String, Box<dyn FnOnce() + Send>);

impl MockTransport {
    pub fn new(root: &str) -> Arc<Self> {
        Arc::new(Self {
            root: root.to_string(),
            ..Default::default()
        })
    }

    pub fn failing(root: &str) -> Arc<Self> {
        let transport = Self::new(root);
        transport.set_fail_add(true);
        transport
    }

    pub fn set_fail_add(&self, fail: bool) {
        self.fail_add.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_emit(&self, fail: bool) {
        self.fail_emit.store(fail, Ordering::SeqCst);
    }

    /// Run `hook` once, right after `interface` is next unregistered.
    pub fn on_drop(&self, interface: &str, hook: impl FnOnce() + Send + 'static) {
        *self.drop_hook.lock().unwrap() = Some((interface.to_string(), Box::new(hook)));
    }

    pub fn registered(&self) -> Vec<(String, String)> {
        self.registered.lock().unwrap().iter().cloned().collect()
    }

    pub fn is_registered(&self, address: &str, interface: &str) -> bool {
        self.registered
            .lock()
            .unwrap()
            .contains(&(address.to_string(), interface.to_string()))
    }

    pub fn emitted(&self) -> Vec<Emitted> {
        self.emitted.lock().unwrap().clone()
    }

    pub fn managed_addresses(&self) -> Vec<String> {
        self.managing.lock().unwrap().keys().cloned().collect()
    }
}

impl Transport for MockTransport {
    fn root(&self) -> &str {
        &self.root
    }

    fn add_interface(&self, node: &Node, interface: &Interface) -> Result<()> {
        if self.fail_add.load(Ordering::SeqCst) {
            return Err(Error::transport("mock transport refuses registrations"));
        }
        let key = (node.full_name(self), interface.name().to_string());
        let mut registered = self.registered.lock().unwrap();
        if !registered.insert(key.clone()) {
            return Err(Error::DuplicateRegistration(format!("{} at {}", key.1, key.0)));
        }
        Ok(())
    }

    fn drop_interface(&self, address: &str, interface: &str) -> bool {
        let removed = self
            .registered
            .lock()
            .unwrap()
            .remove(&(address.to_string(), interface.to_string()));

        let hook = {
            let mut slot = self.drop_hook.lock().unwrap();
            match slot.take() {
                Some((name, hook)) if name == interface => Some(hook),
                other => {
                    *slot = other;
                    None
                }
            }
        };
        if let Some(hook) = hook {
            hook();
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
        self.emitted.lock().unwrap().push(Emitted {
            address: address.to_string(),
            interface: interface.to_string(),
            signal: signal.to_string(),
            args: args.to_vec(),
            args_type: args_type.clone(),
        });
        if self.fail_emit.load(Ordering::SeqCst) {
            return Err(Error::transport("mock transport drops signals"));
        }
        Ok(())
    }

    fn set_managing(&self, node: &Node, object: Option<WeakObjectRef>) {
        let address = node.full_name(self);
        let mut managing = self.managing.lock().unwrap();
        match object {
            Some(object) => {
                managing.insert(address, object);
            }
            None => {
                managing.remove(&address);
            }
        }
    }
}
