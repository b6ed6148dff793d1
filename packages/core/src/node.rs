//! The node tree.
//!
//! Nodes live in an arena owned by their tree and are addressed by stable
//! ids. Parent and child links are ids, so re-parenting on destruction is an
//! id rewrite. The arena holds only weak references to application objects,
//! interfaces and transports; strong references are always taken outside the
//! arena borrow so that no user `Drop` runs while it is held.
//!
//! All structural state of one tree sits behind one reentrant lock. The lock
//! is owned jointly by every node of the tree, so it outlives any single node.
//! Transports are called with the lock held (but the arena not borrowed) and
//! may call back into the tree from the same thread.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Weak};

use ipctree_variant::{ObjectRef, Variant, VariantType, WeakObjectRef};
use parking_lot::{ReentrantMutex, ReentrantMutexGuard};

use crate::error::{Error, MemberKind, Result};
use crate::interface::{AsInterface, Interface};
use crate::transport::Transport;

type NodeId = u64;

#[derive(Clone)]
struct Registration {
    interface: Weak<dyn AsInterface>,
    // Address of the registered `Interface`, to tell it apart from moved copies.
    addr: usize,
}

impl Registration {
    fn new<T: AsInterface>(object: &Arc<T>) -> Self {
        let weak = Arc::downgrade(object);
        let interface: Weak<dyn AsInterface> = weak;
        Self {
            interface,
            addr: address_of(object.interface()),
        }
    }

    fn is_live(&self) -> bool {
        self.interface.strong_count() > 0
    }

    fn is(&self, interface: &Interface) -> bool {
        self.addr == address_of(interface)
    }
}

fn address_of(interface: &Interface) -> usize {
    interface as *const Interface as usize
}

fn same_server(bound: &Weak<dyn Transport>, server: &dyn Transport) -> bool {
    bound.as_ptr() as *const () == server as *const dyn Transport as *const ()
}

struct NodeEntry {
    name: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    servers: Vec<Weak<dyn Transport>>,
    interfaces: BTreeMap<String, Registration>,
    managing: Option<WeakObjectRef>,
    handle: Weak<Node>,
}

impl NodeEntry {
    fn live_servers(&self) -> Vec<Arc<dyn Transport>> {
        self.servers.iter().filter_map(Weak::upgrade).collect()
    }

    fn live_interfaces(&self) -> Vec<Weak<dyn AsInterface>> {
        self.interfaces
            .values()
            .filter(|r| r.is_live())
            .map(|r| r.interface.clone())
            .collect()
    }
}

#[derive(Default)]
struct TreeState {
    next_id: NodeId,
    nodes: BTreeMap<NodeId, NodeEntry>,
}

impl TreeState {
    fn tree_name(&self, id: NodeId) -> String {
        let mut names = Vec::new();
        let mut cursor = Some(id);
        while let Some(entry) = cursor.and_then(|id| self.nodes.get(&id)) {
            if !entry.name.is_empty() {
                names.push(entry.name.as_str());
            }
            cursor = entry.parent;
        }
        names.reverse();
        names.join("/")
    }

    fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self
            .nodes
            .get(&id)
            .map(|e| e.children.clone())
            .unwrap_or_default();
        while let Some(next) = stack.pop() {
            if let Some(entry) = self.nodes.get(&next) {
                stack.extend(entry.children.iter().copied());
            }
            out.push(next);
        }
        out
    }
}

pub(crate) struct Tree {
    state: ReentrantMutex<RefCell<TreeState>>,
}

impl Tree {
    fn new() -> Self {
        Self {
            state: ReentrantMutex::new(RefCell::new(TreeState::default())),
        }
    }

    fn lock(&self) -> ReentrantMutexGuard<'_, RefCell<TreeState>> {
        self.state.lock()
    }

    /// Run `f` with the arena borrowed. `f` must not call out of the tree.
    fn with<R>(&self, f: impl FnOnce(&mut TreeState) -> R) -> R {
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();
        f(&mut state)
    }

    fn full_name(&self, id: NodeId, server: &dyn Transport) -> String {
        let tree_name = self.with(|s| s.tree_name(id));
        join_address(server.root(), &tree_name)
    }

    fn insert(tree: &Arc<Tree>, name: String, parent: Option<NodeId>) -> Arc<Node> {
        let _guard = tree.lock();
        Arc::new_cyclic(|handle| {
            let id = tree.with(|s| {
                let id = s.next_id;
                s.next_id += 1;

                // Bindings are a snapshot of the parent's, not inherited live.
                let servers = parent
                    .and_then(|p| s.nodes.get(&p))
                    .map(|p| {
                        p.servers
                            .iter()
                            .filter(|w| w.strong_count() > 0)
                            .cloned()
                            .collect()
                    })
                    .unwrap_or_default();

                s.nodes.insert(
                    id,
                    NodeEntry {
                        name,
                        parent,
                        children: Vec::new(),
                        servers,
                        interfaces: BTreeMap::new(),
                        managing: None,
                        handle: handle.clone(),
                    },
                );
                if let Some(p) = parent.and_then(|p| s.nodes.get_mut(&p)) {
                    p.children.push(id);
                }
                id
            });

            Node {
                tree: tree.clone(),
                id,
                stand_in: false,
            }
        })
    }
}

/// Join a transport root and a tree name into an address.
pub(crate) fn join_address(root: &str, tree_name: &str) -> String {
    let root = root.trim_end_matches('/');
    match (root.is_empty(), tree_name.is_empty()) {
        (true, true) => "/".to_string(),
        (false, true) => root.to_string(),
        _ => format!("{}/{}", root, tree_name),
    }
}

fn join_names(parent: &str, child: &str) -> String {
    match (parent.is_empty(), child.is_empty()) {
        (true, _) => child.to_string(),
        (_, true) => parent.to_string(),
        _ => format!("{}/{}", parent, child),
    }
}

/// Back-reference from an attached interface to its node.
#[derive(Clone)]
pub(crate) struct NodeLink {
    tree: Weak<Tree>,
    id: NodeId,
}

impl NodeLink {
    pub(crate) fn node(&self) -> Option<Arc<Node>> {
        let tree = self.tree.upgrade()?;
        let handle = tree.with(|s| s.nodes.get(&self.id).map(|e| e.handle.clone()))?;
        handle.upgrade()
    }

    /// Fan a signal out to every transport bound to the node.
    pub(crate) fn emit_signal(
        &self,
        interface: &Interface,
        signal: &str,
        args: &[Variant],
        args_type: &VariantType,
    ) {
        let Some(tree) = self.tree.upgrade() else {
            return;
        };

        let targets = {
            let _guard = tree.lock();
            let found = tree.with(|s| {
                let entry = s.nodes.get(&self.id)?;
                let registration = entry.interfaces.get(interface.name())?;
                Some((
                    registration.is_live() && registration.is(interface),
                    entry.live_servers(),
                ))
            });
            let Some((registered, servers)) = found else {
                return;
            };
            if !registered {
                panic!(
                    "interface '{}' emitted '{}' from a moved copy; only the registered instance can emit",
                    interface.name(),
                    signal
                );
            }
            servers
                .into_iter()
                .map(|server| {
                    let address = tree.full_name(self.id, server.as_ref());
                    (server, address)
                })
                .collect::<Vec<_>>()
        };

        for (server, address) in targets {
            if let Err(e) = server.emit_signal(&address, interface.name(), signal, args, args_type) {
                log::warn!(
                    "failed to emit {}.{} at {}: {}",
                    interface.name(),
                    signal,
                    address,
                    e
                );
            }
        }
    }

    /// Remove a dropped or moved-out interface from its node.
    pub(crate) fn release(&self, interface: &Interface) {
        let Some(tree) = self.tree.upgrade() else {
            return;
        };
        let _guard = tree.lock();

        let servers = tree.with(|s| {
            let entry = s.nodes.get_mut(&self.id)?;
            let registration = entry.interfaces.get(interface.name())?;
            if registration.is_live() && !registration.is(interface) {
                return None;
            }
            entry.interfaces.remove(interface.name());
            Some(entry.live_servers())
        });
        let Some(servers) = servers else {
            return;
        };

        for server in servers {
            let address = tree.full_name(self.id, server.as_ref());
            if !server.drop_interface(&address, interface.name()) {
                log::warn!("{} was not registered at {}", interface.name(), address);
            }
        }
        log::debug!("released interface {}", interface.name());
    }
}

/// An entry in the address tree.
///
/// Nodes are created with [`Node::make_root`] and [`Node::make_child`] and
/// destroyed when the last `Arc` drops. A node's address on a transport is
/// the transport root joined with the names from the tree root down to the
/// node. It is computed on demand, never cached.
///
/// Destroying a node unregisters its interfaces everywhere, detaches the
/// ones still held by the application, and moves its children up to its own
/// parent. Their addresses lose the destroyed component and their interfaces
/// are registered again at the new addresses. When a root is destroyed its
/// children become roots named `root/child`, so their addresses stay put.
pub struct Node {
    tree: Arc<Tree>,
    id: NodeId,
    // Set on a temporary handle for a node whose last `Arc` is being dropped
    // on another thread. Dropping a stand-in destroys nothing.
    stand_in: bool,
}

impl Node {
    /// Create the root of a new tree.
    pub fn make_root(name: impl Into<String>) -> Arc<Node> {
        let node = Tree::insert(&Arc::new(Tree::new()), name.into(), None);
        log::debug!("created root {}", node.name());
        node
    }

    /// Create a child bound to every transport this node is bound to now.
    pub fn make_child(&self, name: impl Into<String>) -> Arc<Node> {
        let node = Tree::insert(&self.tree, name.into(), Some(self.id));
        log::debug!("created node {}", node.tree_name());
        node
    }

    /// Attach an interface, registering it on every bound transport.
    ///
    /// Registration is all-or-nothing: if one transport refuses, the
    /// registrations already made for this call are undone and the error
    /// is returned. The node keeps only a weak reference; the returned `Arc`
    /// owns the interface.
    ///
    /// # Panics
    ///
    /// Panics if the interface is already attached to a node.
    pub fn make_interface<T: AsInterface>(&self, value: T) -> Result<Arc<T>> {
        let object = Arc::new(value);
        self.attach(&object)?;
        Ok(object)
    }

    fn attach<T: AsInterface>(&self, object: &Arc<T>) -> Result<()> {
        let interface = object.interface();
        let name = interface.name();
        assert!(
            !interface.is_attached(),
            "interface '{}' is already attached to a node",
            name
        );

        let _guard = self.tree.lock();
        let found = self.with_entry(|e| {
            let existing = e.interfaces.get(name).map(Registration::is_live);
            (existing, e.live_servers())
        });
        let Some((existing, servers)) = found else {
            return Err(Error::unknown(MemberKind::Object, name));
        };

        match existing {
            Some(true) => {
                return Err(Error::DuplicateRegistration(format!(
                    "interface '{}' already exists on '{}'",
                    name,
                    self.tree_name()
                )))
            }
            Some(false) => self.purge(name, &servers),
            None => {}
        }

        for (done, server) in servers.iter().enumerate() {
            if let Err(e) = server.add_interface(self, interface) {
                for undo in servers[..done].iter().rev() {
                    let address = self.full_name(undo.as_ref());
                    if !undo.drop_interface(&address, name) {
                        log::warn!("rollback: {} was not registered at {}", name, address);
                    }
                }
                return Err(e);
            }
        }

        self.with_entry(|e| e.interfaces.insert(name.to_string(), Registration::new(object)));
        interface.set_owner(Some(NodeLink {
            tree: Arc::downgrade(&self.tree),
            id: self.id,
        }));
        log::debug!("attached {} to {}", name, self.tree_name());
        Ok(())
    }

    // Clears a registration whose interface was moved out of its Arc.
    fn purge(&self, name: &str, servers: &[Arc<dyn Transport>]) {
        for server in servers {
            server.drop_interface(&self.full_name(server.as_ref()), name);
        }
        self.with_entry(|e| e.interfaces.remove(name));
    }

    /// Detach an interface. Returns whether it was attached here.
    pub fn drop_interface(&self, name: &str) -> bool {
        let _guard = self.tree.lock();
        let found = self.with_entry(|e| e.interfaces.remove(name).map(|r| (r, e.live_servers())));
        let Some((registration, servers)) = found.flatten() else {
            return false;
        };

        for server in &servers {
            let address = self.full_name(server.as_ref());
            if !server.drop_interface(&address, name) {
                log::warn!("{} was not registered at {}", name, address);
            }
        }
        if let Some(object) = registration.interface.upgrade() {
            if registration.is(object.interface()) {
                object.interface().set_owner(None);
            }
        }
        log::debug!("dropped {} from {}", name, self.tree_name());
        true
    }

    /// Bind a transport and register every attached interface on it.
    ///
    /// Binding an already-bound transport does nothing. If one registration
    /// fails, the ones made by this call are undone and the error returned.
    pub fn add_server(&self, server: Arc<dyn Transport>) -> Result<()> {
        let _guard = self.tree.lock();
        let found = self.with_entry(|e| {
            let bound = e.servers.iter().any(|w| same_server(w, server.as_ref()));
            (bound, e.live_interfaces(), e.managing.clone())
        });
        let Some((bound, interfaces, managing)) = found else {
            return Ok(());
        };
        if bound {
            return Ok(());
        }

        let interfaces: Vec<Arc<dyn AsInterface>> =
            interfaces.iter().filter_map(Weak::upgrade).collect();
        for (done, object) in interfaces.iter().enumerate() {
            if let Err(e) = server.add_interface(self, object.interface()) {
                let address = self.full_name(server.as_ref());
                for undo in interfaces[..done].iter().rev() {
                    let name = undo.interface().name();
                    if !server.drop_interface(&address, name) {
                        log::warn!("rollback: {} was not registered at {}", name, address);
                    }
                }
                return Err(e);
            }
        }
        if managing.is_some() {
            server.set_managing(self, managing);
        }

        self.with_entry(|e| e.servers.push(Arc::downgrade(&server)));
        log::debug!("bound {} to {}", self.tree_name(), server.root());
        Ok(())
    }

    /// Unbind a transport, unregistering every attached interface from it.
    /// Returns whether it was bound.
    pub fn drop_server(&self, server: &dyn Transport) -> bool {
        let _guard = self.tree.lock();
        let found = self.with_entry(|e| {
            let before = e.servers.len();
            e.servers.retain(|w| !same_server(w, server));
            let names: Vec<String> = e.interfaces.keys().cloned().collect();
            (before != e.servers.len()).then(|| (names, e.managing.is_some()))
        });
        let Some((names, managing)) = found.flatten() else {
            return false;
        };

        let address = self.full_name(server);
        for name in &names {
            if !server.drop_interface(&address, name) {
                log::warn!("{} was not registered at {}", name, address);
            }
        }
        if managing {
            server.set_managing(self, None);
        }
        log::debug!("unbound {} from {}", self.tree_name(), server.root());
        true
    }

    /// Make this node the address of `object`, replacing any previous one.
    pub fn manage(&self, object: Option<&ObjectRef>) {
        let _guard = self.tree.lock();
        let weak = object.map(ObjectRef::downgrade);
        let Some(servers) = self.with_entry(|e| {
            e.managing = weak.clone();
            e.live_servers()
        }) else {
            return;
        };
        for server in servers {
            server.set_managing(self, weak.clone());
        }
    }

    /// The managed object, if any and still alive.
    pub fn managed(&self) -> Option<ObjectRef> {
        self.with_entry(|e| e.managing.clone())
            .flatten()
            .and_then(|w| w.upgrade())
    }

    /// Live attached interfaces by name.
    pub fn interfaces(&self) -> BTreeMap<String, Arc<dyn AsInterface>> {
        let weak = self
            .with_entry(|e| {
                e.interfaces
                    .iter()
                    .map(|(name, r)| (name.clone(), r.interface.clone()))
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        weak.into_iter()
            .filter_map(|(name, w)| w.upgrade().map(|object| (name, object)))
            .collect()
    }

    /// One attached interface.
    pub fn interface(&self, name: &str) -> Option<Arc<dyn AsInterface>> {
        self.with_entry(|e| e.interfaces.get(name).map(|r| r.interface.clone()))
            .flatten()
            .and_then(|w| w.upgrade())
    }

    pub fn name(&self) -> String {
        self.with_entry(|e| e.name.clone()).unwrap_or_default()
    }

    /// Names from the tree root down to this node, joined with `/`.
    pub fn tree_name(&self) -> String {
        self.tree.with(|s| s.tree_name(self.id))
    }

    /// The address of this node on `server`.
    pub fn full_name(&self, server: &dyn Transport) -> String {
        self.tree.full_name(self.id, server)
    }

    pub fn parent(&self) -> Option<Arc<Node>> {
        self.tree
            .with(|s| {
                let parent = s.nodes.get(&self.id)?.parent?;
                s.nodes.get(&parent).map(|p| p.handle.clone())
            })
            .and_then(|w| w.upgrade())
    }

    pub fn children(&self) -> Vec<Arc<Node>> {
        let handles = self.tree.with(|s| {
            s.nodes
                .get(&self.id)
                .map(|e| {
                    e.children
                        .iter()
                        .filter_map(|c| s.nodes.get(c).map(|c| c.handle.clone()))
                        .collect::<Vec<_>>()
                })
                .unwrap_or_default()
        });
        handles.iter().filter_map(Weak::upgrade).collect()
    }

    /// Transports this node is bound to.
    pub fn servers(&self) -> Vec<Arc<dyn Transport>> {
        self.with_entry(|e| e.live_servers()).unwrap_or_default()
    }

    /// A weak handle to this node, for transports to keep.
    pub fn weak(&self) -> Weak<Node> {
        self.with_entry(|e| e.handle.clone()).unwrap_or_default()
    }

    pub fn is_root(&self) -> bool {
        self.with_entry(|e| e.parent.is_none()).unwrap_or(true)
    }

    fn with_entry<R>(&self, f: impl FnOnce(&mut NodeEntry) -> R) -> Option<R> {
        self.tree.with(|s| s.nodes.get_mut(&self.id).map(f))
    }
}

// A descendant whose address changes when an ancestor is destroyed.
struct Moved {
    node: Arc<Node>,
    servers: Vec<Arc<dyn Transport>>,
    interfaces: Vec<Arc<dyn AsInterface>>,
    managing: Option<WeakObjectRef>,
}

impl Drop for Node {
    fn drop(&mut self) {
        if self.stand_in {
            return;
        }
        let _guard = self.tree.lock();
        let snapshot = self.tree.with(|s| {
            let e = s.nodes.get(&self.id)?;
            let registrations: Vec<Registration> = e.interfaces.values().cloned().collect();
            let names: Vec<String> = e.interfaces.keys().cloned().collect();
            Some((
                e.name.clone(),
                e.parent,
                e.children.clone(),
                registrations,
                names,
                e.live_servers(),
                e.managing.is_some(),
            ))
        });
        let Some((name, parent, children, registrations, names, servers, managing)) = snapshot
        else {
            return;
        };

        for server in &servers {
            let address = self.full_name(server.as_ref());
            for interface in &names {
                if !server.drop_interface(&address, interface) {
                    log::warn!("{} was not registered at {}", interface, address);
                }
            }
            if managing {
                server.set_managing(self, None);
            }
        }

        // Interfaces still held elsewhere outlive the node, detached.
        let held: Vec<Arc<dyn AsInterface>> = registrations
            .iter()
            .filter_map(|r| {
                let object = r.interface.upgrade()?;
                r.is(object.interface()).then_some(object)
            })
            .collect();
        for object in &held {
            object.interface().set_owner(None);
        }

        let moved = if parent.is_some() {
            self.unregister_descendants()
        } else {
            Vec::new()
        };

        self.tree.with(|s| {
            s.nodes.remove(&self.id);
            if let Some(p) = parent.and_then(|p| s.nodes.get_mut(&p)) {
                p.children.retain(|c| *c != self.id);
                p.children.extend(children.iter().copied());
            }
            for child in &children {
                if let Some(entry) = s.nodes.get_mut(child) {
                    entry.parent = parent;
                    if parent.is_none() {
                        entry.name = join_names(&name, &entry.name);
                    }
                }
            }
        });

        for m in &moved {
            for server in &m.servers {
                for object in &m.interfaces {
                    if let Err(e) = server.add_interface(&m.node, object.interface()) {
                        log::warn!(
                            "failed to move {} to {}: {}",
                            object.interface().name(),
                            m.node.full_name(server.as_ref()),
                            e
                        );
                    }
                }
                if m.managing.is_some() {
                    server.set_managing(&m.node, m.managing.clone());
                }
            }
        }

        log::debug!("destroyed node {}", name);
    }
}

impl Node {
    // Unregisters every descendant at its current address and returns what
    // must be registered again once the tree is rewritten.
    //
    // A descendant whose last `Arc` is being dropped on another thread is
    // still moved, through a stand-in, so its pending destruction finds it
    // registered at the new address.
    fn unregister_descendants(&self) -> Vec<Moved> {
        let snapshot = self.tree.with(|s| {
            s.descendants(self.id)
                .into_iter()
                .filter_map(|id| s.nodes.get(&id).map(|e| (id, e)))
                .map(|(id, e)| {
                    (
                        id,
                        e.handle.clone(),
                        e.servers.clone(),
                        e.live_interfaces(),
                        e.managing.clone(),
                    )
                })
                .collect::<Vec<_>>()
        });

        let moved: Vec<Moved> = snapshot
            .into_iter()
            .map(|(id, handle, servers, interfaces, managing)| Moved {
                node: handle.upgrade().unwrap_or_else(|| {
                    Arc::new(Node {
                        tree: self.tree.clone(),
                        id,
                        stand_in: true,
                    })
                }),
                servers: servers.iter().filter_map(Weak::upgrade).collect(),
                interfaces: interfaces.iter().filter_map(Weak::upgrade).collect(),
                managing,
            })
            .collect();

        for m in &moved {
            for server in &m.servers {
                let address = m.node.full_name(server.as_ref());
                for object in &m.interfaces {
                    server.drop_interface(&address, object.interface().name());
                }
                if m.managing.is_some() {
                    server.set_managing(&m.node, None);
                }
            }
        }
        moved
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("tree_name", &self.tree_name())
            .finish()
    }
}
