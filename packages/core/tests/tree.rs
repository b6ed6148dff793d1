//! Node tree behavior against recording transports.

mod common;

use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use common::MockTransport;
use ipctree_core::{
    shared, AsInterface, Error, Function, Interface, Node, ObjectRef, Permissions, Property,
    Shared, Transport, Variant,
};

fn named(name: &str) -> Interface {
    Interface::builder(name)
        .function("ping", Function::new(|| "pong".to_string(), &[], &["reply"]))
        .build()
}

#[test]
fn addresses_follow_the_tree() {
    let t = MockTransport::new("/test");
    let root = Node::make_root("root");
    let a = root.make_child("a");
    let b = a.make_child("b");

    let root_path = root.full_name(t.as_ref());
    assert_eq!(root_path, "/test/root");
    assert_eq!(b.full_name(t.as_ref()), format!("{}/a/b", root_path));

    drop(a);
    assert_eq!(b.full_name(t.as_ref()), format!("{}/b", root_path));
}

#[test]
fn attach_registers_on_every_bound_transport() {
    let t1 = MockTransport::new("/one");
    let t2 = MockTransport::new("/two");
    let root = Node::make_root("root");
    root.add_server(t1.clone()).unwrap();
    root.add_server(t2.clone()).unwrap();

    let iface = root.make_interface(named("org.example.Ping")).unwrap();
    assert!(iface.is_attached());
    assert!(t1.is_registered("/one/root", "org.example.Ping"));
    assert!(t2.is_registered("/two/root", "org.example.Ping"));
    assert!(Arc::ptr_eq(&iface.node().unwrap(), &root));
}

#[test]
fn attach_is_all_or_nothing() {
    let good = MockTransport::new("/good");
    let bad = MockTransport::failing("/bad");
    let root = Node::make_root("root");
    root.add_server(good.clone()).unwrap();
    root.add_server(bad.clone()).unwrap();

    let err = root.make_interface(named("org.example.Ping")).unwrap_err();
    assert!(matches!(err, Error::Transport(_)));
    assert!(good.registered().is_empty());
    assert!(root.interface("org.example.Ping").is_none());

    // Nothing was left behind, so a retry is not a duplicate.
    bad.set_fail_add(false);
    let iface = root.make_interface(named("org.example.Ping")).unwrap();
    assert!(iface.is_attached());
    assert!(good.is_registered("/good/root", "org.example.Ping"));
    assert!(bad.is_registered("/bad/root", "org.example.Ping"));
}

#[test]
fn duplicate_names_are_rejected_up_front() {
    let t = MockTransport::new("/");
    let root = Node::make_root("root");
    root.add_server(t.clone()).unwrap();

    let _first = root.make_interface(named("org.example.Ping")).unwrap();
    let err = root.make_interface(named("org.example.Ping")).unwrap_err();
    assert!(matches!(err, Error::DuplicateRegistration(_)));
    assert_eq!(t.registered().len(), 1);
}

#[test]
fn dropping_the_interface_detaches_it() {
    let t = MockTransport::new("/");
    let root = Node::make_root("root");
    root.add_server(t.clone()).unwrap();

    let iface = root.make_interface(named("org.example.Ping")).unwrap();
    assert_eq!(root.interfaces().len(), 1);

    drop(iface);
    assert!(root.interfaces().is_empty());
    assert!(t.registered().is_empty());

    // The name is free again.
    root.make_interface(named("org.example.Ping")).unwrap();
}

#[test]
fn drop_interface_reports_presence() {
    let t = MockTransport::new("/");
    let root = Node::make_root("root");
    root.add_server(t.clone()).unwrap();
    let iface = root.make_interface(named("org.example.Ping")).unwrap();

    assert!(root.drop_interface("org.example.Ping"));
    assert!(!iface.is_attached());
    assert!(t.registered().is_empty());
    assert!(!root.drop_interface("org.example.Ping"));
}

#[test]
fn destroying_a_node_detaches_held_interfaces() {
    let t = MockTransport::new("/");
    let root = Node::make_root("root");
    let child = root.make_child("child");
    child.add_server(t.clone()).unwrap();
    let iface = child.make_interface(named("org.example.Ping")).unwrap();
    assert!(t.is_registered("/root/child", "org.example.Ping"));

    drop(child);
    assert!(!iface.is_attached());
    assert!(iface.node().is_none());
    assert!(t.registered().is_empty());

    // Still usable as a plain value.
    assert_eq!(
        iface.call("ping", &[]).unwrap(),
        vec![Variant::from("pong")]
    );
}

#[test]
fn descendants_move_up_when_a_node_is_destroyed() {
    let t = MockTransport::new("/svc");
    let root = Node::make_root("root");
    root.add_server(t.clone()).unwrap();
    let a = root.make_child("a");
    let b = a.make_child("b");
    let c = b.make_child("c");

    let _on_b = b.make_interface(named("org.example.B")).unwrap();
    let _on_c = c.make_interface(named("org.example.C")).unwrap();
    assert!(t.is_registered("/svc/root/a/b", "org.example.B"));
    assert!(t.is_registered("/svc/root/a/b/c", "org.example.C"));

    drop(a);
    assert!(t.is_registered("/svc/root/b", "org.example.B"));
    assert!(t.is_registered("/svc/root/b/c", "org.example.C"));
    assert_eq!(t.registered().len(), 2);
    assert_eq!(b.parent().unwrap().name(), "root");
}

#[test]
fn destroying_a_root_keeps_child_addresses() {
    let t = MockTransport::new("/");
    let root = Node::make_root("root");
    root.add_server(t.clone()).unwrap();
    let child = root.make_child("child");
    let _iface = child.make_interface(named("org.example.Ping")).unwrap();

    drop(root);
    assert!(child.is_root());
    assert_eq!(child.full_name(t.as_ref()), "/root/child");
    assert!(t.is_registered("/root/child", "org.example.Ping"));
}

#[test]
fn children_take_a_snapshot_of_bindings() {
    let early = MockTransport::new("/early");
    let late = MockTransport::new("/late");
    let root = Node::make_root("root");
    root.add_server(early.clone()).unwrap();

    let child = root.make_child("child");
    root.add_server(late.clone()).unwrap();

    let _iface = child.make_interface(named("org.example.Ping")).unwrap();
    assert!(early.is_registered("/early/root/child", "org.example.Ping"));
    assert!(late.registered().is_empty());
    assert_eq!(child.servers().len(), 1);
}

#[test]
fn add_server_registers_existing_interfaces() {
    let root = Node::make_root("root");
    let _a = root.make_interface(named("org.example.A")).unwrap();
    let _b = root.make_interface(named("org.example.B")).unwrap();

    let t = MockTransport::new("/");
    root.add_server(t.clone()).unwrap();
    assert_eq!(t.registered().len(), 2);

    // Binding twice is a no-op.
    root.add_server(t.clone()).unwrap();
    assert_eq!(root.servers().len(), 1);
    assert_eq!(t.registered().len(), 2);
}

#[test]
fn add_server_failure_binds_nothing() {
    let root = Node::make_root("root");
    let _a = root.make_interface(named("org.example.A")).unwrap();

    let bad = MockTransport::failing("/");
    assert!(root.add_server(bad.clone()).is_err());
    assert!(root.servers().is_empty());
    assert!(bad.registered().is_empty());
}

#[test]
fn drop_server_unregisters() {
    let t = MockTransport::new("/");
    let root = Node::make_root("root");
    root.add_server(t.clone()).unwrap();
    let _a = root.make_interface(named("org.example.A")).unwrap();

    assert!(root.drop_server(t.as_ref()));
    assert!(t.registered().is_empty());
    assert!(root.servers().is_empty());
    assert!(!root.drop_server(t.as_ref()));
}

#[test]
fn dead_transports_are_ignored() {
    let root = Node::make_root("root");
    {
        let t = MockTransport::new("/");
        root.add_server(t.clone()).unwrap();
    }
    assert!(root.servers().is_empty());
    root.make_interface(named("org.example.Ping")).unwrap();
}

#[test]
fn manage_notifies_transports() {
    let t = MockTransport::new("/");
    let root = Node::make_root("root");
    root.add_server(t.clone()).unwrap();
    let child = root.make_child("lamp");

    let lamp = ObjectRef::new(Arc::new("lamp".to_string()));
    child.manage(Some(&lamp));
    assert_eq!(t.managed_addresses(), vec!["/root/lamp"]);
    assert_eq!(child.managed(), Some(lamp.clone()));

    child.manage(None);
    assert!(t.managed_addresses().is_empty());
}

#[test]
fn managed_address_follows_reparenting() {
    let t = MockTransport::new("/");
    let root = Node::make_root("root");
    root.add_server(t.clone()).unwrap();
    let a = root.make_child("a");
    let b = a.make_child("b");

    let lamp = ObjectRef::new(Arc::new(1u8));
    b.manage(Some(&lamp));
    assert_eq!(t.managed_addresses(), vec!["/root/a/b"]);

    drop(a);
    assert_eq!(t.managed_addresses(), vec!["/root/b"]);
}

struct Thermostat {
    interface: Interface,
    target: Shared<f64>,
}

impl Thermostat {
    fn new() -> Self {
        let target = shared(20.0);
        let interface = Interface::builder("org.example.Thermostat")
            .property("target", Property::new(&target, Permissions::FULL))
            .build();
        Self { interface, target }
    }
}

impl AsInterface for Thermostat {
    fn interface(&self) -> &Interface {
        &self.interface
    }
}

#[test]
fn application_types_carry_their_interface() {
    let t = MockTransport::new("/");
    let root = Node::make_root("house");
    root.add_server(t.clone()).unwrap();

    let thermostat = root.make_interface(Thermostat::new()).unwrap();
    assert!(t.is_registered("/house", "org.example.Thermostat"));

    let attached = root.interface("org.example.Thermostat").unwrap();
    attached
        .interface()
        .get_property("target")
        .unwrap()
        .set(&Variant::Double(22.5))
        .unwrap();
    assert_eq!(*thermostat.target.lock().unwrap(), 22.5);
}

#[test]
#[should_panic(expected = "already attached")]
fn moving_an_attached_interface_into_another_node_panics() {
    let root = Node::make_root("root");
    let iface = root.make_interface(named("org.example.Ping")).unwrap();
    let Ok(moved) = Arc::try_unwrap(iface) else {
        unreachable!("only one strong reference exists");
    };
    let other = Node::make_root("other");
    let _ = other.make_interface(moved);
}

#[test]
fn concurrent_calls_and_structural_changes() {
    let t = MockTransport::new("/");
    let root = Node::make_root("root");
    root.add_server(t.clone()).unwrap();
    let counter = shared(0u64);
    let iface = root
        .make_interface(
            Interface::builder("org.example.Counter")
                .property("count", Property::new(&counter, Permissions::FULL))
                .build(),
        )
        .unwrap();

    let mut handles = Vec::new();
    for worker in 0..4 {
        let root = root.clone();
        let iface = iface.clone();
        handles.push(thread::spawn(move || {
            for i in 0..50 {
                let child = root.make_child(format!("w{}_{}", worker, i));
                let _ping = child.make_interface(named("org.example.Ping")).unwrap();
                let property = iface.get_property("count").unwrap();
                let _ = property.get().unwrap();
                drop(child);
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(t.registered(), vec![("/root".to_string(), "org.example.Counter".to_string())]);
    assert!(root.children().is_empty());
}

#[test]
fn transports_are_called_with_the_tree_usable() {
    // The mock computes addresses from inside add_interface, which takes the
    // tree lock again on the same thread.
    let t: Arc<dyn Transport> = MockTransport::new("/");
    let root = Node::make_root("root");
    root.add_server(t.clone()).unwrap();
    root.make_child("x").make_interface(named("org.example.Ping")).unwrap();
}

#[test]
fn descendant_dropped_during_destruction_leaves_nothing_registered() {
    let t = MockTransport::new("/");
    let root = Node::make_root("root");
    root.add_server(t.clone()).unwrap();
    let a = root.make_child("a");
    let c = a.make_child("c");
    let _a_iface = a.make_interface(named("org.example.A")).unwrap();
    let _c_iface = c.make_interface(named("org.example.C")).unwrap();

    // The last handle to `c` goes away on another thread while `a` is
    // being destroyed, so `c`'s own destruction waits on the tree lock.
    let (start, started) = mpsc::channel();
    let dropper = thread::spawn(move || {
        started.recv().unwrap();
        drop(c);
    });
    t.on_drop("org.example.A", move || {
        start.send(()).unwrap();
        thread::sleep(Duration::from_millis(300));
    });

    drop(a);
    dropper.join().unwrap();

    assert!(t.registered().is_empty(), "left registered: {:?}", t.registered());
    assert!(root.children().is_empty());
}
