//! Opaque references to application objects.

use std::any::Any;
use std::cmp::Ordering;
use std::fmt;
use std::sync::{Arc, Weak};

/// A shared reference to an application object, carried inside a `Variant`.
///
/// The variant layer never looks inside the object. Two references are equal
/// when they point at the same allocation. A transport turns an `ObjectRef`
/// into the address of the node that manages the object.
#[derive(Clone)]
pub struct ObjectRef(Arc<dyn Any + Send + Sync>);

impl ObjectRef {
    /// Wrap a shared application object.
    pub fn new<T: Any + Send + Sync>(object: Arc<T>) -> Self {
        ObjectRef(object)
    }

    /// Recover the concrete object if it has type `T`.
    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.0.clone().downcast::<T>().ok()
    }

    /// Create a non-owning reference to the same object.
    pub fn downgrade(&self) -> WeakObjectRef {
        WeakObjectRef(Arc::downgrade(&self.0))
    }

    /// Check whether both references point at the same object.
    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        self.addr() == other.addr()
    }

    fn addr(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }
}

impl<T: Any + Send + Sync> From<Arc<T>> for ObjectRef {
    fn from(object: Arc<T>) -> Self {
        ObjectRef::new(object)
    }
}

impl PartialEq for ObjectRef {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for ObjectRef {}

impl PartialOrd for ObjectRef {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ObjectRef {
    fn cmp(&self, other: &Self) -> Ordering {
        self.addr().cmp(&other.addr())
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectRef({:#x})", self.addr())
    }
}

/// A non-owning counterpart of [`ObjectRef`].
#[derive(Clone)]
pub struct WeakObjectRef(Weak<dyn Any + Send + Sync>);

impl WeakObjectRef {
    /// Get the object back if it is still alive.
    pub fn upgrade(&self) -> Option<ObjectRef> {
        self.0.upgrade().map(ObjectRef)
    }

    /// Check whether the object has been dropped.
    pub fn is_expired(&self) -> bool {
        self.0.strong_count() == 0
    }

    /// Check whether this weak reference points at `object`.
    pub fn refers_to(&self, object: &ObjectRef) -> bool {
        self.0.as_ptr() as *const () as usize == object.addr()
    }
}

impl fmt::Debug for WeakObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WeakObjectRef({:#x})", self.0.as_ptr() as *const () as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Lamp {
        watts: u32,
    }

    #[test]
    fn identity_equality() {
        let lamp = Arc::new(Lamp { watts: 40 });
        let a = ObjectRef::new(lamp.clone());
        let b = ObjectRef::new(lamp);
        let c = ObjectRef::new(Arc::new(Lamp { watts: 40 }));

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn downcast_recovers_concrete_type() {
        let obj = ObjectRef::new(Arc::new(Lamp { watts: 60 }));
        assert_eq!(obj.downcast::<Lamp>().unwrap().watts, 60);
        assert!(obj.downcast::<String>().is_none());
    }

    #[test]
    fn weak_reference_expires() {
        let obj = ObjectRef::new(Arc::new(Lamp { watts: 5 }));
        let weak = obj.downgrade();

        assert!(weak.refers_to(&obj));
        assert!(weak.upgrade().is_some());

        drop(obj);
        assert!(weak.is_expired());
        assert!(weak.upgrade().is_none());
    }
}
