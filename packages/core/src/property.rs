//! Permissioned, lock-guarded properties.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use bitflags::bitflags;
use ipctree_variant::{Variant, VariantType, WireConvert};

use crate::error::{Error, Result};

bitflags! {
    /// Access mask of a [`Property`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Permissions: u8 {
        const READABLE = 0b01;
        const WRITEABLE = 0b10;
        const FULL = Self::READABLE.bits() | Self::WRITEABLE.bits();
    }
}

/// Lock-guarded storage shared between properties and the application.
pub type Shared<T> = Arc<Mutex<T>>;

/// Wrap a value in shared storage.
pub fn shared<T>(value: T) -> Shared<T> {
    Arc::new(Mutex::new(value))
}

fn lock<T>(cell: &Arc<Mutex<T>>) -> MutexGuard<'_, T> {
    cell.lock().unwrap_or_else(PoisonError::into_inner)
}

type Getter = dyn Fn() -> Result<Variant> + Send + Sync;
type Setter = dyn Fn(&Variant) -> Result<bool> + Send + Sync;
type ChangeHook = dyn Fn(&Variant) + Send + Sync;

/// A typed value exposed through the variant layer.
///
/// Each property reads and writes through its own storage lock, so unrelated
/// properties never contend. Several properties may share one lock through
/// [`Property::projected`], and those may belong to different interfaces.
///
/// Failures come in two tiers. An access the permission mask forbids fails
/// with `PermissionDenied`. A write the validator rejects is not an error:
/// [`Property::set`] returns `Ok(false)` and the stored value is unchanged.
#[derive(Clone)]
pub struct Property {
    variant_type: VariantType,
    permissions: Permissions,
    get: Arc<Getter>,
    set: Option<Arc<Setter>>,
    on_change: Option<Arc<ChangeHook>>,
}

impl Property {
    /// A property over `storage` that accepts every well-typed write.
    pub fn new<T>(storage: &Shared<T>, permissions: Permissions) -> Self
    where
        T: WireConvert + Clone + Send + 'static,
    {
        Self::validated(storage, permissions, |_: &T| true)
    }

    /// A property over `storage` whose writes must pass `validator`.
    pub fn validated<T, V>(storage: &Shared<T>, permissions: Permissions, validator: V) -> Self
    where
        T: WireConvert + Clone + Send + 'static,
        V: Fn(&T) -> bool + Send + Sync + 'static,
    {
        let read = storage.clone();
        let write = storage.clone();

        Self {
            variant_type: T::variant_type(),
            permissions,
            get: Arc::new(move || -> Result<Variant> {
                let value = lock(&read).clone();
                Ok(value.to_variant())
            }),
            set: Some(Arc::new(move |value: &Variant| -> Result<bool> {
                let value = T::from_variant(value)?;
                if !validator(&value) {
                    return Ok(false);
                }
                *lock(&write) = value;
                Ok(true)
            })),
            on_change: None,
        }
    }

    /// A property that can never be written, whatever `permissions` says.
    pub fn read_only<T>(storage: &Shared<T>, permissions: Permissions) -> Self
    where
        T: WireConvert + Clone + Send + 'static,
    {
        let read = storage.clone();

        Self {
            variant_type: T::variant_type(),
            permissions: permissions - Permissions::WRITEABLE,
            get: Arc::new(move || -> Result<Variant> {
                let value = lock(&read).clone();
                Ok(value.to_variant())
            }),
            set: None,
            on_change: None,
        }
    }

    /// A property over storage owned elsewhere.
    ///
    /// Fails with `NullTarget` if the storage is already gone. Once it is
    /// dropped, reads and writes fail with `NullTarget`.
    pub fn from_weak<T>(storage: &Weak<Mutex<T>>, permissions: Permissions) -> Result<Self>
    where
        T: WireConvert + Clone + Send + 'static,
    {
        if storage.strong_count() == 0 {
            return Err(Error::NullTarget("property storage has been dropped".to_string()));
        }

        let read = storage.clone();
        let write = storage.clone();

        Ok(Self {
            variant_type: T::variant_type(),
            permissions,
            get: Arc::new(move || -> Result<Variant> {
                let cell = upgrade(&read)?;
                let value = lock(&cell).clone();
                Ok(value.to_variant())
            }),
            set: Some(Arc::new(move |value: &Variant| -> Result<bool> {
                let value = T::from_variant(value)?;
                let cell = upgrade(&write)?;
                *lock(&cell) = value;
                Ok(true)
            })),
            on_change: None,
        })
    }

    /// A property projecting one field out of a larger lock-guarded state.
    ///
    /// `read` extracts the field and `write` stores it back. Both run with
    /// the state lock held.
    pub fn projected<S, T, R, W>(state: &Shared<S>, permissions: Permissions, read: R, write: W) -> Self
    where
        S: Send + 'static,
        T: WireConvert + 'static,
        R: Fn(&S) -> T + Send + Sync + 'static,
        W: Fn(&mut S, T) + Send + Sync + 'static,
    {
        let reader = state.clone();
        let writer = state.clone();

        Self {
            variant_type: T::variant_type(),
            permissions,
            get: Arc::new(move || -> Result<Variant> {
                let value = read(&lock(&reader));
                Ok(value.to_variant())
            }),
            set: Some(Arc::new(move |value: &Variant| -> Result<bool> {
                let value = T::from_variant(value)?;
                write(&mut lock(&writer), value);
                Ok(true)
            })),
            on_change: None,
        }
    }

    /// Install a hook called with the new value after every applied write.
    pub fn on_change<H>(mut self, hook: H) -> Self
    where
        H: Fn(&Variant) + Send + Sync + 'static,
    {
        self.on_change = Some(Arc::new(hook));
        self
    }

    /// Read the current value.
    pub fn get(&self) -> Result<Variant> {
        if !self.permissions.contains(Permissions::READABLE) {
            return Err(Error::PermissionDenied("property is not readable".to_string()));
        }
        (self.get)()
    }

    /// Write a new value.
    ///
    /// Checks the permission mask, decodes, validates, then stores. Returns
    /// whether the value was applied.
    pub fn set(&self, value: &Variant) -> Result<bool> {
        if !self.permissions.contains(Permissions::WRITEABLE) {
            return Err(Error::PermissionDenied("property is not writeable".to_string()));
        }
        let setter = self
            .set
            .as_ref()
            .ok_or_else(|| Error::PermissionDenied("property is read-only".to_string()))?;

        let applied = setter(value)?;
        if applied {
            if let Some(hook) = &self.on_change {
                hook(value);
            }
        }
        Ok(applied)
    }

    pub fn variant_type(&self) -> &VariantType {
        &self.variant_type
    }

    pub fn permissions(&self) -> Permissions {
        self.permissions
    }

    pub fn readable(&self) -> bool {
        self.permissions.contains(Permissions::READABLE)
    }

    pub fn writeable(&self) -> bool {
        self.permissions.contains(Permissions::WRITEABLE) && self.set.is_some()
    }
}

fn upgrade<T>(storage: &Weak<Mutex<T>>) -> Result<Arc<Mutex<T>>> {
    storage
        .upgrade()
        .ok_or_else(|| Error::NullTarget("property storage has been dropped".to_string()))
}

impl fmt::Debug for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Property")
            .field("type", &self.variant_type.to_string())
            .field("permissions", &self.permissions)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ipctree_variant::VariantError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::OnceLock;

    // Encodes as whether its own storage is unlocked at encode time.
    #[derive(Clone)]
    struct LockWitness {
        storage: Arc<OnceLock<Weak<Mutex<LockWitness>>>>,
    }

    impl WireConvert for LockWitness {
        fn variant_type() -> VariantType {
            VariantType::Bool
        }

        fn to_variant(&self) -> Variant {
            let unlocked = self
                .storage
                .get()
                .and_then(Weak::upgrade)
                .map(|cell| {
                    let free = cell.try_lock().is_ok();
                    free
                })
                .unwrap_or(false);
            Variant::Bool(unlocked)
        }

        fn from_variant(_: &Variant) -> std::result::Result<Self, VariantError> {
            Err(VariantError::InvalidType)
        }
    }

    #[test]
    fn values_are_encoded_outside_the_storage_lock() {
        let slot = Arc::new(OnceLock::new());
        let storage = shared(LockWitness {
            storage: slot.clone(),
        });
        slot.set(Arc::downgrade(&storage)).unwrap();

        let plain = Property::new(&storage, Permissions::READABLE);
        let read_only = Property::read_only(&storage, Permissions::READABLE);
        let weak = Property::from_weak(&Arc::downgrade(&storage), Permissions::READABLE).unwrap();

        assert_eq!(plain.get().unwrap(), Variant::Bool(true));
        assert_eq!(read_only.get().unwrap(), Variant::Bool(true));
        assert_eq!(weak.get().unwrap(), Variant::Bool(true));
    }

    #[test]
    fn read_and_write() {
        let volume = shared(5u32);
        let p = Property::new(&volume, Permissions::FULL);

        assert_eq!(p.get().unwrap(), Variant::UInt32(5));
        assert!(p.set(&Variant::UInt32(9)).unwrap());
        assert_eq!(*volume.lock().unwrap(), 9);
        assert_eq!(p.get().unwrap(), Variant::UInt32(9));
    }

    #[test]
    fn permission_mask_is_checked_first() {
        let volume = shared(5u32);
        let write_only = Property::new(&volume, Permissions::WRITEABLE);
        assert!(matches!(write_only.get(), Err(Error::PermissionDenied(_))));

        let read_only_mask = Property::new(&volume, Permissions::READABLE);
        // A wrongly typed value still reports the permission problem.
        assert!(matches!(
            read_only_mask.set(&Variant::from("loud")),
            Err(Error::PermissionDenied(_))
        ));
        assert_eq!(*volume.lock().unwrap(), 5);
    }

    #[test]
    fn decode_failure_is_a_type_mismatch() {
        let volume = shared(5u32);
        let p = Property::new(&volume, Permissions::FULL);
        assert!(matches!(
            p.set(&Variant::Int32(1)),
            Err(Error::TypeMismatch { found: "int32", .. })
        ));
    }

    #[test]
    fn validator_rejection_is_not_an_error() {
        let volume = shared(5u32);
        let p = Property::validated(&volume, Permissions::FULL, |v: &u32| *v <= 10);

        assert!(!p.set(&Variant::UInt32(11)).unwrap());
        assert_eq!(*volume.lock().unwrap(), 5);
        assert!(p.set(&Variant::UInt32(10)).unwrap());
        assert_eq!(*volume.lock().unwrap(), 10);
    }

    #[test]
    fn read_only_always_rejects_writes() {
        let name = shared("lamp".to_string());
        let p = Property::read_only(&name, Permissions::FULL);

        assert!(!p.writeable());
        assert_eq!(p.permissions(), Permissions::READABLE);
        assert!(matches!(
            p.set(&Variant::from("bulb")),
            Err(Error::PermissionDenied(_))
        ));
        assert_eq!(p.get().unwrap(), Variant::from("lamp"));
    }

    #[test]
    fn weak_storage() {
        let volume = shared(1u8);
        let p = Property::from_weak(&Arc::downgrade(&volume), Permissions::FULL).unwrap();
        assert!(p.set(&Variant::Byte(2)).unwrap());
        assert_eq!(*volume.lock().unwrap(), 2);

        drop(volume);
        assert!(matches!(p.get(), Err(Error::NullTarget(_))));
        assert!(matches!(p.set(&Variant::Byte(3)), Err(Error::NullTarget(_))));
    }

    #[test]
    fn weak_storage_must_be_alive_at_construction() {
        let volume = shared(1u8);
        let weak = Arc::downgrade(&volume);
        drop(volume);
        assert!(matches!(
            Property::from_weak(&weak, Permissions::FULL),
            Err(Error::NullTarget(_))
        ));
    }

    #[derive(Default)]
    struct Player {
        volume: u32,
        muted: bool,
    }

    #[test]
    fn projections_share_one_lock() {
        let player = shared(Player::default());
        let volume = Property::projected(
            &player,
            Permissions::FULL,
            |p: &Player| p.volume,
            |p: &mut Player, v| p.volume = v,
        );
        let muted = Property::projected(
            &player,
            Permissions::FULL,
            |p: &Player| p.muted,
            |p: &mut Player, v| p.muted = v,
        );

        volume.set(&Variant::UInt32(7)).unwrap();
        muted.set(&Variant::Bool(true)).unwrap();

        let state = player.lock().unwrap();
        assert_eq!(state.volume, 7);
        assert!(state.muted);
    }

    #[test]
    fn change_hook_runs_only_on_applied_writes() {
        let volume = shared(0u32);
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let p = Property::validated(&volume, Permissions::FULL, |v: &u32| *v < 100).on_change(
            move |value| {
                assert_eq!(value, &Variant::UInt32(50));
                counter.fetch_add(1, Ordering::SeqCst);
            },
        );

        p.set(&Variant::UInt32(500)).unwrap();
        p.set(&Variant::UInt32(50)).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn clones_share_storage() {
        let volume = shared(1u16);
        let a = Property::new(&volume, Permissions::FULL);
        let b = a.clone();
        a.set(&Variant::UInt16(4)).unwrap();
        assert_eq!(b.get().unwrap(), Variant::UInt16(4));
    }
}
