//! Shared ownership with self-reference.
//!
//! [`Ref<T>`] is the strong handle: cloning retains, dropping releases, and
//! the object is destroyed exactly once when the last handle goes away.
//! Objects that need to hand out strong references to themselves (to keep
//! themselves alive across deferred work) embed a [`SelfRef`] and implement
//! [`RefCounted`].

use std::fmt;
use std::ops::Deref;
use std::sync::{Arc, Weak};

/// Strong handle to a reference-counted object.
pub struct Ref<T>(Arc<T>);

impl<T> Ref<T> {
    /// Construct an object that knows its own handle.
    ///
    /// The returned handle is the first reference; the count starts at one.
    pub fn create(build: impl FnOnce(SelfRef<T>) -> T) -> Self {
        Ref(Arc::new_cyclic(|weak| build(SelfRef(weak.clone()))))
    }

    /// Take an additional strong reference.
    pub fn retain(this: &Self) -> Self {
        this.clone()
    }

    /// Give up this strong reference.
    pub fn release(this: Self) {
        drop(this)
    }

    /// Current number of strong references. Diagnostic only.
    pub fn ref_count(this: &Self) -> usize {
        Arc::strong_count(&this.0)
    }

    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }

    pub fn downgrade(this: &Self) -> WeakRef<T> {
        WeakRef(Arc::downgrade(&this.0))
    }
}

impl<T> Clone for Ref<T> {
    fn clone(&self) -> Self {
        Ref(Arc::clone(&self.0))
    }
}

impl<T> Deref for Ref<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T: fmt::Debug> fmt::Debug for Ref<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

/// Non-owning handle; does not keep the object alive.
pub struct WeakRef<T>(Weak<T>);

impl<T> WeakRef<T> {
    pub fn upgrade(&self) -> Option<Ref<T>> {
        self.0.upgrade().map(Ref)
    }
}

impl<T> Clone for WeakRef<T> {
    fn clone(&self) -> Self {
        WeakRef(self.0.clone())
    }
}

/// An object's link to its own handle, filled in by [`Ref::create`].
pub struct SelfRef<T>(Weak<T>);

impl<T> SelfRef<T> {
    pub fn downgrade(&self) -> WeakRef<T> {
        WeakRef(self.0.clone())
    }
}

/// Objects whose lifetime is managed by [`Ref`].
pub trait RefCounted: Sized {
    fn self_ref(&self) -> &SelfRef<Self>;

    /// A new strong handle to this object.
    ///
    /// # Panics
    ///
    /// If the object is already being destroyed.
    fn to_ref(&self) -> Ref<Self> {
        match self.self_ref().0.upgrade() {
            Some(arc) => Ref(arc),
            None => panic!(
                "retain of {} after its last reference was released",
                std::any::type_name::<Self>()
            ),
        }
    }

    /// Current number of strong references. Diagnostic only.
    fn ref_count(&self) -> usize {
        self.self_ref().0.strong_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Tracked {
        self_ref: SelfRef<Tracked>,
        drops: Arc<AtomicUsize>,
    }

    impl RefCounted for Tracked {
        fn self_ref(&self) -> &SelfRef<Self> {
            &self.self_ref
        }
    }

    impl Drop for Tracked {
        fn drop(&mut self) {
            self.drops.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn tracked(drops: &Arc<AtomicUsize>) -> Ref<Tracked> {
        let drops = drops.clone();
        Ref::create(|self_ref| Tracked { self_ref, drops })
    }

    #[test]
    fn test_count_starts_at_one() {
        let drops = Arc::new(AtomicUsize::new(0));
        let obj = tracked(&drops);
        assert_eq!(Ref::ref_count(&obj), 1);
        assert_eq!(obj.ref_count(), 1);
    }

    #[test]
    fn test_destroyed_exactly_once() {
        let drops = Arc::new(AtomicUsize::new(0));
        let obj = tracked(&drops);

        let extra: Vec<_> = (0..5).map(|_| Ref::retain(&obj)).collect();
        assert_eq!(Ref::ref_count(&obj), 6);

        for r in extra {
            Ref::release(r);
        }
        assert_eq!(drops.load(Ordering::SeqCst), 0);

        drop(obj);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_to_ref_keeps_alive() {
        let drops = Arc::new(AtomicUsize::new(0));
        let obj = tracked(&drops);

        let held = obj.to_ref();
        assert!(Ref::ptr_eq(&obj, &held));
        assert_eq!(Ref::ref_count(&obj), 2);

        drop(obj);
        assert_eq!(drops.load(Ordering::SeqCst), 0);
        drop(held);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_concurrent_retain_release() {
        let drops = Arc::new(AtomicUsize::new(0));
        let obj = tracked(&drops);

        let threads: Vec<_> = (0..8)
            .map(|_| {
                let local = obj.clone();
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        let r = local.to_ref();
                        drop(r);
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }

        assert_eq!(Ref::ref_count(&obj), 1);
        drop(obj);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_weak_does_not_retain() {
        let drops = Arc::new(AtomicUsize::new(0));
        let obj = tracked(&drops);
        let weak = obj.self_ref().downgrade();

        assert!(weak.upgrade().is_some());
        drop(obj);
        assert!(weak.upgrade().is_none());
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }
}
