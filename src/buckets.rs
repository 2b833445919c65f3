//! C3 — the bucket array.
//!
//! Modeled on a parking-lot-style bucket table (power-of-two sizing,
//! multiplicative hash, lazily-populated slots), generalized from a fixed
//! compile-time size to one that doubles at runtime.
//!
//! The whole array (pointer + length + order) is replaced in one atomic
//! swap of a boxed [`Snapshot`], rather than updating a pointer and a
//! separate length/mask field independently: a reader who loads the old
//! pointer just before a grower updates the mask can otherwise index out of
//! the old array's bounds with the new mask. Bundling them behind one
//! pointer removes that race entirely; see `DESIGN.md`.
use crate::loom::{AtomicBool, AtomicPtr, Ordering};

use crate::element::Node;

/// An immutable view of the bucket array at one point in its growth.
/// `slots[b]` is a pointer to bucket `b`'s sentinel node, or null if that
/// bucket has never been touched.
pub(crate) struct Snapshot<A, P> {
    pub(crate) slots: Box<[AtomicPtr<Node<A, P>>]>,
    pub(crate) mask: usize,
    pub(crate) order: u32,
}

impl<A, P> Snapshot<A, P> {
    fn new(order: u32) -> Self {
        let len = 1usize << order;
        let slots = (0..len).map(|_| AtomicPtr::new(std::ptr::null_mut())).collect();
        Self {
            slots,
            mask: len - 1,
            order,
        }
    }

    fn grown(&self, new_order: u32) -> Self {
        let len = 1usize << new_order;
        let slots: Box<[AtomicPtr<Node<A, P>>]> = (0..len)
            .map(|b| {
                let src = if b < self.slots.len() {
                    self.slots[b].load(Ordering::Acquire)
                } else {
                    std::ptr::null_mut()
                };
                AtomicPtr::new(src)
            })
            .collect();
        Self {
            slots,
            mask: len - 1,
            order: new_order,
        }
    }
}

/// The bucket array proper: an atomically-swapped pointer to the current
/// [`Snapshot`], plus a single-grower flag so concurrent overflowing
/// inserts don't race to double the table twice at once.
pub(crate) struct BucketArray<A, P> {
    current: AtomicPtr<Snapshot<A, P>>,
    growing: AtomicBool,
    hi_max: u32,
}

impl<A, P> BucketArray<A, P> {
    pub(crate) fn new(order: u32, hi_max: u32) -> Self {
        let snapshot = Box::into_raw(Box::new(Snapshot::new(order)));
        Self {
            current: AtomicPtr::new(snapshot),
            growing: AtomicBool::new(false),
            hi_max,
        }
    }

    /// Loads the current snapshot. Callers must keep the returned reference
    /// alive only for the duration of one operation and must register it
    /// with the hazard fabric (`Table::reserve_row`'s `array` slot) before
    /// dereferencing any of its slots, so a concurrent `grow` can't free it
    /// out from under them.
    #[inline]
    pub(crate) fn load(&self) -> *mut Snapshot<A, P> {
        self.current.load(Ordering::Acquire)
    }

    /// Doubles the bucket array unless another thread is already doing so
    /// or the table is already at its configured ceiling. Returns the
    /// retired snapshot for the caller to hand to the reclaimer, or `None`
    /// if nothing changed.
    pub(crate) fn try_grow(&self) -> Option<*mut Snapshot<A, P>> {
        if self.growing.swap(true, Ordering::AcqRel) {
            return None;
        }
        let result = (|| {
            let old_ptr = self.current.load(Ordering::Acquire);
            let old = unsafe { &*old_ptr };
            if old.order >= self.hi_max {
                return None;
            }
            let grown = Box::into_raw(Box::new(old.grown(old.order + 1)));
            self.current.store(grown, Ordering::Release);
            Some(old_ptr)
        })();
        self.growing.store(false, Ordering::Release);
        result
    }

    /// Symmetric shrink: halves the array when occupancy has fallen below
    /// `entries_min`. See `DESIGN.md` for why this is wired up instead of left
    /// as dead code behind a watermark that's never satisfied.
    pub(crate) fn try_shrink(&self, floor_order: u32) -> Option<*mut Snapshot<A, P>> {
        if self.growing.swap(true, Ordering::AcqRel) {
            return None;
        }
        let result = (|| {
            let old_ptr = self.current.load(Ordering::Acquire);
            let old = unsafe { &*old_ptr };
            if old.order <= floor_order {
                return None;
            }
            let new_order = old.order - 1;
            let new_len = 1usize << new_order;
            // Only the lower half is kept; bucket b >= new_len must already
            // be empty (the caller only shrinks once occupancy is low and
            // the upper buckets have been folded back by delete()'s own
            // bookkeeping), so truncating is safe.
            let slots: Box<[AtomicPtr<Node<A, P>>]> = (0..new_len)
                .map(|b| AtomicPtr::new(old.slots[b].load(Ordering::Acquire)))
                .collect();
            let shrunk = Box::into_raw(Box::new(Snapshot {
                slots,
                mask: new_len - 1,
                order: new_order,
            }));
            self.current.store(shrunk, Ordering::Release);
            Some(old_ptr)
        })();
        self.growing.store(false, Ordering::Release);
        result
    }
}
