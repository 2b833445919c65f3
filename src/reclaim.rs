//! C4 — the reclamation fabric.
//!
//! Two pieces, directly grounded in the pack's hazard-pointer stack
//! (`other_examples/.../stacc_lockfree_hp.rs.rs`): a fixed-size reservation
//! table of soft-link ("hazard") slots that traversals park their current
//! and successor pointers in, and a lock-free retire list that accumulates
//! logically-deleted nodes until nothing is parked on them any more.
//!
//! Departure from that source's literal doubly-linked
//! FIFO: the retire list here is a Treiber stack (push/`take_all`) instead
//! of a FIFO queue. Order doesn't affect correctness — the reclaimer just
//! needs to eventually re-examine every retired pointer against the hazard
//! table — and a stack needs only a single `AtomicPtr` instead of a
//! head/tail pair. See `DESIGN.md`.
use std::ptr;

use crate::buckets::Snapshot;
use crate::config::MAX_THREADS;
use crate::element::Node;
use crate::loom::{AtomicBool, AtomicPtr, Ordering};

/// One reservation row. `curr`/`succ` are the two soft links allocated per
/// thread for list traversal; `array` is an additional slot that protects a
/// `Snapshot` pointer for the duration of an operation, closing a
/// bucket-array teardown race that a pointer-plus-separate-length bucket
/// array would otherwise leave open.
struct Row<A, P> {
    reserved: AtomicBool,
    curr: AtomicPtr<Node<A, P>>,
    succ: AtomicPtr<Node<A, P>>,
    array: AtomicPtr<Snapshot<A, P>>,
}

impl<A, P> Row<A, P> {
    fn empty() -> Self {
        Self {
            reserved: AtomicBool::new(false),
            curr: AtomicPtr::new(ptr::null_mut()),
            succ: AtomicPtr::new(ptr::null_mut()),
            array: AtomicPtr::new(ptr::null_mut()),
        }
    }
}

/// The `MAX_THREADS`-row reservation table.
pub(crate) struct RowTable<A, P> {
    rows: Box<[Row<A, P>]>,
}

impl<A, P> RowTable<A, P> {
    pub(crate) fn new() -> Self {
        let rows = (0..MAX_THREADS).map(|_| Row::empty()).collect();
        Self { rows }
    }

    /// Claims a free row, spinning if the table is momentarily full (every
    /// in-flight call releases its row well before `MAX_THREADS` more can
    /// queue up behind it).
    pub(crate) fn reserve(&self) -> RowGuard<'_, A, P> {
        loop {
            for (index, row) in self.rows.iter().enumerate() {
                if row
                    .reserved
                    .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
                    .is_ok()
                {
                    return RowGuard { rows: self, index };
                }
            }
            std::hint::spin_loop();
        }
    }

    fn hazards_node(&self, target: *mut Node<A, P>) -> bool {
        self.rows
            .iter()
            .any(|row| row.curr.load(Ordering::Acquire) == target || row.succ.load(Ordering::Acquire) == target)
    }

    fn hazards_array(&self, target: *mut Snapshot<A, P>) -> bool {
        self.rows.iter().any(|row| row.array.load(Ordering::Acquire) == target)
    }
}

/// RAII handle to a reserved row. Clears its hazard slots and releases the
/// row back to the table on drop, a drop-guard cleanup idiom instead of
/// requiring callers to remember an explicit release call.
pub(crate) struct RowGuard<'a, A, P> {
    rows: &'a RowTable<A, P>,
    index: usize,
}

impl<'a, A, P> RowGuard<'a, A, P> {
    #[inline]
    fn row(&self) -> &Row<A, P> {
        &self.rows.rows[self.index]
    }

    #[inline]
    pub(crate) fn set_curr(&self, ptr: *mut Node<A, P>) {
        self.row().curr.store(ptr, Ordering::Release);
    }

    #[inline]
    pub(crate) fn set_succ(&self, ptr: *mut Node<A, P>) {
        self.row().succ.store(ptr, Ordering::Release);
    }

    #[inline]
    pub(crate) fn set_array(&self, ptr: *mut Snapshot<A, P>) {
        self.row().array.store(ptr, Ordering::Release);
    }
}

impl<'a, A, P> Drop for RowGuard<'a, A, P> {
    fn drop(&mut self) {
        let row = self.row();
        row.curr.store(ptr::null_mut(), Ordering::Release);
        row.succ.store(ptr::null_mut(), Ordering::Release);
        row.array.store(ptr::null_mut(), Ordering::Release);
        row.reserved.store(false, Ordering::Release);
    }
}

pub(crate) struct RetireNode<T> {
    ptr: *mut T,
    next: *mut RetireNode<T>,
}

/// A lock-free, multi-producer, single-consumer retire list.
pub(crate) struct RetireList<T> {
    head: AtomicPtr<RetireNode<T>>,
}

impl<T> RetireList<T> {
    pub(crate) fn new() -> Self {
        Self {
            head: AtomicPtr::new(ptr::null_mut()),
        }
    }

    pub(crate) fn push(&self, ptr: *mut T) {
        let node = Box::into_raw(Box::new(RetireNode {
            ptr,
            next: ptr::null_mut(),
        }));
        let mut head = self.head.load(Ordering::Acquire);
        loop {
            unsafe {
                (*node).next = head;
            }
            match self
                .head
                .compare_exchange_weak(head, node, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return,
                Err(actual) => head = actual,
            }
        }
    }

    /// Atomically takes the entire list, leaving it empty. Only the
    /// reclaimer calls this, so a plain swap is enough (it is not itself
    /// contended from the consumer side).
    fn take_all(&self) -> *mut RetireNode<T> {
        self.head.swap(ptr::null_mut(), Ordering::AcqRel)
    }

    /// Same as `take_all`, exposed for table teardown: by the time `Drop`
    /// runs nothing else can be pushing, so there's no reclaimer/producer
    /// race left to reason about.
    pub(crate) fn take_all_for_drop(&self) -> *mut RetireNode<T> {
        self.take_all()
    }

    fn push_existing(&self, node: *mut RetireNode<T>) {
        let mut head = self.head.load(Ordering::Acquire);
        loop {
            unsafe {
                (*node).next = head;
            }
            match self
                .head
                .compare_exchange_weak(head, node, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return,
                Err(actual) => head = actual,
            }
        }
    }
}

/// Drains the retired-node list once: any node no longer hazarded by any
/// row, and with a zero link count, is freed; everything else is pushed
/// back for the next sweep.
pub(crate) fn drain_nodes<A, P>(list: &RetireList<Node<A, P>>, rows: &RowTable<A, P>) {
    let mut cursor = list.take_all();
    while !cursor.is_null() {
        let next = unsafe { (*cursor).next };
        let target = unsafe { (*cursor).ptr };
        let safe = unsafe { (*target).link_count() == 0 } && !rows.hazards_node(target);
        if safe {
            unsafe {
                drop(Box::from_raw(target));
                drop(Box::from_raw(cursor));
            }
        } else {
            list.push_existing(cursor);
        }
        cursor = next;
    }
}

/// Unconditionally frees one retired node and its list cell, returning the
/// next cell. Only safe once nothing can still be traversing or hazarding
/// it, which table teardown guarantees by joining the reclaimer first.
pub(crate) unsafe fn free_retired_node<A, P>(cursor: *mut RetireNode<Node<A, P>>) -> *mut RetireNode<Node<A, P>> {
    let next = (*cursor).next;
    drop(Box::from_raw((*cursor).ptr));
    drop(Box::from_raw(cursor));
    next
}

/// Same as `free_retired_node`, for retired bucket-array snapshots.
pub(crate) unsafe fn free_retired_snapshot<A, P>(
    cursor: *mut RetireNode<Snapshot<A, P>>,
) -> *mut RetireNode<Snapshot<A, P>> {
    let next = (*cursor).next;
    drop(Box::from_raw((*cursor).ptr));
    drop(Box::from_raw(cursor));
    next
}

/// Same sweep, for retired bucket-array snapshots.
pub(crate) fn drain_snapshots<A, P>(list: &RetireList<Snapshot<A, P>>, rows: &RowTable<A, P>) {
    let mut cursor = list.take_all();
    while !cursor.is_null() {
        let next = unsafe { (*cursor).next };
        let target = unsafe { (*cursor).ptr };
        if rows.hazards_array(target) {
            list.push_existing(cursor);
        } else {
            unsafe {
                drop(Box::from_raw(target));
                drop(Box::from_raw(cursor));
            }
        }
        cursor = next;
    }
}
