//! C5 — walk and iterator protocol.
//!
//! `Table::walk` is a scoped, non-suspending traversal: it runs to
//! completion inside one call and only ever needs the same row-hazard
//! protection `list.rs` uses for a single lookup.
//!
//! [`Iter`] is the suspendable counterpart: a caller can hold one across
//! arbitrary amounts of other work (including other calls into the same
//! table) because its current position is pinned with the node's own link
//! count (C1), not a row. A row is still reserved for the brief moment
//! `next()` validates and pins its new position, the same
//! publish-then-reread-confirm protocol `list.rs`'s `locate` uses, so the
//! handoff from "about to look at this pointer" to "durably pinned" never
//! has a gap a concurrent delete-and-reclaim could land in.
use std::ptr;

use crate::addr::NetAddr;
use crate::element::{is_marked, unmarked};
use crate::loom::Ordering;
use crate::table::{Entry, Table};

pub(crate) fn walk<A: NetAddr, P>(table: &Table<A, P>, mut body: impl FnMut(&Entry<'_, A, P>)) {
    let guard = table.core.rows.reserve();
    let snapshot_ptr = table.core.buckets.load();
    guard.set_array(snapshot_ptr);
    let snapshot = unsafe { &*snapshot_ptr };
    let head = match snapshot.slots.first() {
        Some(slot) => slot.load(Ordering::Acquire),
        None => return,
    };
    if head.is_null() {
        return;
    }
    guard.set_curr(head);
    let mut prev = head;
    let mut prev_word = unsafe { (*prev).load_next(Ordering::Acquire) };
    loop {
        let curr = unmarked::<A, P>(prev_word);
        if curr.is_null() {
            return;
        }
        guard.set_succ(curr);
        let recheck = unsafe { (*prev).load_next(Ordering::Acquire) };
        if recheck != prev_word {
            // A concurrent splice moved `prev`'s successor out from under
            // us; `prev` itself is still valid (still hazarded), just
            // re-read its current successor and carry on from there.
            prev_word = recheck;
            continue;
        }
        let node = unsafe { &*curr };
        let next_word = node.load_next(Ordering::Acquire);
        if !node.is_sentinel() && !is_marked(next_word) {
            let entry = Entry { node: curr, table };
            body(&entry);
        }
        guard.set_curr(curr);
        prev = curr;
        prev_word = next_word;
    }
}

/// A suspendable cursor over every live entry in a table.
pub struct Iter<'a, A: NetAddr, P> {
    table: &'a Table<A, P>,
    current: *mut crate::element::Node<A, P>,
    /// Set once the cursor has run off the end of the list, or the caller
    /// has explicitly stopped it via `unlink`/`put_end`. Distinguishes
    /// "haven't started yet" from "already spent" — both have `current ==
    /// null`, but only a terminal iterator must keep yielding `None`
    /// instead of restarting from bucket 0 on the next call.
    terminal: bool,
}

impl<'a, A: NetAddr, P> Iter<'a, A, P> {
    pub(crate) fn new(table: &'a Table<A, P>) -> Self {
        Self {
            table,
            current: ptr::null_mut(),
            terminal: false,
        }
    }

    /// Advances to the next candidate node after `self.current` (or bucket
    /// 0's sentinel, if this is the first step), validating it is really
    /// reachable before pinning it. Returns `None` at the end of the list,
    /// which also marks the cursor terminal.
    fn advance_raw(&mut self) -> Option<*mut crate::element::Node<A, P>> {
        if self.terminal {
            return None;
        }
        let guard = self.table.core.rows.reserve();
        loop {
            let prev = if self.current.is_null() {
                let snapshot = unsafe { &*self.table.core.buckets.load() };
                match snapshot.slots.first() {
                    Some(slot) => slot.load(Ordering::Acquire),
                    None => {
                        self.terminal = true;
                        return None;
                    }
                }
            } else {
                self.current
            };
            if prev.is_null() {
                self.terminal = true;
                return None;
            }
            guard.set_curr(prev);
            let prev_word = unsafe { (*prev).load_next(Ordering::Acquire) };
            let candidate = unmarked::<A, P>(prev_word);
            if candidate.is_null() {
                self.terminal = true;
                return None;
            }
            guard.set_succ(candidate);
            let recheck = unsafe { (*prev).load_next(Ordering::Acquire) };
            if recheck != prev_word {
                continue; // `prev` changed under us; retry the same step
            }
            unsafe { (*candidate).incr_link() };
            return Some(candidate);
        }
    }

    fn release_current(&mut self) {
        if !self.current.is_null() {
            unsafe { (*self.current).decr_link() };
            self.current = ptr::null_mut();
        }
    }

    fn terminate(&mut self) {
        self.release_current();
        self.terminal = true;
    }

    /// Releases this iterator's pin and marks it defunct: every
    /// subsequent `next()` returns `None` rather than restarting from
    /// bucket 0.
    pub fn unlink(&mut self) {
        self.terminate();
    }

    /// Releases this iterator's pin and marks it terminal, exactly as
    /// reaching the end of the list naturally would. A separate method
    /// from `unlink` so a caller can say "I'm stopping here" at the call
    /// site instead of "detach without explanation", even though both
    /// leave the cursor in the same spent state.
    pub fn put_end(&mut self) {
        self.terminate();
    }
}

impl<'a, A: NetAddr, P> Iterator for Iter<'a, A, P> {
    type Item = Entry<'a, A, P>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let candidate = self.advance_raw()?;
            let prior = self.current;
            self.current = candidate;
            if !prior.is_null() {
                unsafe { (*prior).decr_link() };
            }
            let node = unsafe { &*candidate };
            if node.is_sentinel() || is_marked(node.load_next(Ordering::Acquire)) {
                continue;
            }
            return Some(Entry {
                node: candidate,
                table: self.table,
            });
        }
    }
}

impl<'a, A: NetAddr, P> Clone for Iter<'a, A, P> {
    /// The `copy` operation: duplicates the cursor's position, pinning it
    /// once more so either copy can advance independently.
    fn clone(&self) -> Self {
        if !self.current.is_null() {
            unsafe { (*self.current).incr_link() };
        }
        Self {
            table: self.table,
            current: self.current,
            terminal: self.terminal,
        }
    }
}

impl<'a, A: NetAddr, P> Drop for Iter<'a, A, P> {
    fn drop(&mut self) {
        self.release_current();
    }
}
