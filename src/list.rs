//! C2 — the split-ordered list.
//!
//! Insert/find/route/delete all follow the same shape: compute a
//! bit-reversed order key, locate the (prev, curr) straddle point with a
//! hazard-protected walk, then CAS. Every algorithm here restarts from
//! scratch on a lost race instead of trying to help a concurrent deleter
//! finish its splice, matching the "no retried `Result`s, just internal
//! restart" external-interface design.
use crate::addr::NetAddr;
use crate::buckets::Snapshot;
use crate::element::{is_marked, ord_key, precedes, unmarked, Node};
use crate::loom::Ordering;
use crate::reclaim::RowGuard;
use crate::table::Core;

/// Clears the highest set bit of `bucket`, giving the bucket whose sentinel
/// must already exist (recursively) before `bucket`'s own sentinel can be
/// linked in. Grounded on the reference split-ordered list's `get_parent`:
/// that implementation derives it by halving the *current table size* down
/// to the first value `<= index`, which is exactly "clear the top bit of
/// `index`" once `index` itself is a valid bucket number. A tempting
/// alternative phrasing, "highest power of two `<= b/2`", undercounts for
/// `b` itself a power of two (it would route bucket 4's parent through
/// bucket 2 instead of bucket 0, breaking the very split point the table's
/// first doubling creates); this crate follows the reference/standard
/// algorithm instead. See `DESIGN.md`.
fn parent_bucket(bucket: usize) -> usize {
    if bucket == 0 {
        return 0;
    }
    let top = 1usize << (usize::BITS - 1 - bucket.leading_zeros());
    bucket ^ top
}

impl<A: NetAddr, P> Core<A, P> {
    /// Walks from `start`, publishing the hazard-protected sliding window
    /// described in `reclaim.rs`, until it finds the first node whose
    /// (key, sentinel-rank) does not precede `(key, is_sentinel)`. Restarts
    /// from `start` if a concurrent splice invalidates the window.
    ///
    /// A node found marked for deletion along the way is helped off the
    /// list (CAS `prev` past it, retire it) rather than stepped over: the
    /// `prev` this returns must never itself be a marked node, or a later
    /// CAS against it would succeed and silently clear its mark bit.
    pub(crate) fn locate(
        &self,
        guard: &RowGuard<'_, A, P>,
        start: *mut Node<A, P>,
        key: u32,
        is_sentinel: bool,
    ) -> (*mut Node<A, P>, usize, *mut Node<A, P>) {
        loop {
            guard.set_curr(start);
            let mut prev = start;
            let mut prev_word = unsafe { (*prev).load_next(Ordering::Acquire) };
            let mut curr = unmarked::<A, P>(prev_word);
            let mut restart = false;
            loop {
                if curr.is_null() {
                    break;
                }
                guard.set_succ(curr);
                let recheck = unsafe { (*prev).load_next(Ordering::Acquire) };
                if recheck != prev_word {
                    restart = true;
                    break;
                }
                let node = unsafe { &*curr };
                let node_next_word = node.load_next(Ordering::Acquire);
                if is_marked(node_next_word) {
                    let succ = unmarked::<A, P>(node_next_word);
                    match unsafe { &*prev }.cas_next(prev_word, succ) {
                        Ok(_) => {
                            self.retired_nodes.push(curr);
                            prev_word = succ as usize;
                            curr = succ;
                            continue;
                        }
                        Err(_) => {
                            restart = true;
                            break;
                        }
                    }
                }
                let node_key = node.key;
                let node_is_sentinel = node.is_sentinel();
                if precedes(node_key, node_is_sentinel, key, is_sentinel) {
                    guard.set_curr(curr);
                    prev = curr;
                    prev_word = node_next_word;
                    curr = unmarked(prev_word);
                    continue;
                }
                break;
            }
            if restart {
                continue;
            }
            return (prev, prev_word, curr);
        }
    }

    /// Ensures bucket `bucket`'s sentinel exists in `snapshot`, recursively
    /// creating every ancestor split point first. Sentinels are never
    /// deleted once linked, so this never needs hazard protection against
    /// reclamation, only against racing creators.
    pub(crate) fn ensure_bucket(
        &self,
        guard: &RowGuard<'_, A, P>,
        snapshot: &Snapshot<A, P>,
        bucket: usize,
    ) -> *mut Node<A, P> {
        let existing = snapshot.slots[bucket].load(Ordering::Acquire);
        if !existing.is_null() {
            return existing;
        }
        let key = ord_key(bucket as u32);
        if bucket == 0 {
            let sentinel = Box::into_raw(Node::new_sentinel(key));
            return match snapshot.slots[0].compare_exchange(
                std::ptr::null_mut(),
                sentinel,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => sentinel,
                Err(actual) => {
                    unsafe { drop(Box::from_raw(sentinel)) };
                    actual
                }
            };
        }
        let parent = self.ensure_bucket(guard, snapshot, parent_bucket(bucket));
        loop {
            let (prev, prev_word, curr) = self.locate(guard, parent, key, true);
            if !curr.is_null() {
                let node = unsafe { &*curr };
                if node.key == key && node.is_sentinel() {
                    let _ = snapshot.slots[bucket].compare_exchange(
                        std::ptr::null_mut(),
                        curr,
                        Ordering::AcqRel,
                        Ordering::Acquire,
                    );
                    return curr;
                }
            }
            let sentinel = Box::into_raw(Node::new_sentinel(key));
            unsafe {
                (*sentinel).next.store(curr as usize, Ordering::Relaxed);
            }
            match unsafe { &*prev }.cas_next(prev_word, sentinel) {
                Ok(_) => {
                    let _ = snapshot.slots[bucket].compare_exchange(
                        std::ptr::null_mut(),
                        sentinel,
                        Ordering::AcqRel,
                        Ordering::Acquire,
                    );
                    return sentinel;
                }
                Err(_) => unsafe {
                    drop(Box::from_raw(sentinel));
                },
            }
        }
    }

    fn bucket_for(&self, snapshot: &Snapshot<A, P>, hash: u32) -> usize {
        (hash as usize) & snapshot.mask
    }

    /// Plain lookup: returns the payload node for `addr` if one is linked
    /// and not (yet) logically deleted. Never allocates or mutates.
    pub(crate) fn find(&self, addr: &A) -> Option<*mut Node<A, P>> {
        let guard = self.rows.reserve();
        let snapshot_ptr = self.buckets.load();
        guard.set_array(snapshot_ptr);
        let snapshot = unsafe { &*snapshot_ptr };
        let hash = addr.net_hash();
        let bucket = self.bucket_for(snapshot, hash);
        let sentinel = snapshot.slots[bucket].load(Ordering::Acquire);
        if sentinel.is_null() {
            return None;
        }
        let key = ord_key(hash);
        let (_, _, curr) = self.locate(&guard, sentinel, key, false);
        if curr.is_null() {
            return None;
        }
        let node = unsafe { &*curr };
        if node.key != key || node.is_sentinel() {
            return None;
        }
        if node.addr() != Some(addr) {
            return None;
        }
        if crate::element::is_marked(node.load_next(Ordering::Acquire)) {
            return None;
        }
        Some(curr)
    }

    /// Lookup-or-insert. Allocates the new node once and carries it across
    /// retries instead of reallocating on every lost race.
    pub(crate) fn get(&self, addr: &A, init: impl FnOnce() -> P) -> (*mut Node<A, P>, bool) {
        let guard = self.rows.reserve();
        let mut pending: Option<Box<Node<A, P>>> = None;
        let mut init = Some(init);
        loop {
            let snapshot_ptr = self.buckets.load();
            guard.set_array(snapshot_ptr);
            let snapshot = unsafe { &*snapshot_ptr };
            let hash = addr.net_hash();
            let bucket = self.bucket_for(snapshot, hash);
            let sentinel = self.ensure_bucket(&guard, snapshot, bucket);
            let key = ord_key(hash);

            let (prev, prev_word, curr) = self.locate(&guard, sentinel, key, false);
            if !curr.is_null() {
                let node = unsafe { &*curr };
                if node.key == key && !node.is_sentinel() && node.addr() == Some(addr) {
                    if crate::element::is_marked(node.load_next(Ordering::Acquire)) {
                        continue; // concurrently deleted; restart
                    }
                    return (curr, false);
                }
            }

            let new_node = pending.take().unwrap_or_else(|| {
                let f = init.take().expect("init consumed at most once");
                Node::new_payload(key, addr.clone(), f())
            });
            let raw = Box::into_raw(new_node);
            unsafe {
                (*raw).next.store(curr as usize, Ordering::Relaxed);
            }
            match unsafe { &*prev }.cas_next(prev_word, raw) {
                Ok(_) => {
                    self.entries.fetch_add(1, Ordering::Relaxed);
                    self.maybe_grow();
                    return (raw, true);
                }
                Err(_) => {
                    pending = Some(unsafe { Box::from_raw(raw) });
                }
            }
        }
    }

    /// Longest-prefix-match: widens `addr` one bit at a time until
    /// `find` succeeds or the prefix is exhausted.
    pub(crate) fn route(&self, addr: &A) -> Option<*mut Node<A, P>> {
        let mut probe = addr.clone();
        loop {
            if let Some(found) = self.find(&probe) {
                return Some(found);
            }
            if !probe.step_down() {
                return None;
            }
        }
    }

    /// Logically then physically deletes `target`. Returns `false` if
    /// another thread already deleted it first. Physical unlink and
    /// retirement happen as a side effect of `locate`'s own help-unlink
    /// step: walking the list past `target` (now marked) is enough to
    /// splice it out.
    pub(crate) fn delete(&self, target: *mut Node<A, P>) -> bool {
        let node = unsafe { &*target };
        if !node.mark_for_deletion() {
            return false;
        }
        self.entries.fetch_sub(1, Ordering::Relaxed);

        let guard = self.rows.reserve();
        let snapshot_ptr = self.buckets.load();
        guard.set_array(snapshot_ptr);
        let snapshot = unsafe { &*snapshot_ptr };
        let addr = node.addr().expect("delete target is always a payload node");
        let hash = addr.net_hash();
        let bucket = self.bucket_for(snapshot, hash);
        let sentinel = snapshot.slots[bucket].load(Ordering::Acquire);
        if !sentinel.is_null() {
            self.locate(&guard, sentinel, node.key, false);
        }
        drop(guard);
        self.maybe_shrink();
        true
    }
}
