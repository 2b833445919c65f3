//! Orchestration: wires C1-C5 together behind the public `Table` API and
//! owns the background reclaimer's lifecycle.
use crate::addr::NetAddr;
use crate::buckets::{BucketArray, Snapshot};
use crate::config::Config;
use crate::element::Node;
use crate::loom::{thread, AtomicBool, AtomicUsize, Arc, Ordering};
use crate::reclaim::{drain_nodes, drain_snapshots, RetireList, RowTable};
use crate::walk::Iter;

type JoinHandle = thread::JoinHandle<()>;

/// The data a running table needs, independent of thread lifecycle. Lives
/// in a `Box` so its address is stable even if the owning `Table` moves,
/// which is what lets the background reclaimer hold a raw pointer to it
/// safely across the `Table`'s own moves.
pub(crate) struct Core<A: NetAddr, P> {
    pub(crate) buckets: BucketArray<A, P>,
    pub(crate) entries: AtomicUsize,
    pub(crate) entries_min: AtomicUsize,
    pub(crate) entries_max: AtomicUsize,
    pub(crate) rows: RowTable<A, P>,
    pub(crate) retired_nodes: RetireList<Node<A, P>>,
    pub(crate) retired_snapshots: RetireList<Snapshot<A, P>>,
    pub(crate) config: Config,
}

impl<A: NetAddr, P> Core<A, P> {
    fn new(config: Config) -> Self {
        let buckets_len = 1usize << config.hash_order;
        let entries_max = buckets_len.saturating_mul(config.grow_factor);
        let entries_min = if config.shrink_enabled {
            buckets_len / config.shrink_factor.max(1)
        } else {
            0
        };
        Self {
            buckets: BucketArray::new(config.hash_order, config.hash_hi_max),
            entries: AtomicUsize::new(0),
            entries_min: AtomicUsize::new(entries_min),
            entries_max: AtomicUsize::new(entries_max),
            rows: RowTable::new(),
            retired_nodes: RetireList::new(),
            retired_snapshots: RetireList::new(),
            config,
        }
    }

    pub(crate) fn maybe_grow(&self) {
        if self.entries.load(Ordering::Relaxed) < self.entries_max.load(Ordering::Relaxed) {
            return;
        }
        if let Some(old) = self.buckets.try_grow() {
            let snapshot = unsafe { &*self.buckets.load() };
            self.entries_max
                .store(snapshot.slots.len().saturating_mul(self.config.grow_factor), Ordering::Relaxed);
            if self.config.shrink_enabled {
                self.entries_min
                    .store(snapshot.slots.len() / self.config.shrink_factor.max(1), Ordering::Relaxed);
            }
            self.retired_snapshots.push(old);
        }
    }

    pub(crate) fn maybe_shrink(&self) {
        if !self.config.shrink_enabled {
            return;
        }
        if self.entries.load(Ordering::Relaxed) >= self.entries_min.load(Ordering::Relaxed) {
            return;
        }
        if let Some(old) = self.buckets.try_shrink(self.config.hash_order) {
            let snapshot = unsafe { &*self.buckets.load() };
            self.entries_max
                .store(snapshot.slots.len().saturating_mul(self.config.grow_factor), Ordering::Relaxed);
            self.entries_min
                .store(snapshot.slots.len() / self.config.shrink_factor.max(1), Ordering::Relaxed);
            self.retired_snapshots.push(old);
        }
    }

    /// One reclamation sweep: nodes first (they hold hazard references to
    /// neither the array nor each other beyond the row table), then
    /// snapshots.
    pub(crate) fn reclaim_tick(&self) {
        drain_nodes(&self.retired_nodes, &self.rows);
        drain_snapshots(&self.retired_snapshots, &self.rows);
    }
}

impl<A: NetAddr, P> Drop for Core<A, P> {
    fn drop(&mut self) {
        // Teardown: free every remaining node reachable from bucket 0,
        // ignoring marks (nothing else can be running by the time a
        // `Table` drops its `Core`).
        let snapshot = unsafe { &*self.buckets.load() };
        if let Some(head) = snapshot.slots.first() {
            let mut cursor = head.load(Ordering::Relaxed);
            while !cursor.is_null() {
                let next = crate::element::unmarked::<A, P>(unsafe { (*cursor).load_next(Ordering::Relaxed) });
                unsafe { drop(Box::from_raw(cursor)) };
                cursor = next;
            }
        }
        // No traversal can still be running by the time `Core` drops (the
        // reclaimer thread has already been joined), so hazard slots don't
        // need to be consulted here; just free everything outright.
        let mut leftover = self.retired_nodes.take_all_for_drop();
        while !leftover.is_null() {
            leftover = unsafe { crate::reclaim::free_retired_node(leftover) };
        }
        unsafe { drop(Box::from_raw(self.buckets.load())) };
        let mut leftover = self.retired_snapshots.take_all_for_drop();
        while !leftover.is_null() {
            leftover = unsafe { crate::reclaim::free_retired_snapshot(leftover) };
        }
    }
}

/// A handle to a payload node returned from `find`/`get`/`route`.
///
/// Borrowed from the `Table` it came from: the borrow checker stops an
/// `Entry` from outliving the table, but (as in the source design this
/// generalizes) it does not stop a concurrent `delete` elsewhere from
/// retiring the very node an `Entry` points at. Use an `Entry` promptly
/// after obtaining it; don't stash it across an operation that might
/// delete the same address.
pub struct Entry<'a, A: NetAddr, P> {
    pub(crate) node: *mut Node<A, P>,
    pub(crate) table: &'a Table<A, P>,
}

impl<'a, A: NetAddr, P> Entry<'a, A, P> {
    /// The address this entry was stored under.
    pub fn addr(&self) -> &A {
        unsafe { &*self.node }.addr().expect("Entry always wraps a payload node")
    }

    /// The payload value.
    pub fn value(&self) -> &P {
        unsafe { &*self.node }.value().expect("Entry always wraps a payload node")
    }

    /// Deletes this entry from its table. Returns `false` if another
    /// thread already deleted it.
    pub fn delete(&self) -> bool {
        self.table.core.delete(self.node)
    }
}

impl<'a, A: NetAddr, P> Clone for Entry<'a, A, P> {
    fn clone(&self) -> Self {
        Self {
            node: self.node,
            table: self.table,
        }
    }
}
impl<'a, A: NetAddr, P> Copy for Entry<'a, A, P> {}

struct TablePtr<A: NetAddr, P>(*const Core<A, P>);
// SAFETY: the reclaimer thread only ever reads through this pointer via
// the same `&Core` methods any other caller uses, and `Table::drop` joins
// the thread before `core` is freed, so the pointee always outlives every
// dereference made through it.
unsafe impl<A: NetAddr, P> Send for TablePtr<A, P> {}

/// A concurrent, prefix-indexed forwarding table.
///
/// Share it across threads the ordinary Rust way, with an `Arc<Table<..>>`;
/// every method here takes `&self`, so any number of threads can call
/// `find`/`get`/`route`/`delete`/`walk` on the same table at once.
pub struct Table<A: NetAddr, P> {
    pub(crate) core: Box<Core<A, P>>,
    stop: Arc<AtomicBool>,
    reclaimer: Option<JoinHandle>,
}

impl<A: NetAddr + 'static, P: 'static> Table<A, P> {
    /// Builds a new, empty table. Starts the background reclaimer thread
    /// unless built without the `reclaimer-thread` feature, in which case
    /// callers must drive reclamation themselves via [`Table::reclaim_tick`].
    pub fn init(config: Config) -> Result<Self, crate::error::FibError> {
        config.validate()?;
        let core = Box::new(Core::new(config));
        let stop = Arc::new(AtomicBool::new(false));

        #[cfg(feature = "reclaimer-thread")]
        let reclaimer = {
            let core_ptr = TablePtr(&*core as *const Core<A, P>);
            let interval = core.config.reclaim_interval;
            let stop = Arc::clone(&stop);
            Some(thread::spawn(move || {
                let core_ptr = core_ptr; // moved into the closure
                while !stop.load(Ordering::Acquire) {
                    thread::sleep(interval);
                    let core = unsafe { &*core_ptr.0 };
                    core.reclaim_tick();
                }
                let core = unsafe { &*core_ptr.0 };
                core.reclaim_tick();
                log::trace!("fib-core reclaimer thread exiting");
            }))
        };
        #[cfg(not(feature = "reclaimer-thread"))]
        let reclaimer = None;

        Ok(Self {
            core,
            stop,
            reclaimer,
        })
    }

    /// Looks a prefix up without creating it. Returns `None` if absent.
    pub fn find(&self, addr: &A) -> Option<Entry<'_, A, P>> {
        self.core.find(addr).map(|node| Entry { node, table: self })
    }

    /// Looks a prefix up, inserting it (via `init`) if it is not already
    /// present. The returned `bool` is `true` exactly when this call
    /// created the entry, resolving an open design question about whether `get`
    /// should expose creation as an explicit result instead of folding it
    /// into a separate out-parameter or losing it entirely. See `DESIGN.md`.
    pub fn get(&self, addr: &A, init: impl FnOnce() -> P) -> (Entry<'_, A, P>, bool) {
        let (node, created) = self.core.get(addr, init);
        (Entry { node, table: self }, created)
    }

    /// Longest-prefix-match lookup.
    pub fn route(&self, addr: &A) -> Option<Entry<'_, A, P>> {
        self.core.route(addr).map(|node| Entry { node, table: self })
    }

    /// Deletes `entry`. Returns `false` if it was already deleted.
    pub fn delete(&self, entry: &Entry<'_, A, P>) -> bool {
        self.core.delete(entry.node)
    }

    /// Current entry count. Approximate under concurrent mutation, exact
    /// at any instant with no in-flight inserts/deletes.
    pub fn len(&self) -> usize {
        self.core.entries.load(Ordering::Relaxed)
    }

    /// `true` iff `len() == 0`.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Scoped, non-suspending walk over every live entry. The closure runs
    /// inline; nothing allocated during the walk outlives this call.
    pub fn walk(&self, body: impl FnMut(&Entry<'_, A, P>)) {
        crate::walk::walk(self, body);
    }

    /// A suspendable iterator, safe to hold across calls that might
    /// concurrently delete the entry it's currently positioned on.
    pub fn iter(&self) -> Iter<'_, A, P> {
        Iter::new(self)
    }

    /// Manually drives one reclamation sweep. Needed when the
    /// `reclaimer-thread` feature is disabled (including under loom, which
    /// cannot model real OS threads), harmless to call otherwise.
    pub fn reclaim_tick(&self) {
        self.core.reclaim_tick();
    }
}

impl<A: NetAddr, P> Drop for Table<A, P> {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.reclaimer.take() {
            let _ = handle.join();
        }
        // `self.core` drops after this returns, freeing everything the
        // reclaimer thread (now joined) is done touching.
    }
}
