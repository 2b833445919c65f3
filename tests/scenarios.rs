//! The concrete seed scenarios: one test per scenario, run against the
//! real `std::thread` backend (not loom — these are too large for model
//! checking; `tests/loom.rs` covers the same races at tractable scale).

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use fib_core::{Config, Ipv4Prefix, Table};

fn table_with_order(order: u32, hi_max: u32) -> Table<Ipv4Prefix, u32> {
    let mut config = Config::default();
    config.hash_order = order;
    config.hash_hi_max = hi_max;
    Table::init(config).unwrap()
}

/// Scenario 1: simple insert/find.
#[test]
fn simple_insert_find() {
    let table = table_with_order(4, 16);
    let prefix = Ipv4Prefix::new(2_040_257_024, 24); // 121.155.218.0/24
    let (got, created) = table.get(&prefix, || 0);
    assert!(created);
    let found = table.find(&prefix).unwrap();
    assert_eq!(found.addr(), got.addr());
    assert_eq!(table.len(), 1);
}

/// Scenario 2: 10 000 sequential IPv4 `/32`s, inserted, found, then
/// deleted one at a time.
#[test]
fn ten_thousand_sequential_slash_32s() {
    let table = table_with_order(4, 20);
    for i in 0..10_000u32 {
        table.get(&Ipv4Prefix::new(i, 32), || i);
    }
    assert_eq!(table.len(), 10_000);
    for i in 0..10_000u32 {
        let entry = table.find(&Ipv4Prefix::new(i, 32)).unwrap();
        assert_eq!(*entry.value(), i);
    }
    for i in 0..10_000u32 {
        assert!(table.find(&Ipv4Prefix::new(i, 32)).unwrap().delete());
    }
    assert_eq!(table.len(), 0);
}

/// Scenario 3: six threads concurrently insert 10 000 prefixes each
/// (disjoint shards `6*i + tid`), then six threads concurrently delete
/// the same shards.
#[test]
fn six_way_concurrent_insert_and_delete() {
    const THREADS: u32 = 6;
    const PER_THREAD: u32 = 10_000;

    let table = Arc::new(table_with_order(8, 20));

    let handles: Vec<_> = (0..THREADS)
        .map(|tid| {
            let table = table.clone();
            thread::spawn(move || {
                for i in 0..PER_THREAD {
                    let addr = THREADS * i + tid;
                    table.get(&Ipv4Prefix::new(addr, 32), || addr);
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(table.len(), (THREADS * PER_THREAD) as usize);
    for addr in 0..(THREADS * PER_THREAD) {
        let entry = table.find(&Ipv4Prefix::new(addr, 32)).unwrap();
        assert_eq!(*entry.value(), addr);
    }

    let handles: Vec<_> = (0..THREADS)
        .map(|tid| {
            let table = table.clone();
            thread::spawn(move || {
                for i in 0..PER_THREAD {
                    let addr = THREADS * i + tid;
                    assert!(table.find(&Ipv4Prefix::new(addr, 32)).unwrap().delete());
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(table.len(), 0);
}

/// Scenario 4: single-thread walk over 10 000 inserted prefixes.
#[test]
fn single_thread_walk_counts_ten_thousand() {
    let table = table_with_order(4, 20);
    for i in 0..10_000u32 {
        table.get(&Ipv4Prefix::new(i, 32), || i);
    }
    let mut count = 0usize;
    table.walk(|_| count += 1);
    assert_eq!(count, 10_000);
}

/// Scenario 5: nested walk. 100 prefixes, an inner walk run once per
/// outer-walk visit, reaching `100 * 100`.
#[test]
fn nested_walk_reaches_ten_thousand() {
    let table = table_with_order(4, 16);
    for i in 0..100u32 {
        table.get(&Ipv4Prefix::new(i, 32), || i);
    }
    let total = AtomicUsize::new(0);
    table.walk(|_outer| {
        table.walk(|_inner| {
            total.fetch_add(1, Ordering::Relaxed);
        });
    });
    assert_eq!(total.load(Ordering::Relaxed), 10_000);
}

/// Scenario 6: iterator suspension under mutation. 31 prefixes, 31
/// threads each hold an independent iterator positioned on "their" entry,
/// signal a shared counter, wait for the rest to arrive, then the main
/// thread deletes every entry while all 31 cursors are still parked
/// mid-traversal; every cursor must finish without touching freed memory.
#[test]
fn iterator_suspension_under_mutation() {
    const COUNT: u32 = 31;

    let table = Arc::new(table_with_order(4, 8));
    for i in 0..COUNT {
        table.get(&Ipv4Prefix::new(i, 32), || i);
    }

    let arrived = Arc::new(AtomicUsize::new(0));
    let release = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..COUNT)
        .map(|tid| {
            let table = table.clone();
            let arrived = arrived.clone();
            let release = release.clone();
            thread::spawn(move || {
                let mut iter = table.iter();
                // Advance to "this thread's" position in cursor order.
                let mut pinned = None;
                for (index, entry) in iter.by_ref().enumerate() {
                    if index as u32 == tid {
                        pinned = Some(entry);
                        break;
                    }
                }
                arrived.fetch_add(1, Ordering::Release);
                while release.load(Ordering::Acquire) == 0 {
                    thread::yield_now();
                }
                // The node this cursor pinned must still be readable even
                // though the main thread is concurrently deleting
                // everything else.
                if let Some(entry) = pinned {
                    let _ = entry.value();
                }
                // Drain whatever is left; must not dangling-dereference a
                // node the main thread deleted out from under it.
                let _ = iter.count();
            })
        })
        .collect();

    while arrived.load(Ordering::Acquire) < COUNT as usize {
        thread::yield_now();
    }

    for i in 0..COUNT {
        if let Some(entry) = table.find(&Ipv4Prefix::new(i, 32)) {
            entry.delete();
        }
    }
    release.store(1, Ordering::Release);

    for h in handles {
        h.join().unwrap();
    }

    assert_eq!(table.len(), 0);
    let mut seen: HashSet<u32> = HashSet::new();
    table.walk(|entry| {
        seen.insert(entry.addr().addr);
    });
    assert!(seen.is_empty());
}
