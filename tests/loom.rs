#![cfg(loom)]
//! Model-checked concurrency scenarios.
//!
//! Run with `cargo test --no-default-features --cfg loom`: the
//! `reclaimer-thread` feature spawns a real background thread on an
//! interval sleep loom can't model, so these scenarios drive reclamation
//! manually via `Table::reclaim_tick` instead, same as any caller running
//! without that feature would.

use loom::thread;

use fib_core::{Config, Ipv4Prefix, Table};

fn tiny_config() -> Config {
    let mut config = Config::default();
    config.hash_order = 1;
    config.hash_hi_max = 2;
    config.shrink_enabled = false;
    config
}

fn prefix(addr: u32) -> Ipv4Prefix {
    Ipv4Prefix::new(addr, 32)
}

#[test]
fn concurrent_insert_distinct_prefixes() {
    loom::model(|| {
        let table = loom::sync::Arc::new(Table::init(tiny_config()).unwrap());

        let h1 = {
            let table = table.clone();
            thread::spawn(move || {
                table.get(&prefix(1), || 1);
            })
        };
        let h2 = {
            let table = table.clone();
            thread::spawn(move || {
                table.get(&prefix(2), || 2);
            })
        };
        h1.join().unwrap();
        h2.join().unwrap();

        assert_eq!(*table.find(&prefix(1)).unwrap().value(), 1);
        assert_eq!(*table.find(&prefix(2)).unwrap().value(), 2);
        assert_eq!(table.len(), 2);
    });
}

#[test]
fn concurrent_get_same_prefix_creates_once() {
    loom::model(|| {
        let table = loom::sync::Arc::new(Table::init(tiny_config()).unwrap());
        let created = loom::sync::Arc::new(loom::sync::atomic::AtomicUsize::new(0));

        let spawn_one = || {
            let table = table.clone();
            let created = created.clone();
            thread::spawn(move || {
                let (_, was_created) = table.get(&prefix(7), || 7);
                if was_created {
                    created.fetch_add(1, loom::sync::atomic::Ordering::Relaxed);
                }
            })
        };
        let h1 = spawn_one();
        let h2 = spawn_one();
        h1.join().unwrap();
        h2.join().unwrap();

        assert_eq!(created.load(loom::sync::atomic::Ordering::Relaxed), 1);
        assert_eq!(table.len(), 1);
    });
}

#[test]
fn concurrent_delete_same_entry_succeeds_once() {
    loom::model(|| {
        let table = loom::sync::Arc::new(Table::init(tiny_config()).unwrap());
        let (_, created) = table.get(&prefix(3), || 3);
        assert!(created);

        let spawn_one = || {
            let table = table.clone();
            thread::spawn(move || match table.find(&prefix(3)) {
                Some(entry) => entry.delete(),
                None => false,
            })
        };
        let h1 = spawn_one();
        let h2 = spawn_one();
        let r1 = h1.join().unwrap();
        let r2 = h2.join().unwrap();

        assert_ne!(r1, r2);
        assert!(table.find(&prefix(3)).is_none());
        table.reclaim_tick();
    });
}

#[test]
fn iterator_suspends_across_concurrent_delete() {
    loom::model(|| {
        let table = Table::init(tiny_config()).unwrap();
        table.get(&prefix(1), || 1);
        table.get(&prefix(2), || 2);
        let table = loom::sync::Arc::new(table);

        let mut iter = table.iter();
        let first = iter.next();

        let h = {
            let table = table.clone();
            thread::spawn(move || {
                if let Some(entry) = table.find(&prefix(1)) {
                    entry.delete();
                }
                if let Some(entry) = table.find(&prefix(2)) {
                    entry.delete();
                }
            })
        };
        h.join().unwrap();

        // The cursor's pin kept `first`'s node alive through the concurrent
        // delete above; reading it here must not touch freed memory.
        if let Some(entry) = first {
            let _ = entry.value();
        }
        drop(iter);
        table.reclaim_tick();
    });
}
