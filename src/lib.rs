//! A concurrent, prefix-indexed forwarding table.
//!
//! `Table<A, P>` is a split-ordered lock-free hash table (Shalev & Shavit)
//! specialized for routing daemons: `A` is a CIDR-style prefix implementing
//! [`NetAddr`], `P` is whatever a caller wants to attach to it (next hops,
//! route attributes, counters). Lookups, inserts and deletes all take `&self`
//! and may run from any number of threads at once; a background thread (or,
//! with the `reclaimer-thread` feature disabled, an explicit call to
//! [`Table::reclaim_tick`]) reclaims memory for deleted entries once nothing
//! is still looking at them.
//!
//! ```
//! use fib_core::{Config, Ipv4Prefix, Table};
//!
//! let table: Table<Ipv4Prefix, u32> = Table::init(Config::default()).unwrap();
//! let prefix = Ipv4Prefix::new(0x0a00_0000, 24); // 10.0.0.0/24
//! let (entry, created) = table.get(&prefix, || 0);
//! assert!(created);
//! assert_eq!(*entry.value(), 0);
//! assert!(table.delete(&entry));
//! ```
#![deny(missing_docs)]

mod addr;
mod buckets;
mod config;
mod element;
pub mod error;
mod list;
mod loom;
mod reclaim;
mod table;
mod walk;

pub use addr::{Ipv4Prefix, NetAddr};
pub use config::Config;
pub use error::FibError;
pub use table::{Entry, Table};
pub use walk::Iter;
