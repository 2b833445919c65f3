//! Dual backend for loom model-checking vs real concurrency: a `cfg_if!`
//! gated re-export so the table and its reclamation fabric run unmodified
//! under either `std::sync` or `loom`.
//!
//! Every atomic type the table touches is imported from here instead of
//! `std::sync::atomic` directly, so `cargo test --cfg loom` (see
//! `tests/loom.rs`) model-checks the exact same code path production runs.
use cfg_if::cfg_if;

cfg_if! {
    if #[cfg(loom)] {
        pub(crate) use loom::sync::atomic::{AtomicBool, AtomicPtr, AtomicUsize, Ordering};
        pub(crate) use loom::sync::Arc;
        pub(crate) use loom::thread;
    } else {
        pub(crate) use std::sync::atomic::{AtomicBool, AtomicPtr, AtomicUsize, Ordering};
        pub(crate) use std::sync::Arc;
        pub(crate) use std::thread;
    }
}
