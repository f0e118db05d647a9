// OPCUA for Rust
// SPDX-License-Identifier: MPL-2.0

//! Locking primitives used across the stack. These are `parking_lot` types; the macros
//! exist so lock acquisition can be traced when debugging deadlocks.

pub use parking_lot::{Mutex, RwLock};

/// Take a read lock, tracing the acquisition when trace logging is enabled.
#[macro_export]
macro_rules! trace_read_lock {
    ($lock:expr) => {{
        log::trace!("Taking read lock at {}:{}", file!(), line!());
        $lock.read()
    }};
}

/// Take a write lock, tracing the acquisition when trace logging is enabled.
#[macro_export]
macro_rules! trace_write_lock {
    ($lock:expr) => {{
        log::trace!("Taking write lock at {}:{}", file!(), line!());
        $lock.write()
    }};
}

/// Take a mutex, tracing the acquisition when trace logging is enabled.
#[macro_export]
macro_rules! trace_lock {
    ($lock:expr) => {{
        log::trace!("Taking lock at {}:{}", file!(), line!());
        $lock.lock()
    }};
}
