//! Host implementations of the diagnostic check bodies.
//!
//! The orchestration engine treats these as opaque callables: it only sees
//! whether they returned, failed, or panicked.

pub mod alloc;
pub mod cipher;
pub mod fs;
pub mod ledger;
pub mod rng;
pub mod signing;
pub mod timing;
