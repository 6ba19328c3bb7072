//! Client-side coordination for the messaging views: typing signal
//! emission and display, polling fallback, and per-thread subscription
//! lifecycle. Correctness here hinges on cancelling timers at the right
//! moments, not on shared state.

pub mod http;
pub mod poller;
pub mod typing;
pub mod watcher;
