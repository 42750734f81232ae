//! Execution runtime for resolved rill graphs
//!
//! Takes a resolved root node plus a table of node definitions and runs
//! them as a live reactive program: per-pin activation scheduling, value
//! routing along connections, recursive composite expansion, dynamically
//! spawned sub-executions, completion tracking and teardown.
//!
//! All scheduling state lives inside one event-loop task per session;
//! node run functions execute as spawned tasks and re-enter the loop
//! through its inbox, which yields the documented ordering guarantee:
//! for a single emission, all connected targets are handled in
//! declaration order before any later emission is looked at.

mod channel;
mod expander;
mod invoker;
mod record;
mod router;
mod scheduler;
mod session;
mod tracker;

pub use session::{ExecutionHandle, ExecutionSession, PinEmission, SessionConfig};
