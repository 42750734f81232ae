//! Standard node library
//!
//! Built-in node definitions for common operations, plus a table
//! constructor for handing them to an execution session.

mod control;
mod debug;
mod math;
mod state;
mod timing;

pub use control::list_map;
pub use debug::log;
pub use math::{add, multiply, subtract};
pub use state::{get_global, set_global};
pub use timing::{debounce, delay};

use rillcore::NodeTable;

/// Table of every standard node, keyed by node id
pub fn stdlib() -> NodeTable {
    NodeTable::new()
        .with(math::add())
        .with(math::subtract())
        .with(math::multiply())
        .with(debug::log())
        .with(timing::delay())
        .with(timing::debounce())
        .with(state::get_global())
        .with(state::set_global())
        .with(control::list_map())
}
