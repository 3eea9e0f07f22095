pub mod cost_guard;
pub mod logging;
