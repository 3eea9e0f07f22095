pub mod context;
pub mod outlet;
pub mod pipeline;
pub mod prompt;
pub mod sanitize;
pub mod types;
pub mod validators;
pub mod workflow;
