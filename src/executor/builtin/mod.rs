mod commands;
mod job_control;
mod manager;
mod vars;

pub use manager::{BuiltinCommand, BuiltinContext, BuiltinManager};
