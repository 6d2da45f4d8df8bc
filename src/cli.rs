mod command;
mod runner;

pub use command::Command;
pub use runner::{OutputMode, run, serve_lines};
