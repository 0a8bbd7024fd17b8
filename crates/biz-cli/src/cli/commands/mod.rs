//! CLI command handlers, one file per command.

mod completions;
mod interactive;
mod process;

pub use completions::run_completions;
pub use interactive::run_interactive;
pub use process::{run_process, ProcessArgs};
