mod commands;
mod parser;

pub use commands::handle_command;
pub use parser::Args;
