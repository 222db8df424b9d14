mod args;
mod catalog_cmd;
mod command;

pub use args::Cli;
pub use catalog_cmd::{AttributeCmd, CategoryCmd, ProductCmd};
pub use command::Command;

pub use args::parse;
