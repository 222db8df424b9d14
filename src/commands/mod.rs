use crate::catalog::Catalog;
use crate::cli::Command;
use crate::storage::Storage;

pub mod catalog;

pub trait CommandRunner {
    fn run<S: Storage>(&self, catalog: &Catalog<S>) -> anyhow::Result<()>;
}

impl Command {
    pub fn run<S: Storage>(&self, catalog: &Catalog<S>) -> anyhow::Result<()> {
        match self {
            Command::Category { cmd } => cmd.run(catalog),
            Command::Attribute { cmd } => cmd.run(catalog),
            Command::Product { cmd } => cmd.run(catalog),
        }
    }
}
