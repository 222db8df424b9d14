use std::{net::SocketAddr, path::PathBuf, time::Duration};

use crate::catalog::CatalogOptions;

/// Runtime settings resolved from the command line and environment.
#[derive(Clone, Debug)]
pub struct Context {
    pub data_dir: PathBuf,
    pub reset: bool,
    pub log_file: Option<PathBuf>,
    pub api_listen: SocketAddr,
    pub busy_timeout: Duration,
    pub catalog_options: CatalogOptions,
}

impl Context {
    pub fn from_cli(cli: &crate::cli::Cli) -> Self {
        Self {
            data_dir: PathBuf::from(&cli.data_dir),
            reset: cli.reset,
            log_file: cli.log_file.as_ref().map(PathBuf::from),
            api_listen: cli.api_listen,
            busy_timeout: Duration::from_millis(cli.busy_timeout_ms),
            catalog_options: CatalogOptions {
                enforce_attribute_category: !cli.allow_foreign_attributes,
            },
        }
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("pmt.sqlite")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn from_cli_maps_flags() {
        let cli = crate::cli::Cli::try_parse_from([
            "pmt",
            "--data-dir",
            "/tmp/pmt-data",
            "--busy-timeout-ms",
            "250",
            "--allow-foreign-attributes",
            "--log-file",
            "logs/pmt.log",
        ])
        .unwrap();
        let ctx = Context::from_cli(&cli);

        assert_eq!(ctx.db_path(), PathBuf::from("/tmp/pmt-data/pmt.sqlite"));
        assert_eq!(ctx.busy_timeout, Duration::from_millis(250));
        assert!(!ctx.catalog_options.enforce_attribute_category);
        assert_eq!(ctx.log_file, Some(PathBuf::from("logs/pmt.log")));
    }
}
