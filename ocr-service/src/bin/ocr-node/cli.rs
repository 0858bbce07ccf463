use clap::Parser;
use ocr_core::infrastructure::config::CONFIG_FILE_NAME;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "ocr-node")]
#[command(about = "Leader-rotating oracle network running against an in-process chain", long_about = None)]
pub struct Cli {
    /// Path to configuration file; `./ocr-config.toml` is used when present
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Override data directory; enables RocksDB persistence
    #[arg(short, long)]
    pub data_dir: Option<PathBuf>,

    /// Log filters, e.g. `info` or `info,ocr_core=debug`
    #[arg(short, long, default_value = "info")]
    pub log_level: String,

    /// Number of oracles in the devnet
    #[arg(long, default_value_t = 4)]
    pub oracles: usize,

    /// Faulty oracles tolerated; reports need threshold + 1 signatures
    #[arg(long, default_value_t = 1)]
    pub threshold: u8,

    /// Stop after this many reports reach the chain; run until ctrl-c when omitted
    #[arg(long)]
    pub rounds: Option<usize>,

    /// Seed for deterministic keys and data sources
    #[arg(long, default_value_t = 7)]
    pub seed: u64,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    pub dump_config: bool,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    pub fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME))
    }

    pub fn apply_to_env(&self) {
        if let Some(data_dir) = &self.data_dir {
            std::env::set_var(format!("{}NODE__DATA_DIR", ocr_core::infrastructure::config::ENV_PREFIX), data_dir);
        }
    }
}
