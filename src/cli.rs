use std::path::PathBuf;

use clap::Parser;

#[derive(Parser)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to the mirror database file
    #[arg(long, default_value = "mirror.db3")]
    pub db: PathBuf,

    /// URL of the node RPC endpoint
    #[arg(long, default_value = "http://127.0.0.1:8332")]
    pub rpc_url: String,

    /// RPC user name
    #[arg(long)]
    pub rpc_user: Option<String>,

    /// RPC password
    #[arg(long)]
    pub rpc_pass: Option<String>,

    /// Network the store mirrors, checked against stored metadata
    #[arg(long, default_value = "mainnet")]
    pub network: String,

    /// Seconds to sleep between polling cycles
    #[arg(long, default_value_t = 10)]
    pub interval: u64,
}
