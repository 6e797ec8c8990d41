mod cli;

use std::time::Duration;

use clap::Parser as _;
use miette::IntoDiagnostic;

use chain_mirror::database::Database;
use chain_mirror::sync::Syncer;

fn main() -> miette::Result<()> {
    env_logger::init();
    let cli = cli::Cli::parse();

    let mut db = Database::new(&cli.db).into_diagnostic()?;
    db.initialize(chain_mirror::VERSION, &cli.network)
        .into_diagnostic()?;

    let auth = match (cli.rpc_user, cli.rpc_pass) {
        (Some(user), Some(pass)) => bitcoincore_rpc::Auth::UserPass(user, pass),
        _ => bitcoincore_rpc::Auth::None,
    };
    let rpc = bitcoincore_rpc::Client::new(&cli.rpc_url, auth).into_diagnostic()?;

    let mut syncer = Syncer::new(rpc, db).into_diagnostic()?;
    syncer
        .run(Duration::from_secs(cli.interval))
        .into_diagnostic()?;
    Ok(())
}
