use anyhow::Result;
use clap::Parser;
use refactors_cli::{Cli, init_logging, run};
use refactors_core::RefactorRegistry;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level)?;
    run(cli, RefactorRegistry::new()).await
}
