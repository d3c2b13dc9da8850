use clap::Parser;

use vcon_lib::cli::Cli;
use vcon_lib::{commands, logging};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init(cli.global.verbose);

    if let Err(e) = commands::run(cli).await {
        eprintln!("{e}");
        std::process::exit(e.exit_code());
    }
}
