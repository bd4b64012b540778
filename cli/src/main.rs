//! devrig - local development environments from a Devrigfile

use clap::Parser;

use devrig_cli::cli::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    devrig_cli::logging::init(cli.verbose);
    let code = match cli.run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            1
        }
    };
    std::process::exit(code);
}
