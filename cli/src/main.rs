use clap::Parser;
use repoversion_cli::Cli;
use repoversion_cli::tracing_setup::Verbosity;
use repoversion_cli::tracing_setup::init_subscriber;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_subscriber(
        Verbosity::from_flags(cli.global.verbose, cli.global.quiet),
        cli.global.no_color,
    );
    cli.run().await
}
