use clap::Parser;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "studio_remote=info".into()),
        )
        .init();

    studio_remote::run(studio_remote::Cli::parse())
}
