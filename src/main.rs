use anyhow::Result;
use chatsync::{app, cli::Cli, infra};
use clap::Parser;

fn main() -> Result<()> {
    infra::secrets::install_panic_redaction_hook();

    app::run(Cli::parse())
}
