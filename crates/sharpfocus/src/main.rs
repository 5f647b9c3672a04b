//! The sharpfocus language server binary.

use std::sync::Arc;

use clap::Parser;
use sharpfocus::args::{CliArguments, Commands, LspArgs};
use sharpfocus::harness::lsp_harness;
use sharpfocus::transport::with_stdio_transport;
use sharpfocus::Init;
use sharpfocus_query::semantics::EmptySemanticModel;

fn main() -> anyhow::Result<()> {
    let _ = {
        use log::LevelFilter::*;
        env_logger::builder()
            .filter_module("sharpfocus", Info)
            .filter_module("sharpfocus_query", Info)
            .try_init()
    };

    let args = CliArguments::parse();
    log::info!("arguments: {args:#?}");

    match args.command.unwrap_or_default() {
        Commands::Lsp(args) => lsp_main(args),
        Commands::Probe => Ok(()),
    }
}

fn lsp_main(args: LspArgs) -> anyhow::Result<()> {
    log::info!("starting the language server");

    // The semantic layer is a collaborator: embedders bind their front end
    // through `Init`; the plain binary serves with none and answers `null`.
    let model = Arc::new(EmptySemanticModel);

    with_stdio_transport(args.mirror, |connection| {
        lsp_harness(Init { model }, connection)
    })?;

    log::info!("language server shut down");
    Ok(())
}
