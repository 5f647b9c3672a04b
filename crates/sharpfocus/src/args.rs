//! Command line arguments.

use clap::{Parser, Subcommand};

use crate::transport::MirrorArgs;

/// The sharpfocus command line.
#[derive(Debug, Clone, Parser)]
#[clap(name = "sharpfocus", author, version, about)]
pub struct CliArguments {
    /// The command to run; serving LSP over stdio is the default.
    #[clap(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands.
#[derive(Debug, Clone, Subcommand)]
#[clap(rename_all = "camelCase")]
pub enum Commands {
    /// Serve the language server over stdio.
    Lsp(LspArgs),
    /// Probe that the binary starts, then exit successfully.
    Probe,
}

impl Default for Commands {
    fn default() -> Self {
        Self::Lsp(LspArgs::default())
    }
}

/// Arguments of the `lsp` command.
#[derive(Debug, Clone, Default, Parser)]
pub struct LspArgs {
    /// Input recording and replay.
    #[clap(flatten)]
    pub mirror: MirrorArgs,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_default_command_serves_lsp() {
        let args = CliArguments::parse_from(["sharpfocus"]);
        assert!(args.command.is_none());
        assert!(matches!(Commands::default(), Commands::Lsp(_)));
    }

    #[test]
    fn mirror_flags_parse() {
        let args = CliArguments::parse_from(["sharpfocus", "lsp", "--mirror", "input.log"]);
        let Some(Commands::Lsp(lsp)) = args.command else {
            panic!("expected the lsp command");
        };
        assert_eq!(lsp.mirror.mirror, "input.log");
        assert_eq!(lsp.mirror.replay, "");
    }
}
