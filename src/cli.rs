//! CLI argument parsing for the certforge-worker binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use uuid::Uuid;

use crate::types::DocumentKind;

#[derive(Parser)]
#[command(name = "certforge-worker", about = "Certforge bulk document generation worker")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the worker server (default if no subcommand given)
    Serve,
    /// Generate documents from a local sheet and exit
    Generate {
        /// Path to the client sheet (.xlsx, .xls or .csv)
        #[arg(long)]
        sheet: PathBuf,

        /// Logo pool: a zip archive or a directory of image files
        #[arg(long)]
        logos: Option<PathBuf>,

        /// Tenant the created records belong to
        #[arg(long)]
        tenant: Uuid,

        /// Operator id written to audit fields
        #[arg(long)]
        actor: Uuid,

        /// Document kind to render
        #[arg(long, value_enum, default_value_t = KindArg::Draft)]
        kind: KindArg,

        /// Output path for the artifact (defaults to its filename in cwd)
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

/// Command-line spelling of the document kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    Draft,
    #[value(name = "softcopy")]
    SoftCopy,
}

impl From<KindArg> for DocumentKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Draft => DocumentKind::Draft,
            KindArg::SoftCopy => DocumentKind::SoftCopy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_cli_no_command_defaults_to_none() {
        let cli = Cli::parse_from(["certforge-worker"]);
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_cli_serve_command_parses() {
        let cli = Cli::parse_from(["certforge-worker", "serve"]);
        assert!(matches!(cli.command, Some(Command::Serve)));
    }

    #[test]
    fn test_cli_generate_command_parses() {
        let tenant = "0e2a1fb2-33bb-4497-9c5c-55b5252916ad";
        let actor = "7d2f8c3e-91f0-4bb1-94f4-3eb01b3bd5e7";
        let cli = Cli::parse_from([
            "certforge-worker",
            "generate",
            "--sheet",
            "clients.xlsx",
            "--logos",
            "logos.zip",
            "--tenant",
            tenant,
            "--actor",
            actor,
            "--kind",
            "softcopy",
            "--output",
            "out.zip",
        ]);

        match cli.command {
            Some(Command::Generate {
                sheet,
                logos,
                tenant: parsed_tenant,
                kind,
                output,
                ..
            }) => {
                assert_eq!(sheet, PathBuf::from("clients.xlsx"));
                assert_eq!(logos, Some(PathBuf::from("logos.zip")));
                assert_eq!(parsed_tenant.to_string(), tenant);
                assert_eq!(kind, KindArg::SoftCopy);
                assert_eq!(output, Some(PathBuf::from("out.zip")));
            }
            _ => panic!("expected generate command"),
        }
    }

    #[test]
    fn test_cli_generate_kind_defaults_to_draft() {
        let cli = Cli::parse_from([
            "certforge-worker",
            "generate",
            "--sheet",
            "clients.csv",
            "--tenant",
            "0e2a1fb2-33bb-4497-9c5c-55b5252916ad",
            "--actor",
            "7d2f8c3e-91f0-4bb1-94f4-3eb01b3bd5e7",
        ]);

        match cli.command {
            Some(Command::Generate { kind, logos, .. }) => {
                assert_eq!(kind, KindArg::Draft);
                assert!(logos.is_none());
            }
            _ => panic!("expected generate command"),
        }
    }
}
