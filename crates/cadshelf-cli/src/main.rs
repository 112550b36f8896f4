//! cadshelf: sync CAD document metadata, thumbnails, and PDFs into a local
//! gallery.
//!
//! Results are printed to stdout as JSON; logs go to stderr.

mod commands;
mod logging;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use tracing::error;

use cadshelf_core::{DocumentFilter, SortOrder};
use cadshelf_sync::BatchCriteria;

#[derive(Parser)]
#[command(name = "cadshelf")]
#[command(author, version, about = "Sync CAD documents into a local gallery")]
#[command(propagate_version = true)]
struct Cli {
    /// Data directory (overrides CADSHELF_DATA_DIR)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sync specific documents by id
    Sync {
        /// Remote document ids
        #[arg(required = true, num_args = 1..)]
        ids: Vec<String>,

        #[command(flatten)]
        steps: StepArgs,
    },

    /// Sync every document matching the selection criteria
    Batch {
        #[command(flatten)]
        criteria: CriteriaArgs,

        #[command(flatten)]
        steps: StepArgs,

        /// Print the selected documents without syncing
        #[arg(long)]
        dry_run: bool,
    },

    /// Upload a document's rendered PDF into its workspace
    Upload {
        /// Remote document id
        id: String,
    },

    /// Write the gallery manifest from the local records
    Gallery,

    /// List local records
    List,
}

#[derive(Args, Debug, Default)]
struct StepArgs {
    /// Render a PDF after each successful sync (needs CADSHELF_PDF_COMMAND)
    #[arg(long)]
    pdf: bool,

    /// Upload the PDF after each successful sync
    #[arg(long)]
    upload: bool,
}

#[derive(Args, Debug, Default)]
struct CriteriaArgs {
    /// Only documents with this label (listing is filtered locally)
    #[arg(short, long)]
    label: Option<String>,

    /// Listing category: owned, created, shared, trash, public, recent
    #[arg(short, long)]
    filter: Option<DocumentFilter>,

    /// Free-text search
    #[arg(short, long)]
    query: Option<String>,

    /// Sort column, e.g. name, modifiedAt, createdAt
    #[arg(long)]
    sort_column: Option<String>,

    /// Sort direction: asc or desc
    #[arg(long)]
    sort_order: Option<SortOrder>,

    /// Page size
    #[arg(long)]
    limit: Option<u32>,

    /// Fetch only the first listing page
    #[arg(long)]
    single_page: bool,
}

impl From<CriteriaArgs> for BatchCriteria {
    fn from(args: CriteriaArgs) -> Self {
        Self {
            label: args.label,
            filter: args.filter,
            query: args.query,
            sort_column: args.sort_column,
            sort_order: args.sort_order,
            limit: args.limit,
            single_page: args.single_page,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let _log_guard = logging::init();

    let cli = Cli::parse();
    match commands::run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            error!(error = %e, "Command failed");
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sync_ids() {
        let cli = Cli::try_parse_from(["cadshelf", "sync", "a", "b", "--pdf"]).unwrap();
        match cli.command {
            Commands::Sync { ids, steps } => {
                assert_eq!(ids, vec!["a", "b"]);
                assert!(steps.pdf);
                assert!(!steps.upload);
            }
            _ => panic!("expected sync"),
        }
    }

    #[test]
    fn test_sync_requires_ids() {
        assert!(Cli::try_parse_from(["cadshelf", "sync"]).is_err());
    }

    #[test]
    fn test_parse_batch_criteria() {
        let cli = Cli::try_parse_from([
            "cadshelf",
            "batch",
            "--label",
            "meshtastic",
            "--filter",
            "shared",
            "--sort-order",
            "asc",
            "--single-page",
            "--data-dir",
            "/tmp/shelf",
        ])
        .unwrap();
        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/shelf")));
        match cli.command {
            Commands::Batch { criteria, .. } => {
                let criteria = BatchCriteria::from(criteria);
                assert_eq!(criteria.label.as_deref(), Some("meshtastic"));
                assert_eq!(criteria.filter, Some(DocumentFilter::Shared));
                assert_eq!(criteria.sort_order, Some(SortOrder::Asc));
                assert!(criteria.single_page);
            }
            _ => panic!("expected batch"),
        }
    }

    #[test]
    fn test_unknown_filter_is_rejected() {
        assert!(Cli::try_parse_from(["cadshelf", "batch", "--filter", "bogus"]).is_err());
    }
}
