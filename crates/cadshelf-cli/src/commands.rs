//! Subcommand handlers. Each prints its result as JSON on stdout and returns
//! whether the command finished without per-item failures.

use std::sync::Arc;

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::json;
use tracing::info;

use cadshelf_core::{DocumentGateway, DocumentSummary, RecordStore};
use cadshelf_gateway::HttpGateway;
use cadshelf_store::{AssetStore, FsRecordStore};
use cadshelf_sync::{
    select_documents, write_manifest, BatchCriteria, BatchOptions, BatchRunner, CommandPdfRenderer,
    PdfRenderer, PdfUploader, Reconciler, SyncConfig, SyncService,
};

use crate::{Cli, Commands, StepArgs};

/// Local storage handles shared by every command.
struct Local {
    config: SyncConfig,
    store: Arc<FsRecordStore>,
    assets: AssetStore,
}

impl Local {
    async fn open(cli: &Cli) -> Result<Self> {
        let mut config = SyncConfig::from_env();
        if let Some(ref dir) = cli.data_dir {
            config = config.with_data_dir(dir.clone());
        }
        let store = FsRecordStore::open(&config.data_dir)
            .await
            .with_context(|| format!("Failed to open data dir {}", config.data_dir.display()))?;
        let assets = AssetStore::new(config.data_dir.clone());
        Ok(Self {
            config,
            store: Arc::new(store),
            assets,
        })
    }

    fn gateway(&self) -> Result<Arc<dyn DocumentGateway>> {
        let gateway = HttpGateway::from_env().context("Remote gateway is not configured")?;
        Ok(Arc::new(gateway))
    }

    fn service(&self, gateway: Arc<dyn DocumentGateway>) -> SyncService {
        SyncService::new(
            gateway,
            self.store.clone(),
            self.assets.clone(),
            Reconciler::new(self.config.reconcile.clone()),
        )
    }

    fn runner(&self, gateway: Arc<dyn DocumentGateway>, steps: &StepArgs) -> Result<BatchRunner> {
        let renderer: Option<Arc<dyn PdfRenderer>> = if steps.pdf {
            let renderer = CommandPdfRenderer::from_env()?
                .context("--pdf needs CADSHELF_PDF_COMMAND")?;
            Some(Arc::new(renderer))
        } else {
            None
        };
        Ok(BatchRunner::new(Arc::new(self.service(gateway)), renderer))
    }

    fn options(&self, steps: &StepArgs) -> BatchOptions {
        BatchOptions {
            render_pdf: steps.pdf,
            upload_pdf: steps.upload,
            upload_delay: self.config.upload_delay,
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub async fn run(cli: Cli) -> Result<bool> {
    let local = Local::open(&cli).await?;

    match cli.command {
        Commands::Sync { ref ids, ref steps } => {
            let runner = local.runner(local.gateway()?, steps)?;
            // Names are unknown until metadata is fetched.
            let candidates: Vec<DocumentSummary> = ids
                .iter()
                .map(|id| DocumentSummary {
                    id: id.clone(),
                    name: id.clone(),
                    labels: Vec::new(),
                })
                .collect();
            let summary = runner.process(&candidates, &local.options(steps)).await?;
            print_json(&summary)?;
            Ok(!summary.has_failures())
        }

        Commands::Batch {
            criteria,
            ref steps,
            dry_run,
        } => {
            let criteria = BatchCriteria::from(criteria);
            let gateway = local.gateway()?;
            if dry_run {
                let selected = select_documents(gateway.as_ref(), &criteria).await?;
                print_json(&selected)?;
                return Ok(true);
            }
            let runner = local.runner(gateway, steps)?;
            let summary = runner.run(&criteria, &local.options(steps)).await?;
            print_json(&summary)?;
            Ok(!summary.has_failures())
        }

        Commands::Upload { ref id } => {
            let uploader = PdfUploader::new(
                local.gateway()?,
                local.store.clone(),
                local.assets.clone(),
            );
            let outcome = uploader.upload(id).await?;
            print_json(&outcome)?;
            Ok(true)
        }

        Commands::Gallery => {
            let path = write_manifest(local.store.as_ref(), &local.assets).await?;
            let count = local.store.list_all().await?.len();
            info!(path = %path.display(), result_count = count, "Gallery written");
            print_json(&json!({ "path": path, "documents": count }))?;
            Ok(true)
        }

        Commands::List => {
            let mut rows = Vec::new();
            for record in local.store.list_all().await? {
                let slug = local.store.slug_of(&record.document_id).await?;
                rows.push(json!({
                    "documentId": record.document_id,
                    "slug": slug,
                    "title": record.title,
                    "labels": record.labels,
                    "versions": record.versions.len(),
                }));
            }
            print_json(&rows)?;
            Ok(true)
        }
    }
}
