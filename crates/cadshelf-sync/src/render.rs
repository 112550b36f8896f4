//! PDF rendering through an external typesetting command.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, instrument};

use cadshelf_core::defaults::PDF_TIMEOUT_SECS;
use cadshelf_core::{DocumentRecord, Error, Result};
use cadshelf_store::{AssetStore, StoredAsset};

const INPUT_PLACEHOLDER: &str = "{input}";
const OUTPUT_PLACEHOLDER: &str = "{output}";
const THUMBNAIL_PLACEHOLDER: &str = "{thumbnail}";

/// Produces a PDF for a record.
#[async_trait]
pub trait PdfRenderer: Send + Sync {
    /// Short identifier recorded as the asset source.
    fn name(&self) -> &str;

    /// Render `record` to PDF bytes. `thumbnail` is the local preview image.
    async fn render(&self, record: &DocumentRecord, thumbnail: Option<&Path>) -> Result<Vec<u8>>;
}

/// Runs a command line such as
/// `typst compile --input data={input} card.typ {output}`.
///
/// `{input}` is replaced with a JSON file holding the record, `{output}` with
/// the path the command must write, `{thumbnail}` with the preview image path
/// (empty when there is none). Arguments are split on whitespace; no shell is
/// involved.
#[derive(Debug, Clone)]
pub struct CommandPdfRenderer {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandPdfRenderer {
    /// Parse a command template.
    pub fn parse(template: &str, timeout_secs: u64) -> Result<Self> {
        let mut parts = template.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| Error::Config("PDF command is empty".to_string()))?;
        let args: Vec<String> = parts.collect();

        if !args.iter().any(|a| a.contains(OUTPUT_PLACEHOLDER)) {
            return Err(Error::Config(format!(
                "PDF command must contain {} placeholder",
                OUTPUT_PLACEHOLDER
            )));
        }
        if timeout_secs == 0 {
            return Err(Error::Config("PDF timeout must be greater than 0".to_string()));
        }

        Ok(Self {
            program,
            args,
            timeout: Duration::from_secs(timeout_secs),
        })
    }

    /// Load from `CADSHELF_PDF_COMMAND` and `CADSHELF_PDF_TIMEOUT_SECS`.
    /// `Ok(None)` when no command is configured.
    pub fn from_env() -> Result<Option<Self>> {
        let template = match std::env::var("CADSHELF_PDF_COMMAND") {
            Ok(t) if !t.trim().is_empty() => t,
            _ => return Ok(None),
        };
        let timeout_secs = std::env::var("CADSHELF_PDF_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(PDF_TIMEOUT_SECS);
        Self::parse(&template, timeout_secs).map(Some)
    }

    fn expand(&self, input: &Path, output: &Path, thumbnail: Option<&Path>) -> Vec<String> {
        let input = input.to_string_lossy();
        let output = output.to_string_lossy();
        let thumbnail = thumbnail
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.args
            .iter()
            .map(|arg| {
                arg.replace(INPUT_PLACEHOLDER, &input)
                    .replace(OUTPUT_PLACEHOLDER, &output)
                    .replace(THUMBNAIL_PLACEHOLDER, &thumbnail)
            })
            .collect()
    }
}

/// Run a command with a timeout, failing on non-zero exit.
async fn run_cmd_with_timeout(cmd: &mut Command, timeout: Duration) -> Result<()> {
    let output = tokio::time::timeout(timeout, cmd.output())
        .await
        .map_err(|_| {
            Error::Render(format!(
                "External command timed out after {}s",
                timeout.as_secs()
            ))
        })?
        .map_err(|e| Error::Render(format!("Failed to execute command: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::Render(format!(
            "Command failed (exit {}): {}",
            output.status,
            stderr.trim()
        )));
    }
    Ok(())
}

#[async_trait]
impl PdfRenderer for CommandPdfRenderer {
    fn name(&self) -> &str {
        &self.program
    }

    #[instrument(skip(self, record, thumbnail), fields(subsystem = "sync", component = "render", op = "render_pdf", document_id = %record.document_id))]
    async fn render(&self, record: &DocumentRecord, thumbnail: Option<&Path>) -> Result<Vec<u8>> {
        let workdir = tempfile::Builder::new()
            .prefix("cadshelf-render-")
            .tempdir()
            .map_err(|e| Error::Render(format!("Failed to create temp dir: {}", e)))?;
        let input = workdir.path().join("record.json");
        let output = workdir.path().join("output.pdf");

        tokio::fs::write(&input, record.to_json_pretty()?).await?;

        let args = self.expand(&input, &output, thumbnail);
        debug!(program = %self.program, ?args, "Running PDF command");
        run_cmd_with_timeout(Command::new(&self.program).args(&args), self.timeout).await?;

        let bytes = match tokio::fs::read(&output).await {
            Ok(bytes) if !bytes.is_empty() => bytes,
            Ok(_) => return Err(Error::Render("PDF command produced an empty file".to_string())),
            Err(e) => {
                return Err(Error::Render(format!(
                    "PDF command produced no output: {}",
                    e
                )))
            }
        };
        Ok(bytes)
    }
}

/// Render a record and store the PDF under `pdfs/`.
pub async fn render_and_store(
    renderer: &dyn PdfRenderer,
    assets: &AssetStore,
    record: &DocumentRecord,
    slug: &str,
    thumbnail: Option<&Path>,
) -> Result<StoredAsset> {
    let bytes = renderer.render(record, thumbnail).await?;
    let stored = assets
        .store_pdf(&record.document_id, slug, &bytes, renderer.name())
        .await?;
    info!(
        document_id = %record.document_id,
        size_bytes = bytes.len(),
        changed = stored.changed,
        "PDF rendered"
    );
    Ok(stored)
}
