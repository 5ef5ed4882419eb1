//! The rendering pipeline.
//!
//! Each input record carries a reviewed invoice. We write three artifacts per
//! invoice into the output directory: a pretty-printed JSON file, a PDF, and
//! a placeholder QR image. After the batch, a summary report PDF covers every
//! invoice that rendered successfully.

pub mod pdf;
pub mod qr;

use std::sync::{Arc, LazyLock, Mutex};

use futures::FutureExt as _;
use regex::Regex;
use schemars::JsonSchema;

use crate::{
    async_utils::{BoxedFuture, BoxedStream},
    invoice::Invoice,
    prelude::*,
    ui::Ui,
    work::{WorkInput, WorkOutput, WorkStatus},
};

/// An input record carrying an invoice to render.
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub struct RenderInput {
    /// The invoice to render.
    pub invoice: Invoice,
}

/// An output record listing the artifacts written for one invoice.
#[derive(Clone, Debug, Default, JsonSchema, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct RenderOutput {
    /// The rendered invoice's number.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice_number: Option<String>,

    /// Path of the JSON artifact.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json_path: Option<PathBuf>,

    /// Path of the PDF artifact.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pdf_path: Option<PathBuf>,

    /// Path of the QR image artifact.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qr_path: Option<PathBuf>,
}

/// Render a stream of invoices into `out_dir`.
///
/// Returns a stream of futures to be resolved with
/// [`futures::StreamExt::buffered`], plus a shared list collecting every
/// successfully rendered invoice for [`write_batch_report`].
#[instrument(level = "debug", skip_all, fields(out_dir = %out_dir.display()))]
pub async fn render_files(
    input: BoxedStream<Result<WorkInput<RenderInput>>>,
    out_dir: &Path,
) -> Result<(
    BoxedStream<BoxedFuture<Result<WorkOutput<RenderOutput>>>>,
    Arc<Mutex<Vec<Invoice>>>,
)> {
    use futures::StreamExt as _;

    tokio::fs::create_dir_all(out_dir)
        .await
        .with_context(|| format!("Failed to create output directory: {:?}", out_dir))?;

    let rendered = Arc::new(Mutex::new(vec![]));
    let out_dir = out_dir.to_owned();
    let output = input
        .map({
            let rendered = rendered.clone();
            move |render_input| {
                let rendered = rendered.clone();
                let out_dir = out_dir.clone();
                async move {
                    let render_input = render_input?;
                    render_file(render_input, &out_dir, &rendered).await
                }
                .boxed()
            }
        })
        .boxed();

    Ok((output, rendered))
}

/// Render a single invoice's artifacts.
#[instrument(level = "debug", skip_all, fields(id = %render_input.id))]
pub async fn render_file(
    render_input: WorkInput<RenderInput>,
    out_dir: &Path,
    rendered: &Mutex<Vec<Invoice>>,
) -> Result<WorkOutput<RenderOutput>> {
    let id = render_input.id.clone();

    // As in extraction, one bad record becomes a `failed` output instead of
    // aborting the batch.
    match render_file_inner(render_input, out_dir).await {
        Ok((output, invoice)) => {
            rendered
                .lock()
                .expect("rendered invoice list lock poisoned")
                .push(invoice);
            Ok(output)
        }
        Err(err) => {
            let errors = vec![format!("{:?}", err)];
            Ok(WorkOutput::new_failed(id, errors, RenderOutput::default()))
        }
    }
}

/// Perform actual work for `render_file`.
async fn render_file_inner(
    render_input: WorkInput<RenderInput>,
    out_dir: &Path,
) -> Result<(WorkOutput<RenderOutput>, Invoice)> {
    let id = render_input.id;
    let invoice = render_input.data.invoice;
    let stem = artifact_stem(&invoice, &id);

    let json_path = out_dir.join(format!("{stem}.json"));
    let json = serde_json::to_vec_pretty(&invoice)
        .context("failed to serialize invoice as JSON")?;
    write_artifact(&json_path, json).await?;

    let pdf_path = out_dir.join(format!("{stem}.pdf"));
    write_artifact(&pdf_path, pdf::invoice_pdf(&invoice)?).await?;

    let qr_path = out_dir.join(format!("{stem}-qr.png"));
    write_artifact(&qr_path, qr::placeholder_qr_png(&invoice.invoice_number)?).await?;

    debug!("rendered artifacts for invoice {}", invoice.invoice_number);
    let output = WorkOutput {
        id,
        status: WorkStatus::Ok,
        errors: vec![],
        data: RenderOutput {
            invoice_number: Some(invoice.invoice_number.clone()),
            json_path: Some(json_path),
            pdf_path: Some(pdf_path),
            qr_path: Some(qr_path),
        },
    };
    Ok((output, invoice))
}

async fn write_artifact(path: &Path, bytes: Vec<u8>) -> Result<()> {
    tokio::fs::write(path, bytes)
        .await
        .with_context(|| format!("Failed to write artifact: {:?}", path))
}

/// Write the batch summary report for the rendered invoices.
pub async fn write_batch_report(
    ui: &Ui,
    out_dir: &Path,
    invoices: &[Invoice],
) -> Result<PathBuf> {
    let path = out_dir.join("batch-report.pdf");
    write_artifact(&path, pdf::batch_report_pdf(invoices)?).await?;
    ui.display_message(
        "📄",
        &format!("Batch report for {} invoice(s): {}", invoices.len(), path.display()),
    );
    Ok(path)
}

/// A file-name-safe stem for an invoice's artifacts, from the invoice number
/// or the record ID as a fallback.
fn artifact_stem(invoice: &Invoice, id: &Value) -> String {
    static UNSAFE_CHARS: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"[^A-Za-z0-9._-]+").expect("invalid regex"));

    let raw = if invoice.invoice_number.is_empty() {
        match id {
            Value::String(id) => format!("invoice-{id}"),
            other => format!("invoice-{other}"),
        }
    } else {
        invoice.invoice_number.clone()
    };
    let stem = UNSAFE_CHARS.replace_all(&raw, "-");
    stem.trim_matches('-').to_owned()
}
