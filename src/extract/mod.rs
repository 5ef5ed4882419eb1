//! The extraction pipeline.
//!
//! Each input record names a scanned invoice file. We check the file, run the
//! preprocessing stages, hand the prepared scan to an extraction engine, and
//! validate what comes back. A failure on one file becomes a `failed` output
//! record rather than aborting the batch.

pub mod engines;

use std::sync::Arc;

use futures::{FutureExt as _, StreamExt as _};
use schemars::JsonSchema;

use crate::{
    async_utils::{BoxedFuture, BoxedStream, io::write_output_csv},
    cmd::StreamOpts,
    file_check::{self, FileKind},
    invoice::{Invoice, Sector},
    prelude::*,
    preprocess,
    profile::ExtractProfile,
    ui::Ui,
    work::{
        WorkInput, WorkItemCounterExt as _, WorkOutput, WorkOutputCounters, WorkStatus,
    },
};

use self::engines::{ExtractionEngine, engine_for_name};

/// An input record describing a file to extract.
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct ExtractInput {
    /// The path to the scanned invoice file.
    pub path: PathBuf,
}

/// An output record describing an extracted invoice.
#[derive(Clone, Debug, JsonSchema, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct ExtractOutput {
    /// The input path.
    pub path: PathBuf,

    /// What kind of file this was.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<FileKind>,

    /// The sector classification of the extracted invoice.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sector: Option<Sector>,

    /// The extracted invoice record, if extraction succeeded. Validation
    /// issues are reported in the record's `errors` with status `incomplete`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice: Option<Invoice>,
}

impl WorkOutput<ExtractOutput> {
    /// Convert this output record to a flat version for CSV output.
    fn to_flat(&self) -> FlatExtractOutput {
        FlatExtractOutput {
            id: if let Value::String(id) = &self.id {
                id.clone()
            } else {
                serde_json::to_string(&self.id).expect("failed to convert ID to string")
            },
            status: self.status,
            errors: if self.errors.is_empty() {
                None
            } else {
                Some(self.errors.join("\n\n"))
            },
            path: self.data.path.clone(),
            invoice_number: self
                .data
                .invoice
                .as_ref()
                .map(|invoice| invoice.invoice_number.clone()),
            vendor: self
                .data
                .invoice
                .as_ref()
                .map(|invoice| invoice.vendor.name.clone()),
            total: self.data.invoice.as_ref().map(|invoice| invoice.total),
        }
    }

    /// Write a stream of outputs to a [`Path`] or to standard output, as CSV.
    pub async fn write_stream_to_csv(
        ui: &Ui,
        path: Option<&Path>,
        stream: BoxedStream<Result<Self>>,
        stream_opts: &StreamOpts,
    ) -> Result<()> {
        let (stream, counters) = WorkOutputCounters::wrap_stream(stream);
        let output = stream.map(|output| Ok(output?.to_flat())).boxed();
        write_output_csv(path, output).await?;
        counters.finish(ui, stream_opts)
    }
}

/// Flat version of [`WorkOutput<ExtractOutput>`], for CSV output.
///
/// Does not contain anything but essential fields.
#[derive(Clone, Debug, JsonSchema, Serialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct FlatExtractOutput {
    /// The ID of the input record.
    pub id: String,

    /// The status of the output record.
    pub status: WorkStatus,

    /// Any errors that occurred during processing.
    pub errors: Option<String>,

    /// The path to the scanned invoice file.
    pub path: PathBuf,

    /// The extracted invoice number.
    pub invoice_number: Option<String>,

    /// The extracted vendor name.
    pub vendor: Option<String>,

    /// The extracted invoice total.
    pub total: Option<f64>,
}

/// Extract a stream of invoice files.
///
/// This function takes a stream of [`ExtractInput`] records and returns a
/// stream of futures yielding [`ExtractOutput`] records, to be resolved with
/// [`futures::StreamExt::buffered`].
#[instrument(level = "debug", skip_all)]
pub async fn extract_files(
    input: BoxedStream<Result<WorkInput<ExtractInput>>>,
    engine_name: &str,
    profile: ExtractProfile,
) -> Result<BoxedStream<BoxedFuture<Result<WorkOutput<ExtractOutput>>>>> {
    // Create an extraction engine.
    let engine = engine_for_name(engine_name, profile.clone())?;

    let output = input
        .map(move |extract_input| {
            let engine = engine.clone();
            let profile = profile.clone();
            async move {
                let extract_input = extract_input?;
                extract_file(extract_input, engine, &profile).await
            }
            .boxed()
        })
        .boxed();

    Ok(output)
}

/// Extract a single invoice file.
#[instrument(level = "debug", skip_all, fields(id = %extract_input.id))]
pub async fn extract_file(
    extract_input: WorkInput<ExtractInput>,
    engine: Arc<dyn ExtractionEngine>,
    profile: &ExtractProfile,
) -> Result<WorkOutput<ExtractOutput>> {
    let id = extract_input.id.clone();
    let path = extract_input.data.path.clone();

    // Perform the actual work.
    let result = extract_file_inner(extract_input, engine, profile).await;

    // If we have an error, output an appropriate record and continue. This is
    // necessary to avoid aborting an entire batch of work if one scan is
    // corrupt or missing.
    match result {
        Ok(output) => Ok(output),
        Err(err) => {
            let errors = vec![format!("{:?}", err)];
            Ok(WorkOutput::new_failed(
                id,
                errors,
                ExtractOutput {
                    path,
                    kind: None,
                    sector: None,
                    invoice: None,
                },
            ))
        }
    }
}

/// Perform actual work for `extract_file`.
#[instrument(level = "debug", skip_all, fields(id = %extract_input.id))]
async fn extract_file_inner(
    extract_input: WorkInput<ExtractInput>,
    engine: Arc<dyn ExtractionEngine>,
    profile: &ExtractProfile,
) -> Result<WorkOutput<ExtractOutput>> {
    let id = extract_input.id;
    let path = extract_input.data.path;

    // Make sure the file is something we're willing to process.
    file_check::check_file(&path, profile.max_file_size_mb).await?;
    let bytes = tokio::fs::read(&path)
        .await
        .with_context(|| format!("Failed to read scan at path: {:?}", path))?;
    let kind = file_check::file_kind(&path, &bytes);

    // Prepare the scan and hand it to the engine.
    let prepared = preprocess::prepare_scan(bytes);
    let invoice = engine
        .extract(&path, &prepared)
        .await
        .with_context(|| format!("Extraction failed for {:?}", path))?;

    // Check the extracted record. Issues mark the record as incomplete but
    // still include the data, so a reviewer can fix it up.
    let issues = invoice.validation_issues();
    let sector = invoice.sector();
    Ok(WorkOutput {
        id,
        status: if issues.is_empty() {
            WorkStatus::Ok
        } else {
            WorkStatus::Incomplete
        },
        errors: issues,
        data: ExtractOutput {
            path,
            kind: Some(kind),
            sector: Some(sector),
            invoice: Some(invoice),
        },
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn input(id: &str, path: &Path) -> WorkInput<ExtractInput> {
        WorkInput {
            id: Value::String(id.to_owned()),
            data: ExtractInput {
                path: path.to_owned(),
            },
        }
    }

    #[tokio::test]
    async fn test_extract_file_with_mock_engine() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("acme-corp.pdf");
        tokio::fs::write(&path, b"%PDF-1.4 fake scan").await.unwrap();

        let engine = engine_for_name("mock", ExtractProfile::default()).unwrap();
        let output = extract_file(
            input("scan-1", &path),
            engine,
            &ExtractProfile::default(),
        )
        .await
        .unwrap();

        assert_eq!(output.status, WorkStatus::Ok);
        assert_eq!(output.data.kind, Some(FileKind::Pdf));
        assert_eq!(output.data.sector, Some(Sector::Retail));
        let invoice = output.data.invoice.unwrap();
        assert!(invoice.invoice_number.starts_with("INV-ACME-"));
    }

    #[tokio::test]
    async fn test_missing_file_becomes_failed_record() {
        let engine = engine_for_name("mock", ExtractProfile::default()).unwrap();
        let output = extract_file(
            input("scan-2", Path::new("/nonexistent/scan.pdf")),
            engine,
            &ExtractProfile::default(),
        )
        .await
        .unwrap();

        assert_eq!(output.status, WorkStatus::Failed);
        assert!(!output.errors.is_empty());
        assert!(output.data.invoice.is_none());
    }

    #[tokio::test]
    async fn test_incomplete_sidecar_is_flagged_for_review() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.png");
        tokio::fs::write(&path, b"fake").await.unwrap();
        // No vendor name and no invoice date.
        let sidecar = json!({
            "invoice_number": "INV-0002",
            "items": [{"description": "Widget", "quantity": 1, "unit_price": 10}],
        });
        tokio::fs::write(
            dir.path().join("partial.png.json"),
            serde_json::to_vec(&sidecar).unwrap(),
        )
        .await
        .unwrap();

        let engine = engine_for_name("sidecar", ExtractProfile::default()).unwrap();
        let output = extract_file(
            input("scan-3", &path),
            engine,
            &ExtractProfile::default(),
        )
        .await
        .unwrap();

        assert_eq!(output.status, WorkStatus::Incomplete);
        assert!(output.errors.contains(&"Missing vendor name".to_owned()));
        assert!(output.errors.contains(&"Missing invoice date".to_owned()));
        assert!(output.data.invoice.is_some());
    }

    #[test]
    fn test_unknown_engine_name() {
        assert!(engine_for_name("tesseract", ExtractProfile::default()).is_err());
    }
}
