//! The sidecar extraction engine.
//!
//! Reads a prepared `<file>.json` sitting next to the scan, standing in for a
//! document whose contents are already known. Useful for demos and tests that
//! need deterministic output. The sidecar may be partial: derived fields are
//! recomputed, and tax is filled in from the profile rate when the sidecar
//! doesn't supply one.

use async_trait::async_trait;

use crate::{invoice::Invoice, prelude::*, profile::ExtractProfile};

use super::ExtractionEngine;

/// Reads invoice data from a JSON file next to the scan.
pub struct SidecarExtractionEngine {
    profile: ExtractProfile,
}

impl SidecarExtractionEngine {
    /// Create a new sidecar engine.
    pub fn new(profile: ExtractProfile) -> Self {
        Self { profile }
    }
}

#[async_trait]
impl ExtractionEngine for SidecarExtractionEngine {
    async fn extract(&self, path: &Path, _scan: &[u8]) -> Result<Invoice> {
        let sidecar_path = sidecar_path(path);
        let data = tokio::fs::read_to_string(&sidecar_path)
            .await
            .with_context(|| {
                format!("Failed to read sidecar file at path: {:?}", sidecar_path)
            })?;
        let value: Value = serde_json::from_str(&data).with_context(|| {
            format!("Failed to parse JSON from sidecar at path: {:?}", sidecar_path)
        })?;
        let has_tax = value.get("tax").is_some();
        let mut invoice: Invoice = serde_json::from_value(value).with_context(|| {
            format!("Invalid invoice data in sidecar at path: {:?}", sidecar_path)
        })?;

        invoice.recalculate();
        if !has_tax {
            invoice.apply_tax_rate(self.profile.tax_rate);
        }
        Ok(invoice)
    }
}

/// The sidecar path for a scan: the scan's file name with `.json` appended.
fn sidecar_path(path: &Path) -> PathBuf {
    let mut os_string = path.as_os_str().to_owned();
    os_string.push(".json");
    PathBuf::from(os_string)
}
