//! Extraction engine interface.
//!
//! An engine turns a preprocessed scan into a structured [`Invoice`]. Neither
//! engine here performs real recognition: `mock` fabricates plausible data
//! from the file name, and `sidecar` reads a prepared JSON file sitting next
//! to the scan. Both produce records in the exact shape a real recognition
//! engine would, so the rest of the pipeline doesn't care.

use std::sync::Arc;

use async_trait::async_trait;

use crate::{invoice::Invoice, prelude::*, profile::ExtractProfile};

pub mod mock;
pub mod sidecar;

/// Interface for extracting a structured invoice from a scan.
#[async_trait]
pub trait ExtractionEngine: Send + Sync + 'static {
    /// Extract an invoice record from a preprocessed scan.
    async fn extract(&self, path: &Path, scan: &[u8]) -> Result<Invoice>;
}

/// Get the extraction engine with the specified name.
pub fn engine_for_name(
    name: &str,
    profile: ExtractProfile,
) -> Result<Arc<dyn ExtractionEngine>> {
    match name {
        "mock" => Ok(Arc::new(mock::MockExtractionEngine::new(profile))),
        "sidecar" => Ok(Arc::new(sidecar::SidecarExtractionEngine::new(profile))),
        _ => Err(anyhow::anyhow!(
            "unknown extraction engine {:?} (expected \"mock\" or \"sidecar\")",
            name
        )),
    }
}
