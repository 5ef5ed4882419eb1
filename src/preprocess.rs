//! Scan preprocessing pipeline.
//!
//! Every stage here is a placeholder standing in for a real image-processing
//! service: denoising, contrast enhancement, deskew and DPI normalization
//! before recognition. The stages log their work and return the bytes
//! unchanged.

use crate::prelude::*;

/// Target resolution for normalized scans, in dots per inch.
pub const DEFAULT_TARGET_DPI: u32 = 300;

/// Remove sensor and compression noise.
#[instrument(level = "debug", skip(bytes), fields(len = bytes.len()))]
pub fn remove_noise(bytes: Vec<u8>) -> Vec<u8> {
    debug!("noise removal stubbed, returning scan unchanged");
    bytes
}

/// Stretch contrast so faint text survives recognition.
#[instrument(level = "debug", skip(bytes), fields(len = bytes.len()))]
pub fn enhance_contrast(bytes: Vec<u8>) -> Vec<u8> {
    debug!("contrast enhancement stubbed, returning scan unchanged");
    bytes
}

/// Detect and correct page rotation.
#[instrument(level = "debug", skip(bytes), fields(len = bytes.len()))]
pub fn correct_skew(bytes: Vec<u8>) -> Vec<u8> {
    debug!("skew correction stubbed, returning scan unchanged");
    bytes
}

/// Resample the scan to a uniform resolution.
#[instrument(level = "debug", skip(bytes), fields(len = bytes.len(), target_dpi))]
pub fn normalize(bytes: Vec<u8>, target_dpi: u32) -> Vec<u8> {
    debug!("DPI normalization stubbed, returning scan unchanged");
    let _ = target_dpi;
    bytes
}

/// Run the full preprocessing pipeline on a scan, in the order a real
/// pipeline would: denoise, contrast, deskew, normalize.
#[instrument(level = "debug", skip(bytes), fields(len = bytes.len()))]
pub fn prepare_scan(bytes: Vec<u8>) -> Vec<u8> {
    let bytes = remove_noise(bytes);
    let bytes = enhance_contrast(bytes);
    let bytes = correct_skew(bytes);
    normalize(bytes, DEFAULT_TARGET_DPI)
}
