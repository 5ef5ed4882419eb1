//! The mock extraction engine.
//!
//! This is the extraction stub standing in for a real OCR service. It
//! fabricates an invoice from the only inputs it has, the file name and the
//! clock: the invoice number and vendor are derived from the file name, and
//! quantities and prices are picked by hashing it. The derived totals are
//! computed with the same rules as every other engine.

use std::hash::{DefaultHasher, Hash, Hasher};

use async_trait::async_trait;
use chrono::{Duration, Utc};

use crate::{
    invoice::{Invoice, LineItem, Party},
    prelude::*,
    profile::ExtractProfile,
};

use super::ExtractionEngine;

/// Fabricates invoice data derived from the file name.
pub struct MockExtractionEngine {
    profile: ExtractProfile,
}

impl MockExtractionEngine {
    /// Create a new mock engine.
    pub fn new(profile: ExtractProfile) -> Self {
        Self { profile }
    }
}

#[async_trait]
impl ExtractionEngine for MockExtractionEngine {
    async fn extract(&self, path: &Path, _scan: &[u8]) -> Result<Invoice> {
        // The scan bytes are deliberately unused. A real engine would
        // recognize them; we only have the file name to work with.
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "scan".to_owned());
        let stem = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "scan".to_owned());
        let fragment = name_fragment(&stem);
        let seed = name_seed(&file_name);

        let now = Utc::now();
        let invoice_date = now.date_naive();
        let due_date = invoice_date + Duration::days(self.profile.net_terms_days);
        let sequence = now.timestamp_millis().rem_euclid(10_000);

        let mut invoice = Invoice {
            invoice_number: format!("INV-{fragment}-{sequence:04}"),
            invoice_date: Some(invoice_date),
            due_date: Some(due_date),
            vendor: Party {
                name: format!("Vendor {fragment}"),
                address: "123 Business St, Suite 100, San Francisco, CA 94107".to_owned(),
                phone: "(555) 123-4567".to_owned(),
                email: format!("billing@{}.com", fragment.to_lowercase()),
            },
            customer: self.profile.customer.clone(),
            items: vec![
                LineItem::new(
                    format!("Product X - {stem}"),
                    (seed % 5 + 1) as f64,
                    ((seed >> 8) % 500 + 100) as f64,
                ),
                LineItem::new(
                    "Hardware Component",
                    ((seed >> 16) % 3 + 1) as f64,
                    ((seed >> 24) % 200 + 50) as f64,
                ),
            ],
            notes: format!("Invoice generated from file: {file_name}"),
            payment_terms: self.profile.payment_terms.clone(),
            ..Invoice::default()
        };
        invoice.recalculate();
        invoice.apply_tax_rate(self.profile.tax_rate);
        Ok(invoice)
    }
}

/// The first few alphanumeric characters of the file stem, uppercased. Used
/// to brand the fabricated invoice number and vendor.
fn name_fragment(stem: &str) -> String {
    let fragment = stem
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(4)
        .collect::<String>()
        .to_uppercase();
    if fragment.is_empty() {
        "SCAN".to_owned()
    } else {
        fragment
    }
}

/// A stable hash of the file name, used to pick quantities and prices.
fn name_seed(file_name: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    file_name.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoice::Sector;

    #[tokio::test]
    async fn test_mock_extraction_shape() {
        let engine = MockExtractionEngine::new(ExtractProfile::default());
        let invoice = engine
            .extract(Path::new("scans/acme-corp.pdf"), b"irrelevant")
            .await
            .unwrap();

        assert!(invoice.invoice_number.starts_with("INV-ACME-"));
        assert_eq!(invoice.vendor.name, "Vendor ACME");
        assert_eq!(invoice.vendor.email, "billing@acme.com");
        assert_eq!(invoice.customer.name, "TechStart Inc.");
        assert_eq!(invoice.items.len(), 2);
        assert_eq!(invoice.items[0].description, "Product X - acme-corp");
        assert_eq!(invoice.payment_terms, "Net 30");
        assert!(invoice.notes.contains("acme-corp.pdf"));
        // Mock line items read as product sales.
        assert_eq!(invoice.sector(), Sector::Retail);
    }

    #[tokio::test]
    async fn test_mock_extraction_totals_are_derived() {
        let engine = MockExtractionEngine::new(ExtractProfile::default());
        let invoice = engine
            .extract(Path::new("scan-123.png"), b"")
            .await
            .unwrap();

        let expected_subtotal: f64 = invoice.items.iter().map(|item| item.amount).sum();
        for item in &invoice.items {
            assert_eq!(item.amount, item.quantity * item.unit_price);
            assert!(item.quantity >= 1.0);
            assert!(item.unit_price > 0.0);
        }
        assert_eq!(invoice.subtotal, expected_subtotal);
        assert_eq!(invoice.total, invoice.subtotal + invoice.tax);
        assert!(invoice.validation_issues().is_empty());
    }

    #[tokio::test]
    async fn test_mock_extraction_is_name_stable() {
        let engine = MockExtractionEngine::new(ExtractProfile::default());
        let a = engine.extract(Path::new("x/report.pdf"), b"").await.unwrap();
        let b = engine.extract(Path::new("y/report.pdf"), b"").await.unwrap();
        // Same file name, same fabricated line items.
        assert_eq!(a.items, b.items);
    }

    #[test]
    fn test_name_fragment() {
        assert_eq!(name_fragment("acme-corp"), "ACME");
        assert_eq!(name_fragment("a1"), "A1");
        assert_eq!(name_fragment("---"), "SCAN");
    }

    #[tokio::test]
    async fn test_mock_extraction_honors_profile() {
        let profile = ExtractProfile {
            tax_rate: 0.0,
            payment_terms: "Due on receipt".to_owned(),
            net_terms_days: 0,
            ..ExtractProfile::default()
        };
        let engine = MockExtractionEngine::new(profile);
        let invoice = engine.extract(Path::new("scan.jpg"), b"").await.unwrap();
        assert_eq!(invoice.tax, 0.0);
        assert_eq!(invoice.total, invoice.subtotal);
        assert_eq!(invoice.payment_terms, "Due on receipt");
        assert_eq!(invoice.invoice_date, invoice.due_date);
    }
}
