//! PDF generation.
//!
//! We build real PDF files with `lopdf`, but the layout is a plain monospaced
//! text rendition of the invoice. A production system would swap this for a
//! designed template; the file structure and the figures are what matter
//! here.

use lopdf::{
    Document, Object, Stream,
    content::{Content, Operation},
    dictionary,
};

use crate::{invoice::Invoice, prelude::*};

/// US Letter, in points.
const PAGE_WIDTH: f32 = 612.0;
const PAGE_HEIGHT: f32 = 792.0;

/// Page margins and line spacing, in points.
const MARGIN: f32 = 54.0;
const FONT_SIZE: f32 = 11.0;
const LEADING: f32 = 14.0;

/// How many text lines fit on one page.
const LINES_PER_PAGE: usize = ((PAGE_HEIGHT - 2.0 * MARGIN) / LEADING) as usize;

/// Render a single invoice as a PDF.
pub fn invoice_pdf(invoice: &Invoice) -> Result<Vec<u8>> {
    text_document(&invoice_lines(invoice))
}

/// Render a summary report over a batch of invoices as a PDF.
pub fn batch_report_pdf(invoices: &[Invoice]) -> Result<Vec<u8>> {
    let total_value: f64 = invoices.iter().map(|invoice| invoice.total).sum();
    let mut lines = vec![
        "Invoice Batch Report".to_owned(),
        String::new(),
        format!("Total Invoices: {}", invoices.len()),
        format!("Total Value: ${:.2}", total_value),
        String::new(),
        "Invoice List:".to_owned(),
    ];
    for invoice in invoices {
        lines.push(format!(
            "{} - {} - {} - ${:.2}",
            invoice.invoice_number,
            date_or_blank(invoice.invoice_date),
            invoice.vendor.name,
            invoice.total,
        ));
    }
    text_document(&lines)
}

/// Lay out one invoice as text lines.
fn invoice_lines(invoice: &Invoice) -> Vec<String> {
    let mut lines = vec![
        format!("Invoice #{}", invoice.invoice_number),
        format!("Date: {}", date_or_blank(invoice.invoice_date)),
        format!("Due:  {}", date_or_blank(invoice.due_date)),
        String::new(),
        format!("From: {}", invoice.vendor.name),
    ];
    if !invoice.vendor.address.is_empty() {
        lines.push(format!("      {}", invoice.vendor.address));
    }
    lines.push(format!("To:   {}", invoice.customer.name));
    if !invoice.customer.address.is_empty() {
        lines.push(format!("      {}", invoice.customer.address));
    }
    lines.push(String::new());
    lines.push("Items:".to_owned());
    for item in &invoice.items {
        lines.push(format!(
            "  {} - {} x ${:.2} = ${:.2}",
            item.description, item.quantity, item.unit_price, item.amount,
        ));
    }
    lines.push(String::new());
    lines.push(format!("Subtotal: ${:.2}", invoice.subtotal));
    lines.push(format!("Tax:      ${:.2}", invoice.tax));
    lines.push(format!("Total:    ${:.2}", invoice.total));
    if !invoice.payment_terms.is_empty() {
        lines.push(String::new());
        lines.push(format!("Terms: {}", invoice.payment_terms));
    }
    if !invoice.notes.is_empty() {
        lines.push(String::new());
        lines.push(format!("Notes: {}", invoice.notes));
    }
    lines
}

fn date_or_blank(date: Option<chrono::NaiveDate>) -> String {
    date.map(|date| date.to_string()).unwrap_or_default()
}

/// Build a PDF from text lines, in Courier, paginating as needed.
fn text_document(lines: &[String]) -> Result<Vec<u8>> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });

    // One page of content per LINES_PER_PAGE chunk. An empty document still
    // gets one blank page.
    let chunks: Vec<&[String]> = if lines.is_empty() {
        vec![&[]]
    } else {
        lines.chunks(LINES_PER_PAGE).collect()
    };

    let mut page_ids = vec![];
    for chunk in chunks {
        let mut operations = vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), FONT_SIZE.into()]),
            Operation::new("TL", vec![LEADING.into()]),
            Operation::new(
                "Td",
                vec![MARGIN.into(), (PAGE_HEIGHT - MARGIN).into()],
            ),
        ];
        for line in chunk {
            operations.push(Operation::new(
                "Tj",
                vec![Object::string_literal(line.as_str())],
            ));
            operations.push(Operation::new("T*", vec![]));
        }
        operations.push(Operation::new("ET", vec![]));

        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            content.encode().context("failed to encode page content")?,
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "MediaBox" => vec![
                0.into(),
                0.into(),
                PAGE_WIDTH.into(),
                PAGE_HEIGHT.into(),
            ],
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => font_id },
            },
        });
        page_ids.push(page_id);
    }

    let page_count = page_ids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => page_ids
                .into_iter()
                .map(Object::Reference)
                .collect::<Vec<_>>(),
            "Count" => page_count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    // Left uncompressed: these are small placeholder documents, and keeping
    // the text streams readable makes them easy to inspect.
    let mut bytes = vec![];
    doc.save_to(&mut bytes)
        .context("failed to serialize PDF document")?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoice::{LineItem, Party};

    fn sample_invoice() -> Invoice {
        let mut invoice = Invoice {
            invoice_number: "INV-2023-0158".to_owned(),
            invoice_date: "2023-10-15".parse().ok(),
            due_date: "2023-11-15".parse().ok(),
            vendor: Party {
                name: "Acme Corporation".to_owned(),
                address: "123 Business St, San Francisco, CA".to_owned(),
                ..Party::default()
            },
            customer: Party {
                name: "TechStart Inc.".to_owned(),
                ..Party::default()
            },
            items: vec![
                LineItem::new("Premium Subscription", 2.0, 600.0),
                LineItem::new("Hardware", 1.0, 850.0),
            ],
            payment_terms: "Net 30".to_owned(),
            ..Invoice::default()
        };
        invoice.recalculate();
        invoice.apply_tax_rate(crate::invoice::DEFAULT_TAX_RATE);
        invoice
    }

    fn contains(haystack: &[u8], needle: &str) -> bool {
        haystack
            .windows(needle.len())
            .any(|window| window == needle.as_bytes())
    }

    #[test]
    fn test_invoice_pdf_is_a_loadable_pdf() {
        let bytes = invoice_pdf(&sample_invoice()).unwrap();
        assert!(bytes.starts_with(b"%PDF-1.5"));
        let doc = Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
    }

    #[test]
    fn test_invoice_pdf_contains_the_figures() {
        let bytes = invoice_pdf(&sample_invoice()).unwrap();
        assert!(contains(&bytes, "INV-2023-0158"));
        assert!(contains(&bytes, "Subtotal: $2050.00"));
        assert!(contains(&bytes, "Tax:      $153.75"));
        assert!(contains(&bytes, "Total:    $2203.75"));
    }

    #[test]
    fn test_long_invoices_paginate() {
        let mut invoice = sample_invoice();
        for index in 0..2 * LINES_PER_PAGE {
            invoice.items.push(LineItem::new(format!("Line {index}"), 1.0, 1.0));
        }
        invoice.recalculate();
        let bytes = invoice_pdf(&invoice).unwrap();
        let doc = Document::load_mem(&bytes).unwrap();
        assert!(doc.get_pages().len() > 1);
    }

    #[test]
    fn test_batch_report() {
        let invoices = vec![sample_invoice(), sample_invoice()];
        let bytes = batch_report_pdf(&invoices).unwrap();
        assert!(contains(&bytes, "Total Invoices: 2"));
        assert!(contains(&bytes, "Total Value: $4407.50"));
        assert!(contains(&bytes, "Acme Corporation"));
    }
}
