//! The review step, as a batch operation.
//!
//! Extraction output is a first draft. A reviewer's corrections are expressed
//! as an edits file (JSON or TOML) naming a record ID and an operation, and
//! this module applies them with the same derivation rules the interactive
//! form would use: changing a quantity or unit price recomputes that item's
//! amount and then the invoice totals, changing the tax recomputes only the
//! total, and removing an item recomputes the totals without it.

use std::collections::HashMap;

use futures::{FutureExt as _, StreamExt as _};
use schemars::JsonSchema;

use crate::{
    async_utils::{BoxedFuture, BoxedStream},
    invoice::{Invoice, Sector},
    prelude::*,
    work::{WorkInput, WorkOutput, WorkStatus},
};

/// An input record carrying an invoice to revise.
#[derive(Debug, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub struct ReviseInput {
    /// The invoice to revise. Extraction output can be piped in directly:
    /// extra fields like `status` and `path` are ignored.
    pub invoice: Invoice,
}

/// An output record carrying a revised invoice.
#[derive(Clone, Debug, JsonSchema, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct ReviseOutput {
    /// How many edits were applied to this record.
    pub edits_applied: usize,

    /// The sector classification of the revised invoice.
    pub sector: Sector,

    /// The revised invoice record.
    pub invoice: Invoice,
}

/// One reviewer edit, targeting a record by ID.
#[derive(Clone, Debug, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct Edit {
    /// The ID of the record to edit.
    pub id: Value,

    /// The operation to apply.
    #[serde(flatten)]
    pub op: EditOp,
}

/// An edit operation, mirroring what the review form can do.
#[derive(Clone, Debug, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "op")]
pub enum EditOp {
    /// Set a top-level or party field, e.g. `invoice_number`, `vendor.name`,
    /// `tax`.
    Set {
        /// The field to set.
        field: String,
        /// The new value.
        value: Value,
    },

    /// Set a field on one line item.
    SetItem {
        /// Zero-based index of the item.
        index: usize,
        /// One of `description`, `quantity` or `unit_price`.
        field: String,
        /// The new value.
        value: Value,
    },

    /// Append a blank line item.
    AddItem {},

    /// Remove one line item.
    RemoveItem {
        /// Zero-based index of the item.
        index: usize,
    },
}

/// An edits file: a list of edits, applied in order.
#[derive(Clone, Debug, Default, Deserialize, JsonSchema, Serialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct EditFile {
    /// The edits to apply.
    #[serde(default)]
    pub edits: Vec<Edit>,
}

impl EditFile {
    /// Group edits by target record ID. IDs are compared by their JSON
    /// serialization, so string and numeric IDs don't collide.
    pub fn by_record_id(&self) -> HashMap<String, Vec<EditOp>> {
        let mut by_id: HashMap<String, Vec<EditOp>> = HashMap::new();
        for edit in &self.edits {
            by_id
                .entry(edit.id.to_string())
                .or_default()
                .push(edit.op.clone());
        }
        by_id
    }
}

/// Apply a single edit operation to an invoice.
pub fn apply_edit(invoice: &mut Invoice, op: &EditOp) -> Result<()> {
    match op {
        EditOp::Set { field, value } => apply_set(invoice, field, value),
        EditOp::SetItem {
            index,
            field,
            value,
        } => apply_set_item(invoice, *index, field, value),
        EditOp::AddItem {} => {
            invoice.add_item();
            Ok(())
        }
        EditOp::RemoveItem { index } => invoice.remove_item(*index),
    }
}

fn apply_set(invoice: &mut Invoice, field: &str, value: &Value) -> Result<()> {
    match field {
        "invoice_number" => invoice.invoice_number = as_string(field, value)?,
        "invoice_date" => invoice.invoice_date = Some(as_date(field, value)?),
        "due_date" => invoice.due_date = Some(as_date(field, value)?),
        "notes" => invoice.notes = as_string(field, value)?,
        "payment_terms" => invoice.payment_terms = as_string(field, value)?,
        "vendor.name" => invoice.vendor.name = as_string(field, value)?,
        "vendor.address" => invoice.vendor.address = as_string(field, value)?,
        "vendor.phone" => invoice.vendor.phone = as_string(field, value)?,
        "vendor.email" => invoice.vendor.email = as_string(field, value)?,
        "customer.name" => invoice.customer.name = as_string(field, value)?,
        "customer.address" => invoice.customer.address = as_string(field, value)?,
        "customer.phone" => invoice.customer.phone = as_string(field, value)?,
        "customer.email" => invoice.customer.email = as_string(field, value)?,
        "tax" => invoice.set_tax(as_number(field, value)?),
        "subtotal" => {
            // The form allows overriding the subtotal directly; only the
            // total is re-derived from it.
            invoice.subtotal = as_number(field, value)?;
            invoice.total = invoice.subtotal + invoice.tax;
        }
        _ => anyhow::bail!("unknown invoice field {:?}", field),
    }
    Ok(())
}

fn apply_set_item(
    invoice: &mut Invoice,
    index: usize,
    field: &str,
    value: &Value,
) -> Result<()> {
    match field {
        "description" => invoice.set_item_description(index, as_string(field, value)?),
        "quantity" => invoice.set_item_quantity(index, as_number(field, value)?),
        "unit_price" => invoice.set_item_unit_price(index, as_number(field, value)?),
        _ => anyhow::bail!("unknown line item field {:?}", field),
    }
}

fn as_string(field: &str, value: &Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        _ => Err(anyhow::anyhow!("field {:?} expects a string, got {}", field, value)),
    }
}

fn as_number(field: &str, value: &Value) -> Result<f64> {
    match value {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| anyhow::anyhow!("field {:?}: {} is out of range", field, n)),
        // Numbers arrive as strings when records came through CSV.
        Value::String(s) => s
            .parse::<f64>()
            .with_context(|| format!("field {:?} expects a number, got {:?}", field, s)),
        _ => Err(anyhow::anyhow!("field {:?} expects a number, got {}", field, value)),
    }
}

fn as_date(field: &str, value: &Value) -> Result<chrono::NaiveDate> {
    let s = as_string(field, value)?;
    s.parse::<chrono::NaiveDate>()
        .with_context(|| format!("field {:?} expects a YYYY-MM-DD date, got {:?}", field, s))
}

/// Revise a stream of invoice records.
///
/// This function takes a stream of [`ReviseInput`] records and returns a
/// stream of futures yielding [`ReviseOutput`] records, to be resolved with
/// [`futures::StreamExt::buffered`].
#[instrument(level = "debug", skip_all)]
pub async fn revise_records(
    input: BoxedStream<Result<WorkInput<ReviseInput>>>,
    edits: EditFile,
) -> Result<BoxedStream<BoxedFuture<Result<WorkOutput<ReviseOutput>>>>> {
    let by_id = std::sync::Arc::new(edits.by_record_id());
    let output = input
        .map(move |revise_input| {
            let by_id = by_id.clone();
            async move {
                let revise_input = revise_input?;
                let ops = by_id
                    .get(&revise_input.id.to_string())
                    .map(|ops| ops.as_slice())
                    .unwrap_or(&[]);
                Ok(revise_record(revise_input, ops))
            }
            .boxed()
        })
        .boxed();
    Ok(output)
}

/// Apply edits to a single record and re-validate it.
#[instrument(level = "debug", skip_all, fields(id = %revise_input.id))]
pub fn revise_record(
    revise_input: WorkInput<ReviseInput>,
    ops: &[EditOp],
) -> WorkOutput<ReviseOutput> {
    let id = revise_input.id;
    let mut invoice = revise_input.data.invoice;

    for (op_index, op) in ops.iter().enumerate() {
        if let Err(err) = apply_edit(&mut invoice, op) {
            // A bad edit fails the record; the remaining edits for it may
            // depend on the failed one, so we don't apply them.
            let errors = vec![format!("edit {} failed: {:?}", op_index + 1, err)];
            let sector = invoice.sector();
            return WorkOutput::new_failed(
                id,
                errors,
                ReviseOutput {
                    edits_applied: op_index,
                    sector,
                    invoice,
                },
            );
        }
    }

    let issues = invoice.validation_issues();
    let sector = invoice.sector();
    WorkOutput {
        id,
        status: if issues.is_empty() {
            WorkStatus::Ok
        } else {
            WorkStatus::Incomplete
        },
        errors: issues,
        data: ReviseOutput {
            edits_applied: ops.len(),
            sector,
            invoice,
        },
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::invoice::LineItem;

    fn reviewed_invoice() -> Invoice {
        let mut invoice = Invoice {
            invoice_number: "INV-2023-0158".to_owned(),
            invoice_date: "2023-10-15".parse().ok(),
            vendor: crate::invoice::Party {
                name: "Acme Corporation".to_owned(),
                ..Default::default()
            },
            items: vec![
                LineItem::new("Premium Subscription", 2.0, 600.0),
                LineItem::new("Hardware", 1.0, 850.0),
            ],
            ..Invoice::default()
        };
        invoice.recalculate();
        invoice.apply_tax_rate(crate::invoice::DEFAULT_TAX_RATE);
        invoice
    }

    fn work_input(invoice: Invoice) -> WorkInput<ReviseInput> {
        WorkInput {
            id: Value::String("scan-1".to_owned()),
            data: ReviseInput { invoice },
        }
    }

    #[test]
    fn test_quantity_edit_recomputes_derived_fields() {
        let ops = vec![EditOp::SetItem {
            index: 0,
            field: "quantity".to_owned(),
            value: json!(3),
        }];
        let output = revise_record(work_input(reviewed_invoice()), &ops);
        assert_eq!(output.status, WorkStatus::Ok);
        assert_eq!(output.data.edits_applied, 1);
        let invoice = &output.data.invoice;
        assert_eq!(invoice.items[0].amount, 1800.0);
        assert_eq!(invoice.items[1].amount, 850.0);
        assert_eq!(invoice.subtotal, 2650.0);
        assert_eq!(invoice.total, 2650.0 + invoice.tax);
    }

    #[test]
    fn test_tax_edit_recomputes_only_total() {
        let ops = vec![EditOp::Set {
            field: "tax".to_owned(),
            value: json!(200.0),
        }];
        let output = revise_record(work_input(reviewed_invoice()), &ops);
        let invoice = &output.data.invoice;
        assert_eq!(invoice.subtotal, 2050.0);
        assert_eq!(invoice.tax, 200.0);
        assert_eq!(invoice.total, 2250.0);
    }

    #[test]
    fn test_remove_item_edit() {
        let ops = vec![EditOp::RemoveItem { index: 0 }];
        let output = revise_record(work_input(reviewed_invoice()), &ops);
        let invoice = &output.data.invoice;
        assert_eq!(invoice.items.len(), 1);
        assert_eq!(invoice.subtotal, 850.0);
        assert_eq!(invoice.total, 850.0 + invoice.tax);
    }

    #[test]
    fn test_add_item_leaves_record_incomplete() {
        // A freshly added item has no description, which is a review issue.
        let ops = vec![EditOp::AddItem {}];
        let output = revise_record(work_input(reviewed_invoice()), &ops);
        assert_eq!(output.status, WorkStatus::Incomplete);
        assert!(
            output
                .errors
                .iter()
                .any(|issue| issue.contains("missing description"))
        );
    }

    #[test]
    fn test_bad_edit_fails_record_and_stops() {
        let ops = vec![
            EditOp::Set {
                field: "vendor.name".to_owned(),
                value: json!("New Vendor"),
            },
            EditOp::Set {
                field: "vendor.fax".to_owned(),
                value: json!("n/a"),
            },
            EditOp::Set {
                field: "notes".to_owned(),
                value: json!("never applied"),
            },
        ];
        let output = revise_record(work_input(reviewed_invoice()), &ops);
        assert_eq!(output.status, WorkStatus::Failed);
        assert_eq!(output.data.edits_applied, 1);
        assert_eq!(output.data.invoice.vendor.name, "New Vendor");
        assert_eq!(output.data.invoice.notes, "");
    }

    #[test]
    fn test_string_numbers_are_accepted() {
        let ops = vec![EditOp::SetItem {
            index: 1,
            field: "unit_price".to_owned(),
            value: json!("900.50"),
        }];
        let output = revise_record(work_input(reviewed_invoice()), &ops);
        assert_eq!(output.data.invoice.items[1].unit_price, 900.5);
    }

    #[test]
    fn test_date_edits() {
        let ops = vec![EditOp::Set {
            field: "due_date".to_owned(),
            value: json!("2023-11-15"),
        }];
        let output = revise_record(work_input(reviewed_invoice()), &ops);
        assert_eq!(
            output.data.invoice.due_date,
            "2023-11-15".parse().ok()
        );
    }

    #[test]
    fn test_edit_file_round_trip_from_toml() {
        let edit_file: EditFile = toml::from_str(
            r#"
[[edits]]
id = "scan-1"
op = "set_item"
index = 0
field = "quantity"
value = 3

[[edits]]
id = "scan-1"
op = "remove_item"
index = 1

[[edits]]
id = "scan-2"
op = "set"
field = "vendor.name"
value = "Corner Store"
"#,
        )
        .unwrap();
        assert_eq!(edit_file.edits.len(), 3);
        let by_id = edit_file.by_record_id();
        assert_eq!(by_id[&json!("scan-1").to_string()].len(), 2);
        assert_eq!(by_id[&json!("scan-2").to_string()].len(), 1);
        assert_eq!(
            edit_file.edits[1].op,
            EditOp::RemoveItem { index: 1 }
        );
    }

    #[test]
    fn test_records_without_edits_pass_through() {
        let output = revise_record(work_input(reviewed_invoice()), &[]);
        assert_eq!(output.status, WorkStatus::Ok);
        assert_eq!(output.data.edits_applied, 0);
        assert_eq!(output.data.invoice.subtotal, 2050.0);
    }
}
