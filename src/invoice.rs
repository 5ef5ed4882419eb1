//! Invoice records and derived-total arithmetic.
//!
//! The derivation rules are deliberately simple and always applied in the same
//! order: line amounts from quantity and unit price, then the subtotal, then
//! the total. Tax is either taken as-is (user-reviewed) or derived from the
//! subtotal at a configured rate during extraction.

use chrono::NaiveDate;
use schemars::JsonSchema;

use crate::prelude::*;

/// Tax rate applied when extraction has no better information.
pub const DEFAULT_TAX_RATE: f64 = 0.075;

/// Round a currency value to two decimal places.
pub fn round_currency(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// One party on an invoice, either the vendor or the customer.
#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct Party {
    /// The party's display name.
    #[serde(default)]
    pub name: String,

    /// Street address, as a single line.
    #[serde(default)]
    pub address: String,

    /// Contact phone number.
    #[serde(default)]
    pub phone: String,

    /// Billing email address.
    #[serde(default)]
    pub email: String,
}

/// One billable entry on an invoice.
#[derive(Clone, Debug, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct LineItem {
    /// What was billed.
    pub description: String,

    /// How many units were billed.
    pub quantity: f64,

    /// The price of a single unit.
    pub unit_price: f64,

    /// The derived line amount, `quantity * unit_price`. Recomputed whenever
    /// quantity or unit price changes, so input values are advisory only.
    #[serde(default)]
    pub amount: f64,
}

impl LineItem {
    /// Create a line item with a derived amount.
    pub fn new(description: impl Into<String>, quantity: f64, unit_price: f64) -> Self {
        let mut item = Self {
            description: description.into(),
            quantity,
            unit_price,
            amount: 0.0,
        };
        item.recalculate();
        item
    }

    /// Recompute the derived amount for this item.
    pub fn recalculate(&mut self) {
        self.amount = self.quantity * self.unit_price;
    }
}

impl Default for LineItem {
    /// A blank item, matching what the review step appends: one unit at no
    /// charge, to be filled in.
    fn default() -> Self {
        Self {
            description: String::new(),
            quantity: 1.0,
            unit_price: 0.0,
            amount: 0.0,
        }
    }
}

/// A structured invoice record.
#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct Invoice {
    /// The invoice's identifier, as printed on the document.
    #[serde(default)]
    pub invoice_number: String,

    /// The issue date of the invoice.
    #[serde(default)]
    pub invoice_date: Option<NaiveDate>,

    /// When payment is due.
    #[serde(default)]
    pub due_date: Option<NaiveDate>,

    /// Who issued the invoice.
    #[serde(default)]
    pub vendor: Party,

    /// Who is being billed.
    #[serde(default)]
    pub customer: Party,

    /// The billable entries.
    #[serde(default)]
    pub items: Vec<LineItem>,

    /// Derived: the sum of all line amounts.
    #[serde(default)]
    pub subtotal: f64,

    /// Tax, in currency units. Either reviewed by hand or derived from the
    /// subtotal during extraction.
    #[serde(default)]
    pub tax: f64,

    /// Derived: `subtotal + tax`.
    #[serde(default)]
    pub total: f64,

    /// Free-form notes.
    #[serde(default)]
    pub notes: String,

    /// Payment terms, e.g. "Net 30".
    #[serde(default)]
    pub payment_terms: String,
}

impl Invoice {
    /// Recompute every derived field from scratch: all line amounts, then
    /// subtotal and total. Tax is left as-is.
    pub fn recalculate(&mut self) {
        for item in &mut self.items {
            item.recalculate();
        }
        self.refresh_totals();
    }

    /// Recompute subtotal and total from the current line amounts. An empty
    /// item list yields a zero subtotal.
    pub fn refresh_totals(&mut self) {
        self.subtotal = self.items.iter().map(|item| item.amount).sum();
        self.total = self.subtotal + self.tax;
    }

    /// Derive tax from the subtotal at the given rate, rounded to cents, and
    /// update the total.
    pub fn apply_tax_rate(&mut self, rate: f64) {
        self.tax = round_currency(self.subtotal * rate);
        self.total = self.subtotal + self.tax;
    }

    /// Change one item's quantity, recomputing that item's amount and then the
    /// invoice totals. Other items are untouched.
    pub fn set_item_quantity(&mut self, index: usize, quantity: f64) -> Result<()> {
        let item = self.item_mut(index)?;
        item.quantity = quantity;
        item.recalculate();
        self.refresh_totals();
        Ok(())
    }

    /// Change one item's unit price, recomputing that item's amount and then
    /// the invoice totals. Other items are untouched.
    pub fn set_item_unit_price(&mut self, index: usize, unit_price: f64) -> Result<()> {
        let item = self.item_mut(index)?;
        item.unit_price = unit_price;
        item.recalculate();
        self.refresh_totals();
        Ok(())
    }

    /// Change one item's description.
    pub fn set_item_description(
        &mut self,
        index: usize,
        description: String,
    ) -> Result<()> {
        self.item_mut(index)?.description = description;
        Ok(())
    }

    /// Set the tax directly, updating only the total.
    pub fn set_tax(&mut self, tax: f64) {
        self.tax = tax;
        self.total = self.subtotal + self.tax;
    }

    /// Append a blank item for review. Its amount is zero, so the totals do
    /// not change.
    pub fn add_item(&mut self) {
        self.items.push(LineItem::default());
    }

    /// Remove an item and recompute the totals without it.
    pub fn remove_item(&mut self, index: usize) -> Result<()> {
        if index >= self.items.len() {
            anyhow::bail!(
                "no line item at index {} (invoice has {})",
                index,
                self.items.len()
            );
        }
        self.items.remove(index);
        self.refresh_totals();
        Ok(())
    }

    fn item_mut(&mut self, index: usize) -> Result<&mut LineItem> {
        let len = self.items.len();
        self.items
            .get_mut(index)
            .ok_or_else(|| anyhow::anyhow!("no line item at index {index} (invoice has {len})"))
    }

    /// Check the record for missing or inconsistent information. Issues are
    /// reported, not fatal: a record with issues is still usable downstream.
    pub fn validation_issues(&self) -> Vec<String> {
        let mut issues = vec![];
        if self.invoice_number.is_empty() {
            issues.push("Missing invoice number".to_owned());
        }
        if self.invoice_date.is_none() {
            issues.push("Missing invoice date".to_owned());
        }
        if self.vendor.name.is_empty() {
            issues.push("Missing vendor name".to_owned());
        }
        if self.items.is_empty() {
            issues.push("No line items found".to_owned());
        }
        for (index, item) in self.items.iter().enumerate() {
            if item.description.is_empty() {
                issues.push(format!("Item {}: missing description", index + 1));
            }
            if item.quantity <= 0.0 {
                issues.push(format!("Item {}: quantity must be positive", index + 1));
            }
            if item.unit_price < 0.0 {
                issues.push(format!("Item {}: unit price cannot be negative", index + 1));
            }
        }
        issues
    }

    /// Classify the invoice by sector, from the vendor name and the item
    /// descriptions. Used to pick sector-specific handling rules downstream.
    pub fn sector(&self) -> Sector {
        let vendor = self.vendor.name.to_lowercase();
        let item_matches = |needles: &[&str]| {
            self.items.iter().any(|item| {
                let description = item.description.to_lowercase();
                needles.iter().any(|needle| description.contains(needle))
            })
        };

        if ["hospital", "clinic", "medical", "health"]
            .iter()
            .any(|needle| vendor.contains(needle))
            || item_matches(&["patient", "treatment"])
        {
            Sector::Healthcare
        } else if ["store", "shop", "retail"]
            .iter()
            .any(|needle| vendor.contains(needle))
            || item_matches(&["product", "item"])
        {
            Sector::Retail
        } else {
            Sector::General
        }
    }
}

/// A coarse invoice classification.
#[derive(
    Clone, Copy, Debug, Default, Deserialize, Eq, JsonSchema, PartialEq, Serialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Sector {
    /// Hospitals, clinics and other medical vendors.
    Healthcare,
    /// Stores and product sales.
    Retail,
    /// Everything else.
    #[default]
    General,
}
