//! Extraction profiles.
//!
//! A profile collects the knobs that vary between deployments: the fallback
//! tax rate, payment terms, the size cap on uploads, and the default customer
//! to bill when a scan doesn't identify one. Profiles are read from JSON or
//! TOML files with [`crate::async_utils::io::read_json_or_toml`].

use schemars::JsonSchema;

use crate::{
    file_check::DEFAULT_MAX_SIZE_MB,
    invoice::{DEFAULT_TAX_RATE, Party},
    prelude::*,
};

/// Settings applied during extraction.
#[derive(Clone, Debug, Deserialize, JsonSchema, Serialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct ExtractProfile {
    /// Tax rate used when the scan carries no usable tax information.
    #[serde(default = "default_tax_rate")]
    pub tax_rate: f64,

    /// Days until payment is due, measured from the invoice date.
    #[serde(default = "default_net_terms_days")]
    pub net_terms_days: i64,

    /// Payment terms to record on extracted invoices.
    #[serde(default = "default_payment_terms")]
    pub payment_terms: String,

    /// Maximum accepted file size, in megabytes.
    #[serde(default = "default_max_file_size_mb")]
    pub max_file_size_mb: u64,

    /// The customer to bill when extraction can't identify one.
    #[serde(default = "default_customer")]
    pub customer: Party,
}

impl Default for ExtractProfile {
    fn default() -> Self {
        Self {
            tax_rate: default_tax_rate(),
            net_terms_days: default_net_terms_days(),
            payment_terms: default_payment_terms(),
            max_file_size_mb: default_max_file_size_mb(),
            customer: default_customer(),
        }
    }
}

fn default_tax_rate() -> f64 {
    DEFAULT_TAX_RATE
}

fn default_net_terms_days() -> i64 {
    30
}

fn default_payment_terms() -> String {
    "Net 30".to_owned()
}

fn default_max_file_size_mb() -> u64 {
    DEFAULT_MAX_SIZE_MB
}

fn default_customer() -> Party {
    Party {
        name: "TechStart Inc.".to_owned(),
        address: "456 Innovation Ave, Mountain View, CA 94043".to_owned(),
        phone: "(555) 987-6543".to_owned(),
        email: "accounts@techstart.io".to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_profile() {
        let profile = ExtractProfile::default();
        assert_eq!(profile.tax_rate, 0.075);
        assert_eq!(profile.net_terms_days, 30);
        assert_eq!(profile.payment_terms, "Net 30");
        assert_eq!(profile.customer.name, "TechStart Inc.");
    }

    #[test]
    fn test_partial_toml_profile() {
        let profile: ExtractProfile = toml::from_str(
            r#"
tax_rate = 0.0825
payment_terms = "Net 15"
net_terms_days = 15
"#,
        )
        .unwrap();
        assert_eq!(profile.tax_rate, 0.0825);
        assert_eq!(profile.payment_terms, "Net 15");
        // Unspecified fields keep their defaults.
        assert_eq!(profile.max_file_size_mb, DEFAULT_MAX_SIZE_MB);
    }

    #[test]
    fn test_unknown_profile_keys_are_rejected() {
        let result = toml::from_str::<ExtractProfile>("tax_rte = 0.05\n");
        assert!(result.is_err());
    }
}
