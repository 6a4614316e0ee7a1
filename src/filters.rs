//! Boolean filter trees understood by the portal's search endpoints.

use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", content = "content")]
pub enum Filter {
    #[serde(rename = "=")]
    Eq { field: String, value: Value },
    #[serde(rename = "and")]
    And(Vec<Filter>),
}

impl Filter {
    pub fn eq(field: &str, value: impl Into<Value>) -> Self {
        Filter::Eq {
            field: field.to_string(),
            value: value.into(),
        }
    }

    pub fn and(filters: Vec<Filter>) -> Self {
        Filter::And(filters)
    }

    /// JSON text for the `filters` query parameter.
    pub fn to_param(&self) -> String {
        // A tree of strings and JSON values always serializes.
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Cases that have at least one open-access MAF file.
pub fn open_access_maf() -> Filter {
    Filter::and(vec![
        Filter::eq("files.access", "open"),
        Filter::eq("files.data_format", "MAF"),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_nested_tree() {
        let filter = Filter::and(vec![
            Filter::eq("primary_site", "Breast"),
            Filter::eq("is_cancer_gene_census", true),
        ]);
        assert_eq!(
            filter.to_param(),
            r#"{"op":"and","content":[{"op":"=","content":{"field":"primary_site","value":"Breast"}},{"op":"=","content":{"field":"is_cancer_gene_census","value":true}}]}"#
        );
    }
}
