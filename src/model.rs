use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque browse node id scoping a search to one category.
pub type CategoryIdentifier = String;

/// Free-text search term, the alternative query axis.
pub type SearchTerm = String;

/// What a single paginated search call is scoped to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    Category(CategoryIdentifier),
    Keywords(SearchTerm),
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Query::Category(id) => write!(f, "node:{}", id),
            Query::Keywords(kw) => write!(f, "keywords:{}", kw),
        }
    }
}

/// Normalized, flattened product entry ready for tabular output.
///
/// Field order is the output header order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub product_id: Option<String>,
    pub image_url: Option<String>,
    pub price: Option<f64>,
    pub currency: Option<String>,
    pub availability: i64,
    pub category: Option<String>,
    pub product_link: Option<String>,
    pub description: String,
}

impl ProductRecord {
    /// Header names, in serialization order.
    pub const FIELD_NAMES: [&'static str; 8] = [
        "product_id",
        "image_url",
        "price",
        "currency",
        "availability",
        "category",
        "product_link",
        "description",
    ];

    /// An empty record carries nothing worth emitting.
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Named cell values in header order; absent values become empty cells.
    pub fn to_fields(&self) -> [(&'static str, String); 8] {
        let text = |v: &Option<String>| v.clone().unwrap_or_default();
        let [id, image, price, currency, availability, category, link, description] =
            Self::FIELD_NAMES;
        [
            (id, text(&self.product_id)),
            (image, text(&self.image_url)),
            (price, self.price.map(|p| p.to_string()).unwrap_or_default()),
            (currency, text(&self.currency)),
            (availability, self.availability.to_string()),
            (category, text(&self.category)),
            (link, text(&self.product_link)),
            (description, self.description.clone()),
        ]
    }
}

/// One page of results as seen by the harvest loop.
#[derive(Debug, Clone, Default)]
pub struct SearchPage {
    /// Raw provider items with snake_case keys.
    pub items: Vec<serde_json::Value>,
    /// Total result count reported by the provider, if any.
    pub total_result_count: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_record_is_empty() {
        assert!(ProductRecord::default().is_empty());

        let record = ProductRecord {
            product_id: Some("B1".to_string()),
            ..Default::default()
        };
        assert!(!record.is_empty());
    }

    #[test]
    fn test_fields_follow_header_order() {
        let record = ProductRecord {
            product_id: Some("B1".into()),
            price: Some(9.99),
            currency: Some("EUR".into()),
            ..Default::default()
        };
        let fields = record.to_fields();
        let names: Vec<&str> = fields.iter().map(|(name, _)| *name).collect();
        assert_eq!(names, ProductRecord::FIELD_NAMES);
        let values: Vec<&str> = fields.iter().map(|(_, v)| v.as_str()).collect();
        assert_eq!(values, vec!["B1", "", "9.99", "EUR", "0", "", "", ""]);
    }

    #[test]
    fn test_query_display() {
        assert_eq!(Query::Category("123".into()).to_string(), "node:123");
        assert_eq!(Query::Keywords("Trucco".into()).to_string(), "keywords:Trucco");
    }
}
