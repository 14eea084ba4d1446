//! Flattening of raw provider items into [`ProductRecord`]s.
//!
//! Every lookup is tolerant: a missing, null or wrong-typed level yields an
//! absent field rather than an error.

use serde_json::Value;

use crate::model::ProductRecord;

/// Where the `description` column is sourced from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DescriptionSource {
    /// `item_info.title.display_value`
    #[default]
    Title,
    /// `item_info.features.display_values`, newline-joined
    Features,
}

impl std::str::FromStr for DescriptionSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "title" => Ok(Self::Title),
            "features" => Ok(Self::Features),
            other => Err(format!("unknown description source '{}'", other)),
        }
    }
}

/// Maps one raw item into a record. Non-object input yields an empty record.
pub fn extract(raw_item: &Value, description: DescriptionSource) -> ProductRecord {
    if !raw_item.is_object() {
        return ProductRecord::default();
    }

    let listing = path(raw_item, &["offers", "listings"]).and_then(first);
    let price = listing.and_then(|l| l.get("price"));

    ProductRecord {
        product_id: string_at(raw_item, &["asin"]),
        image_url: string_at(raw_item, &["images", "primary", "large", "url"]),
        price: price.and_then(|p| p.get("amount")).and_then(as_f64),
        currency: price.and_then(|p| string_at(p, &["currency"])),
        availability: listing
            .and_then(|l| path(l, &["availability", "max_order_quantity"]))
            .and_then(as_i64)
            .unwrap_or(0),
        category: path(raw_item, &["browse_node_info", "browse_nodes"])
            .and_then(first)
            .and_then(|node| string_at(node, &["display_name"])),
        product_link: string_at(raw_item, &["detail_page_url"]),
        description: match description {
            DescriptionSource::Title => {
                string_at(raw_item, &["item_info", "title", "display_value"]).unwrap_or_default()
            }
            DescriptionSource::Features => {
                path(raw_item, &["item_info", "features", "display_values"])
                    .map(join_lines)
                    .unwrap_or_default()
            }
        },
    }
}

fn path<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .try_fold(value, |current, key| current.as_object()?.get(*key))
        .filter(|v| !v.is_null())
}

fn first(value: &Value) -> Option<&Value> {
    value.as_array()?.first().filter(|v| !v.is_null())
}

fn string_at(value: &Value, keys: &[&str]) -> Option<String> {
    match path(value, keys)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn join_lines(value: &Value) -> String {
    match value {
        Value::Array(lines) => lines
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join("\n"),
        Value::String(s) => s.clone(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn full_item() -> Value {
        json!({
            "asin": "B0TEST",
            "detail_page_url": "https://www.amazon.it/dp/B0TEST",
            "images": {"primary": {"large": {"url": "https://m.media-amazon.com/x.jpg"}}},
            "browse_node_info": {"browse_nodes": [
                {"display_name": "Rossetti"},
                {"display_name": "Trucco"}
            ]},
            "item_info": {
                "title": {"display_value": "Rossetto opaco"},
                "features": {"display_values": ["Lunga durata", "Vegano"]}
            },
            "offers": {"listings": [{
                "price": {"amount": 12.5, "currency": "EUR"},
                "availability": {"max_order_quantity": 30}
            }]}
        })
    }

    #[test]
    fn test_extract_full_item() {
        let record = extract(&full_item(), DescriptionSource::Title);
        assert_eq!(record.product_id.as_deref(), Some("B0TEST"));
        assert_eq!(record.image_url.as_deref(), Some("https://m.media-amazon.com/x.jpg"));
        assert_eq!(record.price, Some(12.5));
        assert_eq!(record.currency.as_deref(), Some("EUR"));
        assert_eq!(record.availability, 30);
        assert_eq!(record.category.as_deref(), Some("Rossetti"));
        assert_eq!(record.product_link.as_deref(), Some("https://www.amazon.it/dp/B0TEST"));
        assert_eq!(record.description, "Rossetto opaco");
    }

    #[test]
    fn test_extract_features_are_newline_joined() {
        let record = extract(&full_item(), DescriptionSource::Features);
        assert_eq!(record.description, "Lunga durata\nVegano");
    }

    #[test]
    fn test_extract_minimal_offer() {
        let item = json!({
            "asin": "B1",
            "offers": {"listings": [{"price": {"amount": 9.99, "currency": "EUR"}}]}
        });
        let record = extract(&item, DescriptionSource::Title);
        assert_eq!(
            record,
            ProductRecord {
                product_id: Some("B1".into()),
                image_url: None,
                price: Some(9.99),
                currency: Some("EUR".into()),
                availability: 0,
                category: None,
                product_link: None,
                description: String::new(),
            }
        );
    }

    #[test]
    fn test_non_object_input_yields_empty_record() {
        for raw in [json!(null), json!("B1"), json!(42), json!([{"asin": "B1"}])] {
            let record = extract(&raw, DescriptionSource::Title);
            assert!(record.is_empty(), "expected empty record for {}", raw);
        }
    }

    #[test]
    fn test_malformed_nesting_never_fails() {
        let items = [
            json!({"asin": "B2", "offers": null}),
            json!({"asin": "B2", "offers": {"listings": []}}),
            json!({"asin": "B2", "offers": {"listings": [null]}}),
            json!({"asin": "B2", "offers": {"listings": "nope"}}),
            json!({"asin": "B2", "images": {"primary": null}}),
            json!({"asin": "B2", "images": {"primary": {"large": 7}}}),
            json!({"asin": "B2", "browse_node_info": {"browse_nodes": {}}}),
            json!({"asin": "B2", "item_info": {"title": []}}),
        ];
        for item in items {
            let record = extract(&item, DescriptionSource::Title);
            assert_eq!(record.product_id.as_deref(), Some("B2"));
            assert_eq!(record.price, None);
            assert_eq!(record.availability, 0);
            assert_eq!(record.image_url, None);
            assert_eq!(record.category, None);
            assert_eq!(record.description, "");
        }
    }

    #[test]
    fn test_numeric_strings_are_accepted() {
        let item = json!({
            "asin": "B3",
            "offers": {"listings": [{
                "price": {"amount": "4.20"},
                "availability": {"max_order_quantity": "5"}
            }]}
        });
        let record = extract(&item, DescriptionSource::Title);
        assert_eq!(record.price, Some(4.2));
        assert_eq!(record.availability, 5);
    }

    #[test]
    fn test_extract_is_idempotent() {
        let item = full_item();
        assert_eq!(
            extract(&item, DescriptionSource::Features),
            extract(&item, DescriptionSource::Features)
        );
    }

    #[test]
    fn test_description_source_from_str() {
        assert_eq!("Title".parse::<DescriptionSource>(), Ok(DescriptionSource::Title));
        assert_eq!(" features ".parse::<DescriptionSource>(), Ok(DescriptionSource::Features));
        assert!("summary".parse::<DescriptionSource>().is_err());
    }
}
