use std::collections::BTreeMap;

use serde::{de::Error as _, Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::storage::traits::{Attribute, Category, CategoryId, ProductView};

#[derive(Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_secs: u64,
}

#[derive(Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

#[derive(Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Serialize, Deserialize)]
pub struct CreatedResponse {
    pub message: String,
    pub id: i64,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct CategoryResponse {
    pub id: i64,
    pub name: String,
}

impl From<Category> for CategoryResponse {
    fn from(category: Category) -> Self {
        Self {
            id: category.id.0,
            name: category.name,
        }
    }
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct AttributeResponse {
    pub id: i64,
    pub name: String,
}

impl From<Attribute> for AttributeResponse {
    fn from(attribute: Attribute) -> Self {
        Self {
            id: attribute.id.0,
            name: attribute.name,
        }
    }
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct ProductResponse {
    pub id: i64,
    pub name: String,
    pub category: String,
    pub attributes: BTreeMap<String, String>,
}

impl From<ProductView> for ProductResponse {
    fn from(view: ProductView) -> Self {
        Self {
            id: view.id.0,
            name: view.name,
            category: view.category,
            attributes: view.attributes,
        }
    }
}

#[derive(Deserialize)]
pub struct NameRequest {
    pub name: String,
}

#[derive(Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
    pub category_id: CategoryId,
    #[serde(default, deserialize_with = "text_values")]
    pub attributes: BTreeMap<String, String>,
}

#[derive(Deserialize)]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub category_id: Option<CategoryId>,
    #[serde(default, deserialize_with = "optional_text_values")]
    pub attributes: Option<BTreeMap<String, String>>,
}

/// Attribute values are stored as text. JSON numbers keep their literal form;
/// booleans, nulls, arrays and objects are rejected.
fn into_text_values(raw: BTreeMap<String, Value>) -> Result<BTreeMap<String, String>, String> {
    raw.into_iter()
        .map(|(key, value)| match value {
            Value::String(text) => Ok((key, text)),
            Value::Number(number) => Ok((key, number.to_string())),
            other => Err(format!(
                "value of attribute {key} must be a string or a number, got {other}"
            )),
        })
        .collect()
}

fn text_values<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<BTreeMap<String, String>, D::Error> {
    into_text_values(BTreeMap::deserialize(deserializer)?).map_err(D::Error::custom)
}

fn optional_text_values<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<BTreeMap<String, String>>, D::Error> {
    Option::<BTreeMap<String, Value>>::deserialize(deserializer)?
        .map(into_text_values)
        .transpose()
        .map_err(D::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numeric_values_are_kept_as_text() {
        let request: CreateProductRequest = serde_json::from_value(json!({
            "name": "Widget",
            "category_id": 1,
            "attributes": {"1": 42, "2": 2.5, "3": "red"}
        }))
        .unwrap();
        assert_eq!(
            request.attributes,
            BTreeMap::from([
                ("1".to_string(), "42".to_string()),
                ("2".to_string(), "2.5".to_string()),
                ("3".to_string(), "red".to_string()),
            ])
        );
    }

    #[test]
    fn non_scalar_values_are_rejected() {
        for bad in [json!(true), json!(null), json!(["a"]), json!({"a": 1})] {
            let err = serde_json::from_value::<CreateProductRequest>(json!({
                "name": "Widget",
                "category_id": 1,
                "attributes": {"1": bad}
            }))
            .err()
            .unwrap();
            assert!(err.to_string().contains("attribute 1"), "{err}");
        }
    }

    #[test]
    fn update_attributes_stay_optional() {
        let request: UpdateProductRequest =
            serde_json::from_value(json!({"name": "Gizmo"})).unwrap();
        assert!(request.attributes.is_none());
        let request: UpdateProductRequest =
            serde_json::from_value(json!({"attributes": null})).unwrap();
        assert!(request.attributes.is_none());

        let request: UpdateProductRequest =
            serde_json::from_value(json!({"attributes": {"4": 7}})).unwrap();
        assert_eq!(
            request.attributes,
            Some(BTreeMap::from([("4".to_string(), "7".to_string())]))
        );
    }
}
