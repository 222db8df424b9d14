use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fmt, num::ParseIntError, str::FromStr};

macro_rules! row_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim().parse::<i64>().map(Self)
            }
        }
    };
}

row_id!(
    /// Row id of a `categories` entry.
    CategoryId
);
row_id!(
    /// Row id of an `attributes` entry.
    AttributeId
);
row_id!(
    /// Row id of a `products` entry.
    ProductId
);
row_id!(AttributeValueId);

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Attribute {
    pub id: AttributeId,
    pub name: String,
    pub category_id: CategoryId,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub category_id: CategoryId,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AttributeValue {
    pub id: AttributeValueId,
    pub product_id: ProductId,
    pub attribute_id: AttributeId,
    pub value: String,
}

/// A product joined with its category name and its values keyed by attribute
/// name. Two attributes sharing a name collapse to the most recently written
/// value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ProductView {
    pub id: ProductId,
    pub name: String,
    pub category: String,
    pub attributes: BTreeMap<String, String>,
}
