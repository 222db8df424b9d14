use std::collections::{BTreeMap, HashSet};

use thiserror::Error;

use crate::storage::{
    traits::{
        Attribute, AttributeId, AttributeValue, Category, CategoryId, Product, ProductId,
        ProductView,
    },
    Storage, StorageRead, StorageTx, StorageWrite,
};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("category name already exists: {0}")]
    DuplicateName(String),
    #[error("invalid category: {0}")]
    InvalidCategory(CategoryId),
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: i64 },
    #[error("malformed input: {0}")]
    MalformedInput(String),
    #[error("storage error: {0:#}")]
    Storage(#[from] anyhow::Error),
}

impl CatalogError {
    pub fn kind(&self) -> &'static str {
        match self {
            CatalogError::DuplicateName(_) => "DuplicateName",
            CatalogError::InvalidCategory(_) => "InvalidCategory",
            CatalogError::NotFound { .. } => "NotFound",
            CatalogError::MalformedInput(_) => "MalformedInput",
            CatalogError::Storage(_) => "Storage",
        }
    }

    fn product_not_found(id: ProductId) -> Self {
        CatalogError::NotFound {
            entity: "product",
            id: id.0,
        }
    }
}

pub type CatalogResult<T> = Result<T, CatalogError>;

/// Attribute values as callers send them: attribute ids in text form mapped to
/// opaque values.
pub type RawAttributeValues = BTreeMap<String, String>;

/// Fields to change on an existing product. `attributes`, when present,
/// replaces the product's whole attribute set.
#[derive(Clone, Debug, Default)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub category_id: Option<CategoryId>,
    pub attributes: Option<RawAttributeValues>,
}

#[derive(Clone, Copy, Debug)]
pub struct CatalogOptions {
    /// Reject values whose attribute belongs to a different category than the
    /// product.
    pub enforce_attribute_category: bool,
}

impl Default for CatalogOptions {
    fn default() -> Self {
        Self {
            enforce_attribute_category: true,
        }
    }
}

/// Consistency-preserving operations over the four catalog tables.
///
/// Every operation that writes more than one row runs inside a single storage
/// transaction; an early return drops the transaction and rolls it back.
#[derive(Clone)]
pub struct Catalog<S> {
    storage: S,
    options: CatalogOptions,
}

impl<S: Storage> Catalog<S> {
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            options: CatalogOptions::default(),
        }
    }

    pub fn with_options(mut self, options: CatalogOptions) -> Self {
        self.options = options;
        self
    }

    pub fn list_categories(&self) -> CatalogResult<Vec<Category>> {
        Ok(self.storage.list_categories()?)
    }

    #[tracing::instrument(skip(self))]
    pub fn create_category(&self, name: &str) -> CatalogResult<Category> {
        let name = require_name("category", name)?;

        let tx = self.storage.begin_tx()?;
        if tx.find_category_by_name(name)?.is_some() {
            return Err(CatalogError::DuplicateName(name.to_string()));
        }
        let category = tx.insert_category(name)?;
        tx.commit()?;

        log::info!("📁 Category {} added: {}", category.id, category.name);
        Ok(category)
    }

    /// Deletes the category together with its attributes, its products and
    /// every value hanging off either.
    #[tracing::instrument(skip(self))]
    pub fn delete_category(&self, id: CategoryId) -> CatalogResult<()> {
        let tx = self.storage.begin_tx()?;
        if tx.load_category(id)?.is_none() {
            return Err(CatalogError::NotFound {
                entity: "category",
                id: id.0,
            });
        }

        let values = tx.delete_attribute_values_by_category(id)?;
        let products = tx.delete_products_by_category(id)?;
        let attributes = tx.delete_attributes_by_category(id)?;
        tx.delete_category(id)?;
        tx.commit()?;

        log::info!(
            "🗑️ Category {} deleted ({} products, {} attributes, {} values)",
            id,
            products,
            attributes,
            values
        );
        Ok(())
    }

    pub fn list_attributes(&self, category_id: CategoryId) -> CatalogResult<Vec<Attribute>> {
        Ok(self.storage.list_attributes(category_id)?)
    }

    #[tracing::instrument(skip(self))]
    pub fn create_attribute(&self, category_id: CategoryId, name: &str) -> CatalogResult<Attribute> {
        let name = require_name("attribute", name)?;

        let tx = self.storage.begin_tx()?;
        if tx.load_category(category_id)?.is_none() {
            return Err(CatalogError::InvalidCategory(category_id));
        }
        let attribute = tx.insert_attribute(category_id, name)?;
        tx.commit()?;

        log::info!(
            "🏷️ Attribute {} added to category {}: {}",
            attribute.id,
            category_id,
            attribute.name
        );
        Ok(attribute)
    }

    #[tracing::instrument(skip(self))]
    pub fn delete_attribute(&self, id: AttributeId) -> CatalogResult<()> {
        let tx = self.storage.begin_tx()?;
        if tx.load_attribute(id)?.is_none() {
            return Err(CatalogError::NotFound {
                entity: "attribute",
                id: id.0,
            });
        }

        let values = tx.delete_attribute_values_by_attribute(id)?;
        tx.delete_attribute(id)?;
        tx.commit()?;

        log::info!("🗑️ Attribute {} deleted ({} values)", id, values);
        Ok(())
    }

    pub fn list_products(&self) -> CatalogResult<Vec<ProductView>> {
        Ok(self.storage.list_product_views()?)
    }

    pub fn get_product(&self, id: ProductId) -> CatalogResult<ProductView> {
        self.storage
            .load_product_view(id)?
            .ok_or_else(|| CatalogError::product_not_found(id))
    }

    pub fn list_attribute_values(&self, product_id: ProductId) -> CatalogResult<Vec<AttributeValue>> {
        Ok(self.storage.list_attribute_values(product_id)?)
    }

    #[tracing::instrument(skip(self))]
    pub fn create_product(
        &self,
        name: &str,
        category_id: CategoryId,
        attributes: &RawAttributeValues,
    ) -> CatalogResult<Product> {
        let name = require_name("product", name)?;

        let tx = self.storage.begin_tx()?;
        if tx.load_category(category_id)?.is_none() {
            return Err(CatalogError::InvalidCategory(category_id));
        }
        let values = parse_attribute_values(attributes)?;
        self.check_attributes(&tx, category_id, values.iter().map(|(id, _)| *id))?;

        let product = tx.insert_product(name, category_id)?;
        for (attribute_id, value) in &values {
            tx.insert_attribute_value(product.id, *attribute_id, value)?;
        }
        tx.commit()?;

        log::info!(
            "📦 Product {} added to category {} with {} attributes",
            product.id,
            category_id,
            values.len()
        );
        Ok(product)
    }

    #[tracing::instrument(skip(self))]
    pub fn update_product(&self, id: ProductId, patch: &ProductPatch) -> CatalogResult<()> {
        let name = patch
            .name
            .as_deref()
            .map(|name| require_name("product", name))
            .transpose()?;

        let tx = self.storage.begin_tx()?;
        let product = tx
            .load_product(id)?
            .ok_or_else(|| CatalogError::product_not_found(id))?;

        if let Some(category_id) = patch.category_id {
            if tx.load_category(category_id)?.is_none() {
                return Err(CatalogError::InvalidCategory(category_id));
            }
        }
        let target_category = patch.category_id.unwrap_or(product.category_id);

        let values = patch
            .attributes
            .as_ref()
            .map(parse_attribute_values)
            .transpose()?;
        match &values {
            Some(values) => {
                self.check_attributes(&tx, target_category, values.iter().map(|(id, _)| *id))?
            }
            None if target_category != product.category_id => {
                let existing = tx.list_attribute_values(id)?;
                self.check_attributes(
                    &tx,
                    target_category,
                    existing.iter().map(|value| value.attribute_id),
                )?;
            }
            None => {}
        }

        if name.is_some() || patch.category_id.is_some() {
            tx.update_product(id, name, patch.category_id)?;
        }
        if let Some(values) = &values {
            tx.delete_attribute_values_by_product(id)?;
            for (attribute_id, value) in values {
                tx.insert_attribute_value(id, *attribute_id, value)?;
            }
        }
        tx.commit()?;

        log::info!("✏️ Product {} updated", id);
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub fn delete_product(&self, id: ProductId) -> CatalogResult<()> {
        let tx = self.storage.begin_tx()?;
        let values = tx.delete_attribute_values_by_product(id)?;
        if tx.delete_product(id)? == 0 {
            return Err(CatalogError::product_not_found(id));
        }
        tx.commit()?;

        log::info!("🗑️ Product {} deleted ({} values)", id, values);
        Ok(())
    }

    fn check_attributes<R: StorageRead>(
        &self,
        reader: &R,
        category_id: CategoryId,
        attribute_ids: impl IntoIterator<Item = AttributeId>,
    ) -> CatalogResult<()> {
        for attribute_id in attribute_ids {
            let attribute = reader.load_attribute(attribute_id)?.ok_or_else(|| {
                CatalogError::MalformedInput(format!("unknown attribute id {attribute_id}"))
            })?;
            if self.options.enforce_attribute_category && attribute.category_id != category_id {
                return Err(CatalogError::MalformedInput(format!(
                    "attribute {} belongs to category {}, not {}",
                    attribute_id, attribute.category_id, category_id
                )));
            }
        }
        Ok(())
    }
}

fn require_name<'a>(entity: &str, name: &'a str) -> CatalogResult<&'a str> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(CatalogError::MalformedInput(format!(
            "{entity} name must not be empty"
        )));
    }
    Ok(trimmed)
}

fn parse_attribute_values(raw: &RawAttributeValues) -> CatalogResult<Vec<(AttributeId, String)>> {
    let mut seen = HashSet::with_capacity(raw.len());
    let mut values = Vec::with_capacity(raw.len());
    for (key, value) in raw {
        let attribute_id: AttributeId = key.parse().map_err(|err| {
            CatalogError::MalformedInput(format!("attribute id {key:?} is not an integer: {err}"))
        })?;
        if !seen.insert(attribute_id) {
            return Err(CatalogError::MalformedInput(format!(
                "attribute id {attribute_id} given more than once"
            )));
        }
        values.push((attribute_id, value.clone()));
    }
    Ok(values)
}
