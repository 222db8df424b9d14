use anyhow::Result;

pub use super::catalog::{
    Attribute, AttributeId, AttributeValue, AttributeValueId, Category, CategoryId, Product,
    ProductId, ProductView,
};

pub trait StorageRead {
    fn list_categories(&self) -> Result<Vec<Category>>;
    fn load_category(&self, id: CategoryId) -> Result<Option<Category>>;
    fn find_category_by_name(&self, name: &str) -> Result<Option<Category>>;

    fn list_attributes(&self, category_id: CategoryId) -> Result<Vec<Attribute>>;
    fn load_attribute(&self, id: AttributeId) -> Result<Option<Attribute>>;

    fn load_product(&self, id: ProductId) -> Result<Option<Product>>;
    fn list_product_views(&self) -> Result<Vec<ProductView>>;
    fn load_product_view(&self, id: ProductId) -> Result<Option<ProductView>>;

    fn list_attribute_values(&self, product_id: ProductId) -> Result<Vec<AttributeValue>>;
}

/// Row-level writes. Callers are responsible for ordering cascades so that no
/// foreign key is left dangling when the transaction commits.
pub trait StorageWrite {
    fn insert_category(&self, name: &str) -> Result<Category>;
    fn delete_category(&self, id: CategoryId) -> Result<usize>;

    fn insert_attribute(&self, category_id: CategoryId, name: &str) -> Result<Attribute>;
    fn delete_attribute(&self, id: AttributeId) -> Result<usize>;
    fn delete_attributes_by_category(&self, category_id: CategoryId) -> Result<usize>;

    fn insert_product(&self, name: &str, category_id: CategoryId) -> Result<Product>;
    fn update_product(
        &self,
        id: ProductId,
        name: Option<&str>,
        category_id: Option<CategoryId>,
    ) -> Result<usize>;
    fn delete_product(&self, id: ProductId) -> Result<usize>;
    fn delete_products_by_category(&self, category_id: CategoryId) -> Result<usize>;

    fn insert_attribute_value(
        &self,
        product_id: ProductId,
        attribute_id: AttributeId,
        value: &str,
    ) -> Result<AttributeValue>;
    fn delete_attribute_values_by_product(&self, product_id: ProductId) -> Result<usize>;
    fn delete_attribute_values_by_attribute(&self, attribute_id: AttributeId) -> Result<usize>;
    fn delete_attribute_values_by_category(&self, category_id: CategoryId) -> Result<usize>;
}

/// A write transaction. Dropping it without calling `commit` rolls back.
pub trait StorageTx: StorageRead + StorageWrite {
    fn commit(self) -> Result<()>;
}

pub trait Storage: StorageRead {
    type Tx: StorageTx;

    fn begin_tx(&self) -> Result<Self::Tx>;
}
