use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use std::{path::Path, time::Duration};

use super::traits::{
    Attribute, AttributeId, AttributeValue, AttributeValueId, Category, CategoryId, Product,
    ProductId, ProductView, Storage, StorageRead, StorageTx, StorageWrite,
};

const DB_SCHEMA_VERSION: i64 = 1;

pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_millis(5000);

#[derive(Clone)]
pub struct SqliteStorage {
    pub path: String,
    busy_timeout: Duration,
}

pub struct SqliteTx {
    conn: Connection,
}

impl StorageTx for SqliteTx {
    fn commit(self) -> Result<()> {
        self.conn.execute("COMMIT", [])?;
        Ok(())
    }
}

fn map_category_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Category> {
    Ok(Category {
        id: CategoryId(row.get(0)?),
        name: row.get(1)?,
    })
}

fn map_attribute_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Attribute> {
    Ok(Attribute {
        id: AttributeId(row.get(0)?),
        name: row.get(1)?,
        category_id: CategoryId(row.get(2)?),
    })
}

fn map_product_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Product> {
    Ok(Product {
        id: ProductId(row.get(0)?),
        name: row.get(1)?,
        category_id: CategoryId(row.get(2)?),
    })
}

fn map_attribute_value_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<AttributeValue> {
    Ok(AttributeValue {
        id: AttributeValueId(row.get(0)?),
        product_id: ProductId(row.get(1)?),
        attribute_id: AttributeId(row.get(2)?),
        value: row.get(3)?,
    })
}

fn db_list_categories(conn: &Connection) -> rusqlite::Result<Vec<Category>> {
    let mut stmt = conn.prepare("SELECT id, name FROM categories ORDER BY id")?;
    let mapped = stmt
        .query_map([], map_category_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(mapped)
}

fn db_load_category(conn: &Connection, id: CategoryId) -> rusqlite::Result<Option<Category>> {
    conn.query_row(
        "SELECT id, name FROM categories WHERE id = ?1",
        params![id.0],
        map_category_row,
    )
    .optional()
}

fn db_find_category_by_name(conn: &Connection, name: &str) -> rusqlite::Result<Option<Category>> {
    conn.query_row(
        "SELECT id, name FROM categories WHERE name = ?1",
        params![name],
        map_category_row,
    )
    .optional()
}

fn db_list_attributes(
    conn: &Connection,
    category_id: CategoryId,
) -> rusqlite::Result<Vec<Attribute>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, category_id FROM attributes WHERE category_id = ?1 ORDER BY id",
    )?;
    let mapped = stmt
        .query_map(params![category_id.0], map_attribute_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(mapped)
}

fn db_load_attribute(conn: &Connection, id: AttributeId) -> rusqlite::Result<Option<Attribute>> {
    conn.query_row(
        "SELECT id, name, category_id FROM attributes WHERE id = ?1",
        params![id.0],
        map_attribute_row,
    )
    .optional()
}

fn db_load_product(conn: &Connection, id: ProductId) -> rusqlite::Result<Option<Product>> {
    conn.query_row(
        "SELECT id, name, category_id FROM products WHERE id = ?1",
        params![id.0],
        map_product_row,
    )
    .optional()
}

// One statement, so the joined rows come from a single read snapshot.
fn db_list_product_views(
    conn: &Connection,
    only: Option<ProductId>,
) -> rusqlite::Result<Vec<ProductView>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT p.id, p.name, c.name, a.name, v.value
        FROM products p
        JOIN categories c ON c.id = p.category_id
        LEFT JOIN product_attribute_values v ON v.product_id = p.id
        LEFT JOIN attributes a ON a.id = v.attribute_id
        WHERE ?1 IS NULL OR p.id = ?1
        ORDER BY p.id, v.id
        "#,
    )?;
    let mut rows = stmt.query(params![only.map(|id| id.0)])?;

    let mut views: Vec<ProductView> = Vec::new();
    while let Some(row) = rows.next()? {
        let id = ProductId(row.get(0)?);
        let attribute_name: Option<String> = row.get(3)?;
        let value: Option<String> = row.get(4)?;

        if views.last().map(|view| view.id) != Some(id) {
            views.push(ProductView {
                id,
                name: row.get(1)?,
                category: row.get(2)?,
                attributes: Default::default(),
            });
        }
        if let (Some(attribute_name), Some(value), Some(view)) =
            (attribute_name, value, views.last_mut())
        {
            view.attributes.insert(attribute_name, value);
        }
    }
    Ok(views)
}

fn db_list_attribute_values(
    conn: &Connection,
    product_id: ProductId,
) -> rusqlite::Result<Vec<AttributeValue>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT id, product_id, attribute_id, value
        FROM product_attribute_values
        WHERE product_id = ?1
        ORDER BY id
        "#,
    )?;
    let mapped = stmt
        .query_map(params![product_id.0], map_attribute_value_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(mapped)
}

fn db_insert_category(conn: &Connection, name: &str) -> rusqlite::Result<Category> {
    conn.execute("INSERT INTO categories (name) VALUES (?1)", params![name])?;
    Ok(Category {
        id: CategoryId(conn.last_insert_rowid()),
        name: name.to_string(),
    })
}

fn db_insert_attribute(
    conn: &Connection,
    category_id: CategoryId,
    name: &str,
) -> rusqlite::Result<Attribute> {
    conn.execute(
        "INSERT INTO attributes (name, category_id) VALUES (?1, ?2)",
        params![name, category_id.0],
    )?;
    Ok(Attribute {
        id: AttributeId(conn.last_insert_rowid()),
        name: name.to_string(),
        category_id,
    })
}

fn db_insert_product(
    conn: &Connection,
    name: &str,
    category_id: CategoryId,
) -> rusqlite::Result<Product> {
    conn.execute(
        "INSERT INTO products (name, category_id) VALUES (?1, ?2)",
        params![name, category_id.0],
    )?;
    Ok(Product {
        id: ProductId(conn.last_insert_rowid()),
        name: name.to_string(),
        category_id,
    })
}

fn db_update_product(
    conn: &Connection,
    id: ProductId,
    name: Option<&str>,
    category_id: Option<CategoryId>,
) -> rusqlite::Result<usize> {
    conn.execute(
        r#"
        UPDATE products
        SET name = COALESCE(?2, name),
            category_id = COALESCE(?3, category_id)
        WHERE id = ?1
        "#,
        params![id.0, name, category_id.map(|c| c.0)],
    )
}

fn db_insert_attribute_value(
    conn: &Connection,
    product_id: ProductId,
    attribute_id: AttributeId,
    value: &str,
) -> rusqlite::Result<AttributeValue> {
    conn.execute(
        "INSERT INTO product_attribute_values (product_id, attribute_id, value) VALUES (?1, ?2, ?3)",
        params![product_id.0, attribute_id.0, value],
    )?;
    Ok(AttributeValue {
        id: AttributeValueId(conn.last_insert_rowid()),
        product_id,
        attribute_id,
        value: value.to_string(),
    })
}

fn db_delete_attribute_values_by_category(
    conn: &Connection,
    category_id: CategoryId,
) -> rusqlite::Result<usize> {
    conn.execute(
        r#"
        DELETE FROM product_attribute_values
        WHERE product_id IN (SELECT id FROM products WHERE category_id = ?1)
           OR attribute_id IN (SELECT id FROM attributes WHERE category_id = ?1)
        "#,
        params![category_id.0],
    )
}

impl StorageRead for SqliteTx {
    fn list_categories(&self) -> Result<Vec<Category>> {
        Ok(db_list_categories(&self.conn)?)
    }

    fn load_category(&self, id: CategoryId) -> Result<Option<Category>> {
        Ok(db_load_category(&self.conn, id)?)
    }

    fn find_category_by_name(&self, name: &str) -> Result<Option<Category>> {
        Ok(db_find_category_by_name(&self.conn, name)?)
    }

    fn list_attributes(&self, category_id: CategoryId) -> Result<Vec<Attribute>> {
        Ok(db_list_attributes(&self.conn, category_id)?)
    }

    fn load_attribute(&self, id: AttributeId) -> Result<Option<Attribute>> {
        Ok(db_load_attribute(&self.conn, id)?)
    }

    fn load_product(&self, id: ProductId) -> Result<Option<Product>> {
        Ok(db_load_product(&self.conn, id)?)
    }

    fn list_product_views(&self) -> Result<Vec<ProductView>> {
        Ok(db_list_product_views(&self.conn, None)?)
    }

    fn load_product_view(&self, id: ProductId) -> Result<Option<ProductView>> {
        Ok(db_list_product_views(&self.conn, Some(id))?.pop())
    }

    fn list_attribute_values(&self, product_id: ProductId) -> Result<Vec<AttributeValue>> {
        Ok(db_list_attribute_values(&self.conn, product_id)?)
    }
}

impl StorageWrite for SqliteTx {
    fn insert_category(&self, name: &str) -> Result<Category> {
        Ok(db_insert_category(&self.conn, name)?)
    }

    fn delete_category(&self, id: CategoryId) -> Result<usize> {
        Ok(self
            .conn
            .execute("DELETE FROM categories WHERE id = ?1", params![id.0])?)
    }

    fn insert_attribute(&self, category_id: CategoryId, name: &str) -> Result<Attribute> {
        Ok(db_insert_attribute(&self.conn, category_id, name)?)
    }

    fn delete_attribute(&self, id: AttributeId) -> Result<usize> {
        Ok(self
            .conn
            .execute("DELETE FROM attributes WHERE id = ?1", params![id.0])?)
    }

    fn delete_attributes_by_category(&self, category_id: CategoryId) -> Result<usize> {
        Ok(self.conn.execute(
            "DELETE FROM attributes WHERE category_id = ?1",
            params![category_id.0],
        )?)
    }

    fn insert_product(&self, name: &str, category_id: CategoryId) -> Result<Product> {
        Ok(db_insert_product(&self.conn, name, category_id)?)
    }

    fn update_product(
        &self,
        id: ProductId,
        name: Option<&str>,
        category_id: Option<CategoryId>,
    ) -> Result<usize> {
        Ok(db_update_product(&self.conn, id, name, category_id)?)
    }

    fn delete_product(&self, id: ProductId) -> Result<usize> {
        Ok(self
            .conn
            .execute("DELETE FROM products WHERE id = ?1", params![id.0])?)
    }

    fn delete_products_by_category(&self, category_id: CategoryId) -> Result<usize> {
        Ok(self.conn.execute(
            "DELETE FROM products WHERE category_id = ?1",
            params![category_id.0],
        )?)
    }

    fn insert_attribute_value(
        &self,
        product_id: ProductId,
        attribute_id: AttributeId,
        value: &str,
    ) -> Result<AttributeValue> {
        Ok(db_insert_attribute_value(
            &self.conn,
            product_id,
            attribute_id,
            value,
        )?)
    }

    fn delete_attribute_values_by_product(&self, product_id: ProductId) -> Result<usize> {
        Ok(self.conn.execute(
            "DELETE FROM product_attribute_values WHERE product_id = ?1",
            params![product_id.0],
        )?)
    }

    fn delete_attribute_values_by_attribute(&self, attribute_id: AttributeId) -> Result<usize> {
        Ok(self.conn.execute(
            "DELETE FROM product_attribute_values WHERE attribute_id = ?1",
            params![attribute_id.0],
        )?)
    }

    fn delete_attribute_values_by_category(&self, category_id: CategoryId) -> Result<usize> {
        Ok(db_delete_attribute_values_by_category(
            &self.conn,
            category_id,
        )?)
    }
}

impl Storage for SqliteStorage {
    type Tx = SqliteTx;

    fn begin_tx(&self) -> Result<Self::Tx> {
        let conn = self.open_conn()?;
        conn.execute("BEGIN IMMEDIATE", [])?;

        Ok(SqliteTx { conn })
    }
}

impl SqliteStorage {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_string_lossy().to_string(),
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        }
    }

    /// How long a connection waits on the writer lock before giving up.
    pub fn with_busy_timeout(mut self, busy_timeout: Duration) -> Self {
        self.busy_timeout = busy_timeout;
        self
    }

    pub fn reset_all(&self) -> Result<()> {
        for suffix in ["", "-wal", "-shm"] {
            let path = format!("{}{}", self.path, suffix);
            if Path::new(&path).exists() {
                std::fs::remove_file(&path).with_context(|| format!("removing {path}"))?;
            }
        }
        Ok(())
    }

    pub fn init(&self) -> Result<()> {
        let mut conn = self.open_conn()?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Self::migrate(&mut conn)
    }

    fn open_conn(&self) -> rusqlite::Result<Connection> {
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(self.busy_timeout)?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        Ok(conn)
    }

    fn with_conn<F, T>(&self, f: F) -> rusqlite::Result<T>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<T>,
    {
        let conn = self.open_conn()?;
        f(&conn)
    }

    fn migrate(conn: &mut Connection) -> Result<()> {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let version: i64 = tx.query_row("PRAGMA user_version", [], |row| row.get(0))?;

        if version == DB_SCHEMA_VERSION {
            return Ok(());
        }
        if version != 0 {
            anyhow::bail!(
                "database schema version mismatch (found {}, expected {}); please run with --reset option",
                version,
                DB_SCHEMA_VERSION
            );
        }

        log::info!(
            "SQLite schema migration: {} -> {}",
            version,
            DB_SCHEMA_VERSION
        );

        tx.execute_batch(
            r#"
            CREATE TABLE categories (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE CHECK (length(name) > 0)
            );
            CREATE TABLE attributes (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                category_id INTEGER NOT NULL REFERENCES categories(id)
            );
            CREATE INDEX attributes_category_idx ON attributes(category_id);
            CREATE TABLE products (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                category_id INTEGER NOT NULL REFERENCES categories(id)
            );
            CREATE INDEX products_category_idx ON products(category_id);
            CREATE TABLE product_attribute_values (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                product_id INTEGER NOT NULL REFERENCES products(id),
                attribute_id INTEGER NOT NULL REFERENCES attributes(id),
                value TEXT NOT NULL,
                UNIQUE (product_id, attribute_id)
            );
            CREATE INDEX product_attribute_values_attribute_idx
                ON product_attribute_values(attribute_id);
            "#,
        )?;
        tx.pragma_update(None, "user_version", DB_SCHEMA_VERSION)?;
        tx.commit()?;
        Ok(())
    }
}

impl StorageRead for SqliteStorage {
    fn list_categories(&self) -> Result<Vec<Category>> {
        let rows = self.with_conn(db_list_categories)?;
        Ok(rows)
    }

    fn load_category(&self, id: CategoryId) -> Result<Option<Category>> {
        let row = self.with_conn(|conn| db_load_category(conn, id))?;
        Ok(row)
    }

    fn find_category_by_name(&self, name: &str) -> Result<Option<Category>> {
        let row = self.with_conn(|conn| db_find_category_by_name(conn, name))?;
        Ok(row)
    }

    fn list_attributes(&self, category_id: CategoryId) -> Result<Vec<Attribute>> {
        let rows = self.with_conn(|conn| db_list_attributes(conn, category_id))?;
        Ok(rows)
    }

    fn load_attribute(&self, id: AttributeId) -> Result<Option<Attribute>> {
        let row = self.with_conn(|conn| db_load_attribute(conn, id))?;
        Ok(row)
    }

    fn load_product(&self, id: ProductId) -> Result<Option<Product>> {
        let row = self.with_conn(|conn| db_load_product(conn, id))?;
        Ok(row)
    }

    fn list_product_views(&self) -> Result<Vec<ProductView>> {
        let rows = self.with_conn(|conn| db_list_product_views(conn, None))?;
        Ok(rows)
    }

    fn load_product_view(&self, id: ProductId) -> Result<Option<ProductView>> {
        let mut rows = self.with_conn(|conn| db_list_product_views(conn, Some(id)))?;
        Ok(rows.pop())
    }

    fn list_attribute_values(&self, product_id: ProductId) -> Result<Vec<AttributeValue>> {
        let rows = self.with_conn(|conn| db_list_attribute_values(conn, product_id))?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    fn fresh_storage(dir: &tempfile::TempDir) -> SqliteStorage {
        let repo = SqliteStorage::new(dir.path().join("pmt.sqlite"));
        repo.init().unwrap();
        repo
    }

    #[test]
    fn sqlite_reset_all_ok_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.sqlite");
        let repo = SqliteStorage::new(&path);
        repo.reset_all().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn sqlite_reset_all_removes_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pmt.sqlite");
        std::fs::write(&path, b"dummy").unwrap();
        let repo = SqliteStorage::new(&path);
        repo.reset_all().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn sqlite_init_initializes_schema() {
        let dir = tempfile::tempdir().unwrap();
        let repo = fresh_storage(&dir);

        let conn = Connection::open(&repo.path).unwrap();
        for table in [
            "categories",
            "attributes",
            "products",
            "product_attribute_values",
        ] {
            let found = conn
                .query_row(
                    "SELECT name FROM sqlite_master WHERE type='table' AND name=?1",
                    [table],
                    |row| row.get::<_, String>(0),
                )
                .optional()
                .unwrap();
            assert_eq!(found.as_deref(), Some(table));
        }

        let version: i64 = conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap();
        assert_eq!(version, DB_SCHEMA_VERSION);
    }

    #[test]
    fn sqlite_init_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let repo = fresh_storage(&dir);
        repo.init().unwrap();
    }

    #[test]
    fn sqlite_fails_on_mismatched_schema_version() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pmt.sqlite");
        let conn = Connection::open(&path).unwrap();
        conn.execute_batch("PRAGMA user_version = 999;").unwrap();
        drop(conn);

        let err = SqliteStorage::new(&path)
            .init()
            .expect_err("init should fail on version mismatch");
        let msg = format!("{err}");
        assert!(msg.contains("database schema version mismatch"));
        assert!(msg.contains("--reset"));
    }

    #[test]
    fn sqlite_rejects_duplicate_category_names() {
        let dir = tempfile::tempdir().unwrap();
        let repo = fresh_storage(&dir);

        let tx = repo.begin_tx().unwrap();
        tx.insert_category("Books").unwrap();
        assert!(tx.insert_category("Books").is_err());
        tx.commit().unwrap();

        assert_eq!(repo.list_categories().unwrap().len(), 1);
    }

    #[test]
    fn sqlite_enforces_foreign_keys() {
        let dir = tempfile::tempdir().unwrap();
        let repo = fresh_storage(&dir);

        let tx = repo.begin_tx().unwrap();
        assert!(tx.insert_attribute(CategoryId(404), "color").is_err());
        assert!(tx.insert_product("Ghost", CategoryId(404)).is_err());

        let category = tx.insert_category("Shoes").unwrap();
        tx.insert_product("Sneaker", category.id).unwrap();
        assert!(tx.delete_category(category.id).is_err());
    }

    #[test]
    fn sqlite_dropped_transaction_rolls_back() {
        let dir = tempfile::tempdir().unwrap();
        let repo = fresh_storage(&dir);

        let tx = repo.begin_tx().unwrap();
        tx.insert_category("Transient").unwrap();
        drop(tx);

        assert!(repo.list_categories().unwrap().is_empty());
    }

    #[test]
    fn sqlite_product_views_join_names_and_keep_last_duplicate() {
        let dir = tempfile::tempdir().unwrap();
        let repo = fresh_storage(&dir);

        let tx = repo.begin_tx().unwrap();
        let category = tx.insert_category("Shirts").unwrap();
        let first = tx.insert_attribute(category.id, "size").unwrap();
        let second = tx.insert_attribute(category.id, "size").unwrap();
        let shirt = tx.insert_product("Tee", category.id).unwrap();
        let bare = tx.insert_product("Blank", category.id).unwrap();
        tx.insert_attribute_value(shirt.id, first.id, "M").unwrap();
        tx.insert_attribute_value(shirt.id, second.id, "L").unwrap();
        tx.commit().unwrap();

        let views = repo.list_product_views().unwrap();
        assert_eq!(views.len(), 2);
        assert_eq!(views[0].id, shirt.id);
        assert_eq!(views[0].category, "Shirts");
        assert_eq!(views[0].attributes.get("size").map(String::as_str), Some("L"));
        assert_eq!(views[1].id, bare.id);
        assert!(views[1].attributes.is_empty());

        let single = repo.load_product_view(bare.id).unwrap().unwrap();
        assert_eq!(single.name, "Blank");
        assert!(repo.load_product_view(ProductId(999)).unwrap().is_none());
    }

    #[test]
    fn sqlite_update_product_keeps_absent_fields() {
        let dir = tempfile::tempdir().unwrap();
        let repo = fresh_storage(&dir);

        let tx = repo.begin_tx().unwrap();
        let category = tx.insert_category("Lamps").unwrap();
        let product = tx.insert_product("Desk lamp", category.id).unwrap();
        assert_eq!(tx.update_product(product.id, Some("Floor lamp"), None).unwrap(), 1);
        assert_eq!(tx.update_product(ProductId(999), Some("x"), None).unwrap(), 0);
        tx.commit().unwrap();

        let loaded = repo.load_product(product.id).unwrap().unwrap();
        assert_eq!(loaded.name, "Floor lamp");
        assert_eq!(loaded.category_id, category.id);
    }
}
