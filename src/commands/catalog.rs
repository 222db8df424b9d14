use anyhow::{Context, Result};
use serde::Serialize;

use super::CommandRunner;
use crate::catalog::Catalog;
use crate::cli;
use crate::storage::Storage;

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let out = serde_json::to_string_pretty(value).context("encoding output")?;
    println!("{}", out);
    Ok(())
}

impl CommandRunner for cli::CategoryCmd {
    fn run<S: Storage>(&self, catalog: &Catalog<S>) -> Result<()> {
        match self {
            cli::CategoryCmd::List => print_json(&catalog.list_categories()?),
            cli::CategoryCmd::Add { name } => {
                let category = catalog.create_category(name).context("adding category")?;
                print_json(&category)
            }
            cli::CategoryCmd::Delete { id } => {
                catalog.delete_category(*id).context("deleting category")?;
                log::info!("✅ Category {} deleted", id);
                Ok(())
            }
        }
    }
}

impl CommandRunner for cli::AttributeCmd {
    fn run<S: Storage>(&self, catalog: &Catalog<S>) -> Result<()> {
        match self {
            cli::AttributeCmd::List { category_id } => {
                print_json(&catalog.list_attributes(*category_id)?)
            }
            cli::AttributeCmd::Add { category_id, name } => {
                let attribute = catalog
                    .create_attribute(*category_id, name)
                    .context("adding attribute")?;
                print_json(&attribute)
            }
            cli::AttributeCmd::Delete { id } => {
                catalog.delete_attribute(*id).context("deleting attribute")?;
                log::info!("✅ Attribute {} deleted", id);
                Ok(())
            }
        }
    }
}

impl CommandRunner for cli::ProductCmd {
    fn run<S: Storage>(&self, catalog: &Catalog<S>) -> Result<()> {
        match self {
            cli::ProductCmd::List => print_json(&catalog.list_products()?),
            cli::ProductCmd::Show { id } => print_json(&catalog.get_product(*id)?),
            cli::ProductCmd::Values { id } => print_json(&catalog.list_attribute_values(*id)?),
            cli::ProductCmd::Delete { id } => {
                catalog.delete_product(*id).context("deleting product")?;
                log::info!("✅ Product {} deleted", id);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogError, RawAttributeValues};
    use crate::storage::{traits::CategoryId, SqliteStorage};

    fn catalog(dir: &tempfile::TempDir) -> Catalog<SqliteStorage> {
        let storage = SqliteStorage::new(dir.path().join("pmt.sqlite"));
        storage.init().unwrap();
        Catalog::new(storage)
    }

    #[test]
    fn category_commands_mutate_the_catalog() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = catalog(&dir);

        cli::CategoryCmd::Add {
            name: "Shoes".to_string(),
        }
        .run(&catalog)
        .unwrap();
        cli::CategoryCmd::List.run(&catalog).unwrap();

        let categories = catalog.list_categories().unwrap();
        assert_eq!(categories.len(), 1);

        cli::AttributeCmd::Add {
            category_id: categories[0].id,
            name: "size".to_string(),
        }
        .run(&catalog)
        .unwrap();
        assert_eq!(catalog.list_attributes(categories[0].id).unwrap().len(), 1);

        cli::CategoryCmd::Delete {
            id: categories[0].id,
        }
        .run(&catalog)
        .unwrap();
        assert!(catalog.list_categories().unwrap().is_empty());
    }

    #[test]
    fn command_errors_keep_the_catalog_error() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = catalog(&dir);

        let err = cli::AttributeCmd::Add {
            category_id: CategoryId(3),
            name: "size".to_string(),
        }
        .run(&catalog)
        .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CatalogError>(),
            Some(CatalogError::InvalidCategory(_))
        ));
    }

    #[test]
    fn product_commands_show_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = catalog(&dir);
        let category = catalog.create_category("Lamps").unwrap();
        let product = catalog
            .create_product("Desk lamp", category.id, &RawAttributeValues::new())
            .unwrap();

        cli::ProductCmd::Show { id: product.id }.run(&catalog).unwrap();
        cli::ProductCmd::Values { id: product.id }.run(&catalog).unwrap();
        cli::ProductCmd::Delete { id: product.id }.run(&catalog).unwrap();
        assert!(cli::ProductCmd::Show { id: product.id }.run(&catalog).is_err());
        cli::ProductCmd::List.run(&catalog).unwrap();
    }
}
