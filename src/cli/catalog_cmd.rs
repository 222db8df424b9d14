use clap::Subcommand;

use crate::storage::traits::{AttributeId, CategoryId, ProductId};

#[derive(Subcommand, Debug, Clone)]
pub enum CategoryCmd {
    #[command(about = "List all categories")]
    List,
    #[command(about = "Add a category")]
    Add {
        #[arg(long, value_name = "NAME", help = "Unique category name")]
        name: String,
    },
    #[command(
        about = "Delete a category",
        long_about = "Delete a category together with its attributes, its products and every attribute value attached to them."
    )]
    Delete {
        #[arg(long, value_name = "ID")]
        id: CategoryId,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum AttributeCmd {
    #[command(about = "List the attributes of a category")]
    List {
        #[arg(long = "category-id", value_name = "ID")]
        category_id: CategoryId,
    },
    #[command(about = "Add an attribute to a category")]
    Add {
        #[arg(long = "category-id", value_name = "ID")]
        category_id: CategoryId,
        #[arg(long, value_name = "NAME")]
        name: String,
    },
    #[command(about = "Delete an attribute and every value stored for it")]
    Delete {
        #[arg(long, value_name = "ID")]
        id: AttributeId,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum ProductCmd {
    #[command(about = "List products with category and attribute values")]
    List,
    #[command(about = "Show a single product")]
    Show {
        #[arg(long, value_name = "ID")]
        id: ProductId,
    },
    #[command(
        about = "Show the raw attribute value rows of a product",
        long_about = "Print the stored (attribute id, value) rows of a product, one entry per attribute, without resolving attribute names."
    )]
    Values {
        #[arg(long, value_name = "ID")]
        id: ProductId,
    },
    #[command(about = "Delete a product and its attribute values")]
    Delete {
        #[arg(long, value_name = "ID")]
        id: ProductId,
    },
}
