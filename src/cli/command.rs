use clap::Subcommand;

use crate::cli::catalog_cmd::{AttributeCmd, CategoryCmd, ProductCmd};

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    #[command(
        about = "Category management commands",
        long_about = "List, add or delete categories. Deleting a category also deletes its attributes, its products and their values."
    )]
    Category {
        #[command(subcommand)]
        cmd: CategoryCmd,
    },
    #[command(
        about = "Attribute management commands",
        long_about = "List, add or delete the attributes a category defines for its products."
    )]
    Attribute {
        #[command(subcommand)]
        cmd: AttributeCmd,
    },
    #[command(
        about = "Product inspection commands",
        long_about = "List products with their category and attribute values, show a single product, or delete one."
    )]
    Product {
        #[command(subcommand)]
        cmd: ProductCmd,
    },
}
