//! Products with variants, attributes and a self-referencing category tree.

use pgseed_core::{Batch, Column, ColumnType, Dataset, EntityDefinition, ForeignKey, Row};

pub const NAME: &str = "products";

pub fn dataset() -> Dataset {
    Dataset::new(
        NAME,
        vec![
            EntityDefinition::new("products")
                .with_column(Column::new("id", ColumnType::Text))
                .with_column(Column::new("name", ColumnType::Text))
                .with_primary_key(&["id"]),
            EntityDefinition::new("categories")
                .with_column(Column::new("id", ColumnType::Text))
                .with_column(Column::new("name", ColumnType::Text))
                .with_column(Column::new("parent_id", ColumnType::Text).nullable())
                .with_primary_key(&["id"])
                .with_foreign_key(ForeignKey::new("parent_id", "categories", "id")),
            EntityDefinition::new("product_variants")
                .with_column(Column::new("id", ColumnType::Text))
                .with_column(Column::new("product_id", ColumnType::Text))
                .with_column(Column::new("name", ColumnType::Text))
                .with_primary_key(&["id"])
                .with_foreign_key(ForeignKey::new("product_id", "products", "id")),
            EntityDefinition::new("product_attributes")
                .with_column(Column::new("id", ColumnType::Text))
                .with_column(Column::new("product_id", ColumnType::Text))
                .with_column(Column::new("name", ColumnType::Text))
                .with_column(Column::new("value", ColumnType::Text))
                .with_primary_key(&["id"])
                .with_foreign_key(ForeignKey::new("product_id", "products", "id")),
            EntityDefinition::association("product_categories")
                .with_column(Column::new("product_id", ColumnType::Text))
                .with_column(Column::new("category_id", ColumnType::Text))
                .with_primary_key(&["product_id", "category_id"])
                .with_foreign_key(ForeignKey::new("product_id", "products", "id"))
                .with_foreign_key(ForeignKey::new("category_id", "categories", "id")),
        ],
    )
}

pub fn fixtures() -> Vec<Batch> {
    vec![
        Batch::new(
            "products",
            vec![
                Row::new().with("id", "P001").with("name", "Classic White T-Shirt"),
                Row::new().with("id", "P002").with("name", "Slim Fit Jeans"),
            ],
        ),
        Batch::new(
            "categories",
            vec![
                category("C001", "Clothing", None),
                category("C002", "T-Shirts", Some("C001")),
                category("C003", "Jeans", Some("C001")),
            ],
        ),
        Batch::new(
            "product_variants",
            vec![
                variant("V001", "P001", "Small"),
                variant("V002", "P001", "Medium"),
                variant("V003", "P002", "30x32"),
            ],
        ),
        Batch::new(
            "product_attributes",
            vec![
                attribute("A001", "P001", "Color", "White"),
                attribute("A002", "P001", "Material", "Cotton"),
                attribute("A003", "P002", "Color", "Blue"),
            ],
        ),
        Batch::new(
            "product_categories",
            vec![
                Row::new().with("product_id", "P001").with("category_id", "C002"),
                Row::new().with("product_id", "P002").with("category_id", "C003"),
            ],
        ),
    ]
}

fn category(id: &str, name: &str, parent_id: Option<&str>) -> Row {
    Row::new()
        .with("id", id)
        .with("name", name)
        .with("parent_id", parent_id)
}

fn variant(id: &str, product_id: &str, name: &str) -> Row {
    Row::new()
        .with("id", id)
        .with("product_id", product_id)
        .with("name", name)
}

fn attribute(id: &str, product_id: &str, name: &str, value: &str) -> Row {
    Row::new()
        .with("id", id)
        .with("product_id", product_id)
        .with("name", name)
        .with("value", value)
}
