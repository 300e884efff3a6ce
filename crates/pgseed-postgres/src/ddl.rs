use pgseed_core::EntityDefinition;

/// Quote a Postgres identifier.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn quote_list(names: &[String]) -> String {
    names
        .iter()
        .map(|name| quote_ident(name))
        .collect::<Vec<_>>()
        .join(", ")
}

/// `CREATE TABLE` statement with columns, primary key and foreign keys.
pub fn create_table_sql(definition: &EntityDefinition) -> String {
    let mut parts: Vec<String> = definition
        .columns
        .iter()
        .map(|column| {
            let null = if column.is_nullable { "" } else { " NOT NULL" };
            format!(
                "{} {}{null}",
                quote_ident(&column.name),
                column.column_type.sql_name()
            )
        })
        .collect();

    parts.push(format!(
        "CONSTRAINT {} PRIMARY KEY ({})",
        quote_ident(&definition.primary_key.constraint_name(&definition.name)),
        quote_list(&definition.primary_key.columns)
    ));

    for fk in &definition.foreign_keys {
        parts.push(format!(
            "CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({})",
            quote_ident(&fk.constraint_name(&definition.name)),
            quote_list(&fk.columns),
            quote_ident(&fk.referenced_entity),
            quote_list(&fk.referenced_columns)
        ));
    }

    format!(
        "CREATE TABLE {} (\n  {}\n)",
        quote_ident(&definition.name),
        parts.join(",\n  ")
    )
}

/// `DROP TABLE IF EXISTS` without `CASCADE`, so drop order is enforced by the
/// destination.
pub fn drop_table_sql(definition: &EntityDefinition) -> String {
    format!("DROP TABLE IF EXISTS {}", quote_ident(&definition.name))
}
