use comfy_table::{Cell, Table};

use crate::schema::TableSchema;

pub fn run() {
    let schema = TableSchema::planning();
    let mut table = Table::new();
    table.set_header(vec!["#", "Field", "Type", "Column"]);
    for (i, field) in schema.fields.iter().enumerate() {
        table.add_row(vec![
            Cell::new(i + 1),
            Cell::new(&field.name),
            Cell::new(field.field_type),
            Cell::new(field.field_type.sql_type()),
        ]);
    }
    println!("Destination schema\n{table}");
    println!("{schema}");
}
