use rusqlite::OptionalExtension;

use crate::error::Result;
use crate::fmt::{count, format_bytes};
use crate::pipeline::PipelineConfig;
use crate::sink::{get_connection, row_count, table_exists, LOAD_JOBS_TABLE};

pub fn run(config: &PipelineConfig) -> Result<()> {
    let db_path = config.output.db_path(&config.data_dir);

    println!("Data dir:   {}", config.data_dir.display());
    println!("Database:   {}", db_path.display());
    println!("Table:      {}", config.output);

    if !db_path.exists() {
        println!();
        println!("Database not found. Run a load to create it.");
        return Ok(());
    }

    println!("DB size:    {}", format_bytes(std::fs::metadata(&db_path)?.len()));
    let conn = get_connection(&db_path)?;
    if !table_exists(&conn, &config.output.table)? {
        println!();
        println!("Table not created yet.");
        return Ok(());
    }

    let rows = row_count(&conn, &config.output.table)?;
    println!("Rows:       {}", count(rows.max(0) as usize));

    if table_exists(&conn, LOAD_JOBS_TABLE)? {
        let last: Option<(String, String, i64, i64, String)> = conn
            .query_row(
                "SELECT source, disposition, record_count, rejected_count, loaded_at FROM _load_jobs \
                 WHERE table_name = ?1 COLLATE NOCASE ORDER BY id DESC LIMIT 1",
                [&config.output.table],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?, r.get(4)?)),
            )
            .optional()?;
        if let Some((source, disposition, records, rejected, loaded_at)) = last {
            println!();
            println!("Last load:  {loaded_at} ({disposition})");
            println!("Source:     {source}");
            println!("Written:    {records}");
            println!("Rejected:   {rejected}");
        }
    }
    Ok(())
}
