use colored::Colorize;
use comfy_table::{Cell, Table};

use crate::error::Result;
use crate::fmt::{count, format_bytes};
use crate::pipeline::{Pipeline, PipelineConfig, RunSummary};

pub fn run(config: PipelineConfig) -> Result<()> {
    let pipeline = Pipeline::new(config)?;
    let summary = pipeline.run()?;
    print_summary(&summary);
    Ok(())
}

fn print_summary(summary: &RunSummary) {
    let mut table = Table::new();
    table.set_header(vec!["Source", "Size", "Lines", "Written", "Rejected", "Table"]);
    let rejected = if summary.rejected > 0 {
        Cell::new(count(summary.rejected).yellow())
    } else {
        Cell::new(count(summary.rejected))
    };
    table.add_row(vec![
        Cell::new(&summary.source),
        Cell::new(format_bytes(summary.bytes)),
        Cell::new(count(summary.lines)),
        Cell::new(count(summary.written)),
        rejected,
        Cell::new(&summary.table),
    ]);
    println!("{}\n{table}", "Load complete".green().bold());
    if let Some(path) = &summary.dead_letter {
        if summary.rejected > 0 {
            println!("Rejected lines written to {}", path.display());
        }
    }
    println!("Checksum: {}", summary.checksum);
}
