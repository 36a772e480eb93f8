//! Example: automatic sheet splitting
//!
//! A small sheet capacity makes the split visible without writing a
//! million rows: `Numbers` continues on `Numbers_1` and `Numbers_2`.

use excelstream_exporter::{
    rows_from_iter, Cell, CellStyle, ExporterBuilder, Pulled, Result, Row, SheetSpec,
};

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "excelstream_exporter=debug".into()),
        )
        .init();

    let numbers = |index: usize| -> Result<Pulled> {
        if index >= 2_500 {
            return Ok(Pulled::EndOfData);
        }
        let n = index as i64;
        Ok(Pulled::Row(Row::new([Cell::new(n), Cell::new(n * n)])))
    };

    let summary = ExporterBuilder::new("split_sheets.xlsx")
        .streaming(true)
        .sheet_max_rows(1_000)
        .build()?
        .export(vec![
            SheetSpec::new("Numbers", numbers),
            SheetSpec::new(
                "Notes",
                rows_from_iter(vec![
                    Row::new([Cell::styled("Note", CellStyle::HeaderBold)]),
                    Row::new(["Numbers were split every 1000 rows"]),
                ]),
            ),
        ])?;

    for sheet in &summary.sheets {
        println!("{:<12} {:>6} rows", sheet.name, sheet.rows);
    }
    println!("File: split_sheets.xlsx");
    Ok(())
}
