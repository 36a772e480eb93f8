//! Example: feed a sheet from a push-style producer
//!
//! The producer runs on its own thread and blocks on every row until the
//! exporter pulls it, so memory stays flat no matter how many rows it sends.
//!
//! Run with `RUST_LOG=excelstream_exporter=debug` to see the export log.

use excelstream_exporter::{
    use_row_channel, Cell, CellStyle, Exporter, Row, SheetSpec, StreamWriter, WriteMode,
    XlsxWorkbook,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "excelstream_exporter=info".into()),
        )
        .init();

    let mode = WriteMode::from_env();
    println!("Exporting orders in {:?} mode...", mode);

    let orders = use_row_channel(|sink| {
        for id in 1..=100_000_i64 {
            sink.send(Row::new([
                Cell::new(id),
                Cell::new(format!("Customer {}", id % 977)),
                Cell::styled(id as f64 * 1.25, CellStyle::NumberCurrency),
            ]))?;
        }
        Ok(())
    });

    let spec = SheetSpec::<XlsxWorkbook>::new("Orders", orders).with_init(|exporter| {
        if let Some(stream) = exporter.stream_mut() {
            stream.set_col_width(2, 2, 24.0)?;
        }
        Ok(())
    });

    let summary = Exporter::new("channel_export.xlsx", mode == WriteMode::Streaming)?
        .export(vec![spec])?;

    println!("Wrote {} rows", summary.total_rows);
    println!("File: channel_export.xlsx");
    Ok(())
}
