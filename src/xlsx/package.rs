//! ZIP packaging of the workbook parts

use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

use chrono::Utc;
use s_zip::StreamingZipWriter;
use tracing::debug;

use super::grid::{write_worksheet_end, write_worksheet_start};
use super::xml_writer::XmlWriter;
use super::{SheetBody, Worksheet};
use crate::error::{zip_error, ExcelError, Result};

/// Deflate level used for every entry
const COMPRESSION_LEVEL: u32 = 6;

const SPOOL_CHUNK: usize = 64 * 1024;

/// `io::Write` adapter over a closure, used to feed zip entries
struct EntrySink<F: FnMut(&[u8]) -> io::Result<()>>(F);

impl<F: FnMut(&[u8]) -> io::Result<()>> Write for EntrySink<F> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        (self.0)(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Write the complete `.xlsx` package for `sheets` to `path`
pub(crate) fn write_package(path: &Path, sheets: &[&Worksheet]) -> Result<()> {
    let path_str = path
        .to_str()
        .ok_or_else(|| ExcelError::WriteError(format!("path is not UTF-8: {}", path.display())))?;
    let mut zip =
        StreamingZipWriter::with_compression(path_str, COMPRESSION_LEVEL).map_err(zip_error)?;

    let fixed_parts = [
        ("[Content_Types].xml", content_types_xml(sheets.len())),
        ("_rels/.rels", ROOT_RELS.to_string()),
        ("docProps/app.xml", APP_PROPS.to_string()),
        ("docProps/core.xml", core_props_xml()),
        ("xl/workbook.xml", workbook_xml(sheets)?),
        ("xl/_rels/workbook.xml.rels", workbook_rels_xml(sheets.len())),
        ("xl/styles.xml", STYLES.to_string()),
    ];
    for (name, body) in &fixed_parts {
        zip.start_entry(name).map_err(zip_error)?;
        zip.write_data(body.as_bytes()).map_err(zip_error)?;
    }

    for (i, sheet) in sheets.iter().enumerate() {
        zip.start_entry(&format!("xl/worksheets/sheet{}.xml", i + 1))
            .map_err(zip_error)?;
        let sink = EntrySink(|buf: &[u8]| {
            zip.write_data(buf)
                .map(|_| ())
                .map_err(|e| io::Error::other(e.to_string()))
        });
        let mut xml = XmlWriter::new(sink);
        write_sheet(&mut xml, sheet)?;
    }

    zip.finish().map_err(zip_error)?;
    Ok(())
}

fn write_sheet<W: Write>(xml: &mut XmlWriter<W>, sheet: &Worksheet) -> Result<()> {
    match &sheet.body {
        SheetBody::Grid(grid) => grid.write_xml(xml),
        SheetBody::Streamed(slot) => {
            let mut guard = slot.lock();
            let Some(streamed) = guard.as_mut() else {
                // Never flushed: nothing was committed
                write_worksheet_start(xml, &[])?;
                return write_worksheet_end(xml, &[]);
            };

            debug!(sheet = %sheet.name, rows = streamed.rows, "packaging streamed sheet");
            write_worksheet_start(xml, &streamed.cols)?;
            streamed.spool.seek(SeekFrom::Start(0))?;
            let mut chunk = vec![0u8; SPOOL_CHUNK];
            loop {
                let n = streamed.spool.read(&mut chunk)?;
                if n == 0 {
                    break;
                }
                xml.write_raw(&chunk[..n])?;
            }
            write_worksheet_end(xml, &streamed.merges)
        }
    }
}

fn content_types_xml(sheet_count: usize) -> String {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
<Default Extension="xml" ContentType="application/xml"/>
<Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>
<Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/>
<Override PartName="/docProps/core.xml" ContentType="application/vnd.openxmlformats-package.core-properties+xml"/>
<Override PartName="/docProps/app.xml" ContentType="application/vnd.openxmlformats-officedocument.extended-properties+xml"/>"#,
    );

    for i in 1..=sheet_count {
        xml.push_str(&format!(
            r#"
<Override PartName="/xl/worksheets/sheet{}.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#,
            i
        ));
    }

    xml.push_str("\n</Types>");
    xml
}

const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/>
<Relationship Id="rId2" Type="http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties" Target="docProps/core.xml"/>
<Relationship Id="rId3" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/extended-properties" Target="docProps/app.xml"/>
</Relationships>"#;

const APP_PROPS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Properties xmlns="http://schemas.openxmlformats.org/officeDocument/2006/extended-properties">
<Application>ExcelStream Exporter</Application>
</Properties>"#;

fn core_props_xml() -> String {
    let now = Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<cp:coreProperties xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties" xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:dcterms="http://purl.org/dc/terms/" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">
<dc:creator>ExcelStream Exporter</dc:creator>
<dcterms:created xsi:type="dcterms:W3CDTF">{now}</dcterms:created>
<dcterms:modified xsi:type="dcterms:W3CDTF">{now}</dcterms:modified>
</cp:coreProperties>"#
    )
}

fn workbook_xml(sheets: &[&Worksheet]) -> Result<String> {
    let mut out = Vec::with_capacity(512);
    write_workbook(&mut XmlWriter::new(&mut out), sheets)?;
    String::from_utf8(out).map_err(|e| ExcelError::WriteError(e.to_string()))
}

fn write_workbook<W: Write>(xml: &mut XmlWriter<W>, sheets: &[&Worksheet]) -> Result<()> {
    xml.write_str("<?xml version=\"1.0\" encoding=\"UTF-8\" standalone=\"yes\"?>\n")?;
    xml.start_element("workbook")?;
    xml.attribute(
        "xmlns",
        "http://schemas.openxmlformats.org/spreadsheetml/2006/main",
    )?;
    xml.attribute(
        "xmlns:r",
        "http://schemas.openxmlformats.org/officeDocument/2006/relationships",
    )?;
    xml.close_start_tag()?;
    xml.write_str("<sheets>")?;

    for (i, sheet) in sheets.iter().enumerate() {
        let sheet_id = i + 1;
        xml.start_element("sheet")?;
        xml.attribute("name", &sheet.name)?;
        xml.attribute_int("sheetId", sheet_id)?;
        xml.attribute("r:id", &format!("rId{}", sheet_id))?;
        xml.close_empty()?;
    }

    xml.write_str("</sheets>")?;
    xml.end_element("workbook")?;
    xml.flush()
}

fn workbook_rels_xml(sheet_count: usize) -> String {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    );

    for i in 1..=sheet_count {
        xml.push_str(&format!(
            r#"
<Relationship Id="rId{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet{}.xml"/>"#,
            i, i
        ));
    }

    xml.push_str(&format!(
        r#"
<Relationship Id="rId{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>
</Relationships>"#,
        sheet_count + 1
    ));
    xml
}

/// Preset stylesheet; `cellXfs` order matches [`crate::types::CellStyle`]
const STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
<numFmts count="0"/>
<fonts count="3">
<font><sz val="11"/><name val="Calibri"/></font>
<font><b/><sz val="11"/><name val="Calibri"/></font>
<font><i/><sz val="11"/><name val="Calibri"/></font>
</fonts>
<fills count="5">
<fill><patternFill patternType="none"/></fill>
<fill><patternFill patternType="gray125"/></fill>
<fill><patternFill patternType="solid"><fgColor rgb="FFFFFF00"/></patternFill></fill>
<fill><patternFill patternType="solid"><fgColor rgb="FF00FF00"/></patternFill></fill>
<fill><patternFill patternType="solid"><fgColor rgb="FFFF0000"/></patternFill></fill>
</fills>
<borders count="2">
<border><left/><right/><top/><bottom/><diagonal/></border>
<border><left style="thin"/><right style="thin"/><top style="thin"/><bottom style="thin"/></border>
</borders>
<cellStyleXfs count="1">
<xf numFmtId="0" fontId="0" fillId="0" borderId="0"/>
</cellStyleXfs>
<cellXfs count="14">
<xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/>
<xf numFmtId="0" fontId="1" fillId="0" borderId="0" xfId="0" applyFont="1"/>
<xf numFmtId="3" fontId="0" fillId="0" borderId="0" xfId="0" applyNumberFormat="1"/>
<xf numFmtId="4" fontId="0" fillId="0" borderId="0" xfId="0" applyNumberFormat="1"/>
<xf numFmtId="5" fontId="0" fillId="0" borderId="0" xfId="0" applyNumberFormat="1"/>
<xf numFmtId="10" fontId="0" fillId="0" borderId="0" xfId="0" applyNumberFormat="1"/>
<xf numFmtId="14" fontId="0" fillId="0" borderId="0" xfId="0" applyNumberFormat="1"/>
<xf numFmtId="22" fontId="0" fillId="0" borderId="0" xfId="0" applyNumberFormat="1"/>
<xf numFmtId="0" fontId="1" fillId="0" borderId="0" xfId="0" applyFont="1"/>
<xf numFmtId="0" fontId="2" fillId="0" borderId="0" xfId="0" applyFont="1"/>
<xf numFmtId="0" fontId="0" fillId="2" borderId="0" xfId="0" applyFill="1"/>
<xf numFmtId="0" fontId="0" fillId="3" borderId="0" xfId="0" applyFill="1"/>
<xf numFmtId="0" fontId="0" fillId="4" borderId="0" xfId="0" applyFill="1"/>
<xf numFmtId="0" fontId="0" fillId="0" borderId="1" xfId="0" applyBorder="1"/>
</cellXfs>
</styleSheet>"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_types_list_every_sheet() {
        let xml = content_types_xml(3);
        assert!(xml.contains("/xl/worksheets/sheet1.xml"));
        assert!(xml.contains("/xl/worksheets/sheet3.xml"));
        assert!(!xml.contains("/xl/worksheets/sheet4.xml"));
    }

    #[test]
    fn test_workbook_rels_put_styles_last() {
        let xml = workbook_rels_xml(2);
        assert!(xml.contains("Id=\"rId2\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet\""));
        assert!(xml.contains("Id=\"rId3\" Type=\"http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles\""));
    }

    #[test]
    fn test_workbook_lists_sheets_in_order() {
        let first = Worksheet::new("Orders");
        let second = Worksheet::new("R&D_1");
        let xml = workbook_xml(&[&first, &second]).unwrap();
        let first = xml.find("name=\"Orders\"").unwrap();
        let second = xml.find("name=\"R&amp;D_1\"").unwrap();
        assert!(first < second);
        assert!(xml.contains("sheetId=\"2\" r:id=\"rId2\""));
    }
}
