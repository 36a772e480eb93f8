//! Buffered XML writer with minimal allocations

use std::io::Write;

use crate::error::Result;
use crate::types::{CellRef, CellValue};

/// Fast XML writer that batches output into an internal buffer
pub struct XmlWriter<W: Write> {
    writer: W,
    buffer: Vec<u8>,
    numbers: itoa::Buffer,
}

impl<W: Write> XmlWriter<W> {
    pub fn new(writer: W) -> Self {
        XmlWriter {
            writer,
            buffer: Vec::with_capacity(8192), // 8KB buffer
            numbers: itoa::Buffer::new(),
        }
    }

    /// Write raw bytes directly
    #[inline]
    pub fn write_raw(&mut self, data: &[u8]) -> Result<()> {
        self.buffer.extend_from_slice(data);
        if self.buffer.len() > 4096 {
            self.flush_buffer()?;
        }
        Ok(())
    }

    /// Write string data
    #[inline]
    pub fn write_str(&mut self, s: &str) -> Result<()> {
        self.write_raw(s.as_bytes())
    }

    /// Write an integer without allocating
    #[inline]
    pub fn write_int<I: itoa::Integer>(&mut self, value: I) -> Result<()> {
        let digits = self.numbers.format(value).as_bytes();
        self.buffer.extend_from_slice(digits);
        Ok(())
    }

    /// Write XML element start tag
    #[inline]
    pub fn start_element(&mut self, name: &str) -> Result<()> {
        self.write_raw(b"<")?;
        self.write_str(name)
    }

    /// Write XML element end tag
    #[inline]
    pub fn end_element(&mut self, name: &str) -> Result<()> {
        self.write_raw(b"</")?;
        self.write_str(name)?;
        self.write_raw(b">")
    }

    /// Write attribute
    #[inline]
    pub fn attribute(&mut self, name: &str, value: &str) -> Result<()> {
        self.write_raw(b" ")?;
        self.write_str(name)?;
        self.write_raw(b"=\"")?;
        self.write_escaped(value)?;
        self.write_raw(b"\"")
    }

    /// Write attribute with integer value
    #[inline]
    pub fn attribute_int<I: itoa::Integer>(&mut self, name: &str, value: I) -> Result<()> {
        self.write_raw(b" ")?;
        self.write_str(name)?;
        self.write_raw(b"=\"")?;
        self.write_int(value)?;
        self.write_raw(b"\"")
    }

    /// Write attribute with float value
    #[inline]
    pub fn attribute_float(&mut self, name: &str, value: f64) -> Result<()> {
        self.write_raw(b" ")?;
        self.write_str(name)?;
        self.write_raw(b"=\"")?;
        self.write_str(&value.to_string())?;
        self.write_raw(b"\"")
    }

    /// Close start tag
    #[inline]
    pub fn close_start_tag(&mut self) -> Result<()> {
        self.write_raw(b">")
    }

    /// Close an element without content
    #[inline]
    pub fn close_empty(&mut self) -> Result<()> {
        self.write_raw(b"/>")
    }

    /// Write text content with XML escaping
    pub fn write_escaped(&mut self, text: &str) -> Result<()> {
        for c in text.chars() {
            match c {
                '&' => self.buffer.extend_from_slice(b"&amp;"),
                '<' => self.buffer.extend_from_slice(b"&lt;"),
                '>' => self.buffer.extend_from_slice(b"&gt;"),
                '"' => self.buffer.extend_from_slice(b"&quot;"),
                '\'' => self.buffer.extend_from_slice(b"&apos;"),
                // Control characters are not allowed in XML 1.0
                c if (c as u32) < 0x20 && !matches!(c, '\t' | '\n' | '\r') => {}
                _ => {
                    let mut buf = [0; 4];
                    self.buffer
                        .extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
                }
            }
        }
        if self.buffer.len() > 4096 {
            self.flush_buffer()?;
        }
        Ok(())
    }

    /// Write an A1 reference such as `AB12`
    pub fn write_cell_ref(&mut self, cell: CellRef) -> Result<()> {
        CellRef::push_column_letter(&mut self.buffer, cell.col);
        self.write_int(cell.row)
    }

    /// Write one `<c>` element
    ///
    /// A formula is written with the value as its cached result. Cells with
    /// no value, style or formula produce no output.
    pub fn write_cell(
        &mut self,
        cell: CellRef,
        value: &CellValue,
        style_id: u32,
        formula: Option<&str>,
    ) -> Result<()> {
        if value.is_empty() && style_id == 0 && formula.is_none() {
            return Ok(());
        }

        self.write_raw(b"<c r=\"")?;
        self.write_cell_ref(cell)?;
        self.write_raw(b"\"")?;
        if style_id > 0 {
            self.attribute_int("s", style_id)?;
        }

        let cell_type = match value {
            CellValue::String(_) if formula.is_some() => Some("str"),
            CellValue::String(_) => Some("inlineStr"),
            CellValue::Bool(_) => Some("b"),
            CellValue::Error(_) => Some("e"),
            CellValue::Float(f) | CellValue::DateTime(f) if !f.is_finite() => Some("e"),
            _ => None,
        };
        if let Some(t) = cell_type {
            self.attribute("t", t)?;
        }

        if value.is_empty() && formula.is_none() {
            return self.close_empty();
        }
        self.close_start_tag()?;

        if let Some(f) = formula {
            self.write_raw(b"<f>")?;
            self.write_escaped(f.strip_prefix('=').unwrap_or(f))?;
            self.write_raw(b"</f>")?;
        }

        match value {
            CellValue::Empty => {}
            CellValue::String(s) if formula.is_some() => {
                self.write_raw(b"<v>")?;
                self.write_escaped(s)?;
                self.write_raw(b"</v>")?;
            }
            CellValue::String(s) => {
                self.write_raw(b"<is><t xml:space=\"preserve\">")?;
                self.write_escaped(s)?;
                self.write_raw(b"</t></is>")?;
            }
            CellValue::Int(i) => {
                self.write_raw(b"<v>")?;
                self.write_int(*i)?;
                self.write_raw(b"</v>")?;
            }
            CellValue::Float(f) | CellValue::DateTime(f) => {
                self.write_raw(b"<v>")?;
                if f.is_finite() {
                    self.write_str(&f.to_string())?;
                } else {
                    self.write_str("#NUM!")?;
                }
                self.write_raw(b"</v>")?;
            }
            CellValue::Bool(b) => {
                self.write_raw(if *b { b"<v>1</v>" } else { b"<v>0</v>" })?;
            }
            CellValue::Error(e) => {
                self.write_raw(b"<v>")?;
                self.write_escaped(e)?;
                self.write_raw(b"</v>")?;
            }
        }

        self.write_raw(b"</c>")
    }

    fn flush_buffer(&mut self) -> Result<()> {
        if !self.buffer.is_empty() {
            self.writer.write_all(&self.buffer)?;
            self.buffer.clear();
        }
        Ok(())
    }

    /// Flush buffer to underlying writer
    pub fn flush(&mut self) -> Result<()> {
        self.flush_buffer()?;
        self.writer.flush()?;
        Ok(())
    }

    /// Flush and hand back the underlying writer
    pub fn into_inner(mut self) -> Result<W> {
        self.flush()?;
        Ok(self.writer)
    }
}
