//! CSV output format.

use super::dump::{IndexDump, PropsDump};
use std::io::{self, Write};

/// Write an index dump as CSV.
///
/// Format: id,type,offset,len,preview,error
pub fn write_index_csv<W: Write>(dump: &IndexDump, mut writer: W) -> io::Result<()> {
    writeln!(writer, "id,type,offset,len,preview,error")?;

    for entity in &dump.entities {
        for field in &entity.fields {
            writeln!(
                writer,
                "{},{},{},{},{},{}",
                entity.id,
                field.field_type,
                field.offset,
                field.len.map(|len| len.to_string()).unwrap_or_default(),
                field.preview.as_deref().unwrap_or_default(),
                quote(field.error.as_deref().unwrap_or_default()),
            )?;
        }
    }

    Ok(())
}

/// Write a property dump as CSV.
///
/// Format: code,len,preview
pub fn write_props_csv<W: Write>(dump: &PropsDump, mut writer: W) -> io::Result<()> {
    writeln!(writer, "code,len,preview")?;

    for prop in &dump.properties {
        writeln!(writer, "{},{},{}", prop.code, prop.len, prop.preview)?;
    }

    Ok(())
}

/// Write an index dump as a CSV string.
pub fn to_index_csv_string(dump: &IndexDump) -> io::Result<String> {
    let mut buf = Vec::new();
    write_index_csv(dump, &mut buf)?;
    String::from_utf8(buf).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// Write a property dump as a CSV string.
pub fn to_props_csv_string(dump: &PropsDump) -> io::Result<String> {
    let mut buf = Vec::new();
    write_props_csv(dump, &mut buf)?;
    String::from_utf8(buf).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// Quote a cell that may contain commas or quotes.
fn quote(cell: &str) -> String {
    if cell.contains([',', '"']) {
        format!("\"{}\"", cell.replace('"', "\"\""))
    } else {
        cell.to_string()
    }
}
