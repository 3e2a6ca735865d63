//! JSON output format.

use serde::Serialize;
use std::io::Write;

/// Write any dump as JSON to a writer.
pub fn write_json<W: Write, T: Serialize>(
    dump: &T,
    writer: W,
    pretty: bool,
) -> Result<(), serde_json::Error> {
    if pretty {
        serde_json::to_writer_pretty(writer, dump)
    } else {
        serde_json::to_writer(writer, dump)
    }
}

/// Write any dump as a JSON string.
pub fn to_json_string<T: Serialize>(dump: &T, pretty: bool) -> Result<String, serde_json::Error> {
    if pretty {
        serde_json::to_string_pretty(dump)
    } else {
        serde_json::to_string(dump)
    }
}
