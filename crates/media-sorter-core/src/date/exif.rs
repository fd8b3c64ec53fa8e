use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use chrono::NaiveDateTime;
use exif::{In, Reader, Tag, Value};

/// Read `DateTimeOriginal` from an image's embedded EXIF block.
/// EXIF datetimes have no timezone info - they are local time as-is.
pub fn extract_exif_date(path: &Path) -> Option<NaiveDateTime> {
    let file = File::open(path).ok()?;
    let exif = Reader::new()
        .read_from_container(&mut BufReader::new(file))
        .ok()?;
    let field = exif.get_field(Tag::DateTimeOriginal, In::PRIMARY)?;

    // display_value() reformats datetime tags, so prefer the raw ASCII
    let raw = match &field.value {
        Value::Ascii(parts) => parts
            .first()
            .and_then(|p| std::str::from_utf8(p).ok())
            .map(str::to_owned),
        _ => None,
    }
    .unwrap_or_else(|| field.display_value().to_string());

    parse_exif_datetime(&raw)
}

/// Parse `year:month:day hour:minute:second`. Cameras disagree on the date
/// separator, so `-`, `/`, `\` and `.` are accepted too.
pub(crate) fn parse_exif_datetime(s: &str) -> Option<NaiveDateTime> {
    let cleaned = s
        .trim_matches(|c: char| c == '"' || c == '\0' || c.is_whitespace())
        .replace(['-', '/', '\\', '.'], ":");

    NaiveDateTime::parse_from_str(&cleaned, "%Y:%m:%d %H:%M:%S").ok()
}
