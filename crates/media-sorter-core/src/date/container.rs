//! Creation-time metadata from video containers.
//!
//! Only the handful of fields needed to date a clip are read:
//! - ISO-BMFF (`.mp4`, `.mov`, `.3gp`): `moov/mvhd` creation time
//! - Matroska (`.mkv`): `Segment/Info/DateUTC`
//! - RIFF AVI (`.avi`): `IDIT` chunk, or `INFO/ICRD`
//!
//! Every reader returns `None` on anything unexpected.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeDelta, Utc};

/// Seconds between 1904-01-01 (QuickTime epoch) and 1970-01-01.
const QT_TO_UNIX_OFFSET: i64 = 2_082_844_800;

/// Matroska DateUTC is nanoseconds since 2001-01-01T00:00:00 UTC.
const MKV_EPOCH_UNIX: i64 = 978_307_200;

/// Extract the creation date of a video file as local wall-clock time.
pub fn extract_container_date(path: &Path, extension: &str) -> Option<NaiveDateTime> {
    let file = File::open(path).ok()?;
    let mut reader = BufReader::new(file);
    match extension {
        "mp4" | "mov" | "3gp" => read_mvhd_creation(&mut reader),
        "mkv" => read_matroska_date(&mut reader),
        "avi" => read_avi_date(&mut reader),
        _ => None,
    }
}

fn utc_to_local(utc: DateTime<Utc>) -> NaiveDateTime {
    utc.with_timezone(&Local).naive_local()
}

fn stream_len<R: Seek>(r: &mut R) -> Option<u64> {
    let len = r.seek(SeekFrom::End(0)).ok()?;
    r.seek(SeekFrom::Start(0)).ok()?;
    Some(len)
}

fn read_array<const N: usize, R: Read>(r: &mut R) -> Option<[u8; N]> {
    let mut buf = [0u8; N];
    r.read_exact(&mut buf).ok()?;
    Some(buf)
}

// ---------------------------------------------------------------------------
// ISO-BMFF
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy)]
struct AtomRange {
    data_start: u64,
    data_end: u64,
}

pub(crate) fn read_mvhd_creation<R: Read + Seek>(r: &mut R) -> Option<NaiveDateTime> {
    let len = stream_len(r)?;
    let moov = find_atom(r, 0, len, *b"moov")?;
    let mvhd = find_atom(r, moov.data_start, moov.data_end, *b"mvhd")?;

    r.seek(SeekFrom::Start(mvhd.data_start)).ok()?;
    let [version, ..] = read_array::<4, _>(r)?;
    let qt_seconds = if version == 1 {
        u64::from_be_bytes(read_array(r)?)
    } else {
        u64::from(u32::from_be_bytes(read_array(r)?))
    };
    // Encoders that don't know the date write zero
    if qt_seconds == 0 {
        return None;
    }
    let unix = i64::try_from(qt_seconds).ok()?.checked_sub(QT_TO_UNIX_OFFSET)?;
    DateTime::<Utc>::from_timestamp(unix, 0).map(utc_to_local)
}

fn find_atom<R: Read + Seek>(r: &mut R, start: u64, end: u64, kind: [u8; 4]) -> Option<AtomRange> {
    let mut offset = start;
    while offset + 8 <= end {
        r.seek(SeekFrom::Start(offset)).ok()?;
        let header: [u8; 8] = read_array(r)?;
        let mut size = u64::from(u32::from_be_bytes([header[0], header[1], header[2], header[3]]));
        let mut header_size = 8u64;

        if size == 1 {
            size = u64::from_be_bytes(read_array(r)?);
            header_size = 16;
        } else if size == 0 {
            size = end - offset;
        }
        if size < header_size {
            return None;
        }
        let atom_end = offset.saturating_add(size).min(end);
        if offset + header_size > atom_end {
            return None;
        }

        if header[4..8] == kind {
            return Some(AtomRange {
                data_start: offset + header_size,
                data_end: atom_end,
            });
        }
        offset = atom_end;
    }
    None
}

// ---------------------------------------------------------------------------
// Matroska / EBML
// ---------------------------------------------------------------------------

const EBML_HEADER: u32 = 0x1A45_DFA3;
const MKV_SEGMENT: u32 = 0x1853_8067;
const MKV_INFO: u32 = 0x1549_A966;
const MKV_DATE_UTC: u32 = 0x4461;
const MKV_CLUSTER: u32 = 0x1F43_B675;

/// Variable-length integer. Returns (value, length, all-ones) where the
/// value keeps the marker bit when `keep_marker` is set (element IDs).
fn read_vint<R: Read>(r: &mut R, keep_marker: bool) -> Option<(u64, u64, bool)> {
    let [first] = read_array::<1, _>(r)?;
    let len = first.leading_zeros() as usize + 1;
    if len > 8 {
        return None;
    }
    let mask = 0xFFu64 >> len;
    let mut value = if keep_marker {
        u64::from(first)
    } else {
        u64::from(first) & mask
    };
    let mut all_ones = value == mask;
    for _ in 1..len {
        let [b] = read_array::<1, _>(r)?;
        all_ones &= b == 0xFF;
        value = (value << 8) | u64::from(b);
    }
    Some((value, len as u64, all_ones && !keep_marker))
}

struct Element {
    id: u32,
    data_start: u64,
    data_end: u64,
}

fn read_element<R: Read + Seek>(r: &mut R, offset: u64, parent_end: u64) -> Option<Element> {
    r.seek(SeekFrom::Start(offset)).ok()?;
    let (id, id_len, _) = read_vint(r, true)?;
    let (size, size_len, unknown) = read_vint(r, false)?;
    let data_start = offset + id_len + size_len;
    let data_end = if unknown {
        parent_end
    } else {
        data_start.checked_add(size)?.min(parent_end)
    };
    // Header runs past the end of its parent
    if data_start > data_end {
        return None;
    }
    Some(Element {
        id: u32::try_from(id).ok()?,
        data_start,
        data_end,
    })
}

fn find_element<R: Read + Seek>(r: &mut R, start: u64, end: u64, id: u32) -> Option<Element> {
    let mut offset = start;
    while offset < end {
        let el = read_element(r, offset, end)?;
        if el.id == id {
            return Some(el);
        }
        // Clusters hold the media payload; Info always comes before them
        if el.id == MKV_CLUSTER || el.data_end <= offset {
            return None;
        }
        offset = el.data_end;
    }
    None
}

pub(crate) fn read_matroska_date<R: Read + Seek>(r: &mut R) -> Option<NaiveDateTime> {
    let len = stream_len(r)?;
    let header = read_element(r, 0, len)?;
    if header.id != EBML_HEADER {
        return None;
    }
    let segment = find_element(r, header.data_end, len, MKV_SEGMENT)?;
    let info = find_element(r, segment.data_start, segment.data_end, MKV_INFO)?;
    let date = find_element(r, info.data_start, info.data_end, MKV_DATE_UTC)?;

    if date.data_end.checked_sub(date.data_start)? != 8 {
        return None;
    }
    r.seek(SeekFrom::Start(date.data_start)).ok()?;
    let nanos = i64::from_be_bytes(read_array(r)?);
    let epoch = DateTime::<Utc>::from_timestamp(MKV_EPOCH_UNIX, 0)?;
    let utc = epoch.checked_add_signed(TimeDelta::nanoseconds(nanos))?;
    Some(utc_to_local(utc))
}

// ---------------------------------------------------------------------------
// RIFF AVI
// ---------------------------------------------------------------------------

/// Only the header lists are searched, never `movi`.
const AVI_MAX_DEPTH: usize = 3;

pub(crate) fn read_avi_date<R: Read + Seek>(r: &mut R) -> Option<NaiveDateTime> {
    let len = stream_len(r)?;
    let riff: [u8; 12] = read_array(r)?;
    if &riff[0..4] != b"RIFF" || &riff[8..12] != b"AVI " {
        return None;
    }
    let text = find_riff_text(r, 12, len, 0)?;
    parse_avi_datetime(&text)
}

fn find_riff_text<R: Read + Seek>(r: &mut R, start: u64, end: u64, depth: usize) -> Option<String> {
    let mut offset = start;
    let mut icrd = None;
    while offset + 8 <= end {
        r.seek(SeekFrom::Start(offset)).ok()?;
        let header: [u8; 8] = read_array(r)?;
        let size = u64::from(u32::from_le_bytes([header[4], header[5], header[6], header[7]]));
        let data_start = offset + 8;
        let data_end = data_start.saturating_add(size).min(end);

        match &header[0..4] {
            b"IDIT" => return read_riff_string(r, data_start, data_end),
            b"ICRD" => icrd = icrd.or_else(|| read_riff_string(r, data_start, data_end)),
            b"LIST" if depth < AVI_MAX_DEPTH && data_start + 4 <= data_end => {
                let list_type: [u8; 4] = read_array(r)?;
                if &list_type != b"movi" {
                    if let Some(found) = find_riff_text(r, data_start + 4, data_end, depth + 1) {
                        return Some(found);
                    }
                }
            }
            _ => {}
        }
        // Chunks are padded to an even size
        offset = data_end + (size & 1);
    }
    icrd
}

fn read_riff_string<R: Read + Seek>(r: &mut R, start: u64, end: u64) -> Option<String> {
    let len = usize::try_from(end.checked_sub(start)?).ok()?;
    if len == 0 || len > 256 {
        return None;
    }
    r.seek(SeekFrom::Start(start)).ok()?;
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf).ok()?;
    let s = String::from_utf8_lossy(&buf);
    Some(s.trim_matches(|c: char| c == '\0' || c.is_whitespace()).to_string())
}

/// IDIT is usually `Mon Mar 03 09:44:56 2008`; ICRD is usually `2008-03-03`.
fn parse_avi_datetime(s: &str) -> Option<NaiveDateTime> {
    const FORMATS: &[&str] = &["%a %b %d %H:%M:%S %Y", "%Y:%m:%d %H:%M:%S", "%Y-%m-%d %H:%M:%S"];
    for fmt in FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}
