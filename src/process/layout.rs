//! Row heights and number formats read straight from xlsx parts.
//!
//! calamine hands us values only, so the formatting copy goes to the zip
//! container: `xl/workbook.xml` + rels to find each worksheet part,
//! `xl/styles.xml` for `cellXfs` → number format codes, and the worksheet
//! part itself for `<row ht>` and `<c s>`.

use anyhow::{Context, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::{
    collections::{BTreeMap, HashMap},
    io::{BufReader, Cursor, Read, Seek},
};
use tracing::debug;
use zip::ZipArchive;

/// Formatting of one source sheet, keyed by 0-based source coordinates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SheetLayout {
    pub row_heights: BTreeMap<u32, f64>,
    /// Non-General number format codes by (row, col).
    pub number_formats: BTreeMap<(u32, u32), String>,
}

impl SheetLayout {
    pub fn number_format(&self, row: usize, col: usize) -> Option<&str> {
        self.number_formats
            .get(&(row as u32, col as u32))
            .map(String::as_str)
    }

    pub fn row_height(&self, row: usize) -> Option<f64> {
        self.row_heights.get(&(row as u32)).copied()
    }
}

/// Read layouts for every worksheet of an xlsx payload, keyed by sheet name.
pub fn read_layouts(bytes: &[u8]) -> Result<HashMap<String, SheetLayout>> {
    let mut archive =
        ZipArchive::new(Cursor::new(bytes)).context("opening workbook as zip container")?;

    let sheets = read_sheet_parts(&mut archive)?;
    let formats = match archive.by_name("xl/styles.xml") {
        Ok(part) => read_cell_formats(part)?,
        Err(_) => Vec::new(),
    };

    let mut layouts = HashMap::new();
    for (name, path) in sheets {
        let part = match archive.by_name(&path) {
            Ok(p) => p,
            Err(e) => {
                debug!(sheet = %name, path = %path, "worksheet part missing: {}", e);
                continue;
            }
        };
        let layout = read_sheet_layout(part, &formats)
            .with_context(|| format!("reading layout of sheet {}", name))?;
        layouts.insert(name, layout);
    }
    Ok(layouts)
}

/// (sheet name, zip path of its worksheet part), in workbook order.
fn read_sheet_parts<R: Read + Seek>(archive: &mut ZipArchive<R>) -> Result<Vec<(String, String)>> {
    let mut sheets: Vec<(String, String)> = Vec::new();
    {
        let part = archive
            .by_name("xl/workbook.xml")
            .context("missing xl/workbook.xml")?;
        let mut reader = Reader::from_reader(BufReader::new(part));
        reader.config_mut().trim_text(true);
        let mut buf = Vec::new();
        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"sheet" => {
                    let name = attr_value(&e, b"name").unwrap_or_default();
                    let rid = attr_value(&e, b"id").unwrap_or_default();
                    sheets.push((name, rid));
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }
    }

    let mut targets: HashMap<String, String> = HashMap::new();
    {
        let part = archive
            .by_name("xl/_rels/workbook.xml.rels")
            .context("missing xl/_rels/workbook.xml.rels")?;
        let mut reader = Reader::from_reader(BufReader::new(part));
        reader.config_mut().trim_text(true);
        let mut buf = Vec::new();
        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"Relationship" => {
                    if let (Some(id), Some(target)) =
                        (attr_value(&e, b"Id"), attr_value(&e, b"Target"))
                    {
                        targets.insert(id, target);
                    }
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }
    }

    Ok(sheets
        .into_iter()
        .filter_map(|(name, rid)| {
            let target = targets.get(&rid)?;
            let path = match target.strip_prefix('/') {
                Some(abs) => abs.to_string(),
                None => format!("xl/{}", target),
            };
            Some((name, path))
        })
        .collect())
}

/// Number format code per `cellXfs` index.
fn read_cell_formats<R: Read>(part: R) -> Result<Vec<String>> {
    let mut custom: HashMap<u32, String> = HashMap::new();
    let mut xf_ids: Vec<u32> = Vec::new();
    let mut in_cell_xfs = false;

    let mut reader = Reader::from_reader(BufReader::new(part));
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            // self-closing <cellXfs/> has no children and no End event
            Event::Start(e) if e.local_name().as_ref() == b"cellXfs" => in_cell_xfs = true,
            Event::Start(e) | Event::Empty(e) => match e.local_name().as_ref() {
                b"numFmt" => {
                    let id = attr_value(&e, b"numFmtId").and_then(|v| v.parse().ok());
                    let code = attr_value(&e, b"formatCode");
                    if let (Some(id), Some(code)) = (id, code) {
                        custom.insert(id, code);
                    }
                }
                b"xf" if in_cell_xfs => {
                    let id = attr_value(&e, b"numFmtId")
                        .and_then(|v| v.parse().ok())
                        .unwrap_or(0);
                    xf_ids.push(id);
                }
                _ => {}
            },
            Event::End(e) if e.local_name().as_ref() == b"cellXfs" => in_cell_xfs = false,
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(xf_ids
        .into_iter()
        .map(|id| {
            custom
                .get(&id)
                .cloned()
                .or_else(|| builtin_format(id).map(str::to_string))
                .unwrap_or_else(|| "General".to_string())
        })
        .collect())
}

fn read_sheet_layout<R: Read>(part: R, formats: &[String]) -> Result<SheetLayout> {
    let mut layout = SheetLayout::default();
    let mut reader = Reader::from_reader(BufReader::new(part));
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e) => match e.local_name().as_ref() {
                b"row" => {
                    let row = attr_value(&e, b"r").and_then(|v| v.parse::<u32>().ok());
                    let ht = attr_value(&e, b"ht").and_then(|v| v.parse::<f64>().ok());
                    if let (Some(row), Some(ht)) = (row, ht) {
                        layout.row_heights.insert(row.saturating_sub(1), ht);
                    }
                }
                b"c" => {
                    let pos = attr_value(&e, b"r").and_then(|r| parse_cell_ref(&r));
                    let style = attr_value(&e, b"s").and_then(|v| v.parse::<usize>().ok());
                    if let (Some(pos), Some(style)) = (pos, style) {
                        if let Some(code) = formats.get(style) {
                            if code != "General" {
                                layout.number_formats.insert(pos, code.clone());
                            }
                        }
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(layout)
}

fn attr_value(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == key)
        .and_then(|a| a.unescape_value().ok().map(|v| v.to_string()))
}

/// `B3` → (row 2, col 1), 0-based.
fn parse_cell_ref(cell_ref: &str) -> Option<(u32, u32)> {
    let mut col = 0u32;
    let mut row_str = String::new();
    for ch in cell_ref.chars() {
        if ch.is_ascii_alphabetic() {
            col = col * 26 + (ch.to_ascii_uppercase() as u32 - 'A' as u32 + 1);
        } else if ch.is_ascii_digit() {
            row_str.push(ch);
        }
    }
    let row = row_str.parse::<u32>().ok()?;
    if col == 0 || row == 0 {
        return None;
    }
    Some((row - 1, col - 1))
}

fn builtin_format(id: u32) -> Option<&'static str> {
    Some(match id {
        0 => "General",
        1 => "0",
        2 => "0.00",
        3 => "#,##0",
        4 => "#,##0.00",
        9 => "0%",
        10 => "0.00%",
        11 => "0.00E+00",
        12 => "# ?/?",
        13 => "# ??/??",
        14 => "yyyy-mm-dd",
        15 => "d-mmm-yy",
        16 => "d-mmm",
        17 => "mmm-yy",
        18 => "h:mm AM/PM",
        19 => "h:mm:ss AM/PM",
        20 => "h:mm",
        21 => "h:mm:ss",
        22 => "yyyy-mm-dd h:mm",
        37 => "#,##0 ;(#,##0)",
        38 => "#,##0 ;[Red](#,##0)",
        39 => "#,##0.00;(#,##0.00)",
        40 => "#,##0.00;[Red](#,##0.00)",
        45 => "mm:ss",
        46 => "[h]:mm:ss",
        47 => "mmss.0",
        48 => "##0.0E+0",
        49 => "@",
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_xlsxwriter::{Format, Workbook};

    #[test]
    fn cell_refs_are_zero_based() {
        assert_eq!(parse_cell_ref("A1"), Some((0, 0)));
        assert_eq!(parse_cell_ref("B3"), Some((2, 1)));
        assert_eq!(parse_cell_ref("AA10"), Some((9, 26)));
        assert_eq!(parse_cell_ref("A"), None);
    }

    #[test]
    fn reads_row_heights_and_number_formats() -> Result<()> {
        let mut wb = Workbook::new();
        let ws = wb.add_worksheet();
        ws.set_name("인사")?;
        ws.write_string(0, 0, "No")?;
        ws.write_number_with_format(1, 1, 1234.5, &Format::new().set_num_format("#,##0.00"))?;
        ws.write_number_with_format(2, 2, 45415.0, &Format::new().set_num_format("yyyy-mm-dd"))?;
        ws.set_row_height(1, 30)?;
        let bytes = wb.save_to_buffer()?;

        let layouts = read_layouts(&bytes)?;
        let layout = layouts.get("인사").expect("layout for sheet");
        assert_eq!(layout.row_height(1), Some(30.0));
        assert_eq!(layout.number_format(1, 1), Some("#,##0.00"));
        assert_eq!(layout.number_format(2, 2), Some("yyyy-mm-dd"));
        assert_eq!(layout.number_format(0, 0), None);
        Ok(())
    }
}
