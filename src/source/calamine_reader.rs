//! Calamine Row Source
//!
//! `.xls` / `.xlsb` / `.ods` など、ストリーミングXLSXリーダーが扱わない形式を
//! calamine で読み込みます。シートは開く時点で展開されますが、行の生成は遅延的です。

use calamine::{open_workbook_auto_from_rs, Data, Range, Reader, Sheets};
use std::io::{Cursor, Read, Seek, SeekFrom};
use tracing::debug;

use super::{check_sheet_index, RowIter, RowSource};
use crate::error::ScanError;
use crate::security::SecurityConfig;
use crate::types::Row;

/// calamine によるワークブック行ソース
pub struct CalamineRowSource {
    workbook: Sheets<Cursor<Vec<u8>>>,
    sheet_count: usize,
}

impl CalamineRowSource {
    /// デフォルトのセキュリティ設定でワークブックを開く
    pub fn new<R: Read + Seek>(reader: R) -> Result<Self, ScanError> {
        Self::with_security(reader, &SecurityConfig::default())
    }

    /// セキュリティ設定を指定してワークブックを開く
    pub fn with_security<R: Read + Seek>(
        mut reader: R,
        security: &SecurityConfig,
    ) -> Result<Self, ScanError> {
        let size = reader.seek(SeekFrom::End(0))?;
        reader.seek(SeekFrom::Start(0))?;
        security.check_input_size(size)?;

        let mut data = Vec::with_capacity(size as usize);
        reader.read_to_end(&mut data)?;

        let workbook = open_workbook_auto_from_rs(Cursor::new(data))?;
        let sheet_count = workbook.sheet_names().len();
        debug!(sheets = sheet_count, "Opened workbook with calamine");

        Ok(Self {
            workbook,
            sheet_count,
        })
    }
}

impl RowSource for CalamineRowSource {
    fn sheet_count(&self) -> usize {
        self.sheet_count
    }

    fn open_sheet(&mut self, index: usize) -> Result<RowIter<'_>, ScanError> {
        check_sheet_index(index, self.sheet_count)?;

        let range = self
            .workbook
            .worksheet_range_at(index)
            .ok_or(ScanError::SheetNotFound {
                index,
                available: self.sheet_count,
            })??;

        debug!(index, size = ?range.get_size(), start = ?range.start(), "Opened sheet range");
        Ok(Box::new(CalamineRows::new(range)))
    }
}

/// セル範囲を行単位で列挙するイテレータ
struct CalamineRows {
    range: Range<Data>,
    origin: (u32, u32),
    height: usize,
    width: usize,
    next: usize,
}

impl CalamineRows {
    fn new(range: Range<Data>) -> Self {
        let origin = range.start().unwrap_or((0, 0));
        let (height, width) = range.get_size();
        Self {
            range,
            origin,
            height,
            width,
            next: 0,
        }
    }
}

impl Iterator for CalamineRows {
    type Item = Result<Row, ScanError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.height {
            return None;
        }
        let offset = self.next;
        self.next += 1;

        let (row_origin, col_origin) = self.origin;
        let mut row = Row::new(row_origin + offset as u32);
        for c in 0..self.width {
            if let Some(text) = self.range.get((offset, c)).and_then(cell_text) {
                row.set_cell(col_origin + c as u32, text);
            }
        }
        Some(Ok(row))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.height - self.next;
        (remaining, Some(remaining))
    }
}

/// セル値の表示テキスト（空セルは `None`）
fn cell_text(data: &Data) -> Option<String> {
    match data {
        Data::Empty => None,
        Data::String(s) => Some(s.clone()),
        Data::Bool(true) => Some("TRUE".to_string()),
        Data::Bool(false) => Some("FALSE".to_string()),
        other => Some(other.to_string()),
    }
}
