//! Row Source Module
//!
//! シートの行を遅延的に列挙する行ソースを定義します。
//!
//! * [`XlsxRowSource`]: zip + quick-xml によるストリーミングXLSXリーダー
//! * [`CalamineRowSource`]: calamine による `.xls` / `.xlsb` / `.ods` リーダー
//! * [`MemoryRowSource`]: メモリ上の行（テストや、行をすでに持っている呼び出し元向け）

mod calamine_reader;
mod xlsx;

pub use calamine_reader::CalamineRowSource;
pub use xlsx::XlsxRowSource;

use crate::error::ScanError;
use crate::types::Row;

/// シートの行を前方向に1回だけ列挙するイテレータ
pub type RowIter<'a> = Box<dyn Iterator<Item = Result<Row, ScanError>> + 'a>;

/// 行ソースの能力
///
/// `open_sheet` が返すイテレータは有限・単一パスで、再開できません。
pub trait RowSource {
    /// ワークブック内のシート数
    fn sheet_count(&self) -> usize;

    /// 指定インデックス（0始まり）のシートを開く
    ///
    /// インデックスがシート数以上の場合は `ScanError::SheetNotFound` を返します。
    fn open_sheet(&mut self, index: usize) -> Result<RowIter<'_>, ScanError>;
}

/// シートインデックスの範囲チェック
pub(crate) fn check_sheet_index(index: usize, available: usize) -> Result<(), ScanError> {
    if index >= available {
        return Err(ScanError::SheetNotFound { index, available });
    }
    Ok(())
}

/// メモリ上の行を保持する行ソース
#[derive(Debug, Clone, Default)]
pub struct MemoryRowSource {
    sheets: Vec<Vec<Row>>,
}

impl MemoryRowSource {
    /// 空の行ソースを生成
    pub fn new() -> Self {
        Self::default()
    }

    /// シートを追加する
    pub fn with_sheet(mut self, rows: Vec<Row>) -> Self {
        self.sheets.push(rows);
        self
    }

    /// 1列分の値からシートを追加する
    ///
    /// `None` は空セルとして扱われ、行だけが存在します。
    pub fn with_column<S: AsRef<str>>(self, column: u32, values: &[Option<S>]) -> Self {
        let rows = values
            .iter()
            .enumerate()
            .map(|(i, value)| {
                let mut row = Row::new(i as u32);
                if let Some(text) = value {
                    row.set_cell(column, text.as_ref());
                }
                row
            })
            .collect();
        self.with_sheet(rows)
    }
}

impl RowSource for MemoryRowSource {
    fn sheet_count(&self) -> usize {
        self.sheets.len()
    }

    fn open_sheet(&mut self, index: usize) -> Result<RowIter<'_>, ScanError> {
        check_sheet_index(index, self.sheets.len())?;
        Ok(Box::new(self.sheets[index].iter().cloned().map(Ok)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_source_open_sheet() {
        let mut source = MemoryRowSource::new()
            .with_column(1, &[Some("2"), None, Some("x")])
            .with_sheet(Vec::new());

        assert_eq!(source.sheet_count(), 2);

        let rows: Vec<Row> = source
            .open_sheet(0)
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].cell_text(1), Some("2"));
        assert_eq!(rows[1].cell_text(1), None);
        assert_eq!(rows[2].index(), 2);

        assert_eq!(source.open_sheet(1).unwrap().count(), 0);
    }

    #[test]
    fn test_memory_source_sheet_not_found() {
        let mut source = MemoryRowSource::new().with_sheet(Vec::new());
        let result = source.open_sheet(1);
        match result {
            Err(ScanError::SheetNotFound { index, available }) => {
                assert_eq!(index, 1);
                assert_eq!(available, 1);
            }
            _ => panic!("Expected SheetNotFound error"),
        }
    }
}
