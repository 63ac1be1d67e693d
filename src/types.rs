//! Types Module
//!
//! クレート全体で使用する共通データ型を定義するモジュール。

/// セル座標（0始まり）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct CellCoord {
    pub row: u32,
    pub col: u32,
}

impl CellCoord {
    /// 新しい座標を生成
    pub fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }

    /// A1形式の文字列から座標を解析する（例: "B3" -> (2, 1)）
    ///
    /// 絶対参照の `$` は無視します。形式が不正な場合は `None` を返します。
    pub fn from_a1_notation(reference: &str) -> Option<Self> {
        let reference = reference.trim();
        let mut chars = reference.chars().filter(|c| *c != '$').peekable();

        let mut col: u32 = 0;
        let mut letters = 0;
        while let Some(c) = chars.peek().copied() {
            if !c.is_ascii_alphabetic() {
                break;
            }
            let digit = (c.to_ascii_uppercase() as u8 - b'A') as u32 + 1;
            col = col.checked_mul(26)?.checked_add(digit)?;
            letters += 1;
            chars.next();
        }

        let row_part: String = chars.collect();
        if letters == 0 || row_part.is_empty() || !row_part.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }

        let row: u32 = row_part.parse().ok()?;
        if row == 0 {
            return None;
        }

        Some(Self::new(row - 1, col - 1))
    }

    /// A1形式の文字列に変換（例: (0, 0) -> "A1"）
    #[allow(clippy::wrong_self_convention)]
    pub fn to_a1_notation(&self) -> String {
        let col_str = Self::col_index_to_letter(self.col);
        format!("{}{}", col_str, u64::from(self.row) + 1)
    }

    /// 列インデックスを文字列に変換（0 -> "A", 25 -> "Z", 26 -> "AA"）
    fn col_index_to_letter(mut col: u32) -> String {
        let mut result = String::new();
        loop {
            let remainder = col % 26;
            result.insert(0, (b'A' + remainder as u8) as char);
            if col < 26 {
                break;
            }
            col = col / 26 - 1;
        }
        result
    }
}

/// 行ソースが生成する1行分のセルテキスト
///
/// 空でないセルのみを列インデックス順に保持する疎な表現です。
/// 行ソースが生のテキストをそのまま格納するため、前後の空白も保持されます。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    index: u32,
    cells: Vec<(u32, String)>,
}

impl Row {
    /// 空の行を生成
    pub fn new(index: u32) -> Self {
        Self {
            index,
            cells: Vec::new(),
        }
    }

    /// 行インデックス（0始まり）とセル列から行を生成
    ///
    /// `cells` は `(列インデックス, テキスト)` の組です。順序は問いません。
    pub fn from_cells<I, S>(index: u32, cells: I) -> Self
    where
        I: IntoIterator<Item = (u32, S)>,
        S: Into<String>,
    {
        let mut row = Self::new(index);
        for (col, text) in cells {
            row.set_cell(col, text);
        }
        row
    }

    /// 行インデックス（0始まり）
    pub fn index(&self) -> u32 {
        self.index
    }

    /// セルのテキストを設定する（同じ列への再設定は上書き）
    pub fn set_cell(&mut self, col: u32, text: impl Into<String>) {
        let text = text.into();
        match self.cells.binary_search_by_key(&col, |(c, _)| *c) {
            Ok(pos) => self.cells[pos].1 = text,
            Err(pos) => self.cells.insert(pos, (col, text)),
        }
    }

    /// 指定列のセルテキストを取得する
    ///
    /// セルが存在しない場合は `None` を返します。
    pub fn cell_text(&self, col: u32) -> Option<&str> {
        self.cells
            .binary_search_by_key(&col, |(c, _)| *c)
            .ok()
            .map(|pos| self.cells[pos].1.as_str())
    }
}
