//! Streaming XLSX Row Source
//!
//! XLSXファイル（ZIPアーカイブ）からシートXMLを直接読み込み、1行ずつ列挙します。
//! シート全体をメモリに展開しないため、行数に比例したメモリを必要としません。
//!
//! 読み込む XML:
//!
//! * `xl/workbook.xml` / `xl/_rels/workbook.xml.rels`: シートの順序と実体パス
//! * `xl/sharedStrings.xml`: 共有文字列テーブル（開く時に一度だけ読み込む）
//! * `xl/worksheets/sheetN.xml`: 行データ（ストリーミング）

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom};
use tracing::debug;
use zip::read::ZipFile;
use zip::result::ZipError;
use zip::ZipArchive;

use super::{check_sheet_index, RowIter, RowSource};
use crate::error::ScanError;
use crate::security::SecurityConfig;
use crate::types::{CellCoord, Row};

/// ワークブック内のシート定義
#[derive(Debug, Clone, PartialEq, Eq)]
struct SheetEntry {
    name: String,
    path: String,
}

/// ストリーミングXLSX行ソース
///
/// # 使用例
///
/// ```rust,no_run
/// use primescan::{RowSource, XlsxRowSource};
/// use std::fs::File;
///
/// # fn main() -> Result<(), primescan::ScanError> {
/// let mut source = XlsxRowSource::new(File::open("data.xlsx")?)?;
/// for row in source.open_sheet(0)? {
///     let row = row?;
///     println!("{:?}", row.cell_text(1));
/// }
/// # Ok(())
/// # }
/// ```
pub struct XlsxRowSource<R: Read + Seek> {
    archive: ZipArchive<R>,
    sheets: Vec<SheetEntry>,
    shared_strings: Vec<String>,
    max_entry_size: u64,
}

impl<R: Read + Seek> XlsxRowSource<R> {
    /// デフォルトのセキュリティ設定でワークブックを開く
    pub fn new(reader: R) -> Result<Self, ScanError> {
        Self::with_security(reader, &SecurityConfig::default())
    }

    /// セキュリティ設定を指定してワークブックを開く
    ///
    /// 1. 入力サイズとZIPエントリを検証
    /// 2. シートの順序とパスを解決
    /// 3. 共有文字列テーブルを読み込む
    pub fn with_security(mut reader: R, security: &SecurityConfig) -> Result<Self, ScanError> {
        let size = reader.seek(SeekFrom::End(0))?;
        reader.seek(SeekFrom::Start(0))?;
        security.check_input_size(size)?;

        let mut archive = ZipArchive::new(reader)?;
        security.check_archive(&mut archive)?;

        let max_entry_size = security.max_file_size;
        let sheets = read_sheet_entries(&mut archive, max_entry_size)?;
        let shared_strings =
            match read_entry(&mut archive, "xl/sharedStrings.xml", max_entry_size)? {
                Some(xml) => parse_shared_strings(&xml)?,
                None => Vec::new(),
            };

        debug!(
            sheets = ?sheets.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(),
            shared_strings = shared_strings.len(),
            "Opened xlsx workbook"
        );

        Ok(Self {
            archive,
            sheets,
            shared_strings,
            max_entry_size,
        })
    }
}

impl<R: Read + Seek> RowSource for XlsxRowSource<R> {
    fn sheet_count(&self) -> usize {
        self.sheets.len()
    }

    fn open_sheet(&mut self, index: usize) -> Result<RowIter<'_>, ScanError> {
        check_sheet_index(index, self.sheets.len())?;

        let Self {
            archive,
            sheets,
            shared_strings,
            max_entry_size,
        } = self;
        let entry = &sheets[index];
        debug!(index, name = %entry.name, path = %entry.path, "Opening sheet");

        let file = archive.by_name(&entry.path)?;
        let limited = SizeLimited::new(file, *max_entry_size);
        Ok(Box::new(SheetRows {
            reader: Reader::from_reader(BufReader::new(limited)),
            shared_strings: shared_strings.as_slice(),
            buf: Vec::new(),
            next_row: 0,
            done: false,
        }))
    }
}

/// 展開後のサイズが上限を超えた時点で読み込みを失敗させるリーダー
///
/// ZIPヘッダーのサイズは `check_archive` で検証済みだが、実際に展開される
/// バイト数はヘッダーと一致するとは限らない。
struct SizeLimited<R> {
    inner: R,
    remaining: u64,
}

impl<R: Read> SizeLimited<R> {
    fn new(inner: R, limit: u64) -> Self {
        Self {
            inner,
            remaining: limit,
        }
    }
}

impl<R: Read> Read for SizeLimited<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.remaining = self.remaining.checked_sub(n as u64).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                "ZIP entry inflates beyond the maximum entry size",
            )
        })?;
        Ok(n)
    }
}

/// シートXMLを1行ずつ読み進めるイテレータ
struct SheetRows<'a> {
    reader: Reader<BufReader<SizeLimited<ZipFile<'a>>>>,
    shared_strings: &'a [String],
    buf: Vec<u8>,
    next_row: u32,
    done: bool,
}

impl Iterator for SheetRows<'_> {
    type Item = Result<Row, ScanError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match read_row(
            &mut self.reader,
            &mut self.buf,
            self.shared_strings,
            &mut self.next_row,
        ) {
            Ok(Some(row)) => Some(Ok(row)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

/// セル要素の読み込み中の状態
#[derive(Debug)]
struct PendingCell {
    col: u32,
    kind: CellKind,
    text: String,
    capture: bool,
    in_phonetic: bool,
}

/// `t` 属性によるセルの型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CellKind {
    SharedString,
    InlineString,
    Boolean,
    Other,
}

impl PendingCell {
    fn from_start(e: &BytesStart<'_>, next_col: u32) -> Result<Self, ScanError> {
        let col = attribute(e, b"r")?
            .and_then(|r| CellCoord::from_a1_notation(&r))
            .map(|coord| coord.col)
            .unwrap_or(next_col);

        let kind = match attribute(e, b"t")?.as_deref() {
            Some("s") => CellKind::SharedString,
            Some("inlineStr") => CellKind::InlineString,
            Some("b") => CellKind::Boolean,
            _ => CellKind::Other,
        };

        Ok(Self {
            col,
            kind,
            text: String::new(),
            capture: false,
            in_phonetic: false,
        })
    }

    /// セルの表示テキストを決定する（値がなければ `None`）
    fn resolve(self, shared_strings: &[String]) -> Result<Option<String>, ScanError> {
        match self.kind {
            CellKind::SharedString => {
                if self.text.trim().is_empty() {
                    return Ok(None);
                }
                let index: usize = self.text.trim().parse().map_err(|_| {
                    ScanError::Format(format!("Invalid shared string index: {}", self.text))
                })?;
                let text = shared_strings.get(index).ok_or_else(|| {
                    ScanError::Format(format!(
                        "Shared string index {} out of range (total: {})",
                        index,
                        shared_strings.len()
                    ))
                })?;
                Ok(Some(text.clone()).filter(|t| !t.is_empty()))
            }
            CellKind::Boolean => Ok(match self.text.trim() {
                "1" => Some("TRUE".to_string()),
                "0" => Some("FALSE".to_string()),
                "" => None,
                other => Some(other.to_string()),
            }),
            CellKind::InlineString | CellKind::Other => {
                if self.text.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(self.text))
                }
            }
        }
    }
}

/// 次の `<row>` を読み込む。`</sheetData>` またはEOFで `None`
fn read_row<B: BufRead>(
    reader: &mut Reader<B>,
    buf: &mut Vec<u8>,
    shared_strings: &[String],
    next_row: &mut u32,
) -> Result<Option<Row>, ScanError> {
    let mut row: Option<Row> = None;
    let mut cell: Option<PendingCell> = None;
    let mut next_col: u32 = 0;

    loop {
        buf.clear();
        match reader.read_event_into(buf)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"row" => {
                    row = Some(Row::new(row_index(&e, *next_row)?));
                    next_col = 0;
                }
                b"c" if row.is_some() => cell = Some(PendingCell::from_start(&e, next_col)?),
                b"v" => {
                    if let Some(c) = cell.as_mut() {
                        c.capture = true;
                    }
                }
                b"t" => {
                    if let Some(c) = cell.as_mut() {
                        c.capture = !c.in_phonetic;
                    }
                }
                b"rPh" => {
                    if let Some(c) = cell.as_mut() {
                        c.in_phonetic = true;
                    }
                }
                _ => {}
            },
            Event::Empty(e) => match e.local_name().as_ref() {
                b"row" => {
                    let index = row_index(&e, *next_row)?;
                    *next_row = row_after(index)?;
                    return Ok(Some(Row::new(index)));
                }
                b"c" if row.is_some() => {
                    next_col = PendingCell::from_start(&e, next_col)?.col.saturating_add(1);
                }
                _ => {}
            },
            Event::Text(e) => {
                if let Some(c) = cell.as_mut().filter(|c| c.capture) {
                    c.text.push_str(&e.unescape()?);
                }
            }
            Event::CData(e) => {
                if let Some(c) = cell.as_mut().filter(|c| c.capture) {
                    c.text.push_str(&String::from_utf8_lossy(&e.into_inner()));
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"v" | b"t" => {
                    if let Some(c) = cell.as_mut() {
                        c.capture = false;
                    }
                }
                b"rPh" => {
                    if let Some(c) = cell.as_mut() {
                        c.in_phonetic = false;
                    }
                }
                b"c" => {
                    if let Some(c) = cell.take() {
                        let col = c.col;
                        next_col = col.saturating_add(1);
                        if let (Some(r), Some(text)) = (row.as_mut(), c.resolve(shared_strings)?) {
                            r.set_cell(col, text);
                        }
                    }
                }
                b"row" => {
                    if let Some(r) = row.take() {
                        *next_row = row_after(r.index())?;
                        return Ok(Some(r));
                    }
                }
                b"sheetData" => return Ok(None),
                _ => {}
            },
            Event::Eof => return Ok(None),
            _ => {}
        }
    }
}

/// `<row r="N">` の行インデックス（0始まり）。属性がなければ直前の行の次
fn row_index(e: &BytesStart<'_>, fallback: u32) -> Result<u32, ScanError> {
    Ok(attribute(e, b"r")?
        .and_then(|r| r.trim().parse::<u32>().ok())
        .filter(|r| *r > 0)
        .map(|r| r - 1)
        .unwrap_or(fallback))
}

/// 直前の行の次の行インデックス
fn row_after(index: u32) -> Result<u32, ScanError> {
    index.checked_add(1).ok_or_else(|| {
        ScanError::Format(format!("Row index overflow after row {}", u64::from(index) + 1))
    })
}

/// 要素の属性値をローカル名で取得する
fn attribute(e: &BytesStart<'_>, name: &[u8]) -> Result<Option<String>, ScanError> {
    for attr in e.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        if attr.key.local_name().as_ref() == name {
            let raw = std::str::from_utf8(&attr.value).map_err(quick_xml::Error::from)?;
            let value = quick_xml::escape::unescape(raw).map_err(quick_xml::Error::from)?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

/// ZIPエントリ全体を読み込む（存在しなければ `None`）
///
/// 展開後のサイズが `limit` を超えた場合は `SecurityViolation` を返します。
fn read_entry<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    name: &str,
    limit: u64,
) -> Result<Option<Vec<u8>>, ScanError> {
    let file = match archive.by_name(name) {
        Ok(file) => file,
        Err(ZipError::FileNotFound) => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    let mut content = Vec::new();
    file.take(limit.saturating_add(1)).read_to_end(&mut content)?;
    if content.len() as u64 > limit {
        return Err(ScanError::SecurityViolation(format!(
            "File '{}' inflates beyond maximum size: {} bytes",
            name, limit
        )));
    }
    Ok(Some(content))
}

/// `xl/workbook.xml` と関連付けからシートの順序とパスを解決する
fn read_sheet_entries<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    limit: u64,
) -> Result<Vec<SheetEntry>, ScanError> {
    let workbook = read_entry(archive, "xl/workbook.xml", limit)?
        .ok_or_else(|| ScanError::Format("Missing xl/workbook.xml".to_string()))?;
    let relationships = match read_entry(archive, "xl/_rels/workbook.xml.rels", limit)? {
        Some(xml) => parse_relationships(&xml)?,
        None => HashMap::new(),
    };

    let sheets = parse_workbook_sheets(&workbook)?
        .into_iter()
        .enumerate()
        .map(|(i, (name, rel_id))| {
            let path = rel_id
                .and_then(|id| relationships.get(&id))
                .map(|target| resolve_target(target))
                .unwrap_or_else(|| format!("xl/worksheets/sheet{}.xml", i + 1));
            SheetEntry { name, path }
        })
        .collect();

    Ok(sheets)
}

/// 関連付けのターゲットをアーカイブ内のパスに変換する
fn resolve_target(target: &str) -> String {
    match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("xl/{}", target),
    }
}

/// `<sheet name=".." r:id=".."/>` を出現順に取り出す
fn parse_workbook_sheets(xml: &[u8]) -> Result<Vec<(String, Option<String>)>, ScanError> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut sheets = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"sheet" => {
                let name = attribute(&e, b"name")?.unwrap_or_default();
                let rel_id = attribute(&e, b"id")?;
                sheets.push((name, rel_id));
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(sheets)
}

/// `<Relationship Id=".." Target=".."/>` を `Id -> Target` に変換する
fn parse_relationships(xml: &[u8]) -> Result<HashMap<String, String>, ScanError> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut relationships = HashMap::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"Relationship" => {
                if let (Some(id), Some(target)) = (attribute(&e, b"Id")?, attribute(&e, b"Target")?)
                {
                    relationships.insert(id, target);
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(relationships)
}

/// `xl/sharedStrings.xml` を解析する
///
/// リッチテキストの `<r>` はテキストを連結し、ふりがな（`<rPh>`）は無視します。
fn parse_shared_strings(xml: &[u8]) -> Result<Vec<String>, ScanError> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut strings = Vec::new();

    let mut current = String::new();
    let mut in_t = false;
    let mut in_phonetic = false;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"si" => current.clear(),
                b"t" => in_t = !in_phonetic,
                b"rPh" => in_phonetic = true,
                _ => {}
            },
            Event::Empty(e) if e.local_name().as_ref() == b"si" => strings.push(String::new()),
            Event::Text(e) if in_t => current.push_str(&e.unescape()?),
            Event::CData(e) if in_t => current.push_str(&String::from_utf8_lossy(&e.into_inner())),
            Event::End(e) => match e.local_name().as_ref() {
                b"si" => strings.push(std::mem::take(&mut current)),
                b"t" => in_t = false,
                b"rPh" => in_phonetic = false,
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(strings)
}
