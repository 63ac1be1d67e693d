//! Extraction Stage
//!
//! 行ソースから指定列のテキストを取り出し、空でない値をキューへ渡す。

use tracing::{debug, trace};

use super::cancel::CancellationToken;
use super::queue::QueueProducer;
use crate::error::ScanError;
use crate::types::{CellCoord, Row};

/// 抽出ステージの集計
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractionStats {
    /// 読み込んだ行数
    pub rows_read: u64,
    /// 対象列が空・空白のみ・存在しなかった行数
    pub blank_cells: u64,
    /// キューへ投入した値の数
    pub values_enqueued: u64,
}

/// 行を1つずつ読み、対象列の空でないテキストを投入する
///
/// テキストはトリムせずにそのまま投入します。行ソースのエラー、
/// キャンセル、投入失敗のいずれかで即座に中断し、エラーを返します。
/// 終了マーカーの投入は呼び出し側（パイプライン制御）の責務です。
pub(crate) fn run<I>(
    rows: I,
    column: u32,
    queue: &QueueProducer,
    cancel: &CancellationToken,
) -> Result<ExtractionStats, ScanError>
where
    I: IntoIterator<Item = Result<Row, ScanError>>,
{
    let mut stats = ExtractionStats::default();

    for row in rows {
        if cancel.is_cancelled() {
            debug!(rows_read = stats.rows_read, "Extraction cancelled");
            return Err(ScanError::Cancelled);
        }

        let row = row?;
        stats.rows_read += 1;

        match row.cell_text(column) {
            Some(text) if !text.trim().is_empty() => {
                trace!(
                    cell = %CellCoord::new(row.index(), column).to_a1_notation(),
                    value = text,
                    "Enqueue cell value"
                );
                queue.put(text.to_string())?;
                stats.values_enqueued += 1;
            }
            _ => stats.blank_cells += 1,
        }
    }

    debug!(
        rows_read = stats.rows_read,
        values_enqueued = stats.values_enqueued,
        "Row source exhausted"
    );
    Ok(stats)
}
