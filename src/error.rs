//! Error Types Module
//!
//! クレート全体で使用する構造化エラー型を定義するモジュール。
//! `thiserror`を使用して、エラーの自動変換とメッセージフォーマットを実現する。

use thiserror::Error;

/// primescanクレート全体で使用するエラー型
///
/// スプレッドシートの読み込み、行の抽出、パイプラインの制御中に発生する
/// すべての致命的エラーを統一的に扱います。
///
/// 個々のセル値の解析失敗（数値でない文字列など）はこの型では表現されません。
/// それらはワーカー内で記録され、スキップされるだけで実行を中断しません。
///
/// # 使用例
///
/// ```rust,no_run
/// use primescan::ScanError;
/// use std::fs::File;
///
/// fn open_input(path: &str) -> Result<File, ScanError> {
///     let file = File::open(path)?;  // Ioエラーが自動的に変換される
///     Ok(file)
/// }
/// ```
#[derive(Error, Debug)]
pub enum ScanError {
    /// I/O操作中に発生したエラー
    ///
    /// 入力ファイルの読み込み失敗や、出力先への書き込み失敗などです。
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// calamineがワークブックを解析する際に発生したエラー
    ///
    /// `.xls` / `.xlsb` / `.ods` の読み込みで使用されます。
    #[error("Failed to parse spreadsheet: {0}")]
    Parse(#[from] calamine::Error),

    /// シートXMLまたは共有文字列XMLの解析エラー
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// ZIPアーカイブの解析エラー
    ///
    /// XLSXファイル（ZIPアーカイブ）の読み込み中に発生したエラーです。
    #[error("ZIP archive error: {0}")]
    Zip(String),

    /// コンテナの構造が不正（共有文字列インデックスが範囲外など）
    #[error("Malformed spreadsheet: {0}")]
    Format(String),

    /// 要求されたシートインデックスがワークブックのシート数を超えている
    #[error("Requested sheet index {index}, but workbook has only {available} sheets")]
    SheetNotFound {
        /// 要求されたシートインデックス（0始まり）
        index: usize,
        /// ワークブック内のシート数
        available: usize,
    },

    /// 設定の検証に失敗したエラー
    ///
    /// `ScannerBuilder::build()`時に無効な設定が検出された場合に発生します。
    ///
    /// ```rust,no_run
    /// use primescan::{ScannerBuilder, ScanError};
    ///
    /// match ScannerBuilder::new().with_certainty(0).build() {
    ///     Err(ScanError::Config(msg)) => println!("設定エラー: {}", msg),
    ///     _ => {}
    /// }
    /// ```
    #[error("Configuration error: {0}")]
    Config(String),

    /// セキュリティ制限に違反したエラー
    ///
    /// ZIP bomb、パストラバーサル、ファイルサイズ制限などに違反した場合に発生します。
    #[error("Security violation: {0}")]
    SecurityViolation(String),

    /// ワーカーが停止しており、キューに値を投入できなかった
    ///
    /// 投入できなかった値は`pending`に保持され、失われません。
    #[error("Pipeline queue closed while enqueuing {pending:?}")]
    QueueClosed {
        /// 投入に失敗した生のセル値
        pending: String,
    },

    /// ワーカースレッドがパニックで終了した
    #[error("Prime check worker panicked: {0}")]
    WorkerPanicked(String),

    /// 協調的キャンセルにより処理が中断された
    #[error("Scan was cancelled")]
    Cancelled,
}

impl From<zip::result::ZipError> for ScanError {
    fn from(err: zip::result::ZipError) -> Self {
        ScanError::Zip(err.to_string())
    }
}
