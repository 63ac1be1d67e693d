//! Builder Module
//!
//! Fluent Builder APIを提供し、`PrimeScanner`インスタンスを段階的に構築する。

use std::fs::File;
use std::io::{Read, Seek, Write};
use std::path::Path;
use tracing::{debug, info, warn};

use crate::api::{SourceFormat, DEFAULT_DATA_COLUMN, DEFAULT_SHEET_INDEX, PRIME_CERTAINTY};
use crate::error::ScanError;
use crate::pipeline::{self, CancellationToken, ScanReport};
use crate::primality::PrimalityTest;
use crate::security::SecurityConfig;
use crate::source::{CalamineRowSource, RowSource, XlsxRowSource};

/// 確実性パラメータの上限
const MAX_CERTAINTY: u32 = 256;

/// スキャン処理の設定を保持する内部構造体
#[derive(Debug, Clone)]
pub(crate) struct ScanConfig {
    /// 対象シートのインデックス（0始まり）
    pub sheet_index: usize,

    /// データ列のインデックス（0始まり）
    pub data_column: u32,

    /// 素数判定の確実性パラメータ `k`
    pub certainty: u32,

    /// 乱数シード（`None` の場合はOSのエントロピー）
    pub seed: Option<u64>,

    /// 入力コンテナの形式
    pub format: SourceFormat,

    /// 入力コンテナに対するセキュリティ制限
    pub security: SecurityConfig,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            sheet_index: DEFAULT_SHEET_INDEX,
            data_column: DEFAULT_DATA_COLUMN,
            certainty: PRIME_CERTAINTY,
            seed: None,
            format: SourceFormat::Auto,
            security: SecurityConfig::default(),
        }
    }
}

/// Fluent Builder APIを提供する構造体
///
/// すべての設定項目にデフォルト値が設定されており、必要な設定のみをオーバーライドできます。
///
/// # 使用例
///
/// ```rust,no_run
/// use primescan::ScannerBuilder;
///
/// # fn main() -> Result<(), primescan::ScanError> {
/// let scanner = ScannerBuilder::new()
///     .with_sheet_index(0)
///     .with_data_column(1)
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct ScannerBuilder {
    /// 内部設定（構築中）
    config: ScanConfig,

    /// 外部から渡されたキャンセルトークン
    cancellation: Option<CancellationToken>,
}

impl ScannerBuilder {
    /// デフォルト設定を持つビルダーインスタンスを生成する
    ///
    /// # デフォルト設定
    ///
    /// - シート: 最初のシート（`DEFAULT_SHEET_INDEX`）
    /// - データ列: 2列目（`DEFAULT_DATA_COLUMN`）
    /// - 確実性: `PRIME_CERTAINTY`
    /// - 乱数シード: なし（OSのエントロピー）
    /// - 形式: 拡張子から自動判定
    pub fn new() -> Self {
        Self::default()
    }

    /// 対象シートをインデックス（0始まり）で指定する
    pub fn with_sheet_index(mut self, index: usize) -> Self {
        self.config.sheet_index = index;
        self
    }

    /// データ列をインデックス（0始まり）で指定する
    ///
    /// ```rust,no_run
    /// use primescan::ScannerBuilder;
    ///
    /// // A列を読む
    /// let builder = ScannerBuilder::new().with_data_column(0);
    /// ```
    pub fn with_data_column(mut self, column: u32) -> Self {
        self.config.data_column = column;
        self
    }

    /// 素数判定の確実性パラメータ `k` を指定する
    ///
    /// 合成数を素数と誤判定する確率は `2^-k` 以下になります。
    ///
    /// # 制約
    ///
    /// * `1 <= certainty <= 256`
    /// * 制約違反の場合、`build()`時に`ScanError::Config`を返す
    pub fn with_certainty(mut self, certainty: u32) -> Self {
        self.config.certainty = certainty;
        self
    }

    /// 乱数シードを固定する
    ///
    /// 同じシードで同じ入力をスキャンすると、判定に使う乱数列も同一になります。
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.config.seed = Some(seed);
        self
    }

    /// 入力コンテナの形式を指定する
    pub fn with_format(mut self, format: SourceFormat) -> Self {
        self.config.format = format;
        self
    }

    /// セキュリティ設定を指定する
    ///
    /// ```rust,no_run
    /// use primescan::{ScannerBuilder, SecurityConfig};
    ///
    /// let builder = ScannerBuilder::new().with_security_config(SecurityConfig {
    ///     max_input_file_size: 64 * 1024 * 1024,
    ///     ..SecurityConfig::default()
    /// });
    /// ```
    pub fn with_security_config(mut self, security: SecurityConfig) -> Self {
        self.config.security = security;
        self
    }

    /// キャンセルトークンを指定する
    ///
    /// 指定しない場合、スキャナーは独自のトークンを生成します
    /// （`PrimeScanner::cancellation_token()`で取得可能）。
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// 設定を検証し、`PrimeScanner`インスタンスを生成する
    ///
    /// # 発生し得るエラー
    ///
    /// * `ScanError::Config(String)`: 確実性パラメータが `1..=256` の範囲外
    pub fn build(self) -> Result<PrimeScanner, ScanError> {
        if self.config.certainty == 0 || self.config.certainty > MAX_CERTAINTY {
            return Err(ScanError::Config(format!(
                "Invalid certainty: {} (expected 1..={})",
                self.config.certainty, MAX_CERTAINTY
            )));
        }

        Ok(PrimeScanner {
            config: self.config,
            cancellation: self.cancellation.unwrap_or_default(),
        })
    }
}

/// スキャン処理のファサード
///
/// スプレッドシートの1列を読み込み、素数だけを行順に出力するメインエントリーポイントです。
///
/// # 使用例
///
/// ```rust,no_run
/// use primescan::ScannerBuilder;
///
/// # fn main() -> Result<(), primescan::ScanError> {
/// let scanner = ScannerBuilder::new().build()?;
/// let report = scanner.scan_path("numbers.xlsx", std::io::stdout())?;
/// eprintln!("{} primes", report.worker.primes_found);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct PrimeScanner {
    /// スキャン設定
    config: ScanConfig,

    /// 協調的キャンセル用トークン
    cancellation: CancellationToken,
}

impl PrimeScanner {
    /// このスキャナーのキャンセルトークン（複製）を取得する
    ///
    /// 一度キャンセルされたトークンは元に戻らないため、以降のスキャンはすべて
    /// `ScanError::Cancelled` で終了します。
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    /// 入力コンテナをスキャンし、素数を `output` に1行ずつ書き込む
    ///
    /// パスがないため、`SourceFormat::Auto` はストリーミングXLSXリーダーとして扱われます。
    ///
    /// # 処理フロー
    ///
    /// 1. 行ソースを開く（セキュリティ検証を含む）
    /// 2. 対象シートを開く（範囲外なら `ScanError::SheetNotFound`）
    /// 3. 抽出ステージとワーカーを起動し、終了までjoinする
    ///
    /// ```rust,no_run
    /// use primescan::ScannerBuilder;
    /// use std::io::Cursor;
    ///
    /// # fn main() -> Result<(), primescan::ScanError> {
    /// let scanner = ScannerBuilder::new().build()?;
    /// let xlsx_data: Vec<u8> = vec![]; // XLSXファイルのバイト列
    /// let mut primes = Vec::new();
    /// scanner.scan(Cursor::new(xlsx_data), &mut primes)?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn scan<R, W>(&self, input: R, output: W) -> Result<ScanReport, ScanError>
    where
        R: Read + Seek,
        W: Write + Send,
    {
        self.scan_with_format(self.config.format.resolve(None), input, output)
    }

    /// ファイルパスを指定してスキャンする
    ///
    /// `SourceFormat::Auto` の場合は拡張子から行ソースを選択します。
    pub fn scan_path<P, W>(&self, path: P, output: W) -> Result<ScanReport, ScanError>
    where
        P: AsRef<Path>,
        W: Write + Send,
    {
        let path = path.as_ref();
        let format = self.config.format.resolve(Some(path));
        debug!(path = %path.display(), ?format, "Opening input file");

        let file = File::open(path)?;
        self.scan_with_format(format, file, output)
    }

    /// スキャン結果（素数の行）を文字列として返す
    pub fn scan_to_string<R: Read + Seek>(&self, input: R) -> Result<String, ScanError> {
        let mut buffer = Vec::new();
        self.scan(input, &mut buffer)?;

        let result = String::from_utf8(buffer)
            .map_err(|e| ScanError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;

        Ok(result)
    }

    /// 任意の行ソースをスキャンする
    ///
    /// ```rust
    /// use primescan::{MemoryRowSource, ScannerBuilder};
    ///
    /// # fn main() -> Result<(), primescan::ScanError> {
    /// let scanner = ScannerBuilder::new().with_seed(7).build()?;
    /// let mut source = MemoryRowSource::new().with_column(1, &[Some("7"), None, Some("8"), Some("13")]);
    ///
    /// let mut output = Vec::new();
    /// scanner.scan_rows(&mut source, &mut output)?;
    /// assert_eq!(output, b"7\n13\n");
    /// # Ok(())
    /// # }
    /// ```
    pub fn scan_rows<S, W>(&self, source: &mut S, output: W) -> Result<ScanReport, ScanError>
    where
        S: RowSource + ?Sized,
        W: Write + Send,
    {
        if self.cancellation.is_cancelled() {
            return Err(ScanError::Cancelled);
        }

        // シートが開けない場合はパイプラインを起動しない
        let rows = source.open_sheet(self.config.sheet_index)?;

        let result = pipeline::run(
            rows,
            self.config.data_column,
            self.primality(),
            &self.cancellation,
            output,
        );

        match &result {
            Ok(report) => info!(
                rows = report.extraction.rows_read,
                values = report.extraction.values_enqueued,
                blank = report.extraction.blank_cells,
                unparseable = report.worker.parse_failures,
                non_positive = report.worker.non_positive,
                primes = report.worker.primes_found,
                "Scan completed"
            ),
            Err(ScanError::Cancelled) => warn!("Scan cancelled"),
            Err(err) => debug!(error = %err, "Scan failed"),
        }

        result
    }

    fn scan_with_format<R, W>(
        &self,
        format: SourceFormat,
        input: R,
        output: W,
    ) -> Result<ScanReport, ScanError>
    where
        R: Read + Seek,
        W: Write + Send,
    {
        match format {
            SourceFormat::Calamine => {
                let mut source = CalamineRowSource::with_security(input, &self.config.security)?;
                self.scan_rows(&mut source, output)
            }
            _ => {
                let mut source = XlsxRowSource::with_security(input, &self.config.security)?;
                self.scan_rows(&mut source, output)
            }
        }
    }

    fn primality(&self) -> PrimalityTest {
        match self.config.seed {
            Some(seed) => PrimalityTest::with_seed(self.config.certainty, seed),
            None => PrimalityTest::new(self.config.certainty),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::PipelineState;
    use crate::source::{MemoryRowSource, RowIter, RowSource};
    use crate::types::Row;
    use std::io::Cursor;
    use std::time::Duration;

    /// 数行を返した後にパニックする行ソース
    struct FailingSource;

    impl RowSource for FailingSource {
        fn sheet_count(&self) -> usize {
            1
        }

        fn open_sheet(&mut self, _index: usize) -> Result<RowIter<'_>, ScanError> {
            Ok(Box::new((0u32..).map(|i| {
                if i == 2 {
                    panic!("sheet reader failed");
                }
                Ok(Row::from_cells(i, vec![(1, "5")]))
            })))
        }
    }

    #[test]
    fn test_scanner_builder_new() {
        let builder = ScannerBuilder::new();
        assert_eq!(builder.config.sheet_index, DEFAULT_SHEET_INDEX);
        assert_eq!(builder.config.data_column, DEFAULT_DATA_COLUMN);
        assert_eq!(builder.config.certainty, PRIME_CERTAINTY);
        assert_eq!(builder.config.seed, None);
        assert_eq!(builder.config.format, SourceFormat::Auto);
        assert_eq!(builder.config.security, SecurityConfig::default());
        assert!(builder.cancellation.is_none());
    }

    #[test]
    fn test_builder_method_chaining() {
        let builder = ScannerBuilder::new()
            .with_sheet_index(2)
            .with_data_column(0)
            .with_certainty(64)
            .with_seed(42)
            .with_format(SourceFormat::Calamine);

        assert_eq!(builder.config.sheet_index, 2);
        assert_eq!(builder.config.data_column, 0);
        assert_eq!(builder.config.certainty, 64);
        assert_eq!(builder.config.seed, Some(42));
        assert_eq!(builder.config.format, SourceFormat::Calamine);
    }

    #[test]
    fn test_build_success() {
        assert!(ScannerBuilder::new().build().is_ok());
        assert!(ScannerBuilder::new().with_certainty(1).build().is_ok());
        assert!(ScannerBuilder::new().with_certainty(256).build().is_ok());
    }

    #[test]
    fn test_build_with_invalid_certainty() {
        for certainty in [0, 257] {
            match ScannerBuilder::new().with_certainty(certainty).build() {
                Err(ScanError::Config(msg)) => assert!(msg.contains("Invalid certainty")),
                _ => panic!("Expected Config error"),
            }
        }
    }

    #[test]
    fn test_with_cancellation_shares_token() {
        let token = CancellationToken::new();
        let scanner = ScannerBuilder::new()
            .with_cancellation(token.clone())
            .build()
            .unwrap();

        token.cancel();
        assert!(scanner.cancellation_token().is_cancelled());
    }

    #[test]
    fn test_scan_rows_reads_configured_column() {
        let scanner = ScannerBuilder::new()
            .with_data_column(0)
            .with_seed(1)
            .build()
            .unwrap();
        let mut source = MemoryRowSource::new().with_column(0, &[Some("11"), Some("12"), None]);

        let mut output = Vec::new();
        let report = scanner.scan_rows(&mut source, &mut output).unwrap();

        assert_eq!(output, b"11\n");
        assert_eq!(report.extraction.rows_read, 3);
        assert_eq!(report.extraction.blank_cells, 1);
        assert_eq!(report.state, PipelineState::Stopped);
    }

    #[test]
    fn test_scan_rows_sheet_not_found() {
        let scanner = ScannerBuilder::new().with_sheet_index(1).build().unwrap();
        let mut source = MemoryRowSource::new().with_column(1, &[Some("2")]);

        let mut output = Vec::new();
        assert!(matches!(
            scanner.scan_rows(&mut source, &mut output),
            Err(ScanError::SheetNotFound {
                index: 1,
                available: 1
            })
        ));
        assert!(output.is_empty());
    }

    #[test]
    fn test_scan_rows_after_cancel() {
        let scanner = ScannerBuilder::new().build().unwrap();
        scanner.cancellation_token().cancel();

        let mut source = MemoryRowSource::new().with_column(1, &[Some("2")]);
        let mut output = Vec::new();
        assert!(matches!(
            scanner.scan_rows(&mut source, &mut output),
            Err(ScanError::Cancelled)
        ));
    }

    #[test]
    fn test_scan_rows_with_panicking_source_returns() {
        let (done_tx, done_rx) = crossbeam_channel::bounded(1);

        std::thread::spawn(move || {
            let scanner = ScannerBuilder::new().with_seed(1).build().unwrap();
            let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                let mut output = Vec::new();
                scanner.scan_rows(&mut FailingSource, &mut output)
            }));
            let _ = done_tx.send(outcome.is_err());
        });

        let panicked = done_rx
            .recv_timeout(Duration::from_secs(10))
            .expect("scan_rows did not return after the row source panicked");
        assert!(panicked);
    }

    #[test]
    fn test_scan_to_string_with_invalid_input() {
        let scanner = ScannerBuilder::new().build().unwrap();
        let result = scanner.scan_to_string(Cursor::new(Vec::new()));
        assert!(result.is_err());
    }

    #[test]
    fn test_scan_path_missing_file() {
        let scanner = ScannerBuilder::new().build().unwrap();
        let result = scanner.scan_path("definitely/missing/numbers.xlsx", Vec::new());
        assert!(matches!(result, Err(ScanError::Io(_))));
    }
}
