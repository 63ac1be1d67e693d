//! Public API Types
//!
//! 公開APIで使用する列挙型と定数を定義するモジュール。

/// データ列のデフォルトインデックス（0始まり、つまり2列目）
pub const DEFAULT_DATA_COLUMN: u32 = 1;

/// 対象シートのデフォルトインデックス（0始まり、つまり最初のシート）
pub const DEFAULT_SHEET_INDEX: usize = 0;

/// 素数判定の確実性パラメータ `k`
///
/// 合成数を素数と誤判定する確率は `2^-k` 以下です。
/// `k = 32` の場合、誤判定は約43億回に1回以下となります。
/// 素数を合成数と誤判定すること（偽陰性）はありません。
pub const PRIME_CERTAINTY: u32 = 32;

/// 入力コンテナの形式
///
/// 行ソースの実装を選択するために使用します。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[non_exhaustive]
pub enum SourceFormat {
    /// ファイル拡張子から自動判定（デフォルト）
    ///
    /// `.xls` / `.xlsb` / `.ods` は calamine、それ以外はストリーミングXLSXリーダーを使用します。
    #[default]
    Auto,

    /// ストリーミングXLSXリーダー（zip + quick-xml）
    ///
    /// シートXMLを1行ずつ読み込むため、大きなシートでもメモリ使用量が一定です。
    Xlsx,

    /// calamineによる読み込み（`.xls` / `.xlsb` / `.ods` / `.xlsx`）
    ///
    /// シート全体をメモリに展開してから行を列挙します。
    Calamine,
}

impl SourceFormat {
    /// ファイル拡張子から形式を判定する
    ///
    /// `Auto`以外の値に対してはそのまま自身を返します。
    pub fn resolve(self, path: Option<&std::path::Path>) -> SourceFormat {
        if self != SourceFormat::Auto {
            return self;
        }

        let extension = path
            .and_then(|p| p.extension())
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase());

        match extension.as_deref() {
            Some("xls") | Some("xlsb") | Some("ods") => SourceFormat::Calamine,
            _ => SourceFormat::Xlsx,
        }
    }
}

/// パイプラインの終了プロトコルの状態
///
/// 状態は `Running -> Draining -> Stopped` の順にのみ遷移します。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    /// 抽出ステージが行を読み込み、ワーカーが値を消費している
    Running,

    /// 終了マーカーを投入済みで、ワーカーの終了を待っている
    Draining,

    /// ワーカーが終了マーカーを受け取り（またはキャンセルされ）、joinされた
    Stopped,
}
