//! Pipeline Queue
//!
//! 抽出ステージとワーカーの間の、順序を保持する無制限キュー。
//! 単一の生産者と単一の消費者で使用します。

use crossbeam_channel::{select, Receiver, Sender};

use super::cancel::CancellationToken;
use crate::error::ScanError;

/// キューを流れる要素
///
/// 終了マーカーは専用のバリアントなので、どんなセル値とも衝突しません。
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum QueueItem {
    /// 空でない生のセル値（トリム前）
    Data(String),
    /// これ以上データが来ないことを示す終了マーカー
    Terminate,
}

/// `take()` の結果
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Taken {
    /// キューから取り出した要素
    Item(QueueItem),
    /// 待機中にキャンセルされた
    Cancelled,
    /// 生産者が終了マーカーを送らずに消えた
    Disconnected,
}

/// 無制限キューを生成し、生産者側と消費者側を返す
pub(crate) fn pipeline_queue(
    cancel: CancellationToken,
) -> (QueueProducer, QueueConsumer) {
    let (tx, rx) = crossbeam_channel::unbounded();
    (
        QueueProducer {
            tx,
            cancel: cancel.clone(),
        },
        QueueConsumer { rx, cancel },
    )
}

/// キューの生産者側
#[derive(Debug)]
pub(crate) struct QueueProducer {
    tx: Sender<QueueItem>,
    cancel: CancellationToken,
}

impl QueueProducer {
    /// 生のセル値を投入する
    ///
    /// 消費者がすでに終了している場合は `QueueClosed` を返し、
    /// 投入できなかった値をエラーに保持します。
    pub fn put(&self, value: String) -> Result<(), ScanError> {
        if self.cancel.is_cancelled() {
            return Err(ScanError::Cancelled);
        }

        self.tx
            .send(QueueItem::Data(value))
            .map_err(|err| match err.into_inner() {
                QueueItem::Data(pending) => ScanError::QueueClosed { pending },
                QueueItem::Terminate => ScanError::QueueClosed {
                    pending: String::new(),
                },
            })
    }

    /// 終了マーカーを投入する
    ///
    /// 消費者がすでに終了している場合は何もしません。
    pub fn terminate(&self) -> bool {
        self.tx.send(QueueItem::Terminate).is_ok()
    }
}

/// キューの消費者側
#[derive(Debug)]
pub(crate) struct QueueConsumer {
    rx: Receiver<QueueItem>,
    cancel: CancellationToken,
}

impl QueueConsumer {
    /// 要素が届くか、キャンセルされるまで待機する
    pub fn take(&self) -> Taken {
        if self.cancel.is_cancelled() {
            return Taken::Cancelled;
        }

        select! {
            recv(self.rx) -> msg => match msg {
                Ok(item) => Taken::Item(item),
                Err(_) => Taken::Disconnected,
            },
            recv(self.cancel.signal()) -> _ => Taken::Cancelled,
        }
    }
}
