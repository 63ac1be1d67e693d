//! 協調的キャンセル

use crossbeam_channel::{Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// スキャン処理を外部から中断するためのトークン
///
/// クローンはすべて同じ状態を共有します。`cancel()` を呼ぶと、
/// 抽出ステージは次の行の前に、ワーカーはキュー待機中でも直ちに停止します。
///
/// ```rust
/// use primescan::CancellationToken;
///
/// let token = CancellationToken::new();
/// let handle = token.clone();
/// handle.cancel();
/// assert!(token.is_cancelled());
/// ```
#[derive(Debug, Clone)]
pub struct CancellationToken {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    cancelled: AtomicBool,
    // 送信側をドロップすると、すべての受信側が切断を観測する
    trigger: Mutex<Option<Sender<()>>>,
    signal: Receiver<()>,
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancellationToken {
    /// 未キャンセル状態のトークンを生成
    pub fn new() -> Self {
        let (trigger, signal) = crossbeam_channel::bounded(0);
        Self {
            inner: Arc::new(Inner {
                cancelled: AtomicBool::new(false),
                trigger: Mutex::new(Some(trigger)),
                signal,
            }),
        }
    }

    /// キャンセルを要求する（複数回呼んでも安全）
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        let mut trigger = match self.inner.trigger.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        trigger.take();
    }

    /// キャンセルが要求されたかどうか
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// `select!` で待機するための受信側
    ///
    /// キャンセル時に切断され、`recv` が即座にエラーを返すようになります。
    pub(crate) fn signal(&self) -> &Receiver<()> {
        &self.inner.signal
    }
}
