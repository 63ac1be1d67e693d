//! Prime-Check Worker
//!
//! キューから生のセル値を取り出し、正の素数だけを出力先へ書き込む。

use std::io::{BufWriter, Write};
use tracing::{debug, warn};

use super::queue::{QueueConsumer, QueueItem, Taken};
use crate::candidate::{parse_candidate, Candidate};
use crate::error::ScanError;
use crate::primality::PrimalityTest;

/// ワーカースレッドの名前
pub(crate) const WORKER_NAME: &str = "prime-check-worker";

/// ワーカーループの終了理由
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    /// 終了マーカーを受け取った（通常終了）
    Terminated,
    /// キュー待機中にキャンセルされた
    Cancelled,
    /// 生産者が終了マーカーを送らずに消えた
    Disconnected,
}

/// ワーカーの集計
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    /// 受け取ったデータ値の数
    pub values_received: u64,
    /// 整数として解析できなかった値の数
    pub parse_failures: u64,
    /// 0または負の値の数
    pub non_positive: u64,
    /// 出力した素数の数
    pub primes_found: u64,
}

/// 1つの値を判定した結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Verdict {
    Prime,
    Composite,
    NonPositive,
    Unparseable,
}

/// 素数判定ワーカー
pub(crate) struct PrimeCheckWorker {
    primality: PrimalityTest,
    stats: WorkerStats,
}

impl PrimeCheckWorker {
    pub fn new(primality: PrimalityTest) -> Self {
        Self {
            primality,
            stats: WorkerStats::default(),
        }
    }

    /// 終了マーカーまたはキャンセルまでキューを消費する
    ///
    /// 終了理由にかかわらず、戻る前に出力バッファをフラッシュします。
    /// 書き込みエラーが発生した場合はループを止めてエラーを返します。
    pub fn run<W: Write>(
        mut self,
        queue: &QueueConsumer,
        output: W,
    ) -> Result<(WorkerExit, WorkerStats), ScanError> {
        let mut writer = BufWriter::new(output);

        let exit = self.consume(queue, &mut writer);
        let flushed = writer.flush();

        let exit = exit?;
        flushed?;
        Ok((exit, self.stats))
    }

    fn consume<W: Write>(
        &mut self,
        queue: &QueueConsumer,
        writer: &mut W,
    ) -> Result<WorkerExit, ScanError> {
        loop {
            let raw = match queue.take() {
                Taken::Item(QueueItem::Data(raw)) => raw,
                Taken::Item(QueueItem::Terminate) => return Ok(WorkerExit::Terminated),
                Taken::Cancelled => {
                    debug!("Interrupted while waiting for queue item");
                    return Ok(WorkerExit::Cancelled);
                }
                Taken::Disconnected => {
                    warn!("Queue producer disconnected without termination marker");
                    return Ok(WorkerExit::Disconnected);
                }
            };

            let value = raw.trim();
            if self.check(value) == Verdict::Prime {
                writeln!(writer, "{}", value)?;
            }
        }
    }

    /// トリム済みの値を判定し、集計を更新する
    pub(crate) fn check(&mut self, value: &str) -> Verdict {
        self.stats.values_received += 1;

        let verdict = match parse_candidate(value) {
            Err(err) => {
                debug!(value, error = %err, "Failed to parse number");
                Verdict::Unparseable
            }
            Ok(Candidate::NonPositive) => Verdict::NonPositive,
            Ok(Candidate::Positive(n)) => {
                if self.primality.is_probable_prime(&n) {
                    Verdict::Prime
                } else {
                    Verdict::Composite
                }
            }
        };

        match verdict {
            Verdict::Prime => self.stats.primes_found += 1,
            Verdict::NonPositive => self.stats.non_positive += 1,
            Verdict::Unparseable => self.stats.parse_failures += 1,
            Verdict::Composite => {}
        }
        verdict
    }
}
