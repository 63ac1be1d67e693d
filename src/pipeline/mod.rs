//! Pipeline Module
//!
//! 抽出ステージ（呼び出し元スレッド）と素数判定ワーカー（専用スレッド）を
//! 無制限キューでつなぐ2段パイプラインと、その終了プロトコルを実装します。
//!
//! ```text
//! RowSource ──▶ extract::run ──▶ PipelineQueue ──▶ PrimeCheckWorker ──▶ Output
//!              (caller thread)                    (prime-check-worker)
//! ```
//!
//! 終了プロトコル: `Running -> Draining -> Stopped`。抽出が成功しても失敗しても、
//! 終了マーカーを必ず1回だけ投入し、ワーカーをjoinしてから戻ります。

mod cancel;
mod extract;
mod queue;
mod worker;

pub use cancel::CancellationToken;
pub use extract::ExtractionStats;
pub use worker::{WorkerExit, WorkerStats};

use std::io::Write;
use std::thread;
use tracing::debug;

use crate::api::PipelineState;
use crate::error::ScanError;
use crate::primality::PrimalityTest;
use crate::types::Row;
use queue::{pipeline_queue, QueueProducer};
use worker::{PrimeCheckWorker, WORKER_NAME};

/// 1回のスキャンの結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanReport {
    /// 抽出ステージの集計
    pub extraction: ExtractionStats,
    /// ワーカーの集計
    pub worker: WorkerStats,
    /// 終了時のパイプライン状態（正常終了時は常に `Stopped`）
    pub state: PipelineState,
}

/// 終了プロトコルの状態遷移を記録する
#[derive(Debug)]
struct Protocol {
    state: PipelineState,
}

impl Protocol {
    fn new() -> Self {
        debug!(state = ?PipelineState::Running, "Pipeline started");
        Self {
            state: PipelineState::Running,
        }
    }

    fn advance(&mut self, next: PipelineState) {
        debug_assert!(matches!(
            (self.state, next),
            (PipelineState::Running, PipelineState::Draining)
                | (PipelineState::Draining, PipelineState::Stopped)
        ));
        debug!(from = ?self.state, to = ?next, "Pipeline state transition");
        self.state = next;
    }
}

/// スコープを抜ける時に終了マーカーを投入するガード
///
/// 抽出ステージがパニックした場合も、巻き戻しの途中でマーカーが投入されるため、
/// ワーカーは `take()` で待ち続けずに終了し、スコープのjoinが完了します。
struct TerminationGuard<'a> {
    producer: &'a QueueProducer,
    armed: bool,
}

impl<'a> TerminationGuard<'a> {
    fn new(producer: &'a QueueProducer) -> Self {
        Self {
            producer,
            armed: true,
        }
    }

    /// 通常経路で終了マーカーを投入する
    ///
    /// ワーカーがすでに終了していた場合は `false` を返します。
    fn terminate(mut self) -> bool {
        self.armed = false;
        self.producer.terminate()
    }
}

impl Drop for TerminationGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            debug!("Extraction unwound, enqueueing the termination marker");
            self.producer.terminate();
        }
    }
}

/// 行のシーケンスをパイプラインに流し、素数を `output` に書き込む
///
/// * 抽出は呼び出し元スレッドで、判定は `prime-check-worker` スレッドで実行します。
/// * 行ソースのエラーやキャンセルで抽出が止まっても、終了マーカーを投入して
///   ワーカーをjoinしてから、最初の原因となったエラーを返します。
/// * 抽出中のパニックでもマーカーは投入され、ワーカーをjoinした後に
///   パニックが呼び出し元へ伝播します。
/// * スコープ付きスレッドを使用するため、ワーカーが取り残されることはありません。
pub(crate) fn run<I, W>(
    rows: I,
    column: u32,
    primality: PrimalityTest,
    cancel: &CancellationToken,
    output: W,
) -> Result<ScanReport, ScanError>
where
    I: IntoIterator<Item = Result<Row, ScanError>>,
    W: Write + Send,
{
    let mut protocol = Protocol::new();

    thread::scope(|scope| {
        let (producer, consumer) = pipeline_queue(cancel.clone());
        let worker = thread::Builder::new()
            .name(WORKER_NAME.to_string())
            .spawn_scoped(scope, move || {
                PrimeCheckWorker::new(primality).run(&consumer, output)
            })?;

        let guard = TerminationGuard::new(&producer);
        let extraction = extract::run(rows, column, &producer, cancel);

        if !guard.terminate() {
            debug!("Worker exited before the termination marker was enqueued");
        }
        protocol.advance(PipelineState::Draining);

        let joined = worker.join();
        protocol.advance(PipelineState::Stopped);

        let worker_result = joined.map_err(|panic| {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            ScanError::WorkerPanicked(message)
        })?;

        let (extraction, (exit, worker_stats)) = match (extraction, worker_result) {
            // 投入失敗はワーカー側のエラーが根本原因
            (Err(ScanError::QueueClosed { .. }), Err(worker_err)) => return Err(worker_err),
            (Err(err), _) => return Err(err),
            (Ok(_), Err(worker_err)) => return Err(worker_err),
            (Ok(extraction), Ok(worker)) => (extraction, worker),
        };

        if exit == WorkerExit::Cancelled {
            return Err(ScanError::Cancelled);
        }

        Ok(ScanReport {
            extraction,
            worker: worker_stats,
            state: protocol.state,
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::PRIME_CERTAINTY;
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn column_rows(values: &[&str]) -> Vec<Result<Row, ScanError>> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| Ok(Row::from_cells(i as u32, vec![(1, *v)])))
            .collect()
    }

    fn scan(values: &[&str]) -> (String, ScanReport) {
        let mut output = Vec::new();
        let report = run(
            column_rows(values),
            1,
            PrimalityTest::with_seed(PRIME_CERTAINTY, 3),
            &CancellationToken::new(),
            &mut output,
        )
        .unwrap();
        (String::from_utf8(output).unwrap(), report)
    }

    #[test]
    fn test_pipeline_outputs_primes_in_order() {
        let (output, report) = scan(&["7", "__STOP__", "8", "13", " 2 ", "-5"]);
        assert_eq!(output, "7\n13\n2\n");
        assert_eq!(report.state, PipelineState::Stopped);
        assert_eq!(report.extraction.values_enqueued, 6);
        assert_eq!(report.worker.values_received, 6);
        assert_eq!(report.worker.parse_failures, 1);
        assert_eq!(report.worker.non_positive, 1);
        assert_eq!(report.worker.primes_found, 3);
    }

    #[test]
    fn test_pipeline_empty_input() {
        let (output, report) = scan(&[]);
        assert!(output.is_empty());
        assert_eq!(report.extraction.rows_read, 0);
        assert_eq!(report.state, PipelineState::Stopped);
    }

    #[test]
    fn test_row_source_error_still_drains_worker() {
        let mut rows = column_rows(&["3", "5"]);
        rows.push(Err(ScanError::Format("truncated sheet".to_string())));
        rows.extend(column_rows(&["7"]));

        let mut output = Vec::new();
        let result = run(
            rows,
            1,
            PrimalityTest::with_seed(PRIME_CERTAINTY, 3),
            &CancellationToken::new(),
            &mut output,
        );

        assert!(matches!(result, Err(ScanError::Format(_))));
        // エラー前に投入された値は処理され、フラッシュされている
        assert_eq!(output, b"3\n5\n");
    }

    #[test]
    fn test_write_failure_is_reported() {
        struct BrokenPipe;
        impl Write for BrokenPipe {
            fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
                Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
            }
            fn flush(&mut self) -> io::Result<()> {
                Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
            }
        }

        let result = run(
            column_rows(&["2", "3"]),
            1,
            PrimalityTest::with_seed(PRIME_CERTAINTY, 3),
            &CancellationToken::new(),
            BrokenPipe,
        );
        assert!(matches!(result, Err(ScanError::Io(_))));
    }

    #[test]
    fn test_cancel_during_extraction() {
        let token = CancellationToken::new();
        let seen = Arc::new(AtomicUsize::new(0));

        let trigger = token.clone();
        let counter = Arc::clone(&seen);
        let rows = (0u32..).map(move |i| {
            if counter.fetch_add(1, Ordering::SeqCst) == 10 {
                trigger.cancel();
            }
            Ok(Row::from_cells(i, vec![(1, "7")]))
        });

        let mut output = Vec::new();
        let result = run(
            rows,
            1,
            PrimalityTest::with_seed(PRIME_CERTAINTY, 3),
            &token,
            &mut output,
        );

        assert!(matches!(result, Err(ScanError::Cancelled)));
        assert!(seen.load(Ordering::SeqCst) <= 12);
    }

    #[test]
    fn test_extraction_panic_does_not_deadlock() {
        let (done_tx, done_rx) = crossbeam_channel::bounded(1);

        std::thread::spawn(move || {
            let rows = (0u32..).map(|i| {
                if i == 3 {
                    panic!("row source failed");
                }
                Ok(Row::from_cells(i, vec![(1, "7")]))
            });
            let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                run(
                    rows,
                    1,
                    PrimalityTest::with_seed(PRIME_CERTAINTY, 3),
                    &CancellationToken::new(),
                    Vec::new(),
                )
            }));
            let _ = done_tx.send(outcome.is_err());
        });

        let panicked = done_rx
            .recv_timeout(Duration::from_secs(10))
            .expect("pipeline did not finish after the extraction panic");
        assert!(panicked);
    }

    #[test]
    fn test_repeated_runs_are_identical() {
        let values = [
            "5645657", "15619", "1234187", "211", "7", "9788677", "23311", "54881", "2147483647",
        ];
        let (first, _) = scan(&values);
        let (second, _) = scan(&values);
        assert_eq!(first, second);
        assert_eq!(first.lines().count(), 9);
    }
}
