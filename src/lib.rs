//! primescan - Stream a spreadsheet column and print the primes it contains
//!
//! This crate reads one column of one sheet from a spreadsheet file, hands every
//! non-blank cell to a background prime-check worker through an ordered queue, and
//! writes the values that are positive probable primes, one per line, in row order.
//!
//! Values are arbitrary-precision integers; primality is decided by trial division and
//! Miller-Rabin with a false-positive probability of at most `2^-k` (`k = 32` by default).
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use primescan::ScannerBuilder;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Column B of the first sheet (the defaults)
//!     let scanner = ScannerBuilder::new().build()?;
//!
//!     // Primes go to stdout, one per line
//!     scanner.scan_path("numbers.xlsx", std::io::stdout())?;
//!
//!     Ok(())
//! }
//! ```
//!
//! For in-memory input, use `Cursor`:
//!
//! ```rust,no_run
//! use std::io::Cursor;
//! use primescan::ScannerBuilder;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let scanner = ScannerBuilder::new().build()?;
//! let xlsx_data: Vec<u8> = vec![]; // Your XLSX file bytes
//! let primes = scanner.scan_to_string(Cursor::new(xlsx_data))?;
//! print!("{}", primes);
//! # Ok(())
//! # }
//! ```
//!
//! # Custom Configuration
//!
//! ```rust,no_run
//! use primescan::{ScannerBuilder, SourceFormat};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let scanner = ScannerBuilder::new()
//!         .with_sheet_index(1)                  // Second sheet
//!         .with_data_column(0)                  // Column A
//!         .with_certainty(64)                   // <= 2^-64 false positives
//!         .with_seed(2024)                      // Reproducible random bases
//!         .with_format(SourceFormat::Calamine)  // Force the calamine reader
//!         .build()?;
//!
//!     let report = scanner.scan_path("numbers.ods", std::io::stdout())?;
//!     eprintln!("{} rows, {} primes", report.extraction.rows_read, report.worker.primes_found);
//!
//!     Ok(())
//! }
//! ```
//!
//! # Cancellation
//!
//! ```rust,no_run
//! use primescan::{ScanError, ScannerBuilder};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let scanner = ScannerBuilder::new().build()?;
//! let token = scanner.cancellation_token();
//!
//! std::thread::spawn(move || {
//!     std::thread::sleep(std::time::Duration::from_secs(5));
//!     token.cancel();
//! });
//!
//! match scanner.scan_path("huge.xlsx", std::io::stdout()) {
//!     Err(ScanError::Cancelled) => eprintln!("stopped early"),
//!     other => { other?; }
//! }
//! # Ok(())
//! # }
//! ```

mod api;
mod builder;
mod candidate;
mod error;
mod pipeline;
mod primality;
mod security;
mod source;
mod types;

// 公開API
pub use api::{
    PipelineState, SourceFormat, DEFAULT_DATA_COLUMN, DEFAULT_SHEET_INDEX, PRIME_CERTAINTY,
};
pub use builder::{PrimeScanner, ScannerBuilder};
pub use candidate::{parse_candidate, Candidate, CandidateError};
pub use error::ScanError;
pub use pipeline::{CancellationToken, ExtractionStats, ScanReport, WorkerExit, WorkerStats};
pub use primality::PrimalityTest;
pub use security::SecurityConfig;
pub use source::{CalamineRowSource, MemoryRowSource, RowIter, RowSource, XlsxRowSource};
pub use types::Row;
