//! Boundary Tests for primescan
//!
//! 行数・列位置・値の大きさの境界と、出力順序の性質を検証します。

use primescan::{MemoryRowSource, Row, ScannerBuilder};
use proptest::prelude::*;
use rust_xlsxwriter::*;
use std::io::Cursor;

/// 2^521 - 1 (メルセンヌ素数)
const M521: &str = "6864797660130609714981900799081393217269435300143305409394463459185543183397656052122559640661454554977296311391480858037121987999716643812574028291115057151";

/// (2^89 - 1) * (2^61 - 1)
const MERSENNE_SEMIPRIME: &str = "1427247692705959880439315947500961989719490561";

fn is_prime_naive(n: u64) -> bool {
    if n < 2 {
        return false;
    }
    let mut d = 2;
    while d * d <= n {
        if n % d == 0 {
            return false;
        }
        d += 1;
    }
    true
}

fn scan_memory(values: &[Option<String>]) -> String {
    let scanner = ScannerBuilder::new().with_seed(99).build().unwrap();
    let mut source = MemoryRowSource::new().with_column(1, values);
    let mut output = Vec::new();
    scanner.scan_rows(&mut source, &mut output).unwrap();
    String::from_utf8(output).unwrap()
}

/// 0..10_000 の連番をB列に並べたシート
#[test]
fn test_ten_thousand_rows() {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    for i in 0..10_000u32 {
        worksheet.write_number(i, 1, i).unwrap();
    }
    let data = workbook.save_to_buffer().unwrap();

    let scanner = ScannerBuilder::new().build().unwrap();
    let mut output = Vec::new();
    let report = scanner.scan(Cursor::new(data), &mut output).unwrap();
    let output = String::from_utf8(output).unwrap();

    let lines: Vec<&str> = output.lines().collect();
    assert_eq!(lines.len(), 1229);
    assert_eq!(lines.first(), Some(&"2"));
    assert_eq!(lines.last(), Some(&"9973"));
    assert_eq!(report.extraction.rows_read, 10_000);
    assert_eq!(report.worker.non_positive, 1);
}

/// 行が飛び飛びでも行番号順に出力される
#[test]
fn test_sparse_rows() {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.write_string(0, 1, "3").unwrap();
    worksheet.write_string(50_000, 1, "5").unwrap();
    worksheet.write_string(1_048_575, 1, "7").unwrap();
    let data = workbook.save_to_buffer().unwrap();

    let scanner = ScannerBuilder::new().build().unwrap();
    let mut output = Vec::new();
    let report = scanner.scan(Cursor::new(data), &mut output).unwrap();

    assert_eq!(output, b"3\n5\n7\n");
    assert_eq!(report.extraction.rows_read, 3);
}

/// 最終列（XFD）をデータ列として読む
#[test]
fn test_last_column() {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.write_string(0, 16_383, "101").unwrap();
    worksheet.write_string(1, 1, "103").unwrap();
    let data = workbook.save_to_buffer().unwrap();

    let output = ScannerBuilder::new()
        .with_data_column(16_383)
        .build()
        .unwrap()
        .scan_to_string(Cursor::new(data))
        .unwrap();
    assert_eq!(output, "101\n");
}

#[test]
fn test_very_large_values() {
    let values = vec![
        Some(M521.to_string()),
        Some(MERSENNE_SEMIPRIME.to_string()),
        Some(format!("-{}", M521)),
        Some(format!("000{}", M521)),
    ];
    let output = scan_memory(&values);
    assert_eq!(output, format!("{}\n000{}\n", M521, M521));
}

#[test]
fn test_whitespace_is_trimmed_in_output() {
    let values = vec![
        Some("\t17".to_string()),
        Some("19\r\n".to_string()),
        Some(" \n ".to_string()),
        Some("  23  ".to_string()),
    ];
    assert_eq!(scan_memory(&values), "17\n19\n23\n");
}

#[test]
fn test_rows_without_data_column() {
    let scanner = ScannerBuilder::new().build().unwrap();
    let mut source = MemoryRowSource::new().with_sheet(vec![
        Row::from_cells(0, vec![(0, "2"), (2, "3")]),
        Row::new(1),
        Row::from_cells(2, vec![(1, "5")]),
    ]);

    let mut output = Vec::new();
    let report = scanner.scan_rows(&mut source, &mut output).unwrap();

    assert_eq!(output, b"5\n");
    assert_eq!(report.extraction.blank_cells, 2);
    assert_eq!(report.extraction.values_enqueued, 1);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// 出力は「正の素数である値」を入力順に並べたものと一致する
    #[test]
    fn prop_output_matches_filtered_input(values in prop::collection::vec(
        prop_oneof![
            (0u64..200_000).prop_map(|n| Some(n.to_string())),
            (1u64..1000).prop_map(|n| Some(format!("-{}", n))),
            "[a-z_]{1,8}".prop_map(Some),
            Just(None),
            Just(Some("   ".to_string())),
        ],
        0..64,
    )) {
        let expected: String = values
            .iter()
            .flatten()
            .filter(|v| v.parse::<u64>().map(is_prime_naive).unwrap_or(false))
            .map(|v| format!("{}\n", v))
            .collect();

        prop_assert_eq!(scan_memory(&values), expected);
    }
}
