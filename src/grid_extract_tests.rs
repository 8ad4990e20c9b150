// src/grid_extract_tests.rs

#[cfg(test)]
mod tests {
    use crate::cell::{CellValue, Grid};
    use crate::grid_extract::*;

    fn row(cells: &[&str]) -> Vec<CellValue> {
        cells.iter().map(|c| CellValue::from_raw(c)).collect()
    }

    fn cfg(min_code_tokens: usize) -> ExtractConfig {
        ExtractConfig {
            min_code_tokens,
            ..ExtractConfig::default()
        }
    }

    #[test]
    fn code_token_rules() {
        assert_eq!(code_token(&CellValue::from_raw("PL"), 3), Some("PL"));
        assert_eq!(code_token(&CellValue::from_raw(" ABC "), 3), Some("ABC"));
        assert_eq!(code_token(&CellValue::from_raw("A"), 3), Some("A"));
        // Too long, mixed case, digits, numbers and empties do not qualify.
        assert_eq!(code_token(&CellValue::from_raw("ABCD"), 3), None);
        assert_eq!(code_token(&CellValue::from_raw("Pl"), 3), None);
        assert_eq!(code_token(&CellValue::from_raw("A1"), 3), None);
        assert_eq!(code_token(&CellValue::from_raw("12"), 3), None);
        assert_eq!(code_token(&CellValue::Empty, 3), None);
    }

    #[test]
    fn longest_run_picks_the_contiguous_block() {
        assert_eq!(longest_run(&[1, 2, 3, 7, 8, 9, 10]), vec![7, 8, 9, 10]);
        assert_eq!(longest_run(&[4]), vec![4]);
        assert_eq!(longest_run(&[]), Vec::<usize>::new());
    }

    #[test]
    fn longest_run_tie_breaks_towards_the_first() {
        assert_eq!(longest_run(&[1, 2, 5, 6]), vec![1, 2]);
    }

    #[test]
    fn no_header_is_a_typed_failure() {
        let grid: Grid = vec![
            row(&["Bericht Januar", ""]),
            row(&["Erstellt am", "01.02.2025"]),
        ];
        match extract_billing_codes(&grid, &ExtractConfig::default()) {
            Err(ExtractError::NoHeaderFound { scanned, min_tokens }) => {
                assert_eq!(scanned, 2);
                assert_eq!(min_tokens, DEFAULT_MIN_CODE_TOKENS);
            }
            other => panic!("expected NoHeaderFound, got {:?}", other),
        }
    }

    #[test]
    fn header_beyond_the_scan_limit_is_not_found() {
        let mut grid: Grid = Vec::new();
        for _ in 0..5 {
            grid.push(row(&["Vorspann", ""]));
        }
        grid.push(row(&["", "AA", "BB", "CC", "DD", "EE"]));
        let cfg = ExtractConfig {
            header_scan_limit: 3,
            ..ExtractConfig::default()
        };
        assert!(matches!(
            extract_billing_codes(&grid, &cfg),
            Err(ExtractError::NoHeaderFound { .. })
        ));
    }

    #[test]
    fn extraction_finds_header_sums_and_stops_at_section_marker() {
        // Ten cover rows, then the code table, then a trailing section that
        // must not leak into the totals.
        let mut grid: Grid = Vec::new();
        for i in 0..10 {
            let label = format!("Vorspann {}", i);
            grid.push(row(&[label.as_str(), ""]));
        }
        grid.push(row(&["", "PL", "AB", "CD"])); // row 10
        grid.push(row(&["KW 1", "2,5", "1", "0"])); // row 11
        for _ in 0..3 {
            grid.push(row(&["", "", "", ""]));
        }
        grid.push(row(&["KW 2", "3,5", "2", "1"])); // row 15
        for _ in 0..4 {
            grid.push(row(&["", "", "", ""]));
        }
        grid.push(row(&["Team Gesamt", "99", "99", "99"])); // row 20
        grid.push(row(&["", "123", "123", "123"]));

        let extract = extract_billing_codes(&grid, &cfg(3)).unwrap();
        assert_eq!(extract.header_row, 10);
        assert_eq!(extract.data_start, 11);
        assert_eq!(extract.data_end, 20);
        assert_eq!(
            extract.totals,
            vec![
                CodeTotal { code: "PL".to_string(), total: 6.0 },
                CodeTotal { code: "AB".to_string(), total: 3.0 },
                CodeTotal { code: "CD".to_string(), total: 1.0 },
            ]
        );
    }

    #[test]
    fn stray_code_tokens_outside_the_block_are_discarded() {
        let grid: Grid = vec![
            row(&["Name", "PL", "AB", "CD", "", "ZZ"]),
            row(&["", "1", "2", "3", "", "100"]),
        ];
        let extract = extract_billing_codes(&grid, &cfg(3)).unwrap();
        let codes: Vec<&str> = extract.totals.iter().map(|t| t.code.as_str()).collect();
        assert_eq!(codes, vec!["PL", "AB", "CD"]);
    }

    #[test]
    fn repeated_codes_are_deduplicated_by_summation() {
        let grid: Grid = vec![
            row(&["", "PL", "PL", "AB"]),
            row(&["", "1", "2", "4"]),
        ];
        let extract = extract_columns_manual(&grid, 0, &[1, 2, 3], &ExtractConfig::default()).unwrap();
        assert_eq!(
            extract.totals,
            vec![
                CodeTotal { code: "PL".to_string(), total: 3.0 },
                CodeTotal { code: "AB".to_string(), total: 4.0 },
            ]
        );
    }

    #[test]
    fn unparseable_cells_count_as_zero() {
        let grid: Grid = vec![
            row(&["", "PL", "AB", "CD"]),
            row(&["", "k.A.", "-", "1.234,56"]),
            row(&["", "1", "1", "1"]),
        ];
        let extract = extract_billing_codes(&grid, &cfg(3)).unwrap();
        assert_eq!(extract.totals[0].total, 1.0); // "k.A." -> 0
        assert_eq!(extract.totals[1].total, 1.0); // "-" -> 0.0
        assert_eq!(extract.totals[2].total, 1235.56); // locale number parses
    }

    #[test]
    fn manual_extraction_rejects_out_of_range_header() {
        let grid: Grid = vec![row(&["a", "b"])];
        match extract_columns_manual(&grid, 5, &[0], &ExtractConfig::default()) {
            Err(ExtractError::HeaderOutOfRange { header_row, rows }) => {
                assert_eq!(header_row, 5);
                assert_eq!(rows, 1);
            }
            other => panic!("expected HeaderOutOfRange, got {:?}", other),
        }
    }

    #[test]
    fn manual_extraction_still_honors_stop_phrases() {
        let grid: Grid = vec![
            row(&["", "Spalte"]),
            row(&["", "2"]),
            row(&["gesamtergebnis", ""]),
            row(&["", "40"]),
        ];
        let extract = extract_columns_manual(&grid, 0, &[1], &ExtractConfig::default()).unwrap();
        assert_eq!(extract.data_end, 2);
        assert_eq!(extract.totals[0].total, 2.0);
    }
}
