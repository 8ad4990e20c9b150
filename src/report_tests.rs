// src/report_tests.rs

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use crate::cell::grid_from_delimited;
    use crate::grid_extract::CodeTotal;
    use crate::mapping::purpose_map;
    use crate::report::*;
    use crate::timesheet::{apply_purpose_mapping, parse_timesheet, Billability, TimeEntry};

    fn entry(employee: &str, hours: f64, billability: Option<Billability>) -> TimeEntry {
        TimeEntry {
            employee: employee.to_string(),
            sub_project: String::new(),
            hours,
            purpose: None,
            billability,
        }
    }

    #[test]
    fn rounding_helper() {
        assert_eq!(round_to(1.005, 2), 1.0); // 1.005 is stored slightly below
        assert_eq!(round_to(2.675000001, 2), 2.68);
        assert_eq!(round_to(33.333333, 1), 33.3);
    }

    #[test]
    fn summary_aggregates_per_employee() {
        let entries = vec![
            entry("Anna", 3.5, Some(Billability::External)),
            entry("Anna", 1.5, Some(Billability::Internal)),
            entry("Ben", 8.0, Some(Billability::External)),
        ];
        let summary = summarize_by_employee(&entries);
        assert_eq!(summary.len(), 2);

        let anna = &summary[0];
        assert_eq!(anna.employee, "Anna");
        assert_eq!(anna.internal_hours, 1.5);
        assert_eq!(anna.external_hours, 3.5);
        assert_eq!(anna.total_hours, 5.0);
        assert_eq!(anna.pct_internal, 30.0);
        assert_eq!(anna.pct_external, 70.0);

        let ben = &summary[1];
        assert_eq!(ben.pct_internal, 0.0);
        assert_eq!(ben.pct_external, 100.0);
    }

    #[test]
    fn percentages_sum_to_one_hundred() {
        let entries = vec![
            entry("Anna", 1.0, Some(Billability::Internal)),
            entry("Anna", 2.0, Some(Billability::External)),
        ];
        let summary = summarize_by_employee(&entries);
        let sum = summary[0].pct_internal + summary[0].pct_external;
        assert!((sum - 100.0).abs() < 0.2, "shares sum to {}", sum);
    }

    #[test]
    fn zero_total_hours_yield_zero_percentages() {
        let entries = vec![
            entry("Anna", 0.0, Some(Billability::Internal)),
            entry("Anna", 0.0, Some(Billability::External)),
        ];
        let summary = summarize_by_employee(&entries);
        assert_eq!(summary.len(), 1);
        assert_eq!(summary[0].total_hours, 0.0);
        assert_eq!(summary[0].pct_internal, 0.0);
        assert_eq!(summary[0].pct_external, 0.0);
    }

    #[test]
    fn unknown_and_unmapped_entries_do_not_count() {
        let entries = vec![
            entry("Anna", 4.0, Some(Billability::Unknown)),
            entry("Anna", 4.0, None),
        ];
        // Anna has no classified hours at all, so she has no summary row.
        assert!(summarize_by_employee(&entries).is_empty());
    }

    #[test]
    fn full_pipeline_from_raw_export_to_summary() {
        let g = grid_from_delimited(
            "Mitarbeiter;Unterprojekt;Stunden\n\
             Anna;Projekt X - 12_Analysis;3,5\n\
             Anna;Projekt X - 20_Meeting;1.5\n",
        )
        .unwrap();
        let mut entries = parse_timesheet(&g).unwrap();

        let rows = vec![
            crate::mapping::PurposeMapping {
                purpose: "Analysis".to_string(),
                billability: Billability::External,
            },
            crate::mapping::PurposeMapping {
                purpose: "Meeting".to_string(),
                billability: Billability::Internal,
            },
        ];
        apply_purpose_mapping(&mut entries, &purpose_map(&rows));

        let summary = summarize_by_employee(&entries);
        assert_eq!(summary.len(), 1);
        assert_eq!(summary[0].total_hours, 5.0);
        assert_eq!(summary[0].pct_internal, 30.0);
        assert_eq!(summary[0].pct_external, 70.0);
    }

    #[test]
    fn reconcile_joins_hours_against_billing_targets() {
        let entries = vec![
            entry("Martina Muster", 40.0, Some(Billability::External)),
            entry("Martina Muster", 4.0, Some(Billability::External)),
            entry("Martina Muster", 10.0, Some(Billability::Internal)),
        ];
        let codes = HashMap::from([("Martina Muster".to_string(), "PL".to_string())]);
        let billing = vec![CodeTotal { code: "PL".to_string(), total: 6.0 }];

        let rows = reconcile(&entries, &codes, &billing, 8.0);
        assert_eq!(rows.len(), 1);
        let row = &rows[0];
        assert_eq!(row.code.as_deref(), Some("PL"));
        assert_eq!(row.external_hours, 44.0); // internal hours do not count
        assert_eq!(row.actual_days, 5.5);
        assert_eq!(row.target_days, 6.0);
        assert_eq!(row.variance, -0.5);
    }

    #[test]
    fn employees_without_a_code_surface_with_zero_target() {
        let entries = vec![entry("Neu Person", 8.0, Some(Billability::External))];
        let rows = reconcile(&entries, &HashMap::new(), &[], 8.0);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].code, None);
        assert_eq!(rows[0].target_days, 0.0);
        assert_eq!(rows[0].variance, 1.0);
    }

    #[test]
    fn mapped_code_without_billing_row_counts_as_zero_target() {
        let entries = vec![entry("Anna", 16.0, Some(Billability::External))];
        let codes = HashMap::from([("Anna".to_string(), "AN".to_string())]);
        let billing = vec![CodeTotal { code: "PL".to_string(), total: 3.0 }];
        let rows = reconcile(&entries, &codes, &billing, 8.0);
        assert_eq!(rows[0].code.as_deref(), Some("AN"));
        assert_eq!(rows[0].target_days, 0.0);
        assert_eq!(rows[0].variance, 2.0);
    }

    #[test]
    fn nonpositive_hours_per_day_falls_back_to_one() {
        let entries = vec![entry("Anna", 3.0, Some(Billability::External))];
        let rows = reconcile(&entries, &HashMap::new(), &[], 0.0);
        assert_eq!(rows[0].actual_days, 3.0);
    }
}
