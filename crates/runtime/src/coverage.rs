//! Coverage reports: which source lines evaluation reached.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// An inclusive range of rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LineRange {
    pub start: Row,
    pub end: Row,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Row {
    pub row: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FileCoverage {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub covered: Vec<LineRange>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub not_covered: Vec<LineRange>,
    pub covered_lines: usize,
    pub not_covered_lines: usize,
    /// Percentage of relevant lines that were covered.
    pub coverage: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CoverageReport {
    pub files: BTreeMap<String, FileCoverage>,
    pub covered_lines: usize,
    pub not_covered_lines: usize,
    pub coverage: f64,
}

impl CoverageReport {
    /// Build a report from per-file covered and missed rows.
    pub fn from_files<I, C, N>(files: I) -> Self
    where
        I: IntoIterator<Item = (String, C, N)>,
        C: IntoIterator<Item = u32>,
        N: IntoIterator<Item = u32>,
    {
        let mut report = CoverageReport::default();
        for (name, covered, not_covered) in files {
            let covered: BTreeSet<u32> = covered.into_iter().collect();
            let not_covered: BTreeSet<u32> = not_covered
                .into_iter()
                .filter(|row| !covered.contains(row))
                .collect();
            let file = FileCoverage {
                covered: ranges(&covered),
                not_covered: ranges(&not_covered),
                covered_lines: covered.len(),
                not_covered_lines: not_covered.len(),
                coverage: percentage(covered.len(), not_covered.len()),
            };
            report.covered_lines += file.covered_lines;
            report.not_covered_lines += file.not_covered_lines;
            report.files.insert(name, file);
        }
        report.coverage = percentage(report.covered_lines, report.not_covered_lines);
        report
    }
}

fn percentage(covered: usize, not_covered: usize) -> f64 {
    let total = covered + not_covered;
    if total == 0 {
        0.0
    } else {
        covered as f64 * 100.0 / total as f64
    }
}

fn ranges(rows: &BTreeSet<u32>) -> Vec<LineRange> {
    let mut out: Vec<LineRange> = Vec::new();
    for &row in rows {
        match out.last_mut() {
            Some(range) if range.end.row + 1 == row => range.end.row = row,
            _ => out.push(LineRange {
                start: Row { row },
                end: Row { row },
            }),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contiguous_rows_collapse_into_ranges() {
        let report = CoverageReport::from_files([(
            "play.rego".to_string(),
            vec![3, 4, 5, 9],
            vec![7, 8],
        )]);
        let file = &report.files["play.rego"];
        let covered: Vec<_> = file.covered.iter().map(|r| (r.start.row, r.end.row)).collect();
        assert_eq!(covered, [(3, 5), (9, 9)]);
        assert_eq!(file.not_covered.len(), 1);
        assert_eq!(report.covered_lines, 4);
        assert_eq!(report.not_covered_lines, 2);
        assert!((report.coverage - 66.666).abs() < 0.01);
    }

    #[test]
    fn test_row_reported_both_ways_counts_as_covered() {
        let report = CoverageReport::from_files([("a.rego".to_string(), vec![1], vec![1, 2])]);
        assert_eq!(report.files["a.rego"].not_covered_lines, 1);
    }

    #[test]
    fn test_empty_report() {
        let report = CoverageReport::from_files(Vec::<(String, Vec<u32>, Vec<u32>)>::new());
        assert_eq!(report.coverage, 0.0);
        assert!(report.files.is_empty());
    }

    #[test]
    fn test_serialized_shape() {
        let report = CoverageReport::from_files([("a.rego".to_string(), vec![2], vec![])]);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["files"]["a.rego"]["covered"][0]["start"]["row"], 2);
        assert!(json["files"]["a.rego"].get("not_covered").is_none());
    }
}
