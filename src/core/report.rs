use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::ExitCode;

use crate::error::Result;
use super::call_site::{CallOrigin, ParseFailure};
use super::classifier::{ClassificationResult, Verdict};

/// Method name shown on records for files or blocks that failed to parse
pub const PARSE_ERROR_METHOD: &str = "<parse-error>";

/// Why a record is invalid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Reason {
    UnknownMethod,
    ArityMismatch,
    ShapeMismatch,
    ParseError,
}

impl Reason {
    fn from_verdict(verdict: Verdict) -> Option<Self> {
        match verdict {
            Verdict::Valid => None,
            Verdict::UnknownMethod => Some(Reason::UnknownMethod),
            Verdict::ArityMismatch => Some(Reason::ArityMismatch),
            Verdict::ShapeMismatch => Some(Reason::ShapeMismatch),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRecord {
    pub file: String,
    pub line: usize,
    pub column: usize,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub origin: Option<CallOrigin>,
    pub method: String,
    pub arg_count: usize,
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub reason: Option<Reason>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "is_false", default)]
    pub dynamic: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Forward slashes regardless of platform, so reports compare across machines
fn display_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

impl ReportRecord {
    fn from_result(result: ClassificationResult) -> Self {
        let valid = result.is_valid();
        let site = result.call_site;
        Self {
            file: display_path(&site.file),
            line: site.line,
            column: site.column,
            origin: Some(site.origin),
            method: site.method.to_string(),
            arg_count: site.argument_count,
            valid,
            reason: Reason::from_verdict(result.verdict),
            detail: result.detail,
            dynamic: result.dynamic,
        }
    }

    fn from_failure(failure: ParseFailure) -> Self {
        Self {
            file: display_path(&failure.file),
            line: failure.line,
            column: failure.column,
            origin: None,
            method: PARSE_ERROR_METHOD.to_string(),
            arg_count: 0,
            valid: false,
            reason: Some(Reason::ParseError),
            detail: Some(failure.message),
            dynamic: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub total_calls: usize,
    pub invalid: usize,
    pub unknown_methods: usize,
    pub arity_mismatches: usize,
    pub shape_mismatches: usize,
    pub parse_errors: usize,
    pub files_scanned: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub summary: Summary,
    pub records: Vec<ReportRecord>,
}

/// Classified results and parse failures for one scanned file
#[derive(Debug, Clone, Default)]
pub struct FileOutcome {
    pub results: Vec<ClassificationResult>,
    pub failures: Vec<ParseFailure>,
}

/// Accumulates per-file outcomes in any order and produces a sorted report
#[derive(Debug, Default)]
pub struct ReportBuilder {
    records: Vec<ReportRecord>,
    files_scanned: usize,
}

impl ReportBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, outcome: FileOutcome) {
        self.files_scanned += 1;
        self.records
            .extend(outcome.results.into_iter().map(ReportRecord::from_result));
        self.records
            .extend(outcome.failures.into_iter().map(ReportRecord::from_failure));
    }

    pub fn finish(mut self) -> ValidationReport {
        // Stable sort keeps discovery order for identical positions
        self.records
            .sort_by(|a, b| (&a.file, a.line, a.column).cmp(&(&b.file, b.line, b.column)));

        let mut summary = Summary {
            files_scanned: self.files_scanned,
            ..Summary::default()
        };

        for record in &self.records {
            if record.reason != Some(Reason::ParseError) {
                summary.total_calls += 1;
            }
            if !record.valid {
                summary.invalid += 1;
            }
            match record.reason {
                Some(Reason::UnknownMethod) => summary.unknown_methods += 1,
                Some(Reason::ArityMismatch) => summary.arity_mismatches += 1,
                Some(Reason::ShapeMismatch) => summary.shape_mismatches += 1,
                Some(Reason::ParseError) => summary.parse_errors += 1,
                None => {}
            }
        }

        ValidationReport {
            summary,
            records: self.records,
        }
    }
}

impl ValidationReport {
    pub fn passed(&self) -> bool {
        self.summary.invalid == 0
    }

    pub fn invalid_records(&self) -> impl Iterator<Item = &ReportRecord> {
        self.records.iter().filter(|record| !record.valid)
    }

    pub fn to_json(&self) -> Result<String> {
        let mut json = serde_json::to_string_pretty(self)?;
        json.push('\n');
        Ok(json)
    }

    /// Write the report as pretty JSON, creating parent directories
    pub fn persist<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// One-line human-readable summary
    pub fn summary_line(&self) -> String {
        let s = &self.summary;
        let status = if self.passed() { "PASS" } else { "FAIL" };
        format!(
            "{}: {} call(s) in {} file(s), {} invalid ({} unknown method, {} arity mismatch, {} shape mismatch, {} parse error)",
            status,
            s.total_calls,
            s.files_scanned,
            s.invalid,
            s.unknown_methods,
            s.arity_mismatches,
            s.shape_mismatches,
            s.parse_errors
        )
    }

    pub fn exit_code(&self) -> ExitCode {
        if self.passed() {
            ExitCode::SUCCESS
        } else {
            ExitCode::from(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::call_site::{CallSite, MethodName};
    use assert_fs::prelude::*;
    use assert_fs::TempDir;
    use predicates::prelude::*;
    use std::path::PathBuf;

    fn result(file: &str, line: usize, method: &str, verdict: Verdict) -> ClassificationResult {
        ClassificationResult {
            call_site: CallSite {
                file: PathBuf::from(file),
                line,
                column: 1,
                method: MethodName::Static(method.to_string()),
                argument_count: 1,
                first_argument: None,
                origin: CallOrigin::Code,
            },
            verdict,
            detail: None,
            dynamic: false,
        }
    }

    fn sample_outcomes() -> Vec<FileOutcome> {
        vec![
            FileOutcome {
                results: vec![
                    result("src/b.ts", 9, "foo", Verdict::UnknownMethod),
                    result("src/b.ts", 2, "get", Verdict::Valid),
                ],
                failures: vec![],
            },
            FileOutcome {
                results: vec![result("src/a.ts", 4, "get", Verdict::ArityMismatch)],
                failures: vec![ParseFailure::whole_file("src/a.ts", "syntax error")],
            },
        ]
    }

    fn build(outcomes: Vec<FileOutcome>) -> ValidationReport {
        let mut builder = ReportBuilder::new();
        for outcome in outcomes {
            builder.add(outcome);
        }
        builder.finish()
    }

    #[test]
    fn test_summary_counts() {
        let report = build(sample_outcomes());
        let summary = &report.summary;

        assert_eq!(summary.total_calls, 3);
        assert_eq!(summary.invalid, 3);
        assert_eq!(summary.unknown_methods, 1);
        assert_eq!(summary.arity_mismatches, 1);
        assert_eq!(summary.shape_mismatches, 0);
        assert_eq!(summary.parse_errors, 1);
        assert_eq!(summary.files_scanned, 2);
        assert!(!report.passed());
        assert_eq!(report.invalid_records().count(), 3);
    }

    #[test]
    fn test_records_sorted_by_file_then_position() {
        let report = build(sample_outcomes());
        let order: Vec<(String, usize)> = report
            .records
            .iter()
            .map(|r| (r.file.clone(), r.line))
            .collect();

        assert_eq!(
            order,
            vec![
                ("src/a.ts".to_string(), 1),
                ("src/a.ts".to_string(), 4),
                ("src/b.ts".to_string(), 2),
                ("src/b.ts".to_string(), 9),
            ]
        );
        assert_eq!(report.records[0].method, PARSE_ERROR_METHOD);
    }

    #[test]
    fn test_report_is_independent_of_arrival_order() {
        let mut reversed = sample_outcomes();
        reversed.reverse();
        assert_eq!(
            build(sample_outcomes()).to_json().unwrap(),
            build(reversed).to_json().unwrap()
        );
    }

    #[test]
    fn test_json_shape() {
        let mut outcomes = sample_outcomes();
        let mut dynamic = result("src/c.ts", 1, "x", Verdict::Valid);
        dynamic.call_site.method = MethodName::Dynamic;
        dynamic.dynamic = true;
        outcomes.push(FileOutcome {
            results: vec![dynamic],
            failures: vec![],
        });

        let json = build(outcomes).to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["summary"]["totalCalls"], 4);
        assert_eq!(value["summary"]["unknownMethods"], 1);
        assert_eq!(value["summary"]["arityMismatches"], 1);

        let records = value["records"].as_array().unwrap();
        assert_eq!(records[1]["reason"], "arity-mismatch");
        assert_eq!(records[1]["argCount"], 1);
        assert_eq!(records[2]["valid"], true);
        assert!(records[2].get("reason").is_none());
        assert!(records[2].get("dynamic").is_none());
        assert_eq!(records[4]["method"], "<dynamic>");
        assert_eq!(records[4]["dynamic"], true);
        assert_eq!(records[4]["origin"], "code");
    }

    #[test]
    fn test_empty_report_passes() {
        let report = ReportBuilder::new().finish();
        assert!(report.passed());
        assert_eq!(report.exit_code(), ExitCode::SUCCESS);
        assert!(report.summary_line().starts_with("PASS: 0 call(s)"));
    }

    #[test]
    fn test_persist_creates_parent_directories() {
        let temp = TempDir::new().unwrap();
        let target = temp.child("reports/nested/report.json");

        build(sample_outcomes()).persist(target.path()).unwrap();

        target.assert(predicate::path::exists());
        target.assert(predicate::str::contains("\"invalid\": 3"));
        target.assert(predicate::str::ends_with("}\n"));
    }
}
