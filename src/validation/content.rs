use csv::{ReaderBuilder, StringRecord};
use serde::Serialize;
use std::collections::HashSet;
use std::io::Read;
use tracing::debug;

use crate::constants::{EXPECTED_COLUMNS, FIELD_COUNT};
use crate::status::StatusSink;
use crate::validation::record::{parse_dosage, parse_iso_date, parse_outcome, BusinessKey, ClinicalRecord};

/// Per-category row error counts; a row adds at most one to each category
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IssueTally {
    pub field_count: usize,
    pub missing_fields: usize,
    pub dosage: usize,
    pub date_range: usize,
    pub date_format: usize,
    pub outcome: usize,
    pub duplicate: usize,
}

impl IssueTally {
    fn labelled(&self) -> [(&'static str, usize); 7] {
        [
            ("Field count errors", self.field_count),
            ("Dosage errors", self.dosage),
            ("Date range errors", self.date_range),
            ("Date format errors", self.date_format),
            ("Outcome errors", self.outcome),
            ("Duplicates", self.duplicate),
            ("Missing fields", self.missing_fields),
        ]
    }
}

/// Verdict for one file's content
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub diagnostics: Vec<String>,
    /// Rows with no errors; reported for invalid files too
    pub valid_record_count: usize,
    pub rows_scanned: usize,
    pub issues: IssueTally,
}

impl ValidationResult {
    fn file_error(message: impl Into<String>) -> Self {
        Self {
            is_valid: false,
            diagnostics: vec![message.into()],
            valid_record_count: 0,
            rows_scanned: 0,
            issues: IssueTally::default(),
        }
    }
}

/// Validate a clinical data CSV stream.
///
/// Structural problems (unreadable or non UTF-8 input, empty file, header
/// mismatch, no data rows) abort immediately. Otherwise every row is checked
/// and all row diagnostics are collected before the verdict is returned.
pub fn validate_content<R: Read>(mut input: R, sink: Option<&dyn StatusSink>) -> ValidationResult {
    if let Some(s) = sink {
        s.info("  → Validating content...");
    }

    let mut bytes = Vec::new();
    if let Err(e) = input.read_to_end(&mut bytes) {
        return abort(sink, format!("File read error: {}", e));
    }
    let text = match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(_) => return abort(sink, "File is not valid UTF-8 encoded CSV"),
    };

    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());
    let mut records = reader.records();

    let header = match records.next() {
        None => return abort(sink, "File is empty"),
        Some(Err(e)) => return abort(sink, format!("File read error: {}", e)),
        Some(Ok(header)) => header,
    };

    if let Some(s) = sink {
        s.info("  → Checking header...");
    }
    if !header.iter().eq(EXPECTED_COLUMNS.iter().copied()) {
        if let Some(s) = sink {
            s.error("  ✗ Header mismatch");
        }
        return ValidationResult::file_error(format!(
            "Invalid header. Expected fields: {}",
            EXPECTED_COLUMNS.join(", ")
        ));
    }
    if let Some(s) = sink {
        s.success(&format!("  ✓ Header valid ({} fields)", header.len()));
        s.info("  → Validating rows...");
    }

    let rows: Vec<StringRecord> = match records.collect::<Result<_, _>>() {
        Ok(rows) => rows,
        Err(e) => return abort(sink, format!("File read error: {}", e)),
    };
    if rows.is_empty() {
        return abort(sink, "File contains no data rows");
    }

    let mut scan = RowScan::default();
    let mut lines = LineCounter::new(text.as_bytes());
    for (idx, row) in rows.iter().enumerate() {
        let line = row.position().map_or(idx as u64 + 2, |p| lines.line_at(p.byte()));
        scan.check_row(line, row);
    }

    if let Some(s) = sink {
        s.info("  → Checking duplicates...");
        s.info(&format!("  → Scanned {} rows", rows.len()));
        s.success(&format!("  → Valid records: {}", scan.valid));
        for (label, count) in scan.tally.labelled() {
            if count > 0 {
                s.error(&format!("    • {}: {}", label, count));
            }
        }
        s.info("  → Finalizing...");
    }
    debug!(rows = rows.len(), valid = scan.valid, errors = scan.diagnostics.len(), "content scan finished");

    ValidationResult {
        is_valid: scan.diagnostics.is_empty(),
        diagnostics: scan.diagnostics,
        valid_record_count: scan.valid,
        rows_scanned: rows.len(),
        issues: scan.tally,
    }
}

fn abort(sink: Option<&dyn StatusSink>, message: impl Into<String>) -> ValidationResult {
    let result = ValidationResult::file_error(message);
    if let Some(s) = sink {
        s.error(&format!("  ✗ {}", result.diagnostics[0]));
    }
    result
}

/// Maps record byte offsets to 1-based file lines; offsets must not decrease.
struct LineCounter<'a> {
    bytes: &'a [u8],
    offset: usize,
    line: u64,
}

impl<'a> LineCounter<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0, line: 1 }
    }

    // The reader may report a position before blank lines it skipped
    fn line_at(&mut self, byte: u64) -> u64 {
        let mut target = usize::try_from(byte).unwrap_or(usize::MAX).min(self.bytes.len());
        while target < self.bytes.len() && matches!(self.bytes[target], b'\r' | b'\n') {
            target += 1;
        }
        if target > self.offset {
            self.line += self.bytes[self.offset..target].iter().filter(|&&b| b == b'\n').count() as u64;
            self.offset = target;
        }
        self.line
    }
}

#[derive(Default)]
struct RowScan {
    seen: HashSet<BusinessKey>,
    diagnostics: Vec<String>,
    tally: IssueTally,
    valid: usize,
}

impl RowScan {
    fn check_row(&mut self, row_number: u64, row: &StringRecord) {
        let fields: Vec<&str> = row.iter().collect();
        let Some(record) = ClinicalRecord::from_fields(&fields) else {
            self.tally.field_count += 1;
            self.diagnostics.push(format!(
                "Row {}: Expected {} fields, got {}",
                row_number,
                FIELD_COUNT,
                fields.len()
            ));
            return;
        };

        let mut errors: Vec<String> = Vec::new();

        if record.has_missing_field() {
            self.tally.missing_fields += 1;
            errors.push("Missing required fields".to_string());
        }

        if let Err(e) = parse_dosage(record.dosage_mg) {
            self.tally.dosage += 1;
            errors.push(e.to_string());
        }

        match (parse_iso_date(record.start_date), parse_iso_date(record.end_date)) {
            (Ok(start), Ok(end)) => {
                if end < start {
                    self.tally.date_range += 1;
                    errors.push(format!(
                        "EndDate ({}) before StartDate ({})",
                        record.end_date, record.start_date
                    ));
                }
            }
            _ => {
                self.tally.date_format += 1;
                errors.push("Invalid date format (expected YYYY-MM-DD)".to_string());
            }
        }

        if let Err(e) = parse_outcome(record.outcome) {
            self.tally.outcome += 1;
            errors.push(e.to_string());
        }

        // The first occurrence claims the key whether or not it is clean
        if !self.seen.insert(record.business_key()) {
            self.tally.duplicate += 1;
            errors.push("Duplicate record".to_string());
        }

        if errors.is_empty() {
            self.valid += 1;
        } else {
            self.diagnostics
                .push(format!("Row {}: {}", row_number, errors.join("; ")));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::StatusBuffer;

    const HEADER: &str = "PatientID,TrialCode,DrugCode,Dosage_mg,StartDate,EndDate,Outcome,SideEffects,Analyst";

    fn csv_of(rows: &[&str]) -> String {
        let mut s = String::from(HEADER);
        for row in rows {
            s.push('\n');
            s.push_str(row);
        }
        s.push('\n');
        s
    }

    fn run(text: &str) -> ValidationResult {
        validate_content(text.as_bytes(), None)
    }

    #[test]
    fn test_single_valid_row() {
        let result = run(&csv_of(&["P1,T1,D1,10,2024-01-01,2024-01-02,Improved,None,A"]));
        assert!(result.is_valid);
        assert!(result.diagnostics.is_empty());
        assert_eq!(result.valid_record_count, 1);
        assert_eq!(result.rows_scanned, 1);
    }

    #[test]
    fn test_many_valid_rows() {
        let rows: Vec<String> = (0..25)
            .map(|i| format!("P{i},T1,D1,{},2024-01-01,2024-03-01,No Change,Headache,Dr. Smith", i + 1))
            .collect();
        let refs: Vec<&str> = rows.iter().map(String::as_str).collect();
        let result = run(&csv_of(&refs));
        assert_eq!((result.is_valid, result.valid_record_count), (true, 25));
    }

    #[test]
    fn test_empty_stream() {
        let result = run("");
        assert!(!result.is_valid);
        assert_eq!(result.valid_record_count, 0);
        assert!(result.diagnostics[0].contains("empty"));
    }

    #[test]
    fn test_header_only() {
        let result = run(HEADER);
        assert!(!result.is_valid);
        assert_eq!(result.valid_record_count, 0);
        assert_eq!(result.diagnostics.len(), 1);
        assert!(result.diagnostics[0].contains("no data rows"));
    }

    #[test]
    fn test_header_mismatch_skips_row_scan() {
        let text = "PatientID,TrialCode,DrugCode,Dosage,StartDate,EndDate,Outcome,SideEffects,Analyst\n\
                    P1,T1,D1,abc,bad,bad,Nope,,\n";
        let result = run(text);
        assert!(!result.is_valid);
        assert_eq!(result.diagnostics.len(), 1);
        assert!(result.diagnostics[0].starts_with("Invalid header"));
        assert!(result.diagnostics[0].contains("Dosage_mg"));
        assert_eq!(result.rows_scanned, 0);
    }

    #[test]
    fn test_reordered_header_is_mismatch() {
        let text = "TrialCode,PatientID,DrugCode,Dosage_mg,StartDate,EndDate,Outcome,SideEffects,Analyst\n\
                    T1,P1,D1,10,2024-01-01,2024-01-02,Improved,None,A\n";
        assert!(run(text).diagnostics[0].starts_with("Invalid header"));
    }

    #[test]
    fn test_invalid_utf8() {
        let mut bytes = csv_of(&["P1,T1,D1,10,2024-01-01,2024-01-02,Improved,None,A"]).into_bytes();
        bytes.extend_from_slice(&[0xff, 0xfe, b'\n']);
        let result = validate_content(bytes.as_slice(), None);
        assert!(!result.is_valid);
        assert_eq!(result.valid_record_count, 0);
        assert!(result.diagnostics[0].contains("UTF-8"));
    }

    #[test]
    fn test_bad_dosage() {
        let result = run(&csv_of(&[
            "P1,T1,D1,-5,2024-01-01,2024-01-02,Improved,None,A",
            "P2,T1,D1,abc,2024-01-01,2024-01-02,Improved,None,A",
            "P3,T1,D1,5,2024-01-01,2024-01-02,Improved,None,A",
        ]));
        assert!(!result.is_valid);
        assert_eq!(result.valid_record_count, 1);
        assert_eq!(result.diagnostics.len(), 2);
        assert!(result.diagnostics[0].starts_with("Row 2:"));
        assert!(result.diagnostics[0].contains("Dosage must be positive"));
        assert!(result.diagnostics[1].starts_with("Row 3:"));
        assert!(result.diagnostics[1].contains("Non-numeric dosage"));
        assert_eq!(result.issues.dosage, 2);
    }

    #[test]
    fn test_end_before_start() {
        let result = run(&csv_of(&["P1,T1,D1,10,2024-02-01,2024-01-01,Improved,None,A"]));
        assert!(!result.is_valid);
        assert!(result.diagnostics[0].contains("EndDate (2024-01-01) before StartDate (2024-02-01)"));
        assert_eq!(result.issues.date_range, 1);
        assert_eq!(result.issues.date_format, 0);
    }

    #[test]
    fn test_unparseable_date_suppresses_ordering_check() {
        let result = run(&csv_of(&["P1,T1,D1,10,2024-13-01,2024-01-01,Improved,None,A"]));
        assert!(result.diagnostics[0].contains("Invalid date format"));
        assert!(!result.diagnostics[0].contains("before StartDate"));
        assert_eq!(result.issues.date_range, 0);
        assert_eq!(result.issues.date_format, 1);
    }

    #[test]
    fn test_outcome_and_missing_fields_combine() {
        let result = run(&csv_of(&["P1,T1,D1,10,2024-01-01,2024-01-02,improved,,A"]));
        assert_eq!(result.diagnostics.len(), 1);
        assert_eq!(
            result.diagnostics[0],
            "Row 2: Missing required fields; Invalid outcome 'improved'"
        );
    }

    #[test]
    fn test_wrong_field_count() {
        let result = run(&csv_of(&[
            "P1,T1,D1,10,2024-01-01",
            "P2,T1,D1,10,2024-01-01,2024-01-02,Worsened,Rash,B",
        ]));
        assert_eq!(result.diagnostics, vec!["Row 2: Expected 9 fields, got 5".to_string()]);
        assert_eq!(result.valid_record_count, 1);
        assert_eq!(result.issues.field_count, 1);
    }

    #[test]
    fn test_duplicate_flagged_after_first() {
        let result = run(&csv_of(&[
            "P1,T1,D1,10,2024-01-01,2024-01-02,Improved,None,A",
            "P1,T1,D1,20,2024-02-01,2024-02-02,Worsened,Rash,B",
        ]));
        assert!(!result.is_valid);
        assert_eq!(result.valid_record_count, 1);
        assert_eq!(result.diagnostics, vec!["Row 3: Duplicate record".to_string()]);
    }

    #[test]
    fn test_dirty_first_occurrence_still_claims_key() {
        let result = run(&csv_of(&[
            "P1,T1,D1,0,2024-01-01,2024-01-02,Improved,None,A",
            "P1,T1,D1,20,2024-02-01,2024-02-02,Worsened,Rash,B",
        ]));
        assert_eq!(result.valid_record_count, 0);
        assert_eq!(result.diagnostics.len(), 2);
        assert!(result.diagnostics[1].ends_with("Duplicate record"));
    }

    #[test]
    fn test_key_parts_do_not_collide() {
        let result = run(&csv_of(&[
            "A_B,C,D1,10,2024-01-01,2024-01-02,Improved,None,A",
            "A,B_C,D1,10,2024-01-01,2024-01-02,Improved,None,A",
        ]));
        assert!(result.is_valid);
        assert_eq!(result.valid_record_count, 2);
    }

    #[test]
    fn test_row_numbers_follow_file_lines() {
        let text = format!(
            "{HEADER}\nP1,T1,D1,10,2024-01-01,2024-01-02,Improved,None,A\n\nP2,T1,D1,x,2024-01-01,2024-01-02,Improved,None,A\n"
        );
        assert_eq!(run(&text).diagnostics, vec!["Row 4: Non-numeric dosage: 'x'".to_string()]);

        let text = format!(
            "{HEADER}\nP1,T1,D1,10,2024-01-01,2024-01-02,Improved,\"Rash\nthen fever\",A\nP2,T1,D1,x,2024-01-01,2024-01-02,Improved,None,A\n"
        );
        let result = run(&text);
        assert_eq!(result.valid_record_count, 1);
        assert_eq!(result.diagnostics, vec!["Row 4: Non-numeric dosage: 'x'".to_string()]);

        let text = format!(
            "{HEADER}\r\n\r\n\r\nP1,T1,D1,0,2024-01-01,2024-01-02,Improved,None,A\r\n"
        );
        assert!(run(&text).diagnostics[0].starts_with("Row 4: Dosage must be positive"));
    }

    #[test]
    fn test_padded_or_signed_dates_rejected() {
        let result = run(&csv_of(&[
            "P1,T1,D1,10, 2024-01-01,2024-01-02,Improved,None,A",
            "P2,T1,D1,10,+2024-01-01,2024-01-02,Improved,None,A",
        ]));
        assert_eq!(result.valid_record_count, 0);
        assert_eq!(result.issues.date_format, 2);
    }

    #[test]
    fn test_quoted_fields() {
        let result = run(&csv_of(&[
            r#"P1,T1,D1,10,2024-01-01,2024-01-02,No Change,"Nausea, mild",A"#,
        ]));
        assert!(result.is_valid);
    }

    #[test]
    fn test_sink_reports_stages_and_tallies() {
        let sink = StatusBuffer::new();
        let text = csv_of(&[
            "P1,T1,D1,10,2024-01-01,2024-01-02,Improved,None,A",
            "P1,T1,D1,x,2024-01-01,2024-01-02,Improved,None,A",
        ]);
        let result = validate_content(text.as_bytes(), Some(&sink));
        assert!(!result.is_valid);

        let messages = sink.messages();
        assert!(messages.iter().any(|m| m.contains("Header valid (9 fields)")));
        assert!(messages.iter().any(|m| m.contains("Scanned 2 rows")));
        assert!(messages.iter().any(|m| m.contains("Valid records: 1")));
        assert!(messages.iter().any(|m| m.contains("Dosage errors: 1")));
        assert!(messages.iter().any(|m| m.contains("Duplicates: 1")));
        assert!(!messages.iter().any(|m| m.contains("Outcome errors")));
    }
}
