use chrono::NaiveDate;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::constants::DATE_FORMAT;

/// One data row of a clinical data file, borrowed from the CSV record.
#[derive(Debug, Clone, Copy)]
pub struct ClinicalRecord<'a> {
    pub patient_id: &'a str,
    pub trial_code: &'a str,
    pub drug_code: &'a str,
    pub dosage_mg: &'a str,
    pub start_date: &'a str,
    pub end_date: &'a str,
    pub outcome: &'a str,
    pub side_effects: &'a str,
    pub analyst: &'a str,
}

impl<'a> ClinicalRecord<'a> {
    /// Build from exactly nine fields; any other count yields `None`.
    pub fn from_fields(fields: &[&'a str]) -> Option<Self> {
        match *fields {
            [patient_id, trial_code, drug_code, dosage_mg, start_date, end_date, outcome, side_effects, analyst] => {
                Some(Self {
                    patient_id,
                    trial_code,
                    drug_code,
                    dosage_mg,
                    start_date,
                    end_date,
                    outcome,
                    side_effects,
                    analyst,
                })
            }
            _ => None,
        }
    }

    pub fn fields(&self) -> [&'a str; 9] {
        [
            self.patient_id,
            self.trial_code,
            self.drug_code,
            self.dosage_mg,
            self.start_date,
            self.end_date,
            self.outcome,
            self.side_effects,
            self.analyst,
        ]
    }

    pub fn has_missing_field(&self) -> bool {
        self.fields().iter().any(|f| f.is_empty())
    }

    pub fn business_key(&self) -> BusinessKey {
        BusinessKey {
            patient_id: self.patient_id.to_string(),
            trial_code: self.trial_code.to_string(),
            drug_code: self.drug_code.to_string(),
        }
    }
}

/// PatientID + TrialCode + DrugCode; identifies a record within one file
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BusinessKey {
    pub patient_id: String,
    pub trial_code: String,
    pub drug_code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DosageError {
    #[error("Non-numeric dosage: '{0}'")]
    NotInteger(String),
    #[error("Dosage must be positive integer, got '{0}'")]
    NotPositive(String),
    #[error("Dosage out of range: '{0}'")]
    OutOfRange(String),
}

/// Dosage in milligrams; surrounding whitespace and a leading sign are tolerated.
pub fn parse_dosage(raw: &str) -> Result<u64, DosageError> {
    let trimmed = raw.trim();
    let (negative, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(DosageError::NotInteger(raw.to_string()));
    }
    if negative || digits.bytes().all(|b| b == b'0') {
        return Err(DosageError::NotPositive(raw.to_string()));
    }
    digits
        .parse()
        .map_err(|_| DosageError::OutOfRange(raw.to_string()))
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid date '{0}' (expected YYYY-MM-DD)")]
pub struct DateError(pub String);

/// Strict `YYYY-MM-DD`: no padding, sign or short fields.
pub fn parse_iso_date(raw: &str) -> Result<NaiveDate, DateError> {
    let shape_ok = raw.len() == 10
        && raw.bytes().enumerate().all(|(i, b)| match i {
            4 | 7 => b == b'-',
            _ => b.is_ascii_digit(),
        });
    if !shape_ok {
        return Err(DateError(raw.to_string()));
    }
    NaiveDate::parse_from_str(raw, DATE_FORMAT).map_err(|_| DateError(raw.to_string()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Improved,
    NoChange,
    Worsened,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Improved => "Improved",
            Outcome::NoChange => "No Change",
            Outcome::Worsened => "Worsened",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid outcome '{0}'")]
pub struct OutcomeError(pub String);

impl FromStr for Outcome {
    type Err = OutcomeError;

    // Case-sensitive: "improved" is rejected
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Improved" => Ok(Outcome::Improved),
            "No Change" => Ok(Outcome::NoChange),
            "Worsened" => Ok(Outcome::Worsened),
            other => Err(OutcomeError(other.to_string())),
        }
    }
}

pub fn parse_outcome(raw: &str) -> Result<Outcome, OutcomeError> {
    raw.parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dosage() {
        assert_eq!(parse_dosage("10"), Ok(10));
        assert_eq!(parse_dosage(" 250 "), Ok(250));
        assert_eq!(parse_dosage("-5"), Err(DosageError::NotPositive("-5".to_string())));
        assert_eq!(parse_dosage("0"), Err(DosageError::NotPositive("0".to_string())));
        assert_eq!(parse_dosage("abc"), Err(DosageError::NotInteger("abc".to_string())));
        assert_eq!(parse_dosage("2.5"), Err(DosageError::NotInteger("2.5".to_string())));
        assert_eq!(parse_dosage(""), Err(DosageError::NotInteger(String::new())));
        assert_eq!(parse_dosage("+7"), Ok(7));
        assert_eq!(parse_dosage("-0"), Err(DosageError::NotPositive("-0".to_string())));
        assert_eq!(parse_dosage("1 0"), Err(DosageError::NotInteger("1 0".to_string())));
        assert_eq!(parse_dosage("-"), Err(DosageError::NotInteger("-".to_string())));
    }

    #[test]
    fn test_parse_dosage_large_values() {
        assert_eq!(parse_dosage("9223372036854775808"), Ok(9_223_372_036_854_775_808));
        assert_eq!(
            parse_dosage("99999999999999999999"),
            Err(DosageError::OutOfRange("99999999999999999999".to_string()))
        );
        assert_eq!(
            parse_dosage("-99999999999999999999"),
            Err(DosageError::NotPositive("-99999999999999999999".to_string()))
        );
    }

    #[test]
    fn test_parse_iso_date() {
        assert_eq!(
            parse_iso_date("2024-02-29"),
            Ok(NaiveDate::from_ymd_opt(2024, 2, 29).unwrap())
        );
        assert!(parse_iso_date("2023-02-29").is_err());
        assert!(parse_iso_date("01/02/2024").is_err());
        assert!(parse_iso_date("2024-01-01T00:00:00").is_err());
        assert!(parse_iso_date(" 2024-01-01").is_err());
        assert!(parse_iso_date("+2024-01-01").is_err());
        assert!(parse_iso_date("2024-1-01").is_err());
        assert!(parse_iso_date("2024-01-1 ").is_err());
        assert!(parse_iso_date("２０２４-01-01").is_err());
    }

    #[test]
    fn test_parse_outcome_is_case_sensitive() {
        assert_eq!(parse_outcome("No Change"), Ok(Outcome::NoChange));
        assert_eq!(parse_outcome("Worsened").map(|o| o.to_string()), Ok("Worsened".to_string()));
        assert!(parse_outcome("improved").is_err());
        assert!(parse_outcome("No change").is_err());
    }

    #[test]
    fn test_record_from_fields() {
        let fields = ["P1", "T1", "D1", "10", "2024-01-01", "2024-01-02", "Improved", "", "A"];
        let record = ClinicalRecord::from_fields(&fields).unwrap();
        assert!(record.has_missing_field());
        assert_eq!(record.business_key().patient_id, "P1");
        assert!(ClinicalRecord::from_fields(&fields[..8]).is_none());
    }
}
