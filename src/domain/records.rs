//! Input record schema
//!
//! Raw records arrive as loosely typed JSON. They pass through two explicit
//! phases: [`validate_records`] checks every record against the schema and
//! collects all failures, then [`build_observations`] maps the validated
//! payloads onto the domain types.

use super::compressor::{
    CapacityControl, CompressorObservation, CompressorSpecification, Refrigerant, Technology,
    ABSOLUTE_ZERO_C,
};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use thiserror::Error;
use validator::{Validate, ValidationError, ValidationErrors, ValidationErrorsKind};

/// Field reported when a record cannot be decoded at all
pub const RECORD_FIELD: &str = "<record>";

/// Specification block of an input record, before enum coercion
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RawSpecification {
    #[validate(length(min = 1))]
    pub model: String,
    #[validate(custom(function = "validate_technology"))]
    pub technology: String,
    #[validate(custom(function = "validate_refrigerant"))]
    pub refrigerant: String,
    #[validate(custom(function = "validate_capacity_control"))]
    pub capacity_control: String,
}

/// One input record as found in the input file
// Evaporator temperature and power carry no range rule; see DESIGN.md.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RawObservation {
    #[validate(nested)]
    pub specs: RawSpecification,
    #[validate(range(min = -273.15))]
    pub condenser_temp: f64,
    pub evaporator_temp: f64,
    pub power: f64,
}

/// A single schema violation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldFailure {
    /// Position of the offending record in the input batch
    pub index: usize,
    /// Dotted path of the field, e.g. `specs.refrigerant`
    pub field: String,
    pub message: String,
}

impl fmt::Display for FieldFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "record {}: {}: {}", self.index, self.field, self.message)
    }
}

/// The batch was rejected; carries every field-level failure
#[derive(Debug, Clone, Error)]
#[error("{} invalid field(s) in input records: {}", .failures.len(), summarize(.failures))]
pub struct RecordValidationError {
    pub failures: Vec<FieldFailure>,
}

fn summarize(failures: &[FieldFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

fn one_of(code: &'static str, value: &str, allowed: &[&str]) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(Cow::Owned(format!(
        "'{}' is not one of: {}",
        value,
        allowed.join(", ")
    )));
    err
}

fn validate_technology(value: &str) -> Result<(), ValidationError> {
    value.parse::<Technology>().map(|_| ()).map_err(|_| {
        let allowed = Technology::ALL.map(|t| t.as_str());
        one_of("technology", value, &allowed)
    })
}

fn validate_refrigerant(value: &str) -> Result<(), ValidationError> {
    value.parse::<Refrigerant>().map(|_| ()).map_err(|_| {
        let allowed = Refrigerant::ALL.map(|r| r.as_str());
        one_of("refrigerant", value, &allowed)
    })
}

fn validate_capacity_control(value: &str) -> Result<(), ValidationError> {
    value.parse::<CapacityControl>().map(|_| ()).map_err(|_| {
        let allowed = CapacityControl::ALL.map(|c| c.as_str());
        one_of("capacity_control", value, &allowed)
    })
}

fn describe(error: &ValidationError) -> String {
    if let Some(message) = &error.message {
        return message.to_string();
    }
    match error.params.get("min") {
        Some(min) => format!("{} (min {})", error.code, min),
        None => error.code.to_string(),
    }
}

fn flatten(index: usize, prefix: &str, errors: &ValidationErrors, out: &mut Vec<FieldFailure>) {
    for (field, kind) in errors.errors() {
        let path = if prefix.is_empty() {
            field.to_string()
        } else {
            format!("{}.{}", prefix, field)
        };
        match kind {
            ValidationErrorsKind::Field(list) => {
                out.extend(list.iter().map(|e| FieldFailure {
                    index,
                    field: path.clone(),
                    message: describe(e),
                }));
            }
            ValidationErrorsKind::Struct(inner) => flatten(index, &path, inner, out),
            ValidationErrorsKind::List(items) => {
                for (i, inner) in items {
                    flatten(index, &format!("{}[{}]", path, i), inner, out);
                }
            }
        }
    }
}

/// Validate a batch of raw JSON records.
///
/// Every record is decoded and checked; the batch is rejected as a whole if
/// any record fails, and the error lists all failures sorted by record and
/// field.
pub fn validate_records(
    values: Vec<serde_json::Value>,
) -> Result<Vec<RawObservation>, RecordValidationError> {
    let mut failures = Vec::new();
    let mut records = Vec::with_capacity(values.len());

    for (index, value) in values.into_iter().enumerate() {
        let record: RawObservation = match serde_json::from_value(value) {
            Ok(record) => record,
            Err(e) => {
                failures.push(FieldFailure {
                    index,
                    field: RECORD_FIELD.to_string(),
                    message: e.to_string(),
                });
                continue;
            }
        };

        if let Err(errors) = record.validate() {
            let start = failures.len();
            flatten(index, "", &errors, &mut failures);
            failures[start..].sort_by(|a, b| a.field.cmp(&b.field));
            continue;
        }

        records.push(record);
    }

    if failures.is_empty() {
        Ok(records)
    } else {
        Err(RecordValidationError { failures })
    }
}

impl TryFrom<RawSpecification> for CompressorSpecification {
    type Error = FieldFailure;

    fn try_from(raw: RawSpecification) -> Result<Self, Self::Error> {
        let failure = |field: &str, message: String| FieldFailure {
            index: 0,
            field: format!("specs.{}", field),
            message,
        };
        Ok(Self {
            technology: raw
                .technology
                .parse()
                .map_err(|e| failure("technology", e))?,
            refrigerant: raw
                .refrigerant
                .parse()
                .map_err(|e| failure("refrigerant", e))?,
            capacity_control: raw
                .capacity_control
                .parse()
                .map_err(|e| failure("capacity_control", e))?,
            model: raw.model,
        })
    }
}

impl TryFrom<RawObservation> for CompressorObservation {
    type Error = FieldFailure;

    fn try_from(raw: RawObservation) -> Result<Self, Self::Error> {
        if raw.condenser_temp < ABSOLUTE_ZERO_C {
            return Err(FieldFailure {
                index: 0,
                field: "condenser_temp".to_string(),
                message: format!("{} is below absolute zero", raw.condenser_temp),
            });
        }
        Ok(Self {
            specs: raw.specs.try_into()?,
            condenser_temp_c: raw.condenser_temp,
            evaporator_temp_c: raw.evaporator_temp,
            power: raw.power,
        })
    }
}

/// Map validated records onto domain observations, preserving order.
pub fn build_observations(
    records: Vec<RawObservation>,
) -> Result<Vec<CompressorObservation>, RecordValidationError> {
    let mut failures = Vec::new();
    let mut observations = Vec::with_capacity(records.len());

    for (index, record) in records.into_iter().enumerate() {
        match CompressorObservation::try_from(record) {
            Ok(observation) => observations.push(observation),
            Err(failure) => failures.push(FieldFailure { index, ..failure }),
        }
    }

    if failures.is_empty() {
        Ok(observations)
    } else {
        Err(RecordValidationError { failures })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(model: &str, refrigerant: &str, condenser: f64) -> serde_json::Value {
        json!({
            "specs": {
                "model": model,
                "technology": "Scroll",
                "refrigerant": refrigerant,
                "capacity_control": "Fixed Speed"
            },
            "condenser_temp": condenser,
            "evaporator_temp": -10.0,
            "power": 500.0
        })
    }

    #[test]
    fn test_valid_batch_builds_observations() {
        let raw = validate_records(vec![
            record("MT064-4", "R404A", 30.0),
            record("ABC1", "R22", 35.0),
        ])
        .unwrap();
        let observations = build_observations(raw).unwrap();

        assert_eq!(observations.len(), 2);
        assert_eq!(observations[0].model(), "MT064-4");
        assert_eq!(observations[0].specs.refrigerant, Refrigerant::R404A);
        assert_eq!(
            observations[1].specs.capacity_control,
            CapacityControl::FixedSpeed
        );
    }

    #[test]
    fn test_invalid_batch_collects_every_failure() {
        let err = validate_records(vec![
            record("MT064-4", "R404A", 30.0),
            record("MT064-4", "R134a", -300.0),
            json!({ "specs": { "model": "X" } }),
        ])
        .unwrap_err();

        let fields: Vec<(usize, &str)> = err
            .failures
            .iter()
            .map(|f| (f.index, f.field.as_str()))
            .collect();
        assert_eq!(
            fields,
            vec![
                (1, "condenser_temp"),
                (1, "specs.refrigerant"),
                (2, RECORD_FIELD),
            ]
        );
        assert!(err.failures[1].message.contains("R134a"));
    }

    #[test]
    fn test_absolute_zero_is_accepted() {
        let raw = validate_records(vec![record("M", "R22", ABSOLUTE_ZERO_C)]).unwrap();
        assert_eq!(build_observations(raw).unwrap()[0].condenser_temp_c, ABSOLUTE_ZERO_C);
    }

    #[test]
    fn test_evaporator_and_power_are_not_range_checked() {
        let mut value = record("M", "R22", 20.0);
        value["evaporator_temp"] = json!(-400.0);
        value["power"] = json!(-1.0);
        assert!(validate_records(vec![value]).is_ok());
    }

    #[test]
    fn test_construction_rejects_unvalidated_enum() {
        let raw = RawObservation {
            specs: RawSpecification {
                model: "M".to_string(),
                technology: "Rotary".to_string(),
                refrigerant: "R22".to_string(),
                capacity_control: "Fixed Speed".to_string(),
            },
            condenser_temp: 20.0,
            evaporator_temp: 0.0,
            power: 1.0,
        };
        let err = build_observations(vec![raw]).unwrap_err();
        assert_eq!(err.failures[0].field, "specs.technology");
    }
}
