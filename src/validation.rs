//! Cross-field Validation
//!
//! Checks run before any remote call. A failed check produces a list of
//! issues and leaves the document untouched.

use chrono::NaiveDate;

use crate::cascade::{CascadeDef, OptionCatalog};
use crate::document::DocumentStore;
use crate::error::{ValidationError, ValidationErrors};

/// Parse an ISO `YYYY-MM-DD` date field
pub fn parse_date(field: &str, value: &str) -> Result<NaiveDate, ValidationError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| ValidationError::InvalidDate {
        field: field.to_string(),
        value: value.to_string(),
    })
}

/// A reporting period must not end before it starts
pub fn validate_period(from: &str, to: &str) -> Result<(NaiveDate, NaiveDate), ValidationErrors> {
    match (parse_date("period_from", from), parse_date("period_to", to)) {
        (Ok(f), Ok(t)) if f > t => Err(ValidationErrors(vec![
            ValidationError::PeriodInverted {
                from: f.to_string(),
                to: t.to_string(),
            },
        ])),
        (Ok(f), Ok(t)) => Ok((f, t)),
        (f, t) => Err(ValidationErrors(
            f.err().into_iter().chain(t.err()).collect(),
        )),
    }
}

/// Every listed field must hold a value
pub fn require_fields<D: DocumentStore + ?Sized>(doc: &D, fields: &[&str]) -> Vec<ValidationError> {
    fields
        .iter()
        .filter(|f| doc.value(f).map(|v| v.is_empty()).unwrap_or(true))
        .map(|f| ValidationError::Required(f.to_string()))
        .collect()
}

/// A dependent value must be one of the catalog options for its parent
pub fn validate_dependent<D: DocumentStore + ?Sized>(
    doc: &D,
    def: &CascadeDef,
    catalog: &OptionCatalog,
) -> Result<(), ValidationError> {
    let Some(value) = doc.text(&def.dependent) else {
        return Ok(());
    };
    let parent = doc.text(&def.parent).unwrap_or_default();

    if catalog.options(&parent).iter().any(|o| *o == value) {
        Ok(())
    } else {
        Err(ValidationError::InvalidOption {
            field: def.dependent.clone(),
            value,
            parent,
        })
    }
}
