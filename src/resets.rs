//! Dependent Field Resets
//!
//! Smaller than section rules: a trigger and a condition decide whether a
//! handful of follow-up fields still make sense. When they do not, their
//! values are cleared (visibility is left to the host's own depends-on
//! expressions).

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::document::DocumentStore;
use crate::visibility::FieldMutation;

/// When a reset rule fires
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "when", rename_all = "snake_case")]
pub enum ResetCondition {
    /// The trigger checkbox is not checked
    Unchecked,
    /// The trigger does not hold this exact value
    NotEquals { value: String },
    /// Another field's text does not contain `needle` (case-insensitive)
    ParentLacks { field: String, needle: String },
}

/// Clear `clears` whenever `condition` holds for `trigger`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetRule {
    pub trigger: String,
    #[serde(flatten)]
    pub condition: ResetCondition,
    pub clears: Vec<String>,
}

impl ResetRule {
    pub fn unchecked(trigger: &str, clears: &[&str]) -> Self {
        Self {
            trigger: trigger.to_string(),
            condition: ResetCondition::Unchecked,
            clears: clears.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn not_equals(trigger: &str, value: &str, clears: &[&str]) -> Self {
        Self {
            trigger: trigger.to_string(),
            condition: ResetCondition::NotEquals {
                value: value.to_string(),
            },
            clears: clears.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn parent_lacks(trigger: &str, field: &str, needle: &str, clears: &[&str]) -> Self {
        Self {
            trigger: trigger.to_string(),
            condition: ResetCondition::ParentLacks {
                field: field.to_string(),
                needle: needle.to_string(),
            },
            clears: clears.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Follow-up fields of the GHG accounting steps
    pub fn onboarding_defaults() -> Vec<ResetRule> {
        vec![
            ResetRule::unchecked(
                "scope_1_intensity_reduction",
                &["scope_1_reduction_percentage", "scope_1_target_year"],
            ),
            ResetRule::unchecked(
                "scope_2_intensity_reduction",
                &["scope_2_reduction_percentage", "scope_2_target_year"],
            ),
            ResetRule::unchecked(
                "scope_3_intensity_reduction",
                &["scope_3_reduction_percentage", "scope_3_target_year"],
            ),
            ResetRule::unchecked(
                "ghg_tracking_tools_software",
                &["ghg_tracking_tools_software_name"],
            ),
            ResetRule::not_equals(
                "monitoring_frequency",
                "Other",
                &["monitoring_frequency_other_text"],
            ),
            // NF3 is only reportable for semiconductor manufacturing
            ResetRule::parent_lacks(
                "gases_to_report_nf3",
                "industry_type",
                "semiconductor",
                &["gases_to_report_nf3"],
            ),
        ]
    }

    /// Whether a change to `field` should re-evaluate this rule
    pub fn watches(&self, field: &str) -> bool {
        if self.trigger == field {
            return true;
        }
        matches!(&self.condition, ResetCondition::ParentLacks { field: f, .. } if f == field)
    }

    /// Whether the document carries every field the condition reads
    pub fn provisioned<D: DocumentStore + ?Sized>(&self, doc: &D) -> bool {
        if !doc.has_field(&self.trigger) {
            return false;
        }
        match &self.condition {
            ResetCondition::ParentLacks { field, .. } => doc.has_field(field),
            _ => true,
        }
    }

    pub fn holds<D: DocumentStore + ?Sized>(&self, doc: &D) -> bool {
        match &self.condition {
            ResetCondition::Unchecked => !doc.is_checked(&self.trigger),
            ResetCondition::NotEquals { value } => {
                doc.text(&self.trigger).as_deref() != Some(value.as_str())
            }
            ResetCondition::ParentLacks { field, needle } => {
                let needle = needle.to_lowercase();
                !doc
                    .text(field)
                    .map(|t| t.to_lowercase().contains(&needle))
                    .unwrap_or(false)
            }
        }
    }
}

/// Clears implied by the reset rules.
///
/// With `changed = Some(field)` only rules watching that field are
/// evaluated; `None` evaluates every rule (document refresh).
pub fn evaluate_resets<D: DocumentStore + ?Sized>(
    rules: &[ResetRule],
    doc: &D,
    changed: Option<&str>,
) -> Vec<FieldMutation> {
    let mut mutations: Vec<FieldMutation> = Vec::new();

    for rule in rules {
        if let Some(field) = changed {
            if !rule.watches(field) {
                continue;
            }
        }
        if !rule.provisioned(doc) {
            debug!(trigger = %rule.trigger, "Skipping reset for missing field");
            continue;
        }
        if !rule.holds(doc) {
            continue;
        }

        for target in &rule.clears {
            if mutations.iter().any(|m| &m.field == target) {
                continue;
            }
            match doc.value(target) {
                Some(value) if !value.is_empty() => {
                    debug!(field = %target, trigger = %rule.trigger, "Resetting dependent field");
                    mutations.push(FieldMutation::clear(target, value));
                }
                _ => {}
            }
        }
    }

    mutations
}
