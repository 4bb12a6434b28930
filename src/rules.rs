//! Section Rules
//!
//! A rule ties one trigger flag to the ordered list of fields it shows or
//! hides. Tables are validated once at construction: a field may be governed
//! by at most one rule, and a trigger may never govern itself or another
//! trigger.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::RuleTableError;

/// A field governed by a section rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "FieldEntry")]
pub struct ControlledField {
    pub name: String,
    /// Section-break marker: toggled but never cleared
    pub section: bool,
}

impl ControlledField {
    pub fn field(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            section: false,
        }
    }

    pub fn header(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            section: true,
        }
    }
}

/// YAML accepts either a bare field name or `{ name, section }`
#[derive(Deserialize)]
#[serde(untagged)]
enum FieldEntry {
    Name(String),
    Full {
        name: String,
        #[serde(default)]
        section: bool,
    },
}

impl From<FieldEntry> for ControlledField {
    fn from(entry: FieldEntry) -> Self {
        match entry {
            FieldEntry::Name(name) => ControlledField::field(name),
            FieldEntry::Full { name, section } => ControlledField { name, section },
        }
    }
}

/// One trigger flag and the fields it governs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionRule {
    pub trigger: String,
    #[serde(default)]
    pub label: Option<String>,
    pub fields: Vec<ControlledField>,
}

impl SectionRule {
    pub fn new(trigger: impl Into<String>, fields: Vec<ControlledField>) -> Self {
        Self {
            trigger: trigger.into(),
            label: None,
            fields,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Heading shown to users: the label, or the trigger when unlabelled
    pub fn display_name(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.trigger)
    }
}

/// The reporting scopes selectable in step 4 of the onboarding form.
///
/// Each scope owns the step 5 target section that appears when it is
/// selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeSection {
    Scope1,
    Scope2,
    Scope3,
    Reductions,
}

impl ScopeSection {
    pub const ALL: [ScopeSection; 4] = [
        ScopeSection::Scope1,
        ScopeSection::Scope2,
        ScopeSection::Scope3,
        ScopeSection::Reductions,
    ];

    pub fn trigger(&self) -> &'static str {
        match self {
            ScopeSection::Scope1 => "scopes_to_report_scope1",
            ScopeSection::Scope2 => "scopes_to_report_scope2",
            ScopeSection::Scope3 => "scopes_to_report_scope3",
            ScopeSection::Reductions => "scopes_to_report_reductions",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ScopeSection::Scope1 => "Scope 1",
            ScopeSection::Scope2 => "Scope 2",
            ScopeSection::Scope3 => "Scope 3",
            ScopeSection::Reductions => "Reductions",
        }
    }

    pub fn header(&self) -> &'static str {
        match self {
            ScopeSection::Scope1 => "section_b_scope_1_targets",
            ScopeSection::Scope2 => "section_c_scope_2_targets",
            ScopeSection::Scope3 => "section_d_scope_3_targets",
            ScopeSection::Reductions => "section_e_reductions",
        }
    }

    pub fn field_names(&self) -> &'static [&'static str] {
        match self {
            ScopeSection::Scope1 => &[
                "scope_1_target_type",
                "scope_1_intensity_reduction",
                "scope_1_reduction_percentage",
                "scope_1_target_year",
                "scope_1_mitigation_strategies",
            ],
            ScopeSection::Scope2 => &[
                "scope_2_target_type",
                "scope_2_intensity_reduction",
                "scope_2_reduction_percentage",
                "scope_2_target_year",
                "scope_2_mitigation_strategies",
            ],
            ScopeSection::Scope3 => &[
                "scope_3_categories_included",
                "scope_3_target_type",
                "scope_3_intensity_reduction",
                "scope_3_reduction_percentage",
                "scope_3_target_year",
                "scope_3_mitigation_strategies",
            ],
            ScopeSection::Reductions => &[
                "reduction_target_type",
                "land_sector_removals",
                "residual_emissions_strategy",
            ],
        }
    }

    /// Section header first, then the fields in form order
    pub fn fields(&self) -> Vec<ControlledField> {
        std::iter::once(ControlledField::header(self.header()))
            .chain(self.field_names().iter().map(|f| ControlledField::field(*f)))
            .collect()
    }

    pub fn rule(&self) -> SectionRule {
        SectionRule::new(self.trigger(), self.fields()).with_label(self.label())
    }
}

/// A validated, ordered set of section rules
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleTable {
    rules: Vec<SectionRule>,
    /// controlled field -> index of the owning rule
    owners: HashMap<String, usize>,
}

impl RuleTable {
    /// Build a table, rejecting any field governed by more than one rule
    pub fn new(rules: Vec<SectionRule>) -> Result<Self, RuleTableError> {
        let mut owners: HashMap<String, usize> = HashMap::new();

        for (idx, rule) in rules.iter().enumerate() {
            if rule.trigger.trim().is_empty() {
                return Err(RuleTableError::EmptyTrigger);
            }

            for field in &rule.fields {
                if field.name.trim().is_empty() {
                    return Err(RuleTableError::EmptyFieldName {
                        trigger: rule.trigger.clone(),
                    });
                }

                if let Some(&prev) = owners.get(&field.name) {
                    if prev == idx {
                        return Err(RuleTableError::DuplicateField {
                            field: field.name.clone(),
                            trigger: rule.trigger.clone(),
                        });
                    }
                    return Err(RuleTableError::OverlappingField {
                        field: field.name.clone(),
                        first: rules[prev].trigger.clone(),
                        second: rule.trigger.clone(),
                    });
                }

                owners.insert(field.name.clone(), idx);
            }
        }

        if let Some(rule) = rules.iter().find(|r| owners.contains_key(&r.trigger)) {
            return Err(RuleTableError::TriggerControlled(rule.trigger.clone()));
        }

        Ok(Self { rules, owners })
    }

    /// The step 5 target sections keyed by the four scope flags
    pub fn ghg_scopes() -> Result<Self, RuleTableError> {
        Self::new(ScopeSection::ALL.iter().map(|s| s.rule()).collect())
    }

    pub fn empty() -> Self {
        Self {
            rules: Vec::new(),
            owners: HashMap::new(),
        }
    }

    pub fn rules(&self) -> &[SectionRule] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn is_trigger(&self, field: &str) -> bool {
        self.rules.iter().any(|r| r.trigger == field)
    }

    /// The rule governing a field, if any
    pub fn rule_for(&self, field: &str) -> Option<&SectionRule> {
        self.owners.get(field).map(|&idx| &self.rules[idx])
    }

    /// Number of controlled fields across all rules
    pub fn field_count(&self) -> usize {
        self.owners.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ghg_scopes_table_is_valid() {
        let table = RuleTable::ghg_scopes().unwrap();
        assert_eq!(table.rules().len(), 4);
        assert_eq!(table.field_count(), 6 + 6 + 7 + 4);
        assert!(table.is_trigger("scopes_to_report_scope3"));
        assert_eq!(
            table.rule_for("scope_3_categories_included").map(|r| r.trigger.as_str()),
            Some("scopes_to_report_scope3")
        );
        assert!(table.rule_for("industry_type").is_none());
    }

    #[test]
    fn test_overlapping_field_rejected() {
        let rules = vec![
            SectionRule::new("a", vec![ControlledField::field("shared")]),
            SectionRule::new("b", vec![ControlledField::field("shared")]),
        ];

        let err = RuleTable::new(rules).unwrap_err();
        assert_eq!(
            err,
            RuleTableError::OverlappingField {
                field: "shared".to_string(),
                first: "a".to_string(),
                second: "b".to_string(),
            }
        );
    }

    #[test]
    fn test_duplicate_field_in_one_rule_rejected() {
        let rules = vec![SectionRule::new(
            "a",
            vec![ControlledField::field("x"), ControlledField::field("x")],
        )];
        assert!(matches!(
            RuleTable::new(rules),
            Err(RuleTableError::DuplicateField { .. })
        ));
    }

    #[test]
    fn test_trigger_cannot_be_controlled() {
        let rules = vec![
            SectionRule::new("a", vec![ControlledField::field("b")]),
            SectionRule::new("b", vec![ControlledField::field("c")]),
        ];
        assert_eq!(
            RuleTable::new(rules).unwrap_err(),
            RuleTableError::TriggerControlled("b".to_string())
        );
    }

    #[test]
    fn test_shared_trigger_allowed() {
        let rules = vec![
            SectionRule::new("a", vec![ControlledField::field("x")]),
            SectionRule::new("a", vec![ControlledField::field("y")]),
        ];
        assert!(RuleTable::new(rules).is_ok());
    }

    #[test]
    fn test_display_name_prefers_label() {
        let table = RuleTable::ghg_scopes().unwrap();
        let names: Vec<&str> = table.rules().iter().map(|r| r.display_name()).collect();
        assert_eq!(
            names,
            ScopeSection::ALL.iter().map(|s| s.label()).collect::<Vec<_>>()
        );

        let unlabelled = SectionRule::new("wants_newsletter", Vec::new());
        assert_eq!(unlabelled.display_name(), "wants_newsletter");
    }

    #[test]
    fn test_yaml_field_shorthand() {
        let yaml = r#"
trigger: scopes_to_report_scope1
fields:
  - name: section_b_scope_1_targets
    section: true
  - scope_1_target_type
"#;
        let rule: SectionRule = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(rule.fields[0], ControlledField::header("section_b_scope_1_targets"));
        assert_eq!(rule.fields[1], ControlledField::field("scope_1_target_type"));
    }
}
