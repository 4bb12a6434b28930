//! Section Visibility
//!
//! Visibility is a pure function of the document: it is recomputed from the
//! rule table on every refresh or trigger change and never cached.
//! Applying it hides fields and clears any value left behind in a hidden,
//! non-header field so deselected scopes cannot leak into a submission.

use serde::Serialize;
use tracing::debug;

use crate::document::{DocumentStore, FieldValue};
use crate::rules::RuleTable;

/// Computed visibility of one controlled field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldVisibility {
    pub field: String,
    pub visible: bool,
    /// Section headers are toggled but never cleared
    pub section: bool,
}

/// Visibility of every provisioned controlled field, in rule order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VisibilityState {
    entries: Vec<FieldVisibility>,
}

impl VisibilityState {
    pub fn entries(&self) -> &[FieldVisibility] {
        &self.entries
    }

    pub fn is_visible(&self, field: &str) -> Option<bool> {
        self.entries
            .iter()
            .find(|e| e.field == field)
            .map(|e| e.visible)
    }

    pub fn visible_fields(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(|e| e.visible)
            .map(|e| e.field.as_str())
    }

    pub fn hidden_fields(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(|e| !e.visible)
            .map(|e| e.field.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Evaluate every rule's trigger against the document.
///
/// Controlled fields the document does not carry are skipped; the same
/// table runs against deployments where optional fields were never
/// provisioned.
pub fn recompute_visibility<D: DocumentStore + ?Sized>(
    table: &RuleTable,
    doc: &D,
) -> VisibilityState {
    let mut entries = Vec::with_capacity(table.field_count());

    for rule in table.rules() {
        let visible = doc.is_checked(&rule.trigger);

        for field in &rule.fields {
            if !doc.has_field(&field.name) {
                debug!(field = %field.name, trigger = %rule.trigger, "Skipping missing field");
                continue;
            }
            entries.push(FieldVisibility {
                field: field.name.clone(),
                visible,
                section: field.section,
            });
        }
    }

    VisibilityState { entries }
}

/// A value change requested by the controller
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldMutation {
    pub field: String,
    pub previous: FieldValue,
    pub value: FieldValue,
}

impl FieldMutation {
    pub fn clear(field: impl Into<String>, previous: FieldValue) -> Self {
        Self {
            field: field.into(),
            previous,
            value: FieldValue::Empty,
        }
    }
}

/// Visibility flags plus the value clears they imply
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VisibilityPlan {
    pub field_updates: Vec<FieldVisibility>,
    pub mutations: Vec<FieldMutation>,
}

impl VisibilityPlan {
    /// Write the plan to the document.
    ///
    /// All visibility flags go out before any value is cleared, so a hidden
    /// field is never rendered with stale content. Flags that already match
    /// are not rewritten.
    pub fn commit<D: DocumentStore + ?Sized>(&self, doc: &mut D) {
        for update in &self.field_updates {
            let hidden = !update.visible;
            if doc.is_hidden(&update.field) != hidden {
                doc.set_hidden(&update.field, hidden);
            }
        }

        for mutation in &self.mutations {
            debug!(field = %mutation.field, previous = %mutation.previous, "Clearing hidden field");
            doc.set_value(&mutation.field, mutation.value.clone());
        }
    }

    /// Fields whose hidden flag differs from the document's current flag
    pub fn flag_changes<D: DocumentStore + ?Sized>(&self, doc: &D) -> usize {
        self.field_updates
            .iter()
            .filter(|u| doc.is_hidden(&u.field) == u.visible)
            .count()
    }
}

/// Derive the flag updates and value clears for a visibility state
pub fn apply_visibility<D: DocumentStore + ?Sized>(
    doc: &D,
    state: &VisibilityState,
) -> VisibilityPlan {
    let mut plan = VisibilityPlan {
        field_updates: state.entries.clone(),
        mutations: Vec::new(),
    };

    for entry in state.entries.iter().filter(|e| !e.visible && !e.section) {
        match doc.value(&entry.field) {
            Some(value) if !value.is_empty() => {
                plan.mutations.push(FieldMutation::clear(&entry.field, value));
            }
            _ => {}
        }
    }

    plan
}
