//! Form Session
//!
//! One `FormSession` per open form. It owns the rule table, the reset rules
//! and one [`CascadeSelect`] per dependent field, and turns the host's two
//! events (document refresh, field change) into document writes plus the
//! lookups the host still has to run.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::cascade::{
    CascadeDef, CascadeOutcome, CascadeRequest, CascadeSelect, CascadeTicket, OptionLookup,
};
use crate::config::FormConfig;
use crate::document::DocumentStore;
use crate::error::{FormError, LookupError, RuleTableError};
use crate::resets::{evaluate_resets, ResetRule};
use crate::rules::RuleTable;
use crate::visibility::{
    apply_visibility, recompute_visibility, FieldMutation, VisibilityPlan, VisibilityState,
};

/// Session lifecycle. There is no terminal state; the session lives as long
/// as the form is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionState {
    Uninitialized,
    VisibleComputed,
}

/// Everything one event did, plus the lookups still outstanding
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionUpdate {
    /// Set when visibility was recomputed for this event
    pub visibility: Option<VisibilityPlan>,
    /// Dependent-field resets that were written
    pub resets: Vec<FieldMutation>,
    /// Cascades settled without a lookup (empty parent), by dependent field
    #[serde(skip)]
    pub cascades: Vec<(String, CascadeOutcome)>,
    /// Lookups the host must run and hand back to `resolve_cascade`
    #[serde(skip)]
    pub pending: Vec<CascadeTicket>,
}

impl SessionUpdate {
    /// Every value cleared by this event
    pub fn mutations(&self) -> impl Iterator<Item = &FieldMutation> {
        self.visibility
            .iter()
            .flat_map(|plan| plan.mutations.iter())
            .chain(self.resets.iter())
            .chain(self.cascades.iter().filter_map(|(_, c)| c.cleared()))
    }

    pub fn is_empty(&self) -> bool {
        self.visibility.is_none()
            && self.resets.is_empty()
            && self.cascades.is_empty()
            && self.pending.is_empty()
    }
}

/// The controller for one open form
#[derive(Debug, Clone)]
pub struct FormSession {
    session_id: Uuid,
    table: RuleTable,
    resets: Vec<ResetRule>,
    /// Keyed by dependent field
    cascades: BTreeMap<String, CascadeSelect>,
    state: SessionState,
}

impl FormSession {
    pub fn new(
        table: RuleTable,
        resets: Vec<ResetRule>,
        cascades: Vec<CascadeDef>,
    ) -> Result<Self, RuleTableError> {
        let mut selects = BTreeMap::new();
        for def in cascades {
            let dependent = def.dependent.clone();
            if selects.insert(dependent.clone(), CascadeSelect::new(def)).is_some() {
                return Err(RuleTableError::DuplicateCascade(dependent));
            }
        }

        Ok(Self {
            session_id: Uuid::new_v4(),
            table,
            resets,
            cascades: selects,
            state: SessionState::Uninitialized,
        })
    }

    pub fn from_config(config: &FormConfig) -> Result<Self, FormError> {
        let session = Self::new(
            config.rule_table()?,
            config.resets.clone(),
            config.cascades.clone(),
        )?;
        debug!(
            session = %session.session_id,
            form = %config.form,
            rules = session.table.rules().len(),
            cascades = session.cascades.len(),
            "Form session created"
        );
        Ok(session)
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn rule_table(&self) -> &RuleTable {
        &self.table
    }

    /// Options currently offered for a dependent field
    pub fn options(&self, dependent: &str) -> Option<&[String]> {
        self.cascades.get(dependent).map(|c| c.options())
    }

    /// Current visibility, computed fresh from the document
    pub fn visibility<D: DocumentStore + ?Sized>(&self, doc: &D) -> VisibilityState {
        recompute_visibility(&self.table, doc)
    }

    /// Document loaded or reloaded: recompute everything
    pub fn on_refresh<D: DocumentStore + ?Sized>(&mut self, doc: &mut D) -> SessionUpdate {
        let mut update = SessionUpdate {
            visibility: Some(self.sync_visibility(doc)),
            resets: self.apply_resets(doc, None),
            ..SessionUpdate::default()
        };

        let dependents: Vec<String> = self.cascades.keys().cloned().collect();
        for dependent in dependents {
            self.issue(&dependent, doc, &mut update);
        }

        self.state = SessionState::VisibleComputed;
        info!(
            session = %self.session_id,
            cleared = update.mutations().count(),
            pending = update.pending.len(),
            "Form refreshed"
        );
        update
    }

    /// A single field changed in the host UI
    pub fn on_field_change<D: DocumentStore + ?Sized>(
        &mut self,
        doc: &mut D,
        field: &str,
    ) -> SessionUpdate {
        if self.state == SessionState::Uninitialized {
            debug!(session = %self.session_id, field, "Change before first refresh");
            return self.on_refresh(doc);
        }

        let mut update = SessionUpdate::default();

        if self.table.is_trigger(field) {
            update.visibility = Some(self.sync_visibility(doc));
        }
        update.resets = self.apply_resets(doc, Some(field));

        let dependents: Vec<String> = self
            .cascades
            .values()
            .filter(|c| c.def().parent == field)
            .map(|c| c.def().dependent.clone())
            .collect();
        for dependent in dependents {
            self.issue(&dependent, doc, &mut update);
        }

        if !update.is_empty() {
            debug!(
                session = %self.session_id,
                field,
                cleared = update.mutations().count(),
                pending = update.pending.len(),
                "Field change handled"
            );
        }
        update
    }

    /// Hand back the result of a lookup issued by this session
    pub fn resolve_cascade<D: DocumentStore + ?Sized>(
        &mut self,
        ticket: &CascadeTicket,
        result: Result<Vec<String>, LookupError>,
        doc: &mut D,
    ) -> Result<CascadeOutcome, FormError> {
        let cascade = self
            .cascades
            .get_mut(&ticket.dependent)
            .ok_or_else(|| FormError::UnknownCascade(ticket.dependent.clone()))?;
        Ok(cascade.resolve(ticket, result, doc))
    }

    /// Run pending lookups one after another and resolve them
    pub async fn run_cascades<D, L>(
        &mut self,
        doc: &mut D,
        pending: &[CascadeTicket],
        lookup: &L,
    ) -> Result<Vec<CascadeOutcome>, FormError>
    where
        D: DocumentStore + ?Sized,
        L: OptionLookup + ?Sized,
    {
        let mut outcomes = Vec::with_capacity(pending.len());
        for ticket in pending {
            let result = lookup.lookup(&ticket.parent).await;
            outcomes.push(self.resolve_cascade(ticket, result, doc)?);
        }
        Ok(outcomes)
    }

    fn sync_visibility<D: DocumentStore + ?Sized>(&self, doc: &mut D) -> VisibilityPlan {
        let state = recompute_visibility(&self.table, doc);
        let plan = apply_visibility(doc, &state);
        plan.commit(doc);
        plan
    }

    fn apply_resets<D: DocumentStore + ?Sized>(
        &self,
        doc: &mut D,
        changed: Option<&str>,
    ) -> Vec<FieldMutation> {
        let mutations = evaluate_resets(&self.resets, doc, changed);
        for mutation in &mutations {
            doc.set_value(&mutation.field, mutation.value.clone());
        }
        mutations
    }

    fn issue<D: DocumentStore + ?Sized>(
        &mut self,
        dependent: &str,
        doc: &mut D,
        update: &mut SessionUpdate,
    ) {
        let Some(cascade) = self.cascades.get_mut(dependent) else {
            return;
        };
        if !doc.has_field(&cascade.def().parent) {
            debug!(
                dependent,
                parent = %cascade.def().parent,
                "Skipping cascade for missing parent"
            );
            return;
        }
        match cascade.request(doc) {
            CascadeRequest::Cleared(outcome) => {
                update.cascades.push((dependent.to_string(), outcome))
            }
            CascadeRequest::Pending(ticket) => update.pending.push(ticket),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cascade::{OptionCatalog, StaticOptionLookup};
    use crate::document::{FieldValue, MemoryDocument};

    fn session() -> FormSession {
        FormSession::new(
            RuleTable::ghg_scopes().unwrap(),
            ResetRule::onboarding_defaults(),
            vec![CascadeDef::new("industry_type", "sub_industry_type")],
        )
        .unwrap()
    }

    fn lookup() -> StaticOptionLookup {
        StaticOptionLookup::new(
            OptionCatalog::new()
                .with("Manufacturing", &["Textiles", "Chemicals"])
                .with("Energy", &["Oil Refining"]),
        )
    }

    #[test]
    fn test_duplicate_cascade_rejected() {
        let result = FormSession::new(
            RuleTable::empty(),
            Vec::new(),
            vec![
                CascadeDef::new("industry_type", "sub_industry_type"),
                CascadeDef::new("sector", "sub_industry_type"),
            ],
        );
        assert!(matches!(result, Err(RuleTableError::DuplicateCascade(_))));
    }

    #[test]
    fn test_refresh_computes_and_issues() {
        let mut session = session();
        assert_eq!(session.state(), SessionState::Uninitialized);

        let mut doc = MemoryDocument::new()
            .with("scopes_to_report_scope1", false)
            .with("scope_1_target_type", "Absolute")
            .with("industry_type", "Manufacturing")
            .with("sub_industry_type", "Textiles");

        let update = session.on_refresh(&mut doc);
        assert_eq!(session.state(), SessionState::VisibleComputed);
        assert!(doc.is_hidden("scope_1_target_type"));
        assert_eq!(doc.value("scope_1_target_type"), Some(FieldValue::Empty));
        assert_eq!(update.pending.len(), 1);
        assert_eq!(update.pending[0].parent, "Manufacturing");
    }

    #[test]
    fn test_non_trigger_change_skips_visibility() {
        let mut session = session();
        let mut doc = MemoryDocument::new()
            .with("scopes_to_report_scope1", true)
            .with("company_name", "Acme");
        session.on_refresh(&mut doc);

        let update = session.on_field_change(&mut doc, "company_name");
        assert!(update.visibility.is_none());
        assert!(update.is_empty());

        let update = session.on_field_change(&mut doc, "scopes_to_report_scope1");
        assert!(update.visibility.is_some());
    }

    #[test]
    fn test_change_before_refresh_initializes() {
        let mut session = session();
        let mut doc = MemoryDocument::new().with("company_name", "Acme");

        let update = session.on_field_change(&mut doc, "company_name");
        assert!(update.visibility.is_some());
        assert_eq!(session.state(), SessionState::VisibleComputed);
    }

    #[test]
    fn test_reset_written_on_change() {
        let mut session = session();
        let mut doc = MemoryDocument::new()
            .with("ghg_tracking_tools_software", true)
            .with("ghg_tracking_tools_software_name", "CarbonTool");
        session.on_refresh(&mut doc);
        assert_eq!(
            doc.text("ghg_tracking_tools_software_name").as_deref(),
            Some("CarbonTool")
        );

        doc.set_value("ghg_tracking_tools_software", FieldValue::Bool(false));
        let update = session.on_field_change(&mut doc, "ghg_tracking_tools_software");
        assert_eq!(update.resets.len(), 1);
        assert_eq!(
            doc.value("ghg_tracking_tools_software_name"),
            Some(FieldValue::Empty)
        );
    }

    #[test]
    fn test_refresh_skips_resets_without_trigger() {
        let mut session = session();
        let mut doc = MemoryDocument::new()
            .with("ghg_tracking_tools_software_name", "CarbonTool")
            .with("gases_to_report_nf3", true);

        let update = session.on_refresh(&mut doc);
        assert!(update.resets.is_empty());
        assert!(update.cascades.is_empty());
        assert_eq!(
            doc.text("ghg_tracking_tools_software_name").as_deref(),
            Some("CarbonTool")
        );
        assert_eq!(doc.value("gases_to_report_nf3"), Some(FieldValue::Bool(true)));
    }

    #[tokio::test]
    async fn test_industry_change_runs_cascade() {
        let mut session = session();
        let mut doc = MemoryDocument::new()
            .with_empty("industry_type")
            .with("sub_industry_type", "Textiles");
        let update = session.on_refresh(&mut doc);
        assert!(update.pending.is_empty());
        assert_eq!(update.cascades.len(), 1);
        assert_eq!(doc.value("sub_industry_type"), Some(FieldValue::Empty));

        doc.set_value("industry_type", FieldValue::text("Energy"));
        let update = session.on_field_change(&mut doc, "industry_type");
        let outcomes = session
            .run_cascades(&mut doc, &update.pending, &lookup())
            .await
            .unwrap();

        assert_eq!(outcomes.len(), 1);
        assert_eq!(
            session.options("sub_industry_type"),
            Some(&["Oil Refining".to_string()][..])
        );
    }

    #[test]
    fn test_unknown_ticket_rejected() {
        let mut session = session();
        let mut doc = MemoryDocument::new();
        let ticket = CascadeTicket {
            dependent: "region".to_string(),
            seq: 1,
            parent: "India".to_string(),
        };

        let err = session
            .resolve_cascade(&ticket, Ok(Vec::new()), &mut doc)
            .unwrap_err();
        assert!(matches!(err, FormError::UnknownCascade(ref f) if f == "region"));
    }
}
