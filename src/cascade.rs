//! Cascading Selects
//!
//! A dependent select (sub-industry) whose options come from a remote lookup
//! keyed by a parent field (industry). Every request gets a sequence number
//! from a per-field counter; only the response to the most recently issued
//! request is applied. A late response to an older request is dropped, so
//! the user's newest parent selection always wins regardless of response
//! order.
//!
//! The request/resolve pair lets the host run the lookup however it likes;
//! [`CascadeSelect::cascade_select`] does the whole round trip inline.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::document::{DocumentStore, FieldValue};
use crate::error::LookupError;
use crate::notification::Notification;
use crate::visibility::FieldMutation;

/// Remote lookup: parent value -> ordered child options
#[async_trait]
pub trait OptionLookup: Send + Sync {
    async fn lookup(&self, parent: &str) -> Result<Vec<String>, LookupError>;
}

#[async_trait]
impl<T: OptionLookup + ?Sized> OptionLookup for Arc<T> {
    async fn lookup(&self, parent: &str) -> Result<Vec<String>, LookupError> {
        (**self).lookup(parent).await
    }
}

/// Parent value -> ordered child options
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OptionCatalog(BTreeMap<String, Vec<String>>);

impl OptionCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, parent: impl Into<String>, options: &[&str]) -> Self {
        self.0.insert(
            parent.into(),
            options.iter().map(|s| s.to_string()).collect(),
        );
        self
    }

    /// Options for a parent; unknown parents have none
    pub fn options(&self, parent: &str) -> &[String] {
        self.0.get(parent).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn parents(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(|k| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Serves a configured catalog in-process
#[derive(Debug, Clone)]
pub struct StaticOptionLookup {
    catalog: Arc<OptionCatalog>,
}

impl StaticOptionLookup {
    pub fn new(catalog: OptionCatalog) -> Self {
        Self {
            catalog: Arc::new(catalog),
        }
    }

    pub fn catalog(&self) -> &OptionCatalog {
        &self.catalog
    }
}

#[async_trait]
impl OptionLookup for StaticOptionLookup {
    async fn lookup(&self, parent: &str) -> Result<Vec<String>, LookupError> {
        Ok(self.catalog.options(parent).to_vec())
    }
}

/// Which parent drives which dependent field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CascadeDef {
    pub parent: String,
    pub dependent: String,
    /// Name of the option catalog serving this cascade
    #[serde(default)]
    pub catalog: Option<String>,
}

impl CascadeDef {
    pub fn new(parent: impl Into<String>, dependent: impl Into<String>) -> Self {
        Self {
            parent: parent.into(),
            dependent: dependent.into(),
            catalog: None,
        }
    }

    pub fn with_catalog(mut self, catalog: impl Into<String>) -> Self {
        self.catalog = Some(catalog.into());
        self
    }
}

/// An issued lookup awaiting its response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CascadeTicket {
    pub dependent: String,
    pub seq: u64,
    pub parent: String,
}

/// Result of issuing a cascade request
#[derive(Debug, Clone, PartialEq)]
pub enum CascadeRequest {
    /// Parent is empty: options and dependent already cleared, nothing to fetch
    Cleared(CascadeOutcome),
    /// Run the lookup for `ticket.parent`, then call `resolve`
    Pending(CascadeTicket),
}

/// What a resolved cascade did to the document
#[derive(Debug, Clone, PartialEq)]
pub enum CascadeOutcome {
    Applied {
        options: Vec<String>,
        cleared: Option<FieldMutation>,
    },
    Failed {
        error: LookupError,
        cleared: Option<FieldMutation>,
        notification: Notification,
    },
    /// Response to a superseded request; nothing was written
    Stale { seq: u64, latest: u64 },
}

impl CascadeOutcome {
    pub fn cleared(&self) -> Option<&FieldMutation> {
        match self {
            CascadeOutcome::Applied { cleared, .. } | CascadeOutcome::Failed { cleared, .. } => {
                cleared.as_ref()
            }
            CascadeOutcome::Stale { .. } => None,
        }
    }

    pub fn is_stale(&self) -> bool {
        matches!(self, CascadeOutcome::Stale { .. })
    }
}

/// Cascade state for one dependent field
#[derive(Debug, Clone)]
pub struct CascadeSelect {
    def: CascadeDef,
    /// Sequence of the newest issued request
    issued: u64,
    /// Options currently offered for the dependent field
    options: Vec<String>,
}

impl CascadeSelect {
    pub fn new(def: CascadeDef) -> Self {
        Self {
            def,
            issued: 0,
            options: Vec::new(),
        }
    }

    pub fn def(&self) -> &CascadeDef {
        &self.def
    }

    pub fn options(&self) -> &[String] {
        &self.options
    }

    pub fn latest_seq(&self) -> u64 {
        self.issued
    }

    /// Issue a request for the parent's current value.
    ///
    /// Bumps the sequence even when the parent is empty, so any lookup still
    /// in flight is superseded.
    pub fn request<D: DocumentStore + ?Sized>(&mut self, doc: &mut D) -> CascadeRequest {
        self.issued += 1;
        let seq = self.issued;

        match lookup_key(doc.value(&self.def.parent)) {
            None => {
                debug!(dependent = %self.def.dependent, seq, "Parent empty, clearing options");
                self.options.clear();
                let cleared = self.clear_dependent(doc);
                CascadeRequest::Cleared(CascadeOutcome::Applied {
                    options: Vec::new(),
                    cleared,
                })
            }
            Some(parent) => CascadeRequest::Pending(CascadeTicket {
                dependent: self.def.dependent.clone(),
                seq,
                parent,
            }),
        }
    }

    /// Apply a lookup response if it answers the newest request
    pub fn resolve<D: DocumentStore + ?Sized>(
        &mut self,
        ticket: &CascadeTicket,
        result: Result<Vec<String>, LookupError>,
        doc: &mut D,
    ) -> CascadeOutcome {
        if ticket.seq != self.issued || ticket.dependent != self.def.dependent {
            debug!(
                dependent = %self.def.dependent,
                seq = ticket.seq,
                latest = self.issued,
                parent = %ticket.parent,
                "Dropping stale lookup response"
            );
            return CascadeOutcome::Stale {
                seq: ticket.seq,
                latest: self.issued,
            };
        }

        match result {
            Ok(options) => {
                let keep = match doc.value(&self.def.dependent) {
                    None => true,
                    Some(current) if current.is_empty() => true,
                    Some(FieldValue::Text(current)) => options.iter().any(|o| *o == current),
                    Some(_) => false,
                };
                let cleared = if keep {
                    None
                } else {
                    self.clear_dependent(doc)
                };
                self.options = options.clone();
                CascadeOutcome::Applied { options, cleared }
            }
            Err(error) => {
                warn!(
                    dependent = %self.def.dependent,
                    parent = %ticket.parent,
                    %error,
                    "Option lookup failed"
                );
                self.options.clear();
                let cleared = self.clear_dependent(doc);
                let notification = Notification::error(format!(
                    "Could not load options for {}: {}",
                    self.def.dependent, error
                ));
                CascadeOutcome::Failed {
                    error,
                    cleared,
                    notification,
                }
            }
        }
    }

    /// Request, look up, and resolve in one go
    pub async fn cascade_select<D, L>(&mut self, doc: &mut D, lookup: &L) -> CascadeOutcome
    where
        D: DocumentStore + ?Sized,
        L: OptionLookup + ?Sized,
    {
        match self.request(doc) {
            CascadeRequest::Cleared(outcome) => outcome,
            CascadeRequest::Pending(ticket) => {
                let result = lookup.lookup(&ticket.parent).await;
                self.resolve(&ticket, result, doc)
            }
        }
    }

    fn clear_dependent<D: DocumentStore + ?Sized>(&self, doc: &mut D) -> Option<FieldMutation> {
        let previous = doc.value(&self.def.dependent)?;
        if previous.is_empty() {
            return None;
        }
        doc.set_value(&self.def.dependent, FieldValue::Empty);
        Some(FieldMutation::clear(&self.def.dependent, previous))
    }
}

/// Lookup key for a parent value; `None` when the parent is empty.
///
/// Non-text selections are keyed by their display form.
fn lookup_key(value: Option<FieldValue>) -> Option<String> {
    let value = value.filter(|v| !v.is_empty())?;
    let key = value.to_string().trim().to_string();
    (!key.is_empty()).then_some(key)
}
