//! Onboarding Forms - conditional section controller
//!
//! Drives the GHG onboarding form: section visibility from scope
//! checkboxes, dependent-field resets, cascading industry selects, plus the
//! validation and server calls around report generation and admin review.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use onboarding_forms::{FormConfig, FormSession, MemoryDocument};
//!
//! let config = FormConfig::onboarding_default().unwrap();
//! let mut session = FormSession::from_config(&config).unwrap();
//! let mut doc = MemoryDocument::named("OF-0001").with("scopes_to_report_scope1", true);
//! let update = session.on_refresh(&mut doc);
//! assert!(update.visibility.is_some());
//! ```

// Core error handling
pub mod error;

// Host document and rule tables
pub mod document;
pub mod rules;

// Controllers
pub mod cascade;
pub mod resets;
pub mod session;
pub mod visibility;

// Configuration
pub mod config;

// Checks and server calls
pub mod notification;
pub mod report;
pub mod review;
pub mod validation;

pub use cascade::{
    CascadeDef, CascadeOutcome, CascadeRequest, CascadeSelect, CascadeTicket, OptionCatalog,
    OptionLookup, StaticOptionLookup,
};
pub use config::{FormConfig, FormLoader};
pub use document::{DocumentStore, FieldValue, MemoryDocument};
pub use error::{
    ConfigError, FormError, LookupError, RemoteError, ReviewError, RuleTableError,
    ValidationError, ValidationErrors,
};
pub use notification::{Notification, NotifyLevel};
pub use report::{ReportRenderer, ReportRequest, RenderResult};
pub use resets::{evaluate_resets, ResetRule};
pub use review::{ApplicationStatus, PermissionCheck, ReviewAction, ReviewService};
pub use rules::{ControlledField, RuleTable, ScopeSection, SectionRule};
pub use session::{FormSession, SessionState, SessionUpdate};
pub use visibility::{
    apply_visibility, recompute_visibility, FieldMutation, VisibilityPlan, VisibilityState,
};
