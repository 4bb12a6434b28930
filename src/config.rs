//! Form Configuration and YAML Loading
//!
//! A form's rule table, dependent-field resets, cascades and option catalogs
//! are defined in YAML and validated when loaded. The onboarding form's
//! definition ships with the crate.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::debug;

use crate::cascade::{CascadeDef, OptionCatalog};
use crate::error::{ConfigError, RuleTableError};
use crate::resets::ResetRule;
use crate::rules::{RuleTable, ScopeSection, SectionRule};

const ONBOARDING_FORM_YAML: &str = include_str!("../config/onboarding_form.yaml");

/// A section entry: one of the built-in scope sections or an explicit rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SectionEntry {
    Scope { scope: ScopeSection },
    Rule(SectionRule),
}

impl SectionEntry {
    pub fn to_rule(&self) -> SectionRule {
        match self {
            SectionEntry::Scope { scope } => scope.rule(),
            SectionEntry::Rule(rule) => rule.clone(),
        }
    }
}

/// Review gate settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewConfig {
    /// Roles allowed to approve or reject
    #[serde(default = "default_elevated_roles")]
    pub elevated_roles: Vec<String>,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            elevated_roles: default_elevated_roles(),
        }
    }
}

fn default_elevated_roles() -> Vec<String> {
    vec![
        "System Manager".to_string(),
        "Administrator".to_string(),
        "Super Admin".to_string(),
    ]
}

/// A complete form definition loaded from YAML
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormConfig {
    /// Form identifier
    pub form: String,
    #[serde(default)]
    pub description: String,

    /// Section rules in evaluation order
    #[serde(default)]
    pub sections: Vec<SectionEntry>,

    /// Dependent-field resets
    #[serde(default)]
    pub resets: Vec<ResetRule>,

    /// Parent -> dependent selects
    #[serde(default)]
    pub cascades: Vec<CascadeDef>,

    /// Option catalogs by name
    #[serde(default)]
    pub catalogs: HashMap<String, OptionCatalog>,

    #[serde(default)]
    pub review: ReviewConfig,
}

impl FormConfig {
    /// The onboarding form definition bundled with the crate
    pub fn onboarding_default() -> Result<Self, ConfigError> {
        FormLoader::load_from_str(ONBOARDING_FORM_YAML)
    }

    pub fn rule_table(&self) -> Result<RuleTable, RuleTableError> {
        RuleTable::new(self.sections.iter().map(|s| s.to_rule()).collect())
    }

    /// Catalog serving a cascade, if it names one that exists
    pub fn catalog_for(&self, def: &CascadeDef) -> Option<&OptionCatalog> {
        def.catalog.as_ref().and_then(|name| self.catalogs.get(name))
    }

    pub fn cascade_for(&self, dependent: &str) -> Option<&CascadeDef> {
        self.cascades.iter().find(|c| c.dependent == dependent)
    }

    /// Check the cross-references the type system cannot
    pub fn validate(&self) -> Result<(), RuleTableError> {
        self.rule_table()?;

        let mut dependents = HashSet::new();
        for cascade in &self.cascades {
            if !dependents.insert(cascade.dependent.as_str()) {
                return Err(RuleTableError::DuplicateCascade(cascade.dependent.clone()));
            }
            if cascade.catalog.is_some() && self.catalog_for(cascade).is_none() {
                return Err(RuleTableError::MissingCatalog(cascade.dependent.clone()));
            }
        }

        Ok(())
    }
}

/// Loads form definitions from YAML
pub struct FormLoader;

impl FormLoader {
    /// Load every `*.yaml`/`*.yml` in a directory, keyed by form id
    pub fn load_from_dir(dir: &Path) -> Result<HashMap<String, FormConfig>, ConfigError> {
        let mut forms = HashMap::new();

        if !dir.exists() {
            return Ok(forms);
        }

        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();

            if path
                .extension()
                .map(|e| e == "yaml" || e == "yml")
                .unwrap_or(false)
            {
                let config = Self::load_from_file(&path)?;
                debug!(form = %config.form, path = %path.display(), "Loaded form definition");
                forms.insert(config.form.clone(), config);
            }
        }

        Ok(forms)
    }

    /// Load a single form definition from a file
    pub fn load_from_file(path: &Path) -> Result<FormConfig, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::load_from_str(&content)
    }

    /// Load from a YAML string
    pub fn load_from_str(yaml: &str) -> Result<FormConfig, ConfigError> {
        let config: FormConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }
}
