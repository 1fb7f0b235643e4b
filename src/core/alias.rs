//! Site alias resolution.
//!
//! An alias names one `<site>.<environment>` pair known to the remote
//! front-end. Resolving it yields an [`ExecutionTarget`] that the remote
//! executor runs commands against.

use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::runner::CommandRunner;

/// Attribute holding the site URI of an alias.
pub const URI_ATTRIBUTE: &str = "uri";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionTarget {
    /// Alias identifier as the front-end expects it, e.g. `@www.local`.
    pub id: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
}

impl ExecutionTarget {
    pub fn new(site: &str, environment: &str, attributes: BTreeMap<String, String>) -> Self {
        Self {
            id: format!("@{}", alias_name(site, environment)),
            attributes,
        }
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }
}

pub fn alias_name(site: &str, environment: &str) -> String {
    format!("{}.{}", site, environment)
}

/// Source of known aliases.
pub trait AliasRegistry {
    /// Attributes of the alias called `name` (`<site>.<environment>`), or
    /// `None` when the registry has no such alias.
    fn lookup(&self, name: &str) -> Result<Option<BTreeMap<String, String>>>;
}

pub struct AliasResolver<'a> {
    registry: &'a dyn AliasRegistry,
}

impl<'a> AliasResolver<'a> {
    pub fn new(registry: &'a dyn AliasRegistry) -> Self {
        Self { registry }
    }

    pub fn resolve(&self, site: &str, environment: &str) -> Result<ExecutionTarget> {
        let name = alias_name(site, environment);
        match self.registry.lookup(&name)? {
            Some(attributes) => Ok(ExecutionTarget::new(site, environment, attributes)),
            None => Err(Error::alias_not_found(site, environment)),
        }
    }
}

/// In-memory registry keyed by `<site>.<environment>`.
#[derive(Debug, Default, Clone)]
pub struct StaticAliasRegistry {
    aliases: HashMap<String, BTreeMap<String, String>>,
}

impl StaticAliasRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_alias(mut self, site: &str, environment: &str, attributes: &[(&str, &str)]) -> Self {
        self.aliases.insert(
            alias_name(site, environment),
            attributes
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        );
        self
    }
}

impl AliasRegistry for StaticAliasRegistry {
    fn lookup(&self, name: &str) -> Result<Option<BTreeMap<String, String>>> {
        Ok(self.aliases.get(name).cloned())
    }
}

/// Asks `drush site:alias` for alias records.
pub struct DrushAliasRegistry<'a> {
    runner: &'a dyn CommandRunner,
    drush: String,
    project_root: PathBuf,
}

impl<'a> DrushAliasRegistry<'a> {
    pub fn new(runner: &'a dyn CommandRunner, drush: impl Into<String>, project_root: PathBuf) -> Self {
        Self {
            runner,
            drush: drush.into(),
            project_root,
        }
    }
}

impl AliasRegistry for DrushAliasRegistry<'_> {
    fn lookup(&self, name: &str) -> Result<Option<BTreeMap<String, String>>> {
        let command = format!("{} site:alias @{} --format=json", self.drush, name);
        let result = self.runner.run(&command, &self.project_root, &[], false)?;

        // drush exits non-zero for unknown aliases
        if !result.success {
            return Ok(None);
        }

        parse_alias_record(&result.output_text(), name)
    }
}

/// Parse `site:alias --format=json` output into flat string attributes.
///
/// The record is keyed by `@<name>`; when the key differs (e.g. a
/// self-alias), the first record is taken.
pub fn parse_alias_record(output: &str, name: &str) -> Result<Option<BTreeMap<String, String>>> {
    let Some(start) = output.find('{') else {
        return Ok(None);
    };

    let value: Value = serde_json::from_str(&output[start..]).map_err(|e| {
        Error::internal_json(e.to_string(), Some(format!("parse alias record for {}", name)))
    })?;

    let Value::Object(records) = value else {
        return Ok(None);
    };

    let key = format!("@{}", name);
    let record = records.get(&key).or_else(|| records.values().next());

    let Some(Value::Object(fields)) = record else {
        return Ok(None);
    };

    let attributes = fields
        .iter()
        .filter_map(|(k, v)| match v {
            Value::String(s) => Some((k.clone(), s.clone())),
            Value::Number(n) => Some((k.clone(), n.to_string())),
            Value::Bool(b) => Some((k.clone(), b.to_string())),
            _ => None,
        })
        .collect();

    Ok(Some(attributes))
}
