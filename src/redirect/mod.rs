use std::collections::HashMap;

use indexmap::IndexMap;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::status_code_registry::{self, ReasonPhrase};

pub use pattern::{CompileError, PathPattern};
pub use query::{QueryConstraint, QueryParams};
pub use template::Template;

mod pattern;
mod query;
mod template;

/// Variable name to bound value, filled from the path first and then the query.
pub type Bindings = HashMap<String, String>;

const DEFAULT_STATUS: ReasonPhrase = ReasonPhrase::TemporaryRedirect;

/// One entry of the rule file.
#[derive(Deserialize, Clone, Debug, Eq, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RuleDefinition {
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub status: Option<u16>,
    /// Evaluated in the order written.
    #[serde(default)]
    pub query: IndexMap<String, String>,
}

impl RuleDefinition {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            status: None,
            query: IndexMap::new(),
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_query(mut self, key: impl Into<String>, spec: impl Into<String>) -> Self {
        self.query.insert(key.into(), spec.into());
        self
    }
}

#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum LoadError {
    #[error("rule #{index} `from: {from}`: {source}")]
    Pattern {
        index: usize,
        from: String,
        #[source]
        source: CompileError,
    },
    #[error("rule #{index} `query.{key}: {spec}`: {source}")]
    Query {
        index: usize,
        key: String,
        spec: String,
        #[source]
        source: CompileError,
    },
    #[error("rule #{index}: {status} is not a redirect status")]
    Status { index: usize, status: u16 },
}

#[derive(Clone, Debug)]
pub struct CompiledRule {
    source: RuleDefinition,
    pattern: PathPattern,
    query: Vec<(String, QueryConstraint)>,
    destination: Template,
    status: u16,
}

impl CompiledRule {
    pub fn compile(index: usize, source: RuleDefinition) -> Result<Self, LoadError> {
        let pattern = PathPattern::compile(&source.from).map_err(|err| LoadError::Pattern {
            index,
            from: source.from.clone(),
            source: err,
        })?;

        let query = source
            .query
            .iter()
            .map(|(key, spec)| match QueryConstraint::parse(spec) {
                Ok(constraint) => Ok((key.clone(), constraint)),
                Err(err) => Err(LoadError::Query {
                    index,
                    key: key.clone(),
                    spec: spec.clone(),
                    source: err,
                }),
            })
            .collect::<Result<Vec<_>, _>>()?;

        let status = match source.status {
            Some(status) if is_redirect_status(status) => status,
            Some(status) => return Err(LoadError::Status { index, status }),
            None => status_code_registry::get_status_code(DEFAULT_STATUS),
        };

        let declared = pattern
            .variable_names()
            .chain(query.iter().filter_map(|(_, c)| c.variable_name()));
        let destination = Template::compile(&source.to, declared);

        Ok(Self {
            source,
            pattern,
            query,
            destination,
            status,
        })
    }

    pub fn source(&self) -> &RuleDefinition {
        &self.source
    }

    pub fn from(&self) -> &str {
        self.pattern.as_str()
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    /// Returns the rendered destination when both path and query are accepted.
    fn apply(&self, path: &str, query: &(impl QueryParams + ?Sized)) -> Option<String> {
        let mut bindings = self.pattern.captures(path)?;

        let accepted = self.query.iter().all(|(key, constraint)| {
            constraint.evaluate(query.get_param(key).as_deref(), &mut bindings)
        });

        accepted.then(|| self.destination.render(&bindings))
    }
}

fn is_redirect_status(status: u16) -> bool {
    status_code_registry::get_reason_phrase(status).is_some_and(|r| r.is_redirect())
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum MatchOutcome {
    Redirect { status: u16, destination: String },
    NotFound,
}

/// Ordered rule list. The first rule accepting a request wins.
#[derive(Clone, Debug)]
pub struct RedirectEngine {
    rules: Vec<CompiledRule>,
    not_found_page: String,
}

impl RedirectEngine {
    pub fn new(
        definitions: impl IntoIterator<Item = RuleDefinition>,
        not_found_page: impl Into<String>,
    ) -> Result<Self, LoadError> {
        let rules = definitions
            .into_iter()
            .enumerate()
            .map(|(index, definition)| CompiledRule::compile(index, definition))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            rules,
            not_found_page: not_found_page.into(),
        })
    }

    pub fn rules(&self) -> &[CompiledRule] {
        &self.rules
    }

    pub fn not_found_page(&self) -> &str {
        &self.not_found_page
    }

    /// `None` means the request carried no path at all.
    pub fn resolve(&self, path: Option<&str>, query: &(impl QueryParams + ?Sized)) -> MatchOutcome {
        let Some(path) = path else {
            debug!("no path");
            return MatchOutcome::NotFound;
        };
        let path = normalize_path(path);

        for rule in &self.rules {
            if let Some(destination) = rule.apply(&path, query) {
                info!("match: {} -> {}", rule.from(), destination);
                return MatchOutcome::Redirect {
                    status: rule.status,
                    destination,
                };
            }
        }

        debug!("no match: {}", path);
        MatchOutcome::NotFound
    }
}

/// Adds the leading `/` and strips one trailing `/`.
pub fn normalize_path(path: &str) -> String {
    let mut normalized = if path.starts_with('/') {
        path.to_owned()
    } else {
        format!("/{}", path)
    };
    if normalized.ends_with('/') {
        normalized.pop();
    }
    normalized
}
