use std::{borrow::Cow, collections::HashMap};

use crate::multi_map::MultiMap;

use super::{
    pattern::{validate_variable_name, CompileError},
    Bindings,
};

/// Read access to the query parameters of a request.
pub trait QueryParams {
    fn get_param(&self, key: &str) -> Option<Cow<'_, str>>;
}

impl QueryParams for HashMap<String, String> {
    fn get_param(&self, key: &str) -> Option<Cow<'_, str>> {
        self.get(key).map(|v| Cow::Borrowed(v.as_str()))
    }
}

impl QueryParams for HashMap<&str, &str> {
    fn get_param(&self, key: &str) -> Option<Cow<'_, str>> {
        self.get(key).map(|v| Cow::Borrowed(*v))
    }
}

/// Repeated parameters read as their values joined by `,`.
impl QueryParams for MultiMap<String, String> {
    fn get_param(&self, key: &str) -> Option<Cow<'_, str>> {
        self.get_joined(key, ",")
    }
}

/// One entry of a rule's `query` mapping.
#[derive(Clone, Eq, PartialEq, Debug)]
pub enum QueryConstraint {
    /// The request value must equal this string. Absent counts as empty.
    Exact(String),
    /// `:name`, the request must carry a non-empty value.
    Required(String),
    /// `:name?`, binds the request value or an empty string.
    Optional(String),
}

impl QueryConstraint {
    pub fn parse(spec: &str) -> Result<Self, CompileError> {
        let Some(variable) = spec.strip_prefix(':') else {
            return Ok(Self::Exact(spec.to_owned()));
        };
        match variable.strip_suffix('?') {
            Some(name) => {
                validate_variable_name(name, spec)?;
                Ok(Self::Optional(name.to_owned()))
            }
            None => {
                validate_variable_name(variable, spec)?;
                Ok(Self::Required(variable.to_owned()))
            }
        }
    }

    pub fn variable_name(&self) -> Option<&str> {
        match self {
            Self::Exact(_) => None,
            Self::Required(name) | Self::Optional(name) => Some(name),
        }
    }

    /// Checks `value` against the constraint, binding the variable on success.
    pub fn evaluate(&self, value: Option<&str>, bindings: &mut Bindings) -> bool {
        let value = value.unwrap_or_default();
        match self {
            Self::Exact(expected) => expected == value,
            Self::Required(_) if value.is_empty() => false,
            Self::Required(name) | Self::Optional(name) => {
                bindings.insert(name.clone(), value.to_owned());
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use crate::{
        multi_map::MultiMap,
        redirect::{pattern::CompileError, Bindings},
    };

    use super::{QueryConstraint, QueryParams};

    #[test]
    fn test_parse() {
        let tests = [
            ("search", QueryConstraint::Exact("search".to_owned())),
            ("", QueryConstraint::Exact("".to_owned())),
            ("a:b", QueryConstraint::Exact("a:b".to_owned())),
            (":q", QueryConstraint::Required("q".to_owned())),
            (":u?", QueryConstraint::Optional("u".to_owned())),
        ];

        for (spec, want) in tests {
            assert_eq!(QueryConstraint::parse(spec).unwrap(), want);
        }
    }

    #[test]
    fn test_parse_err() {
        let tests = [
            (":", CompileError::EmptyVariableName(":".to_owned())),
            (":?", CompileError::EmptyVariableName(":?".to_owned())),
            (":a b", CompileError::InvalidVariableName("a b".to_owned())),
            (":q??", CompileError::InvalidVariableName("q?".to_owned())),
        ];

        for (spec, want) in tests {
            assert_eq!(QueryConstraint::parse(spec).unwrap_err(), want);
        }
    }

    #[test]
    fn test_exact() {
        let constraint = QueryConstraint::Exact("search".to_owned());
        let mut bindings = Bindings::new();
        assert!(constraint.evaluate(Some("search"), &mut bindings));
        assert!(!constraint.evaluate(Some("find"), &mut bindings));
        assert!(!constraint.evaluate(None, &mut bindings));
        assert!(bindings.is_empty());
    }

    #[test]
    fn test_exact_empty_matches_absent() {
        let constraint = QueryConstraint::Exact("".to_owned());
        let mut bindings = Bindings::new();
        assert!(constraint.evaluate(None, &mut bindings));
        assert!(constraint.evaluate(Some(""), &mut bindings));
        assert!(!constraint.evaluate(Some("x"), &mut bindings));
    }

    #[test]
    fn test_required() {
        let constraint = QueryConstraint::Required("q".to_owned());

        let mut bindings = Bindings::new();
        assert!(constraint.evaluate(Some("recursion"), &mut bindings));
        assert_eq!(bindings["q"], "recursion");

        let mut bindings = Bindings::new();
        assert!(!constraint.evaluate(Some(""), &mut bindings));
        assert!(!constraint.evaluate(None, &mut bindings));
        assert!(bindings.is_empty());
    }

    #[test]
    fn test_optional() {
        let constraint = QueryConstraint::Optional("u".to_owned());

        let mut bindings = Bindings::new();
        assert!(constraint.evaluate(None, &mut bindings));
        assert_eq!(bindings["u"], "");

        assert!(constraint.evaluate(Some("thewbear"), &mut bindings));
        assert_eq!(bindings["u"], "thewbear");
    }

    #[test]
    fn test_query_params_impls() {
        let owned = HashMap::from([("q".to_owned(), "x".to_owned())]);
        assert_eq!(owned.get_param("q").as_deref(), Some("x"));
        assert_eq!(owned.get_param("z"), None);

        let borrowed = HashMap::from([("q", "y")]);
        assert_eq!(borrowed.get_param("q").as_deref(), Some("y"));

        let mut mm = MultiMap::new_empty();
        mm.insert_scalar("tag".to_owned(), "a".to_owned());
        mm.insert_scalar("tag".to_owned(), "b".to_owned());
        assert_eq!(mm.get_param("tag").as_deref(), Some("a,b"));
    }
}
