use std::fmt;
use std::sync::Arc;

use async_graphql::Value;
use async_graphql::dynamic::Scalar;
use chrono::DateTime;
use indexmap::IndexMap;

type Validator = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// Custom scalar registered on every schema build.
#[derive(Clone)]
pub struct ScalarDefinition {
    pub name: String,
    pub description: Option<String>,
    pub specified_by_url: Option<String>,
    validator: Option<Validator>,
}

impl ScalarDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            specified_by_url: None,
            validator: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn specified_by_url(mut self, url: impl Into<String>) -> Self {
        self.specified_by_url = Some(url.into());
        self
    }

    pub fn validator(mut self, validator: impl Fn(&Value) -> bool + Send + Sync + 'static) -> Self {
        self.validator = Some(Arc::new(validator));
        self
    }

    pub fn is_valid(&self, value: &Value) -> bool {
        self.validator.as_ref().is_none_or(|validate| validate(value))
    }

    pub fn into_scalar(self) -> Scalar {
        let mut scalar = Scalar::new(self.name);
        if let Some(description) = self.description {
            scalar = scalar.description(description);
        }
        if let Some(url) = self.specified_by_url {
            scalar = scalar.specified_by_url(url);
        }
        if let Some(validate) = self.validator {
            scalar = scalar.validator(move |value| validate(value));
        }
        scalar
    }
}

impl fmt::Debug for ScalarDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScalarDefinition")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("specified_by_url", &self.specified_by_url)
            .finish_non_exhaustive()
    }
}

/// Scalars every schema gets unless a user scalar of the same name replaces it.
pub fn base_scalars() -> Vec<ScalarDefinition> {
    vec![
        ScalarDefinition::new("DateTime")
            .description("An ISO-8601 encoded UTC date-time string.")
            .specified_by_url("https://datatracker.ietf.org/doc/html/rfc3339")
            .validator(|value| match value {
                Value::String(text) => DateTime::parse_from_rfc3339(text).is_ok(),
                _ => false,
            }),
    ]
}

/// Merge scalar lists by name. Later entries win, first position is kept.
pub fn merge(
    base: impl IntoIterator<Item = ScalarDefinition>,
    user: impl IntoIterator<Item = ScalarDefinition>,
) -> Vec<ScalarDefinition> {
    let mut merged: IndexMap<String, ScalarDefinition> = IndexMap::new();
    for scalar in base.into_iter().chain(user) {
        merged.insert(scalar.name.clone(), scalar);
    }
    merged.into_values().collect()
}
