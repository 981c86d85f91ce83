use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_graphql::extensions::ExtensionFactory;
use confique::Config;
use indexmap::IndexMap;
use serde::Deserialize;

use crate::auth::AuthCheck;
use crate::host::Environment;
use crate::scalars::ScalarDefinition;

/// Default request body limit for GraphQL routes (8 MiB).
pub const DEFAULT_MAX_BODY_SIZE: usize = 8 * 1024 * 1024;

/// Process-level configuration, read from the environment.
#[derive(Debug, Clone, Config)]
pub struct AppConfig {
    #[config(env = "BIND_ADDRESS", default = "0.0.0.0:8002")]
    pub bind_address: String,

    #[config(env = "APP_ENV", default = "web")]
    pub environment: Environment,

    /// Root directory resolver patterns are resolved against.
    #[config(env = "APP_ROOT", default = ".")]
    pub app_root: PathBuf,

    #[config(env = "GRAPHQL_CONFIG", default = "config/graphql.toml")]
    pub graphql_config: PathBuf,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn load_and_validate() -> Result<Self, confique::Error> {
        Self::builder().env().load()
    }
}

/// Registry of GraphQL servers, keyed by server name.
///
/// Entries keep their file order, but servers are independent of each other.
#[derive(Debug, Clone, Default, Config)]
pub struct GraphQLConfig {
    pub servers: IndexMap<String, ServerConfig>,
}

impl GraphQLConfig {
    /// Load the registry from a TOML file.
    pub fn load(path: &Path) -> Result<Self, confique::Error> {
        Self::builder().file(path).load()
    }

    pub fn with_server(mut self, name: impl Into<String>, server: ServerConfig) -> Self {
        self.servers.insert(name.into(), server);
        self
    }
}

/// Description of one GraphQL endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Route path, shared by the HTTP handler and the WebSocket transport.
    pub path: String,

    #[serde(default)]
    pub resolver_patterns: Option<Vec<String>>,

    #[serde(default)]
    pub schema: SchemaOptions,

    #[serde(default)]
    pub engine: EngineOptions,

    /// Subscriptions over WebSocket are only served when this is present.
    #[serde(default)]
    pub pub_sub: Option<PubSubConfig>,
}

impl ServerConfig {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            resolver_patterns: None,
            schema: SchemaOptions::default(),
            engine: EngineOptions::default(),
            pub_sub: None,
        }
    }

    pub fn with_patterns<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.resolver_patterns = Some(patterns.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_pub_sub(mut self, pub_sub: PubSubConfig) -> Self {
        self.pub_sub = Some(pub_sub);
        self
    }

    pub fn patterns(&self) -> &[String] {
        self.resolver_patterns.as_deref().unwrap_or_default()
    }
}

/// Options handed to the schema builder.
///
/// Resolvers and the DI adapter are never configured here; the server
/// supplies them when it builds the schema.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct SchemaOptions {
    pub query_type: String,
    pub mutation_type: String,
    pub subscription_type: String,
    pub suggestions: bool,
    /// Write the SDL of the built schema to this path.
    pub emit_schema_file: Option<PathBuf>,

    /// Custom scalars. Built-in scalars with the same name are replaced.
    #[serde(skip)]
    pub scalars: Vec<ScalarDefinition>,

    /// Replaces the default authorization bridge.
    #[serde(skip)]
    pub auth_checker: Option<Arc<dyn AuthCheck>>,
}

impl Default for SchemaOptions {
    fn default() -> Self {
        Self {
            query_type: "Query".to_string(),
            mutation_type: "Mutation".to_string(),
            subscription_type: "Subscription".to_string(),
            suggestions: true,
            emit_schema_file: None,
            scalars: Vec::new(),
            auth_checker: None,
        }
    }
}

impl fmt::Debug for SchemaOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaOptions")
            .field("query_type", &self.query_type)
            .field("mutation_type", &self.mutation_type)
            .field("subscription_type", &self.subscription_type)
            .field("suggestions", &self.suggestions)
            .field("emit_schema_file", &self.emit_schema_file)
            .field("scalars", &self.scalars)
            .field("auth_checker", &self.auth_checker.is_some())
            .finish()
    }
}

/// Options handed to the execution engine.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineOptions {
    /// Serve the GraphiQL landing page on `GET` requests without an operation.
    pub playground: bool,
    pub introspection: bool,
    pub depth_limit: Option<usize>,
    pub complexity_limit: Option<usize>,
    /// Largest request body read from the wire, in bytes.
    pub max_body_size: usize,

    #[serde(skip)]
    pub plugins: Vec<EnginePlugin>,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            playground: false,
            introspection: true,
            depth_limit: None,
            complexity_limit: None,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            plugins: Vec::new(),
        }
    }
}

#[derive(Clone)]
pub enum EnginePlugin {
    Extension(Arc<dyn ExtensionFactory>),
    LandingPage(LandingPage),
    LandingPageDisabled,
}

impl fmt::Debug for EnginePlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnginePlugin::Extension(_) => f.write_str("Extension"),
            EnginePlugin::LandingPage(page) => f.debug_tuple("LandingPage").field(page).finish(),
            EnginePlugin::LandingPageDisabled => f.write_str("LandingPageDisabled"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LandingPage {
    pub title: String,
}

impl Default for LandingPage {
    fn default() -> Self {
        Self {
            title: "GraphiQL".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PubSubConfig {
    /// Buffered events per topic before slow subscribers start lagging.
    pub capacity: usize,
}

impl Default for PubSubConfig {
    fn default() -> Self {
        Self { capacity: 256 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_server_registry_from_toml_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("graphql.toml");
        std::fs::write(
            &path,
            r#"
[servers.main]
path = "/graphql"
resolver_patterns = ["app/graphql/resolvers/*.rs"]

[servers.main.engine]
playground = true

[servers.admin]
path = "/admin/graphql"

[servers.admin.pub_sub]
capacity = 16
"#,
        )
        .expect("write config");

        let config = GraphQLConfig::load(&path).expect("load config");

        assert_eq!(config.servers.len(), 2);

        let main = &config.servers["main"];
        assert_eq!(main.path, "/graphql");
        assert_eq!(main.patterns().to_vec(), vec!["app/graphql/resolvers/*.rs".to_string()]);
        assert!(main.engine.playground);
        assert!(main.engine.introspection);
        assert!(main.pub_sub.is_none());
        assert_eq!(main.schema.query_type, "Query");

        let admin = &config.servers["admin"];
        assert!(admin.resolver_patterns.is_none());
        assert!(!admin.engine.playground);
        assert_eq!(admin.pub_sub.as_ref().map(|p| p.capacity), Some(16));
    }

    #[test]
    fn test_missing_registry_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let result = GraphQLConfig::load(&dir.path().join("missing.toml"));
        assert!(result.is_err());
    }
}
