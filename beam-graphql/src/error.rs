use std::path::PathBuf;

use salvo::http::StatusCode;
use salvo::http::body::ResBody;
use salvo::prelude::*;
use thiserror::Error;

use crate::adapter::AdapterError;
use crate::auth::AuthError;
use crate::injector::ContainerError;

/// Boxed error returned by host collaborators (authenticators, policies,
/// resolver loaders, container factories).
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("GraphQL config missing in {}", .0.display())]
    MissingConfig(PathBuf),

    #[error("GraphQL server '{0}' not found")]
    ServerNotFound(String),

    #[error("GraphQL manager not initialized")]
    NotInitialized,

    #[error("HTTP listener is not available yet")]
    ListenerUnavailable,

    #[error(
        "No resolvers found for GraphQL schema '{server}'. Make sure your resolver files exist \
         and are registered in the resolver catalog. Configured patterns: {patterns:?}"
    )]
    NoResolvers {
        server: String,
        patterns: Vec<String>,
    },

    #[error("GraphQL schema '{0}' is already built, resolvers can no longer be attached")]
    SchemaSealed(String),

    #[error("Failed to load resolver '{label}': {source}")]
    ResolverLoad {
        label: String,
        #[source]
        source: BoxError,
    },

    #[error("Resolver '{resolver}' failed to register: {source}")]
    ResolverRegister {
        resolver: String,
        #[source]
        source: BoxError,
    },

    #[error("Failed to build GraphQL schema: {0}")]
    SchemaBuild(#[from] async_graphql::dynamic::SchemaError),

    #[error("Failed to write schema file {}: {source}", path.display())]
    EmitSchema {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("GraphQL engine for '{0}' has not been started")]
    EngineNotStarted(String),

    #[error("Failed to start GraphQL server '{server}': {source}")]
    Start {
        server: String,
        #[source]
        source: Box<Error>,
    },

    #[error("Collaborator error: {0}")]
    Collaborator(#[source] BoxError),

    #[error(transparent)]
    Adapter(#[from] AdapterError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Container(#[from] ContainerError),
}

impl Error {
    /// HTTP status used when the error escapes a request handler.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Adapter(AdapterError::Body(_)) => StatusCode::BAD_REQUEST,
            Error::Auth(AuthError::UnavailableFeature(_)) => StatusCode::NOT_IMPLEMENTED,
            Error::EngineNotStarted(_) => StatusCode::SERVICE_UNAVAILABLE,
            Error::ServerNotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Write the error onto a response.
    pub fn render(&self, res: &mut Response) {
        res.body(ResBody::None);
        res.status_code(self.status_code());
        res.render(Text::Plain(self.to_string()));
    }
}
