use std::sync::Arc;

use async_graphql::Executor;
use async_graphql::dynamic::{Schema, SchemaBuilder};
use async_graphql::extensions::{Extension, ExtensionFactory};
use async_graphql::http::{GraphiQLSource, MultipartOptions, parse_query_string, receive_batch_body};
use async_graphql::parser::parse_query;
use async_graphql::parser::types::OperationType;
use futures_util::io::Cursor;
use salvo::http::StatusCode;
use salvo::http::header::{ALLOW, CACHE_CONTROL, CONTENT_TYPE, HeaderValue};

use crate::adapter::{EngineRequest, EngineResponse};
use crate::config::{EngineOptions, EnginePlugin, LandingPage};
use crate::context::RequestContext;
use crate::error::Error;

const JSON: &str = "application/json; charset=utf-8";

struct SharedExtension(Arc<dyn ExtensionFactory>);

impl ExtensionFactory for SharedExtension {
    fn create(&self) -> Arc<dyn Extension> {
        self.0.create()
    }
}

/// Started execution engine for one schema.
#[derive(Clone)]
pub struct Engine {
    schema: Schema,
    landing_page: Option<LandingPage>,
    endpoint: String,
}

impl Engine {
    /// Apply engine options and plugins to the builder and seal the schema.
    ///
    /// Plugins apply in order, so a later landing page plugin replaces an
    /// earlier one.
    pub fn start(
        mut builder: SchemaBuilder,
        options: &EngineOptions,
        plugins: Vec<EnginePlugin>,
        endpoint: &str,
    ) -> Result<Self, Error> {
        if let Some(depth) = options.depth_limit {
            builder = builder.limit_depth(depth);
        }
        if let Some(complexity) = options.complexity_limit {
            builder = builder.limit_complexity(complexity);
        }
        if !options.introspection {
            builder = builder.disable_introspection();
        }

        let mut landing_page = Some(LandingPage::default());
        for plugin in plugins {
            match plugin {
                EnginePlugin::Extension(factory) => {
                    builder = builder.extension(SharedExtension(factory));
                }
                EnginePlugin::LandingPage(page) => landing_page = Some(page),
                EnginePlugin::LandingPageDisabled => landing_page = None,
            }
        }

        Ok(Self {
            schema: builder.finish()?,
            landing_page,
            endpoint: endpoint.to_string(),
        })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn sdl(&self) -> String {
        self.schema.sdl()
    }

    pub fn landing_page(&self) -> Option<&LandingPage> {
        self.landing_page.as_ref()
    }

    /// Execute one HTTP request against the schema.
    pub async fn execute(&self, req: EngineRequest, ctx: RequestContext) -> EngineResponse {
        match req.method.as_str() {
            "GET" | "HEAD" => self.execute_get(req, ctx).await,
            "POST" => self.execute_post(req, ctx).await,
            _ => {
                let mut res = EngineResponse::complete(
                    StatusCode::METHOD_NOT_ALLOWED,
                    "GraphQL only supports GET and POST requests.",
                );
                res.headers
                    .insert(ALLOW, HeaderValue::from_static("GET, POST"));
                res
            }
        }
    }

    async fn execute_get(&self, req: EngineRequest, ctx: RequestContext) -> EngineResponse {
        let query = req.search.trim_start_matches('?');
        let has_operation = query
            .split('&')
            .any(|pair| pair.split('=').next() == Some("query"));

        if !has_operation {
            return match &self.landing_page {
                Some(page) if req.accepts("text/html") => self.render_landing_page(page),
                _ => bad_request("GET query missing."),
            };
        }

        match parse_query_string(query) {
            Ok(request) if is_mutation(&request) => {
                let mut res = EngineResponse::complete(
                    StatusCode::METHOD_NOT_ALLOWED,
                    "Mutations can only be sent over POST.",
                );
                res.headers.insert(ALLOW, HeaderValue::from_static("POST"));
                res
            }
            Ok(request) => {
                self.respond(async_graphql::BatchRequest::Single(request.data(ctx)))
                    .await
            }
            Err(err) => bad_request(&err.to_string()),
        }
    }

    async fn execute_post(&self, req: EngineRequest, ctx: RequestContext) -> EngineResponse {
        let content_type = req.header("content-type").map(str::to_string);
        let batch = receive_batch_body(
            content_type,
            Cursor::new(req.body),
            MultipartOptions::default(),
        )
        .await;

        match batch {
            Ok(batch) => self.respond(batch.data(ctx)).await,
            Err(err) => bad_request(&err.to_string()),
        }
    }

    async fn respond(&self, batch: async_graphql::BatchRequest) -> EngineResponse {
        let response = self.schema.execute_batch(batch).await;
        let body = match serde_json::to_string(&response) {
            Ok(body) => body,
            Err(err) => {
                tracing::error!(error = %err, "Failed to serialize GraphQL response");
                return EngineResponse::complete(StatusCode::INTERNAL_SERVER_ERROR, "");
            }
        };

        let mut res = EngineResponse::complete(StatusCode::OK, body);
        res.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static(JSON));
        if let Some(cache_control) = response
            .cache_control()
            .value()
            .and_then(|value: String| HeaderValue::from_str(&value).ok())
        {
            res.headers.insert(CACHE_CONTROL, cache_control);
        }
        res
    }

    fn render_landing_page(&self, page: &LandingPage) -> EngineResponse {
        let html = GraphiQLSource::build()
            .endpoint(&self.endpoint)
            .subscription_endpoint(&self.endpoint)
            .title(&page.title)
            .finish();

        let mut res = EngineResponse::complete(StatusCode::OK, html);
        res.headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("text/html; charset=utf-8"),
        );
        res
    }
}

/// Whether the operation a GET request would run is a mutation.
///
/// Documents that fail to parse are left to the executor to report.
fn is_mutation(request: &async_graphql::Request) -> bool {
    let Ok(document) = parse_query(&request.query) else {
        return false;
    };
    document.operations.iter().any(|(name, operation)| {
        let selected = match (&request.operation_name, name) {
            (Some(wanted), Some(name)) => wanted.as_str() == name.as_str(),
            (Some(_), None) => false,
            (None, _) => true,
        };
        selected && operation.node.ty == OperationType::Mutation
    })
}

fn bad_request(message: &str) -> EngineResponse {
    let body = serde_json::json!({ "errors": [{ "message": message }] }).to_string();
    let mut res = EngineResponse::complete(StatusCode::BAD_REQUEST, body);
    res.headers
        .insert(CONTENT_TYPE, HeaderValue::from_static(JSON));
    res
}
