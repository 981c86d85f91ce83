use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use async_graphql::dynamic::{FieldFuture, ResolverContext};
use async_graphql::{Context, Guard};
use thiserror::Error;

use crate::context::RequestContext;
use crate::error::BoxError;

pub const ACCESS_DENIED: &str = "Access denied! You don't have permission for this action!";

#[derive(Debug, Error)]
pub enum AuthError {
    /// A collaborator the check depends on was never installed for the request.
    #[error("Authorization requires the '{0}' feature, which is not configured")]
    UnavailableFeature(&'static str),

    #[error("Authorization collaborator failed: {0}")]
    Collaborator(#[source] BoxError),
}

/// Named permission evaluated by the host policy.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Ability(Cow<'static, str>);

impl Ability {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl From<&'static str> for Ability {
    fn from(name: &'static str) -> Self {
        Self::new(name)
    }
}

impl fmt::Display for Ability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Per-request authentication state, installed in the depot by host middleware.
#[cfg_attr(any(test, feature = "test-utils"), mockall::automock)]
#[async_trait::async_trait]
pub trait Authenticator: Send + Sync + fmt::Debug {
    /// Whether the current request carries a valid identity.
    async fn check(&self) -> Result<bool, BoxError>;
}

/// Host policy deciding single abilities for the current identity.
#[cfg_attr(any(test, feature = "test-utils"), mockall::automock)]
#[async_trait::async_trait]
pub trait Policy: Send + Sync + fmt::Debug {
    async fn denies(&self, ability: &Ability) -> Result<bool, BoxError>;
}

/// Decide whether the request may use a protected field.
///
/// Denial is `Ok(false)`. A missing authenticator, or abilities without a
/// policy, fail closed with [`AuthError::UnavailableFeature`].
pub async fn check(ctx: &RequestContext, abilities: &[Ability]) -> Result<bool, AuthError> {
    let auth = ctx
        .auth()
        .ok_or(AuthError::UnavailableFeature("authenticator"))?;

    if !auth.check().await.map_err(AuthError::Collaborator)? {
        return Ok(false);
    }

    if abilities.is_empty() {
        return Ok(true);
    }

    let policy = ctx.policy().ok_or(AuthError::UnavailableFeature("policy"))?;
    for ability in abilities {
        if policy
            .denies(ability)
            .await
            .map_err(AuthError::Collaborator)?
        {
            tracing::debug!(ability = %ability, "Policy denied ability");
            return Ok(false);
        }
    }

    Ok(true)
}

/// Pluggable authorization check used by protected fields.
#[async_trait::async_trait]
pub trait AuthCheck: Send + Sync {
    async fn check(&self, ctx: &RequestContext, abilities: &[Ability]) -> Result<bool, AuthError>;
}

/// Default checker, backed by the request's authenticator and policy.
#[derive(Debug, Default, Clone, Copy)]
pub struct PolicyAuthChecker;

#[async_trait::async_trait]
impl AuthCheck for PolicyAuthChecker {
    async fn check(&self, ctx: &RequestContext, abilities: &[Ability]) -> Result<bool, AuthError> {
        check(ctx, abilities).await
    }
}

/// Checker stored in the schema data.
#[derive(Clone)]
pub struct AuthHook(Arc<dyn AuthCheck>);

impl AuthHook {
    pub fn new(checker: Arc<dyn AuthCheck>) -> Self {
        Self(checker)
    }
}

impl Default for AuthHook {
    fn default() -> Self {
        Self(Arc::new(PolicyAuthChecker))
    }
}

async fn enforce(ctx: &Context<'_>, abilities: &[Ability]) -> async_graphql::Result<()> {
    let hook = ctx.data::<AuthHook>()?;
    let request = ctx.data::<RequestContext>()?;

    match hook.0.check(request, abilities).await {
        Ok(true) => Ok(()),
        Ok(false) => Err(async_graphql::Error::new(ACCESS_DENIED)),
        Err(err) => {
            tracing::warn!(error = %err, "Authorization check failed");
            Err(async_graphql::Error::new(err.to_string()))
        }
    }
}

fn constrain<F>(f: F) -> F
where
    F: for<'a> Fn(ResolverContext<'a>) -> FieldFuture<'a> + Send + Sync + 'static,
{
    f
}

/// Wrap a dynamic field resolver so it only runs for authorized requests.
pub fn authorized<F>(
    abilities: impl IntoIterator<Item = Ability>,
    resolver: F,
) -> impl for<'a> Fn(ResolverContext<'a>) -> FieldFuture<'a> + Send + Sync + 'static
where
    F: for<'a> Fn(ResolverContext<'a>) -> FieldFuture<'a> + Send + Sync + 'static,
{
    let abilities: Arc<[Ability]> = abilities.into_iter().collect();
    let resolver = Arc::new(resolver);

    constrain(move |ctx| {
        let abilities = abilities.clone();
        let resolver = resolver.clone();
        FieldFuture::new(async move {
            enforce(ctx.ctx, &abilities).await?;
            match resolver(ctx) {
                FieldFuture::Future(fut) => fut.await,
                FieldFuture::Value(value) => Ok(value),
            }
        })
    })
}

/// Guard for statically typed objects merged into a schema.
pub struct Authorized {
    abilities: Vec<Ability>,
}

impl Authorized {
    pub fn new<I, A>(abilities: I) -> Self
    where
        I: IntoIterator<Item = A>,
        A: Into<Ability>,
    {
        Self {
            abilities: abilities.into_iter().map(Into::into).collect(),
        }
    }
}

impl Guard for Authorized {
    async fn check(&self, ctx: &Context<'_>) -> async_graphql::Result<()> {
        enforce(ctx, &self.abilities).await
    }
}

#[cfg(test)]
#[path = "auth_tests.rs"]
mod auth_tests;
