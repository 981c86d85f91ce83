use std::ops::Deref;
use std::sync::Arc;

use salvo::http::uri::Uri;
use salvo::http::{HeaderMap, Method};
use salvo::prelude::*;

use crate::auth::{Authenticator, Policy};

/// Host request context passed to resolvers as per-request execution data.
///
/// Built from the Salvo request and depot; the authentication and policy
/// collaborators are whatever the host's middleware injected into the depot.
#[derive(Clone, Debug, Default)]
pub struct RequestContext {
    inner: Arc<RequestContextInner>,
}

#[derive(Debug, Default)]
pub struct RequestContextInner {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub remote_addr: Option<String>,
    pub auth: Option<Arc<dyn Authenticator>>,
    pub policy: Option<Arc<dyn Policy>>,
}

impl RequestContext {
    pub fn new(inner: RequestContextInner) -> Self {
        Self {
            inner: Arc::new(inner),
        }
    }

    pub fn from_request(req: &Request, depot: &Depot) -> Self {
        Self::new(RequestContextInner {
            method: req.method().clone(),
            uri: req.uri().clone(),
            headers: req.headers().clone(),
            remote_addr: Some(req.remote_addr().to_string()),
            auth: depot.obtain::<Arc<dyn Authenticator>>().ok().cloned(),
            policy: depot.obtain::<Arc<dyn Policy>>().ok().cloned(),
        })
    }

    pub fn with_auth(auth: Arc<dyn Authenticator>) -> Self {
        Self::new(RequestContextInner {
            auth: Some(auth),
            ..Default::default()
        })
    }

    pub fn with_auth_and_policy(auth: Arc<dyn Authenticator>, policy: Arc<dyn Policy>) -> Self {
        Self::new(RequestContextInner {
            auth: Some(auth),
            policy: Some(policy),
            ..Default::default()
        })
    }

    pub fn auth(&self) -> Option<&Arc<dyn Authenticator>> {
        self.inner.auth.as_ref()
    }

    pub fn policy(&self) -> Option<&Arc<dyn Policy>> {
        self.inner.policy.as_ref()
    }
}

impl Deref for RequestContext {
    type Target = RequestContextInner;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}
