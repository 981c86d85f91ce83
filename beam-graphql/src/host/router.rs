use std::sync::Arc;

use parking_lot::Mutex;
use salvo::http::Method;
use salvo::prelude::*;
use salvo::routing::filters::MethodFilter;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteInfo {
    pub path: String,
    pub methods: Vec<Method>,
}

/// Route table filled by providers during boot and mounted once the host serves.
#[derive(Clone, Default)]
pub struct HttpRouter {
    routes: Arc<Mutex<Vec<(RouteInfo, Router)>>>,
}

impl HttpRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` at `path` for each of `methods`.
    pub fn route<H>(&self, path: &str, methods: &[Method], handler: H)
    where
        H: Handler + Clone,
    {
        let mut router = Router::with_path(path.trim_matches('/'));
        for method in methods {
            router = router
                .push(Router::with_filter(MethodFilter::new(method.clone())).goal(handler.clone()));
        }

        tracing::debug!(path, ?methods, "Registered route");
        self.routes.lock().push((
            RouteInfo {
                path: path.to_string(),
                methods: methods.to_vec(),
            },
            router,
        ));
    }

    pub fn routes(&self) -> Vec<RouteInfo> {
        self.routes
            .lock()
            .iter()
            .map(|(info, _)| info.clone())
            .collect()
    }

    /// Move every registered route into a single Salvo router.
    pub fn into_router(&self) -> Router {
        let routes = std::mem::take(&mut *self.routes.lock());
        routes
            .into_iter()
            .fold(Router::new(), |root, (_, router)| root.push(router))
    }
}

impl std::fmt::Debug for HttpRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.routes()).finish()
    }
}
