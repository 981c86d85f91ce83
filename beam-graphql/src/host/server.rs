use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use salvo::http::header::{CONNECTION, HeaderName, UPGRADE};
use salvo::prelude::*;

/// Takes over a connection whose request asked for a protocol upgrade.
#[async_trait::async_trait]
pub trait UpgradeHandler: Send + Sync {
    async fn upgrade(&self, req: &mut Request, depot: &mut Depot, res: &mut Response);
}

/// Handle to the bound HTTP server.
///
/// Holds the upgrade table consulted before routing, so handlers attached
/// after the listener is bound still receive their upgrade requests.
#[derive(Clone, Default)]
pub struct HttpServer {
    inner: Arc<HttpServerInner>,
}

#[derive(Default)]
struct HttpServerInner {
    local_addr: Option<String>,
    upgrades: RwLock<HashMap<String, Arc<dyn UpgradeHandler>>>,
}

fn normalize(path: &str) -> String {
    format!("/{}", path.trim_matches('/'))
}

impl HttpServer {
    pub fn new(local_addr: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(HttpServerInner {
                local_addr: Some(local_addr.into()),
                upgrades: RwLock::default(),
            }),
        }
    }

    pub fn local_addr(&self) -> Option<&str> {
        self.inner.local_addr.as_deref()
    }

    /// Attach an upgrade handler at `path`. Returns `false` and keeps the
    /// existing handler when the path is taken.
    pub fn attach_upgrade(&self, path: &str, handler: Arc<dyn UpgradeHandler>) -> bool {
        let mut upgrades = self.inner.upgrades.write();
        let path = normalize(path);
        if upgrades.contains_key(&path) {
            tracing::warn!(path = %path, "Upgrade handler already attached");
            return false;
        }
        upgrades.insert(path, handler);
        true
    }

    pub fn upgrade_handler(&self, path: &str) -> Option<Arc<dyn UpgradeHandler>> {
        self.inner.upgrades.read().get(&normalize(path)).cloned()
    }

    pub fn upgrade_count(&self) -> usize {
        self.inner.upgrades.read().len()
    }

    pub fn upgrade_hoop(&self) -> UpgradeHoop {
        UpgradeHoop {
            server: self.clone(),
        }
    }
}

fn has_token(req: &Request, name: HeaderName, token: &str) -> bool {
    req.headers().get_all(name).iter().any(|value| {
        value.to_str().is_ok_and(|value| {
            value
                .split(',')
                .any(|part| part.trim().eq_ignore_ascii_case(token))
        })
    })
}

fn is_upgrade(req: &Request) -> bool {
    has_token(req, CONNECTION, "upgrade") && has_token(req, UPGRADE, "websocket")
}

/// Service-level hoop dispatching WebSocket upgrades to attached handlers.
pub struct UpgradeHoop {
    server: HttpServer,
}

#[handler]
impl UpgradeHoop {
    async fn handle(
        &self,
        req: &mut Request,
        depot: &mut Depot,
        res: &mut Response,
        ctrl: &mut FlowCtrl,
    ) {
        let handler = is_upgrade(req)
            .then(|| self.server.upgrade_handler(req.uri().path()))
            .flatten();
        if let Some(handler) = handler {
            handler.upgrade(req, depot, res).await;
            ctrl.skip_rest();
            return;
        }
        ctrl.call_next(req, depot, res).await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use salvo::test::{ResponseExt, TestClient};

    use super::*;

    struct CountingUpgrade(Arc<AtomicUsize>);

    #[async_trait::async_trait]
    impl UpgradeHandler for CountingUpgrade {
        async fn upgrade(&self, _req: &mut Request, _depot: &mut Depot, res: &mut Response) {
            self.0.fetch_add(1, Ordering::SeqCst);
            res.status_code(StatusCode::SWITCHING_PROTOCOLS);
        }
    }

    #[handler]
    async fn plain(res: &mut Response) {
        res.render(Text::Plain("plain"));
    }

    #[test]
    fn test_attach_upgrade_once_per_path() {
        let server = HttpServer::new("127.0.0.1:0");
        let hits = Arc::new(AtomicUsize::new(0));

        assert!(server.attach_upgrade("/graphql", Arc::new(CountingUpgrade(hits.clone()))));
        assert!(!server.attach_upgrade("graphql/", Arc::new(CountingUpgrade(hits))));
        assert_eq!(server.upgrade_count(), 1);
        assert!(server.upgrade_handler("/graphql").is_some());
        assert!(server.upgrade_handler("/admin").is_none());
    }

    #[tokio::test]
    async fn test_hoop_dispatches_upgrades_and_passes_plain_requests() {
        let server = HttpServer::new("127.0.0.1:0");
        let hits = Arc::new(AtomicUsize::new(0));
        server.attach_upgrade("/graphql", Arc::new(CountingUpgrade(hits.clone())));

        let service =
            Service::new(Router::with_path("graphql").get(plain)).hoop(server.upgrade_hoop());

        let res = TestClient::get("http://127.0.0.1:5800/graphql")
            .add_header("connection", "Upgrade", true)
            .add_header("upgrade", "websocket", true)
            .send(&service)
            .await;
        assert_eq!(res.status_code, Some(StatusCode::SWITCHING_PROTOCOLS));
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        let mut res = TestClient::get("http://127.0.0.1:5800/graphql")
            .send(&service)
            .await;
        assert_eq!(res.take_string().await.unwrap(), "plain");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
