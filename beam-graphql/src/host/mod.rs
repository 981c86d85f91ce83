//! Minimal application shell the GraphQL layer plugs into: a DI container,
//! a route table, the bound HTTP server handle and provider lifecycle hooks.

pub mod app;
pub mod container;
pub mod router;
pub mod server;

use serde::Deserialize;

pub use app::{Application, Provider};
pub use container::Container;
pub use router::{HttpRouter, RouteInfo};
pub use server::{HttpServer, UpgradeHandler, UpgradeHoop};

/// Process flavour. Only `web` processes serve HTTP traffic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Web,
    Console,
    Test,
    Repl,
}
