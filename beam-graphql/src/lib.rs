pub mod adapter;
pub mod auth;
pub mod config;
pub mod context;
pub mod discovery;
pub mod engine;
pub mod error;
pub mod host;
pub mod injector;
pub mod logging;
pub mod manager;
pub mod provider;
pub mod pubsub;
pub mod resolver;
pub mod scalars;
pub mod server;
pub mod service;
pub mod subscriptions;

pub use error::{BoxError, Error};
pub use manager::GraphQLServersManager;
pub use provider::GraphQLProvider;
pub use server::GraphQLServer;
pub use service::GraphQLService;
