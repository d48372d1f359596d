//! CRM GraphQL gateway: request authentication in front of the execution
//! engine, plus the built-in session resolvers.

pub mod app;
pub mod classifier;
pub mod config;
pub mod context;
pub mod directory;
pub mod executor;
pub mod graphql;
pub mod middleware;
pub mod session;
