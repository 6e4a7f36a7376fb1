pub mod clients;
pub mod config;
pub mod error;
pub mod models;
pub mod routes;

use std::sync::Arc;

use clients::relay::Relay;

#[derive(Clone)]
pub struct AppState {
    pub relay: Arc<Relay>,
}
