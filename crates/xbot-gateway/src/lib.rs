//! HTTP gateway for the xbot chat bot.
//!
//! Receives platform webhooks, archives every update through the message
//! archive and serves the history commands over JSON.

pub mod error;
pub mod history;
pub mod routes;
pub mod state;
pub mod wiring;

pub use error::{ErrorBody, GatewayError};
pub use history::{HistoryReply, HistoryService, HistorySettings};
pub use state::AppState;
pub use wiring::{ConfiguredBackends, build_state};

use rocket::figment::Figment;
use rocket::{Build, Rocket};

/// Assemble the rocket instance for `state`.
pub fn server(figment: Figment, state: AppState) -> Rocket<Build> {
    rocket::custom(figment)
        .manage(state)
        .mount("/", routes::health())
        .mount("/v1", routes::api())
}
