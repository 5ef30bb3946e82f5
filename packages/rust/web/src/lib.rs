//! HTML form front end for the assistant.

mod page;
mod routes;
mod server;

pub use routes::{AppState, router};
pub use server::{app, serve};
