//! voxledger gateway: HTTP queries and live updates over the presence ledger.

pub mod api;
pub mod server;
pub mod ws_protocol;
pub mod ws_server;

pub use server::{build_router, start_server, GatewayState};
pub use ws_protocol::WsMessage;
