use async_trait::async_trait;
use tokio::sync::mpsc;

use voxledger_core::PresenceEvent;

pub mod discord;
pub mod reconnect;

pub use discord::DiscordSource;
pub use reconnect::{run_with_reconnect, ReconnectPolicy};

/// A feed of voice presence changes.
#[async_trait]
pub trait PresenceSource: Send + Sync {
    /// Source name for logging.
    fn name(&self) -> &str;

    /// Run the source, pushing every observed change into `sink`.
    /// Returns when the source stops for good.
    async fn start(&self, sink: mpsc::Sender<PresenceEvent>) -> anyhow::Result<()>;
}
