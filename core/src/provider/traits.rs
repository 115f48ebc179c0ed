use async_trait::async_trait;

use super::types::{ProviderExit, ProviderKind, ProviderStartArgs};

/// A running agent process.
#[async_trait]
pub trait ProviderSession: Send {
    /// Write interactive input to the agent.
    async fn send_input(&mut self, input: &str) -> anyhow::Result<()>;

    /// Next line of streamed output, `None` once the stream is closed.
    async fn read_output(&mut self) -> anyhow::Result<Option<String>>;

    async fn wait(&mut self) -> anyhow::Result<ProviderExit>;

    async fn kill(&mut self) -> anyhow::Result<()>;
}

#[async_trait]
pub trait Provider: Send + Sync {
    fn kind(&self) -> ProviderKind;

    async fn spawn(&self, args: &ProviderStartArgs) -> anyhow::Result<Box<dyn ProviderSession>>;
}
