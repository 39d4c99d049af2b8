//! Discord global command endpoints

use super::definition::{CommandDefinition, RegisteredCommand};
use crate::error::GatewayError;

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info};
use twilight_http::Client;
use twilight_model::application::command::Command;
use twilight_model::id::{marker::ApplicationMarker, Id};

/// Remote side of command reconciliation
#[async_trait]
pub trait CommandApi: Send + Sync {
    /// Fetch every global command currently registered
    async fn retrieve_commands(&self) -> Result<Vec<RegisteredCommand>, GatewayError>;

    /// Replace the whole global command set, returning what Discord stored
    async fn replace_commands(
        &self,
        commands: &[CommandDefinition],
    ) -> Result<Vec<RegisteredCommand>, GatewayError>;
}

/// [`CommandApi`] backed by the Twilight HTTP client
pub struct HttpCommandApi {
    client: Arc<Client>,
    application_id: OnceCell<Id<ApplicationMarker>>,
}

impl HttpCommandApi {
    pub fn new(client: Arc<Client>) -> Self {
        Self {
            client,
            application_id: OnceCell::new(),
        }
    }

    /// Application id of the bot, fetched once
    pub async fn application_id(&self) -> Result<Id<ApplicationMarker>, GatewayError> {
        self.application_id
            .get_or_try_init(|| async {
                let application = self
                    .client
                    .current_user_application()
                    .await
                    .map_err(|e| GatewayError::http("current_user_application", e))?
                    .model()
                    .await
                    .map_err(|e| GatewayError::http("current_user_application", e))?;

                debug!(application_id = %application.id, "Resolved application id");
                Ok(application.id)
            })
            .await
            .copied()
    }
}

fn registered(commands: &[Command]) -> Result<Vec<RegisteredCommand>, GatewayError> {
    commands.iter().map(RegisteredCommand::from_twilight).collect()
}

#[async_trait]
impl CommandApi for HttpCommandApi {
    async fn retrieve_commands(&self) -> Result<Vec<RegisteredCommand>, GatewayError> {
        let retrieval = |e: GatewayError| GatewayError::CommandRetrieval(Box::new(e));
        let application_id = self.application_id().await.map_err(retrieval)?;

        let commands = self
            .client
            .interaction(application_id)
            .global_commands()
            .await
            .map_err(|e| retrieval(GatewayError::http("global_commands", e)))?
            .models()
            .await
            .map_err(|e| retrieval(GatewayError::http("global_commands", e)))?;

        debug!(count = commands.len(), "Retrieved global commands");
        registered(&commands)
    }

    async fn replace_commands(
        &self,
        commands: &[CommandDefinition],
    ) -> Result<Vec<RegisteredCommand>, GatewayError> {
        let count = commands.len();
        let upload = |e: GatewayError| GatewayError::CommandUpload {
            count,
            source: Box::new(e),
        };

        let payload = commands
            .iter()
            .map(CommandDefinition::to_twilight)
            .collect::<Result<Vec<_>, _>>()?;
        let application_id = self.application_id().await.map_err(upload)?;

        let stored = self
            .client
            .interaction(application_id)
            .set_global_commands(&payload)
            .await
            .map_err(|e| upload(GatewayError::http("set_global_commands", e)))?
            .models()
            .await
            .map_err(|e| upload(GatewayError::http("set_global_commands", e)))?;

        info!(count = stored.len(), "Global commands overwritten");
        registered(&stored)
    }
}
