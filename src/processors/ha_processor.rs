use tracing::info;

use crate::home_assistant::command::CommandRequest;
use crate::smartgen_api::error::ApiError;
use crate::smartgen_api::models::genset_status::GensetStatus;
use crate::smartgen_api::models::response::command_ack::CommandAck;
use crate::smartgen_api::smartgen_client::GensetApiTrait;

#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    Sent(CommandAck),
    /// Breaker toggle skipped because the breaker is already where it was asked to be.
    AlreadySatisfied,
}

/// Forwards Home Assistant commands to the vendor API.
#[derive(Clone)]
pub struct HaProcessor<T>
where
    T: GensetApiTrait + Clone + Send + Sync + 'static,
{
    pub http_smartgen_client: T,
}

impl<T: GensetApiTrait + Clone + Send + Sync> HaProcessor<T> {
    pub async fn process_ha_command(
        &self,
        cmd: &CommandRequest,
        last_status: Option<&GensetStatus>,
    ) -> Result<CommandOutcome, ApiError> {
        if cmd.action.is_toggle()
            && let Some(status) = last_status
            && cmd.action.already_satisfied(status)
        {
            info!(
                "Skipping {} from {}: breaker already in requested position",
                cmd.action, cmd.topic
            );
            return Ok(CommandOutcome::AlreadySatisfied);
        }

        info!("Sending SmartGen action {} ({})", cmd.action, cmd.action.vendor_code());
        let ack = self.http_smartgen_client.send_command(cmd.action).await?;
        Ok(CommandOutcome::Sent(ack))
    }
}
