//! Command reconciliation
//!
//! Runs once, when the gateway first reaches semi-ready:
//!
//! 1. Collect the local definitions; a duplicate name aborts before any request.
//! 2. Fetch the remote set.
//! 3. Equal sets keep the remote set. Otherwise upload the local set if
//!    updates are allowed, else keep the stale remote set.
//! 4. Populate the registry with the outcome.
//!
//! `start()` is blocked on all of this; any error fails the start.

use super::api::CommandApi;
use super::definition::{CommandDefinition, RegisteredCommand};
use super::registry::CommandRegistry;
use crate::components::Components;
use crate::error::GatewayError;
use crate::events::{LifecycleEvent, LifecycleEventKind, LifecycleListener};
use crate::metrics::GatewayMetrics;

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, Default)]
pub struct ReconcileSettings {
    /// Overwrite the remote set when it differs
    pub update_commands: bool,
    /// Include commands declared through `Components::declare_command`
    pub include_declared: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Remote set already matched
    Unchanged,
    /// Local set was uploaded
    Uploaded,
    /// Sets differ and updates are disabled
    Stale,
}

impl ReconcileOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Unchanged => "unchanged",
            Self::Uploaded => "uploaded",
            Self::Stale => "stale",
        }
    }
}

pub struct CommandReconciler {
    api: Arc<dyn CommandApi>,
    components: Arc<Components>,
    settings: ReconcileSettings,
    registry: Arc<CommandRegistry>,
    metrics: Arc<GatewayMetrics>,
}

impl CommandReconciler {
    pub fn new(
        api: Arc<dyn CommandApi>,
        components: Arc<Components>,
        settings: ReconcileSettings,
        registry: Arc<CommandRegistry>,
        metrics: Arc<GatewayMetrics>,
    ) -> Self {
        Self {
            api,
            components,
            settings,
            registry,
            metrics,
        }
    }

    /// Local definitions, rejecting duplicate names
    pub fn collect_local(&self) -> Result<Vec<CommandDefinition>, GatewayError> {
        let definitions = self
            .components
            .command_definitions(self.settings.include_declared);

        let mut names = HashSet::with_capacity(definitions.len());
        for definition in &definitions {
            if !names.insert(definition.name.as_str()) {
                return Err(GatewayError::DuplicateCommand {
                    name: definition.name.clone(),
                });
            }
        }
        Ok(definitions)
    }

    pub async fn reconcile(&self) -> Result<ReconcileOutcome, GatewayError> {
        let local = self.collect_local()?;

        let remote = self.api.retrieve_commands().await?;

        debug!(local = local.len(), remote = remote.len(), "Comparing command sets");

        let (outcome, commands) = if in_sync(&local, &remote) {
            info!(count = remote.len(), "Global commands up to date");
            (ReconcileOutcome::Unchanged, remote)
        } else if self.settings.update_commands {
            warn!(
                local = local.len(),
                remote = remote.len(),
                "Global commands differ, uploading local set"
            );
            let uploaded = self.api.replace_commands(&local).await?;
            (ReconcileOutcome::Uploaded, uploaded)
        } else {
            warn!(
                local = local.len(),
                remote = remote.len(),
                "Global commands differ but updates are disabled, keeping remote set"
            );
            (ReconcileOutcome::Stale, remote)
        };

        let count = commands.len();
        if !self.registry.populate(commands) {
            warn!("Command registry was already populated, result discarded");
        }
        self.metrics.record_reconciliation(outcome.label(), count);
        Ok(outcome)
    }
}

/// Same size and every local definition present remotely
fn in_sync(local: &[CommandDefinition], remote: &[RegisteredCommand]) -> bool {
    local.len() == remote.len()
        && local
            .iter()
            .all(|l| remote.iter().any(|r| l.matches_remote(&r.definition)))
}

#[async_trait]
impl LifecycleListener for CommandReconciler {
    fn name(&self) -> &str {
        "command_reconciler"
    }

    async fn on_lifecycle_event(&self, event: &LifecycleEvent) -> Result<(), GatewayError> {
        if event.kind != LifecycleEventKind::SemiReady {
            return Ok(());
        }
        if self.registry.is_initialized() {
            debug!("Commands already reconciled, skipping");
            return Ok(());
        }

        let outcome = self.reconcile().await?;
        info!(outcome = outcome.label(), "Command reconciliation finished");
        Ok(())
    }
}
