//! Application components
//!
//! Everything the application contributes to the gateway layer: command
//! providers, invite permission and scope providers, intents and gateway
//! listeners. Declared values (as opposed to providers) are only honoured
//! while `annotation_configuration` is enabled.

use crate::commands::{CommandDefinition, CommandProvider};
use crate::error::GatewayError;
use crate::invite::{InviteSettings, PermissionProvider, Scope, ScopeProvider};
use crate::shard::GatewayListener;

use std::path::Path;
use std::sync::Arc;
use tracing::debug;
use twilight_gateway::Intents;
use twilight_model::guild::Permissions;

pub struct Components {
    command_providers: Vec<Arc<dyn CommandProvider>>,
    declared_commands: Vec<CommandDefinition>,
    permission_providers: Vec<Arc<dyn PermissionProvider>>,
    scope_providers: Vec<Arc<dyn ScopeProvider>>,
    declared_permissions: Permissions,
    declared_scopes: Vec<Scope>,
    declared_intents: Intents,
    listeners: Vec<Arc<dyn GatewayListener>>,
}

impl Default for Components {
    fn default() -> Self {
        Self {
            command_providers: Vec::new(),
            declared_commands: Vec::new(),
            permission_providers: Vec::new(),
            scope_providers: Vec::new(),
            declared_permissions: Permissions::empty(),
            declared_scopes: Vec::new(),
            declared_intents: Intents::empty(),
            listeners: Vec::new(),
        }
    }
}

impl Components {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn command_provider(mut self, provider: impl CommandProvider + 'static) -> Self {
        self.command_providers.push(Arc::new(provider));
        self
    }

    pub fn declare_command(mut self, command: CommandDefinition) -> Self {
        self.declared_commands.push(command);
        self
    }

    /// Declare every command of a JSON array file
    pub fn declare_commands_from_file(
        mut self,
        path: impl AsRef<Path>,
    ) -> Result<Self, GatewayError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            GatewayError::Config(format!("failed to read commands file {}: {e}", path.display()))
        })?;
        let commands: Vec<CommandDefinition> = serde_json::from_str(&raw).map_err(|e| {
            GatewayError::Config(format!("invalid commands file {}: {e}", path.display()))
        })?;

        debug!(path = %path.display(), count = commands.len(), "Declared commands loaded");
        self.declared_commands.extend(commands);
        Ok(self)
    }

    pub fn permission_provider(mut self, provider: impl PermissionProvider + 'static) -> Self {
        self.permission_providers.push(Arc::new(provider));
        self
    }

    pub fn scope_provider(mut self, provider: impl ScopeProvider + 'static) -> Self {
        self.scope_providers.push(Arc::new(provider));
        self
    }

    pub fn declare_permissions(mut self, permissions: Permissions) -> Self {
        self.declared_permissions |= permissions;
        self
    }

    pub fn declare_scope(mut self, scope: Scope) -> Self {
        self.declared_scopes.push(scope);
        self
    }

    pub fn declare_intents(mut self, intents: Intents) -> Self {
        self.declared_intents |= intents;
        self
    }

    pub fn listener(mut self, listener: Arc<dyn GatewayListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    /// Provided commands followed by declared ones, in registration order
    pub fn command_definitions(&self, include_declared: bool) -> Vec<CommandDefinition> {
        let provided = self.command_providers.iter().map(|p| p.command());
        if include_declared {
            provided.chain(self.declared_commands.iter().cloned()).collect()
        } else {
            provided.collect()
        }
    }

    pub fn permissions(&self, include_declared: bool) -> Permissions {
        let provided = self
            .permission_providers
            .iter()
            .fold(Permissions::empty(), |acc, p| acc | p.permissions());

        if include_declared {
            provided | self.declared_permissions
        } else {
            provided
        }
    }

    /// Distinct scopes in first-seen order
    pub fn scopes(&self, include_declared: bool) -> Vec<Scope> {
        let provided = self.scope_providers.iter().flat_map(|p| p.scopes());
        let declared = include_declared
            .then(|| self.declared_scopes.iter().copied())
            .into_iter()
            .flatten();

        let mut scopes = Vec::new();
        for scope in provided.chain(declared) {
            if !scopes.contains(&scope) {
                scopes.push(scope);
            }
        }
        scopes
    }

    pub fn intents(&self, include_declared: bool) -> Intents {
        if include_declared {
            self.declared_intents
        } else {
            Intents::empty()
        }
    }

    pub fn invite_settings(&self, include_declared: bool) -> InviteSettings {
        InviteSettings {
            permissions: self.permissions(include_declared),
            scopes: self.scopes(include_declared),
        }
    }

    pub fn listeners(&self) -> &[Arc<dyn GatewayListener>] {
        &self.listeners
    }

    /// Listeners that did not opt out of automatic registration
    pub fn auto_registered_listeners(&self) -> impl Iterator<Item = &Arc<dyn GatewayListener>> {
        self.listeners.iter().filter(|l| l.auto_register())
    }
}
