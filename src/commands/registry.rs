//! Write-once command registry
//!
//! Holds the authoritative command set decided by reconciliation. Queries
//! before population fail with [`GatewayError::RegistryNotInitialized`] so
//! callers never mistake "not yet known" for "no commands".

use super::definition::RegisteredCommand;
use crate::error::GatewayError;

use std::sync::{Arc, OnceLock};

#[derive(Debug, Default)]
pub struct CommandRegistry {
    commands: OnceLock<Arc<[RegisteredCommand]>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the command set. Returns false if the registry was already populated.
    pub fn populate(&self, commands: Vec<RegisteredCommand>) -> bool {
        self.commands.set(commands.into()).is_ok()
    }

    pub fn is_initialized(&self) -> bool {
        self.commands.get().is_some()
    }

    fn loaded(&self) -> Result<&Arc<[RegisteredCommand]>, GatewayError> {
        self.commands.get().ok_or(GatewayError::RegistryNotInitialized)
    }

    /// Shared handle to the whole set
    pub fn commands(&self) -> Result<Arc<[RegisteredCommand]>, GatewayError> {
        self.loaded().map(Arc::clone)
    }

    pub fn iter(&self) -> Result<impl Iterator<Item = &RegisteredCommand>, GatewayError> {
        Ok(self.loaded()?.iter())
    }

    /// Look a command up by name, ignoring case
    pub fn get_by_name(&self, name: &str) -> Result<Option<&RegisteredCommand>, GatewayError> {
        let wanted = name.to_lowercase();
        Ok(self
            .loaded()?
            .iter()
            .find(|command| command.name().to_lowercase() == wanted))
    }

    pub fn find<P>(&self, mut predicate: P) -> Result<Option<&RegisteredCommand>, GatewayError>
    where
        P: FnMut(&RegisteredCommand) -> bool,
    {
        Ok(self.loaded()?.iter().find(|command| predicate(command)))
    }

    pub fn len(&self) -> Result<usize, GatewayError> {
        Ok(self.loaded()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, GatewayError> {
        Ok(self.loaded()?.is_empty())
    }
}
