use super::definition::CommandDefinition;

/// Supplies one locally declared command
pub trait CommandProvider: Send + Sync {
    fn command(&self) -> CommandDefinition;
}

impl CommandProvider for CommandDefinition {
    fn command(&self) -> CommandDefinition {
        self.clone()
    }
}

impl<F> CommandProvider for F
where
    F: Fn() -> CommandDefinition + Send + Sync,
{
    fn command(&self) -> CommandDefinition {
        self()
    }
}
