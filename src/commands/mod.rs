//! Global slash commands
//!
//! Local definitions, the Discord endpoints, reconciliation between the two
//! and the registry holding the result.

mod api;
mod definition;
mod provider;
mod reconciler;
mod registry;

pub use api::{CommandApi, HttpCommandApi};
pub use definition::{
    CommandChoice, CommandDefinition, CommandKind, CommandOptionDefinition, OptionKind,
    RegisteredCommand,
};
pub use provider::CommandProvider;
pub use reconciler::{CommandReconciler, ReconcileOutcome, ReconcileSettings};
pub use registry::CommandRegistry;
