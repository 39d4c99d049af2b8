//! Slash command definitions
//!
//! Definitions are kept in Discord's wire shape so that a command fetched from
//! Discord maps back to the same comparable value as the local declaration.
//! Absent and `null` optional fields both normalise to the field's default.

use crate::error::GatewayError;

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use twilight_model::application::command::Command;
use twilight_model::guild::Permissions;
use twilight_model::id::marker::{ApplicationMarker, CommandMarker, CommandVersionMarker};
use twilight_model::id::Id;

/// Application command type
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum CommandKind {
    #[default]
    ChatInput,
    User,
    Message,
    PrimaryEntryPoint,
    Unknown(u8),
}

impl From<u8> for CommandKind {
    fn from(value: u8) -> Self {
        match value {
            1 => Self::ChatInput,
            2 => Self::User,
            3 => Self::Message,
            4 => Self::PrimaryEntryPoint,
            other => Self::Unknown(other),
        }
    }
}

impl From<CommandKind> for u8 {
    fn from(kind: CommandKind) -> Self {
        match kind {
            CommandKind::ChatInput => 1,
            CommandKind::User => 2,
            CommandKind::Message => 3,
            CommandKind::PrimaryEntryPoint => 4,
            CommandKind::Unknown(other) => other,
        }
    }
}

/// Command option type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "u8", into = "u8")]
pub enum OptionKind {
    SubCommand,
    SubCommandGroup,
    String,
    Integer,
    Boolean,
    User,
    Channel,
    Role,
    Mentionable,
    Number,
    Attachment,
    Unknown(u8),
}

impl From<u8> for OptionKind {
    fn from(value: u8) -> Self {
        match value {
            1 => Self::SubCommand,
            2 => Self::SubCommandGroup,
            3 => Self::String,
            4 => Self::Integer,
            5 => Self::Boolean,
            6 => Self::User,
            7 => Self::Channel,
            8 => Self::Role,
            9 => Self::Mentionable,
            10 => Self::Number,
            11 => Self::Attachment,
            other => Self::Unknown(other),
        }
    }
}

impl From<OptionKind> for u8 {
    fn from(kind: OptionKind) -> Self {
        match kind {
            OptionKind::SubCommand => 1,
            OptionKind::SubCommandGroup => 2,
            OptionKind::String => 3,
            OptionKind::Integer => 4,
            OptionKind::Boolean => 5,
            OptionKind::User => 6,
            OptionKind::Channel => 7,
            OptionKind::Role => 8,
            OptionKind::Mentionable => 9,
            OptionKind::Number => 10,
            OptionKind::Attachment => 11,
            OptionKind::Unknown(other) => other,
        }
    }
}

/// A locally declared global command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandDefinition {
    pub name: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,

    #[serde(rename = "type", default)]
    pub kind: CommandKind,

    #[serde(default, deserialize_with = "null_as_default")]
    pub options: Vec<CommandOptionDefinition>,

    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "is_false")]
    pub nsfw: bool,

    /// Permissions a member needs by default; `None` lets everyone use it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_member_permissions: Option<Permissions>,

    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub name_localizations: BTreeMap<String, String>,

    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub description_localizations: BTreeMap<String, String>,

    /// Interaction context types; empty leaves Discord's default
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "Vec::is_empty")]
    pub contexts: Vec<u8>,

    /// Installation types; empty leaves Discord's default
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "Vec::is_empty")]
    pub integration_types: Vec<u8>,
}

impl CommandDefinition {
    /// A chat input (slash) command
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            kind: CommandKind::ChatInput,
            options: Vec::new(),
            nsfw: false,
            default_member_permissions: None,
            name_localizations: BTreeMap::new(),
            description_localizations: BTreeMap::new(),
            contexts: Vec::new(),
            integration_types: Vec::new(),
        }
    }

    pub fn kind(mut self, kind: CommandKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn option(mut self, option: CommandOptionDefinition) -> Self {
        self.options.push(option);
        self
    }

    pub fn nsfw(mut self, nsfw: bool) -> Self {
        self.nsfw = nsfw;
        self
    }

    pub fn default_member_permissions(mut self, permissions: Permissions) -> Self {
        self.default_member_permissions = Some(permissions);
        self
    }

    pub fn name_localization(mut self, locale: impl Into<String>, name: impl Into<String>) -> Self {
        self.name_localizations.insert(locale.into(), name.into());
        self
    }

    pub fn description_localization(
        mut self,
        locale: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        self.description_localizations
            .insert(locale.into(), description.into());
        self
    }

    pub fn contexts(mut self, contexts: impl IntoIterator<Item = u8>) -> Self {
        self.contexts = contexts.into_iter().collect();
        self
    }

    pub fn integration_types(mut self, types: impl IntoIterator<Item = u8>) -> Self {
        self.integration_types = types.into_iter().collect();
        self
    }

    /// Whether the command registered remotely is the one declared here.
    ///
    /// Discord fills in contexts and installation types that were left
    /// unspecified, so those only count when declared locally.
    pub fn matches_remote(&self, remote: &CommandDefinition) -> bool {
        if self.contexts.is_empty() && self.integration_types.is_empty() {
            let mut remote = remote.clone();
            remote.contexts.clear();
            remote.integration_types.clear();
            return *self == remote;
        }

        let mut local = self.clone();
        if local.contexts.is_empty() {
            local.contexts = remote.contexts.clone();
        }
        if local.integration_types.is_empty() {
            local.integration_types = remote.integration_types.clone();
        }
        local == *remote
    }

    /// Convert to the Twilight model sent to Discord
    pub fn to_twilight(&self) -> Result<Command, GatewayError> {
        let codec = |source| GatewayError::CommandCodec {
            name: self.name.clone(),
            source,
        };

        let mut value = serde_json::to_value(self).map_err(codec)?;
        if let Some(object) = value.as_object_mut() {
            // Twilight requires a version; Discord assigns the real one
            object.insert("version".to_string(), serde_json::json!("1"));
        }
        serde_json::from_value(value).map_err(codec)
    }
}

/// One option (or subcommand) of a command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandOptionDefinition {
    #[serde(rename = "type")]
    pub kind: OptionKind,

    pub name: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,

    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "is_false")]
    pub required: bool,

    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "is_false")]
    pub autocomplete: bool,

    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<CommandChoice>,

    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<CommandOptionDefinition>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_value: Option<serde_json::Number>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_value: Option<serde_json::Number>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u16>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u16>,

    /// Channel types a channel option accepts; empty accepts all
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "Vec::is_empty")]
    pub channel_types: Vec<u8>,

    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub name_localizations: BTreeMap<String, String>,

    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub description_localizations: BTreeMap<String, String>,
}

impl CommandOptionDefinition {
    pub fn new(kind: OptionKind, name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            description: description.into(),
            required: false,
            autocomplete: false,
            choices: Vec::new(),
            options: Vec::new(),
            min_value: None,
            max_value: None,
            min_length: None,
            max_length: None,
            channel_types: Vec::new(),
            name_localizations: BTreeMap::new(),
            description_localizations: BTreeMap::new(),
        }
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn autocomplete(mut self, autocomplete: bool) -> Self {
        self.autocomplete = autocomplete;
        self
    }

    pub fn choice(mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.choices.push(CommandChoice {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    /// Nested option of a subcommand or subcommand group
    pub fn option(mut self, option: CommandOptionDefinition) -> Self {
        self.options.push(option);
        self
    }

    /// Bounds of an integer or number option
    pub fn range(
        mut self,
        min: impl Into<serde_json::Number>,
        max: impl Into<serde_json::Number>,
    ) -> Self {
        self.min_value = Some(min.into());
        self.max_value = Some(max.into());
        self
    }

    /// Length bounds of a string option
    pub fn length(mut self, min: u16, max: u16) -> Self {
        self.min_length = Some(min);
        self.max_length = Some(max);
        self
    }

    pub fn channel_types(mut self, types: impl IntoIterator<Item = u8>) -> Self {
        self.channel_types = types.into_iter().collect();
        self
    }

    pub fn name_localization(mut self, locale: impl Into<String>, name: impl Into<String>) -> Self {
        self.name_localizations.insert(locale.into(), name.into());
        self
    }

    pub fn description_localization(
        mut self,
        locale: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        self.description_localizations
            .insert(locale.into(), description.into());
        self
    }
}

/// A fixed choice of a string, integer or number option
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandChoice {
    pub name: String,
    pub value: serde_json::Value,
}

/// A command as registered with Discord
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisteredCommand {
    pub id: Id<CommandMarker>,

    #[serde(default)]
    pub application_id: Option<Id<ApplicationMarker>>,

    #[serde(default)]
    pub version: Option<Id<CommandVersionMarker>>,

    #[serde(flatten)]
    pub definition: CommandDefinition,
}

impl RegisteredCommand {
    pub fn name(&self) -> &str {
        &self.definition.name
    }

    /// Convert a command returned by Twilight
    pub fn from_twilight(command: &Command) -> Result<Self, GatewayError> {
        let codec = |source| GatewayError::CommandCodec {
            name: command.name.clone(),
            source,
        };

        let value = serde_json::to_value(command).map_err(codec)?;
        serde_json::from_value(value).map_err(codec)
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn is_false(value: &bool) -> bool {
    !*value
}
