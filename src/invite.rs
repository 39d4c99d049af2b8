//! OAuth2 invite URLs
//!
//! Permissions and scopes are collected from providers registered in
//! [`Components`](crate::components::Components) and composed into Discord's
//! authorize URL.

use serde::Serialize;
use std::fmt;
use twilight_model::guild::Permissions;
use twilight_model::id::{marker::ApplicationMarker, Id};

const AUTHORIZE_URL: &str = "https://discord.com/oauth2/authorize";

/// Discord OAuth2 scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Scope {
    #[serde(rename = "activities.read")]
    ActivitiesRead,
    #[serde(rename = "activities.write")]
    ActivitiesWrite,
    #[serde(rename = "applications.builds.read")]
    ApplicationsBuildsRead,
    #[serde(rename = "applications.builds.upload")]
    ApplicationsBuildsUpload,
    #[serde(rename = "applications.commands")]
    ApplicationsCommands,
    #[serde(rename = "applications.commands.update")]
    ApplicationsCommandsUpdate,
    #[serde(rename = "applications.commands.permissions.update")]
    ApplicationsCommandsPermissionsUpdate,
    #[serde(rename = "applications.entitlements")]
    ApplicationsEntitlements,
    #[serde(rename = "applications.store.update")]
    ApplicationsStoreUpdate,
    #[serde(rename = "bot")]
    Bot,
    #[serde(rename = "connections")]
    Connections,
    #[serde(rename = "dm_channels.read")]
    DmChannelsRead,
    #[serde(rename = "email")]
    Email,
    #[serde(rename = "gdm.join")]
    GdmJoin,
    #[serde(rename = "guilds")]
    Guilds,
    #[serde(rename = "guilds.join")]
    GuildsJoin,
    #[serde(rename = "guilds.members.read")]
    GuildsMembersRead,
    #[serde(rename = "identify")]
    Identify,
    #[serde(rename = "messages.read")]
    MessagesRead,
    #[serde(rename = "relationships.read")]
    RelationshipsRead,
    #[serde(rename = "role_connections.write")]
    RoleConnectionsWrite,
    #[serde(rename = "rpc")]
    Rpc,
    #[serde(rename = "rpc.activities.write")]
    RpcActivitiesWrite,
    #[serde(rename = "rpc.notifications.read")]
    RpcNotificationsRead,
    #[serde(rename = "rpc.voice.read")]
    RpcVoiceRead,
    #[serde(rename = "rpc.voice.write")]
    RpcVoiceWrite,
    #[serde(rename = "voice")]
    Voice,
    #[serde(rename = "webhook.incoming")]
    WebhookIncoming,
}

impl Scope {
    /// Name of the scope as Discord spells it
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ActivitiesRead => "activities.read",
            Self::ActivitiesWrite => "activities.write",
            Self::ApplicationsBuildsRead => "applications.builds.read",
            Self::ApplicationsBuildsUpload => "applications.builds.upload",
            Self::ApplicationsCommands => "applications.commands",
            Self::ApplicationsCommandsUpdate => "applications.commands.update",
            Self::ApplicationsCommandsPermissionsUpdate => {
                "applications.commands.permissions.update"
            }
            Self::ApplicationsEntitlements => "applications.entitlements",
            Self::ApplicationsStoreUpdate => "applications.store.update",
            Self::Bot => "bot",
            Self::Connections => "connections",
            Self::DmChannelsRead => "dm_channels.read",
            Self::Email => "email",
            Self::GdmJoin => "gdm.join",
            Self::Guilds => "guilds",
            Self::GuildsJoin => "guilds.join",
            Self::GuildsMembersRead => "guilds.members.read",
            Self::Identify => "identify",
            Self::MessagesRead => "messages.read",
            Self::RelationshipsRead => "relationships.read",
            Self::RoleConnectionsWrite => "role_connections.write",
            Self::Rpc => "rpc",
            Self::RpcActivitiesWrite => "rpc.activities.write",
            Self::RpcNotificationsRead => "rpc.notifications.read",
            Self::RpcVoiceRead => "rpc.voice.read",
            Self::RpcVoiceWrite => "rpc.voice.write",
            Self::Voice => "voice",
            Self::WebhookIncoming => "webhook.incoming",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Contributes permissions to the invite URL
pub trait PermissionProvider: Send + Sync {
    fn permissions(&self) -> Permissions;
}

impl PermissionProvider for Permissions {
    fn permissions(&self) -> Permissions {
        *self
    }
}

/// Contributes OAuth2 scopes to the invite URL
pub trait ScopeProvider: Send + Sync {
    fn scopes(&self) -> Vec<Scope>;
}

impl ScopeProvider for Vec<Scope> {
    fn scopes(&self) -> Vec<Scope> {
        self.clone()
    }
}

impl ScopeProvider for Scope {
    fn scopes(&self) -> Vec<Scope> {
        vec![*self]
    }
}

/// Resolved invite parameters
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InviteSettings {
    pub permissions: Permissions,
    /// Distinct scopes in first-seen order
    pub scopes: Vec<Scope>,
}

impl Default for InviteSettings {
    fn default() -> Self {
        Self {
            permissions: Permissions::empty(),
            scopes: Vec::new(),
        }
    }
}

impl InviteSettings {
    /// Authorize URL for `application_id`. Falls back to the `bot` scope when
    /// none was provided.
    pub fn url(&self, application_id: Id<ApplicationMarker>) -> String {
        let scopes = if self.scopes.is_empty() {
            Scope::Bot.as_str().to_string()
        } else {
            self.scopes
                .iter()
                .map(Scope::as_str)
                .collect::<Vec<_>>()
                .join("+")
        };

        let mut url = format!("{AUTHORIZE_URL}?client_id={application_id}&scope={scopes}");
        if !self.permissions.is_empty() {
            url.push_str(&format!("&permissions={}", self.permissions.bits()));
        }
        url
    }
}
