//! Command types accepted by the broker and typed constructors.

use std::fmt;

use serde_json::{json, Map, Value};

/// Command types, published to `xs3/1/cmd/{type}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandType {
    Login,
    Logout,
    RemoteDisengage,
    RemoteDisengagePermanent,
    AssignAuthorizationProfileToMediumMapi,
    AssignPersonToMediumMapi,
}

impl CommandType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandType::Login => "Login",
            CommandType::Logout => "Logout",
            CommandType::RemoteDisengage => "RemoteDisengage",
            CommandType::RemoteDisengagePermanent => "RemoteDisengagePermanent",
            CommandType::AssignAuthorizationProfileToMediumMapi => {
                "AssignAuthorizationProfileToMediumMapi"
            }
            CommandType::AssignPersonToMediumMapi => "AssignPersonToMediumMapi",
        }
    }
}

impl fmt::Display for CommandType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A command with its type-specific fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub command_type: CommandType,
    pub data: Map<String, Value>,
}

impl Command {
    pub fn new(command_type: CommandType) -> Self {
        Self {
            command_type,
            data: Map::new(),
        }
    }

    /// Add one field to the command body.
    pub fn with(mut self, key: impl Into<String>, value: Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }

    /// Open an installation point once (`extended` for the long release time).
    pub fn remote_disengage(installation_point_id: &str, extended: bool) -> Self {
        Self::new(CommandType::RemoteDisengage)
            .with("installationPointId", json!(installation_point_id))
            .with("extended", json!(extended))
    }

    /// Switch permanent release of an installation point on or off.
    pub fn remote_disengage_permanent(installation_point_id: &str, enable: bool) -> Self {
        Self::new(CommandType::RemoteDisengagePermanent)
            .with("installationPointId", json!(installation_point_id))
            .with("enable", json!(enable))
    }

    pub fn assign_authorization_profile_to_medium(profile_id: &str, medium_id: &str) -> Self {
        Self::new(CommandType::AssignAuthorizationProfileToMediumMapi)
            .with("authorizationProfileId", json!(profile_id))
            .with("mediumId", json!(medium_id))
    }

    pub fn assign_person_to_medium(person_id: &str, medium_id: &str) -> Self {
        Self::new(CommandType::AssignPersonToMediumMapi)
            .with("personId", json!(person_id))
            .with("mediumId", json!(medium_id))
    }
}
