use serde::{Deserialize, Deserializer, Serialize};

/// Absent and `null` both decode to the type's default. Warhorn omits or nulls
/// optional relations freely and the traversal treats them as empty.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// --- Response envelope ---

/// Top-level GraphQL response body. Only `data` is consumed; `errors` is
/// surfaced for logging.
#[derive(Debug, Clone, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct GraphqlResponse<T> {
    #[serde(default)]
    pub data: Option<T>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub errors: Vec<GraphqlError>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GraphqlError {
    #[serde(default, deserialize_with = "null_as_default")]
    pub message: String,
}

// --- Pagination shapes ---

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    #[serde(default, deserialize_with = "null_as_default")]
    pub end_cursor: String,
}

/// A Relay-style connection as Warhorn returns it.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", bound(deserialize = "T: Deserialize<'de>"))]
pub struct Connection<T> {
    #[serde(default, deserialize_with = "null_as_default")]
    pub nodes: Vec<T>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub page_info: PageInfo,
}

impl<T> Default for Connection<T> {
    fn default() -> Self {
        Self {
            nodes: Vec::new(),
            page_info: PageInfo::default(),
        }
    }
}

// --- globalScenarios ---

#[derive(Debug, Clone, Serialize)]
pub struct ScenariosVariables {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalScenariosData {
    #[serde(default, deserialize_with = "null_as_default")]
    pub global_scenarios: Connection<ScenarioNode>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScenarioNode {
    #[serde(default, deserialize_with = "null_as_default")]
    pub event: EventRef,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventRef {
    #[serde(default, deserialize_with = "null_as_default")]
    pub slug: String,
}

// --- eventSessions ---

#[derive(Debug, Clone, Serialize)]
pub struct EventSessionsVariables {
    pub events: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventSessionsData {
    #[serde(default, deserialize_with = "null_as_default")]
    pub event_sessions: Connection<SessionNode>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionNode {
    #[serde(default, deserialize_with = "null_as_default")]
    pub starts_at: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub scenario: SessionScenario,
    #[serde(default, deserialize_with = "null_as_default")]
    pub gm_signups: Vec<Signup>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub gm_waitlist_entries: Vec<Signup>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub player_signups: Vec<Signup>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub player_waitlist_entries: Vec<Signup>,
}

impl SessionNode {
    pub fn game_system_name(&self) -> &str {
        &self.scenario.game_system.name
    }

    /// GM user IDs across signups and waitlist entries.
    pub fn gm_ids(&self) -> impl Iterator<Item = &str> {
        self.gm_signups
            .iter()
            .chain(&self.gm_waitlist_entries)
            .map(Signup::user_id)
    }

    /// Player user IDs across signups and waitlist entries.
    pub fn player_ids(&self) -> impl Iterator<Item = &str> {
        self.player_signups
            .iter()
            .chain(&self.player_waitlist_entries)
            .map(Signup::user_id)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionScenario {
    #[serde(default, deserialize_with = "null_as_default")]
    pub game_system: GameSystem,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GameSystem {
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Signup {
    #[serde(default, deserialize_with = "null_as_default")]
    pub user: UserRef,
}

impl Signup {
    pub fn user_id(&self) -> &str {
        &self.user.id
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserRef {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
}
