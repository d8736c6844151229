//! Typed GraphQL operations.
//!
//! Query text is static; everything that varies travels as JSON variables so
//! no caller ever escapes a value into the query string.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::types::{
    EventSessionsData, EventSessionsVariables, GlobalScenariosData, ScenariosVariables,
};

/// A GraphQL request body: `{"query": ..., "variables": {...}}`.
#[derive(Debug, Clone, Serialize)]
pub struct GraphqlRequest<V> {
    pub query: String,
    pub variables: V,
}

impl<V: Serialize> GraphqlRequest<V> {
    pub fn new(query: impl Into<String>, variables: V) -> Self {
        Self {
            query: query.into(),
            variables,
        }
    }
}

/// A named query with typed variables and response data.
pub trait Operation {
    type Variables: Serialize + Send + Sync;
    type Data: DeserializeOwned + Default;

    const NAME: &'static str;
    const QUERY: &'static str;

    fn request(variables: Self::Variables) -> GraphqlRequest<Self::Variables> {
        GraphqlRequest::new(Self::QUERY, variables)
    }
}

/// Every scenario across all events. Warhorn has no query that lists events
/// directly, so this is how events are found.
pub struct GlobalScenarios;

impl Operation for GlobalScenarios {
    type Variables = ScenariosVariables;
    type Data = GlobalScenariosData;

    const NAME: &'static str = "GlobalScenarios";
    const QUERY: &'static str = "query GlobalScenarios($after: String) { \
        globalScenarios(after: $after) { \
            nodes { event { slug } } \
            pageInfo { endCursor } \
        } \
    }";
}

/// Sessions of the given events, with the signup lists needed for counting.
pub struct EventSessions;

impl Operation for EventSessions {
    type Variables = EventSessionsVariables;
    type Data = EventSessionsData;

    const NAME: &'static str = "EventSessions";
    const QUERY: &'static str = "query EventSessions($events: [String!]!, $after: String) { \
        eventSessions(events: $events, after: $after) { \
            nodes { \
                startsAt \
                scenario { gameSystem { name } } \
                gmSignups { user { id } } \
                gmWaitlistEntries { user { id } } \
                playerSignups { user { id } } \
                playerWaitlistEntries { user { id } } \
            } \
            pageInfo { endCursor } \
        } \
    }";
}
