pub mod error;
pub mod pagination;
pub mod query;
pub mod transport;
pub mod types;

pub use error::{Result, WarhornError};
pub use pagination::{Cursor, CursorPaginator, Page, PageSize, PaginationStats};
pub use query::{EventSessions, GlobalScenarios, GraphqlRequest, Operation};
pub use transport::{RetryPolicy, Transport};
pub use types::{ScenarioNode, SessionNode, Signup};

use reqwest::header::CONTENT_TYPE;
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::Serialize;
use tracing::{debug, warn};

use types::{EventSessionsVariables, GraphqlResponse, ScenariosVariables};

pub const DEFAULT_ENDPOINT: &str = "https://warhorn.net/graphql";

/// Authenticated client for Warhorn's GraphQL endpoint.
pub struct WarhornClient {
    transport: Transport,
    endpoint: String,
    token: String,
}

impl WarhornClient {
    pub fn new(token: impl Into<String>) -> Result<Self> {
        Self::builder(token).build()
    }

    pub fn builder(token: impl Into<String>) -> WarhornClientBuilder {
        WarhornClientBuilder {
            token: token.into(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Run a request and decode its `data` object into `T`.
    ///
    /// GraphQL `errors` are logged and otherwise tolerated. A missing or
    /// `null` `data` object decodes as `T::default()`, which for a connection
    /// is an empty page and so ends the traversal.
    pub async fn execute<V, T>(&self, request: &GraphqlRequest<V>) -> Result<T>
    where
        V: Serialize,
        T: DeserializeOwned + Default,
    {
        let body = self.post(request).await?;
        let envelope: GraphqlResponse<T> = serde_json::from_slice(&body)?;

        if !envelope.errors.is_empty() {
            let messages: Vec<&str> = envelope.errors.iter().map(|e| e.message.as_str()).collect();
            warn!(
                count = messages.len(),
                errors = ?messages,
                has_data = envelope.data.is_some(),
                "GraphQL errors returned with 200 response"
            );
        }
        if envelope.data.is_none() {
            debug!("Response carried no data object, using empty result");
        }
        Ok(envelope.data.unwrap_or_default())
    }

    /// Run a request whose result is not needed. The body is still read in
    /// full and must be valid JSON.
    pub async fn execute_discard<V: Serialize>(&self, request: &GraphqlRequest<V>) -> Result<()> {
        let body = self.post(request).await?;
        serde_json::from_slice::<IgnoredAny>(&body)?;
        Ok(())
    }

    pub async fn query<O: Operation>(&self, variables: O::Variables) -> Result<O::Data> {
        debug!(operation = O::NAME, "Executing query");
        self.execute(&O::request(variables)).await
    }

    /// One page of scenarios across all events.
    pub async fn global_scenarios(&self, after: Option<Cursor>) -> Result<Page<ScenarioNode>> {
        let data = self
            .query::<GlobalScenarios>(ScenariosVariables {
                after: after.map(Cursor::into_inner),
            })
            .await?;
        Ok(data.global_scenarios.into())
    }

    /// One page of sessions belonging to `event`.
    pub async fn event_sessions(
        &self,
        event: &str,
        after: Option<Cursor>,
    ) -> Result<Page<SessionNode>> {
        let data = self
            .query::<EventSessions>(EventSessionsVariables {
                events: vec![event.to_string()],
                after: after.map(Cursor::into_inner),
            })
            .await?;
        Ok(data.event_sessions.into())
    }

    async fn post<V: Serialize>(&self, request: &GraphqlRequest<V>) -> Result<Vec<u8>> {
        let body = serde_json::to_vec(request)?;
        let http_request = self
            .transport
            .http()
            .post(&self.endpoint)
            .bearer_auth(&self.token)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .build()?;

        let resp = self.transport.send(http_request).await?;
        Ok(resp.bytes().await?.to_vec())
    }
}

pub struct WarhornClientBuilder {
    token: String,
    endpoint: String,
    retry: RetryPolicy,
}

impl WarhornClientBuilder {
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn build(self) -> Result<WarhornClient> {
        if self.token.is_empty() {
            return Err(WarhornError::Config("bearer token is required".to_string()));
        }
        Ok(WarhornClient {
            transport: Transport::new(self.retry)?,
            endpoint: self.endpoint,
            token: self.token,
        })
    }
}
