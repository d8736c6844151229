//! Per-event session aggregation.
//!
//! Streams one `SESSION` line per session as pages arrive, then one
//! `EVENTSUMMARY` line once the event's sessions are exhausted.

use std::collections::HashSet;
use std::fmt;
use std::io::Write;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::info;
use warhorn_client::{CursorPaginator, PageSize, SessionNode, WarhornClient};

use crate::discovery::EventHandler;

/// `SESSION,<event>,<startsAt>,<gmSignups>,<playerSignups>,<gameSystem>`
///
/// Counts are signup list lengths only; waitlist entries are left out here
/// even though they count toward the event's unique participants. Values are
/// written as-is, so a comma inside a game system name shifts the columns.
#[derive(Debug, Clone, Copy)]
pub struct SessionLine<'a> {
    pub event: &'a str,
    pub session: &'a SessionNode,
}

impl fmt::Display for SessionLine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SESSION,{},{},{},{},{}",
            self.event,
            self.session.starts_at,
            self.session.gm_signups.len(),
            self.session.player_signups.len(),
            self.session.game_system_name()
        )
    }
}

/// Unique GM and player user IDs across all sessions of one event.
#[derive(Debug, Default)]
pub struct ParticipantSets {
    gms: HashSet<String>,
    players: HashSet<String>,
}

impl ParticipantSets {
    /// Signup and waitlist IDs for the same role merge into one set.
    pub fn record(&mut self, session: &SessionNode) {
        self.gms.extend(session.gm_ids().map(str::to_string));
        self.players.extend(session.player_ids().map(str::to_string));
    }

    pub fn gm_count(&self) -> usize {
        self.gms.len()
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }
}

/// `EVENTSUMMARY,<event>,<n> queries,<n> sessions,<n> GMs,<n> players`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventSummary {
    pub event: String,
    pub queries: usize,
    pub sessions: usize,
    pub gms: usize,
    pub players: usize,
}

impl fmt::Display for EventSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "EVENTSUMMARY,{},{} queries,{} sessions,{} GMs,{} players",
            self.event, self.queries, self.sessions, self.gms, self.players
        )
    }
}

/// Walk every session page of `event`, writing a line per session and a
/// summary line at the end. Output is flushed after each page.
pub async fn aggregate_sessions<W: Write>(
    client: &WarhornClient,
    page_size: PageSize,
    event: &str,
    out: &mut W,
) -> Result<EventSummary> {
    let mut participants = ParticipantSets::default();
    let mut pages = CursorPaginator::new(page_size);

    while let Some(sessions) = pages
        .next_page(|after| client.event_sessions(event, after))
        .await
        .with_context(|| format!("Failed to fetch sessions for {event}"))?
    {
        for session in &sessions {
            participants.record(session);
            writeln!(out, "{}", SessionLine { event, session })?;
        }
        out.flush()?;
    }

    let stats = pages.stats();
    let summary = EventSummary {
        event: event.to_string(),
        queries: stats.queries,
        sessions: stats.nodes,
        gms: participants.gm_count(),
        players: participants.player_count(),
    };
    writeln!(out, "{summary}")?;
    out.flush()?;

    Ok(summary)
}

/// Aggregates the sessions of every event handed to it by discovery.
pub struct SessionAggregator<'a, W> {
    client: &'a WarhornClient,
    page_size: PageSize,
    out: W,
    summaries: usize,
}

impl<'a, W: Write + Send> SessionAggregator<'a, W> {
    pub fn new(client: &'a WarhornClient, page_size: PageSize, out: W) -> Self {
        Self {
            client,
            page_size,
            out,
            summaries: 0,
        }
    }

    /// Events summarized so far.
    pub fn summaries(&self) -> usize {
        self.summaries
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

#[async_trait]
impl<'a, W: Write + Send> EventHandler for SessionAggregator<'a, W> {
    async fn handle_event(&mut self, slug: &str) -> Result<()> {
        let summary = aggregate_sessions(self.client, self.page_size, slug, &mut self.out).await?;
        self.summaries += 1;
        info!(
            event = summary.event.as_str(),
            queries = summary.queries,
            sessions = summary.sessions,
            gms = summary.gms,
            players = summary.players,
            "Event summarized"
        );
        Ok(())
    }
}
