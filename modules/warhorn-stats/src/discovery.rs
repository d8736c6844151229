//! Event discovery.
//!
//! Warhorn's API has no query that lists events. Every scenario belongs to
//! exactly one event, so walking all scenarios and collecting their distinct
//! event slugs recovers the events that have at least one scenario. Events
//! without any scenario are never found this way, and the output is
//! incomplete by exactly that set.

use std::collections::HashSet;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{debug, info};
use warhorn_client::{CursorPaginator, PageSize, ScenarioNode, WarhornClient};

/// Receives each event the first time it is discovered.
#[async_trait]
pub trait EventHandler: Send {
    async fn handle_event(&mut self, slug: &str) -> Result<()>;
}

/// Event slugs seen during one discovery run.
#[derive(Debug, Default)]
pub struct EventSet {
    seen: HashSet<String>,
}

impl EventSet {
    /// Returns the scenario's event slug if it is non-empty and new.
    pub fn record(&mut self, scenario: ScenarioNode) -> Option<String> {
        let slug = scenario.event.slug;
        if slug.is_empty() || self.seen.contains(&slug) {
            return None;
        }
        self.seen.insert(slug.clone());
        Some(slug)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscoveryReport {
    pub events: usize,
    pub queries: usize,
}

/// Walk every scenario page and hand each newly seen event to `handler`, in
/// first-seen order. The handler runs to completion before the next scenario
/// is looked at; a handler error aborts discovery.
pub async fn discover_events<H: EventHandler>(
    client: &WarhornClient,
    page_size: PageSize,
    handler: &mut H,
) -> Result<DiscoveryReport> {
    let mut events = EventSet::default();
    let mut pages = CursorPaginator::new(page_size);

    while let Some(scenarios) = pages
        .next_page(|after| client.global_scenarios(after))
        .await
        .context("Failed to fetch scenarios")?
    {
        debug!(scenarios = scenarios.len(), "Scenario page");
        for scenario in scenarios {
            if let Some(slug) = events.record(scenario) {
                handler
                    .handle_event(&slug)
                    .await
                    .with_context(|| format!("Failed to process event {slug}"))?;
            }
        }
    }

    let report = DiscoveryReport {
        events: events.len(),
        queries: pages.stats().queries,
    };
    info!(
        events = report.events,
        queries = report.queries,
        "Found unique events"
    );
    Ok(report)
}
