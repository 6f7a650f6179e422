// handoff.rs - Read-only filters over the opportunity list: won deals handed
// off to operations, training date requests and per-owner views.

use crate::opportunity::{Opportunity, OpportunityStatus};

/// Won opportunities whose customer name or any topic contains `query`
/// (case-insensitive). An empty query returns every won opportunity.
pub fn won_opportunities<'a>(opportunities: &'a [Opportunity], query: &str) -> Vec<&'a Opportunity> {
    let needle = query.trim().to_lowercase();
    opportunities
        .iter()
        .filter(|o| o.status == OpportunityStatus::Won)
        .filter(|o| {
            needle.is_empty()
                || o.customer_name.to_lowercase().contains(&needle)
                || o
                    .training_details
                    .iter()
                    .any(|d| d.topic.to_lowercase().contains(&needle))
        })
        .collect()
}

/// Opportunities where the customer asked for at least one training date,
/// in store order.
pub fn date_requests(opportunities: &[Opportunity]) -> Vec<&Opportunity> {
    opportunities
        .iter()
        .filter(|o| !o.requested_dates.is_empty())
        .collect()
}

/// One sales owner's slice of the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct OwnerPortfolio<'a> {
    pub opportunities: Vec<&'a Opportunity>,
    /// How many of `opportunities` are still open (neither won nor lost).
    pub active: usize,
}

/// Opportunities whose `owner_id` equals `owner` exactly. Records without
/// an owner never match.
pub fn owned_by<'a>(opportunities: &'a [Opportunity], owner: &str) -> OwnerPortfolio<'a> {
    let opportunities: Vec<&Opportunity> = opportunities
        .iter()
        .filter(|o| o.owner_id.as_deref() == Some(owner))
        .collect();
    let active = opportunities
        .iter()
        .filter(|o| !o.status.is_terminal())
        .count();
    OwnerPortfolio {
        opportunities,
        active,
    }
}
