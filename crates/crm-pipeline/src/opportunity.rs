// opportunity.rs - Opportunity: one sales deal moving through the pipeline.
//
// An opportunity bundles one or more training topics for a customer. Its
// status walks the four in-progress stages and ends in WON or LOST:
//
//   ProposalSent → ProposalDiscussed → ProposalDetailed → CloseToClosing
//     (Won or Lost reachable from any in-progress stage)
//
// Topic names are derived from `training_details`, so the topic list and the
// per-topic prices can never drift out of index alignment.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::PipelineError;
use crate::task::{OpportunityTask, TaskFilter};

/// Stable identifier of an opportunity (e.g. `FRS-1A2B3C4D`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OpportunityId(String);

impl OpportunityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh `FRS-` prefixed id.
    pub fn generate() -> Self {
        let raw = Uuid::new_v4().simple().to_string();
        Self(format!("FRS-{}", raw[..8].to_uppercase()))
    }

    /// Derive the id of one half of a split (`<id>-W` / `<id>-L`).
    pub fn split_child(&self, suffix: &str) -> Self {
        Self(format!("{}-{}", self.0, suffix))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OpportunityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl From<&str> for OpportunityId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Pipeline stage of an opportunity.
///
/// Serialized as `"PROPOSAL_SENT"`, `"WON"`, etc.; displayed as snake_case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OpportunityStatus {
    /// Proposal has been sent to the customer. Every new opportunity starts here.
    ProposalSent,
    /// Proposal was discussed with the customer.
    ProposalDiscussed,
    /// Proposal scope and pricing were detailed.
    ProposalDetailed,
    /// Deal is about to close.
    CloseToClosing,
    /// Terminal: the deal was won.
    Won,
    /// Terminal: the deal was lost.
    Lost,
}

/// The in-progress stages in their progression order.
pub const PIPELINE_STAGES: [OpportunityStatus; 4] = [
    OpportunityStatus::ProposalSent,
    OpportunityStatus::ProposalDiscussed,
    OpportunityStatus::ProposalDetailed,
    OpportunityStatus::CloseToClosing,
];

/// Every status, in-progress stages first.
pub const ALL_STATUSES: [OpportunityStatus; 6] = [
    OpportunityStatus::ProposalSent,
    OpportunityStatus::ProposalDiscussed,
    OpportunityStatus::ProposalDetailed,
    OpportunityStatus::CloseToClosing,
    OpportunityStatus::Won,
    OpportunityStatus::Lost,
];

impl OpportunityStatus {
    /// `Won` and `Lost` are absorbing.
    pub fn is_terminal(self) -> bool {
        matches!(self, OpportunityStatus::Won | OpportunityStatus::Lost)
    }

    /// Position within [`PIPELINE_STAGES`], or `None` for terminal statuses.
    pub fn stage_index(self) -> Option<usize> {
        PIPELINE_STAGES.iter().position(|&s| s == self)
    }

    /// The following in-progress stage. `CloseToClosing` and terminals have none.
    pub fn next_stage(self) -> Option<OpportunityStatus> {
        let index = self.stage_index()?;
        PIPELINE_STAGES.get(index + 1).copied()
    }

    /// Statuses the pipeline offers as move targets from this one.
    ///
    /// Any in-progress stage may move to any other status. Terminal statuses
    /// offer nothing; a caller that still wants to reopen a deal does so on
    /// its own authority.
    pub fn offered_targets(self) -> Vec<OpportunityStatus> {
        if self.is_terminal() {
            return Vec::new();
        }
        ALL_STATUSES.into_iter().filter(|&s| s != self).collect()
    }

    /// Human-readable column title.
    pub fn label(self) -> &'static str {
        match self {
            OpportunityStatus::ProposalSent => "Proposal sent",
            OpportunityStatus::ProposalDiscussed => "Proposal discussed",
            OpportunityStatus::ProposalDetailed => "Proposal detailed",
            OpportunityStatus::CloseToClosing => "Close to closing",
            OpportunityStatus::Won => "Won",
            OpportunityStatus::Lost => "Lost",
        }
    }
}

impl fmt::Display for OpportunityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpportunityStatus::ProposalSent => write!(f, "proposal_sent"),
            OpportunityStatus::ProposalDiscussed => write!(f, "proposal_discussed"),
            OpportunityStatus::ProposalDetailed => write!(f, "proposal_detailed"),
            OpportunityStatus::CloseToClosing => write!(f, "close_to_closing"),
            OpportunityStatus::Won => write!(f, "won"),
            OpportunityStatus::Lost => write!(f, "lost"),
        }
    }
}

impl FromStr for OpportunityStatus {
    type Err = PipelineError;

    /// Accepts `proposal_sent`, `PROPOSAL_SENT` and `proposal-sent`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace(['-', ' '], "_");
        ALL_STATUSES
            .into_iter()
            .find(|status| status.to_string() == normalized)
            .ok_or_else(|| PipelineError::UnknownStatus(s.to_string()))
    }
}

/// Currency of the quoted amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Currency {
    #[default]
    #[serde(rename = "TL")]
    Tl,
    #[serde(rename = "USD")]
    Usd,
    #[serde(rename = "EUR")]
    Eur,
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Currency::Tl => write!(f, "TL"),
            Currency::Usd => write!(f, "USD"),
            Currency::Eur => write!(f, "EUR"),
        }
    }
}

/// What the quoted amount is priced per.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceUnit {
    Total,
    #[default]
    Daily,
    Hourly,
}

impl fmt::Display for PriceUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PriceUnit::Total => write!(f, "total"),
            PriceUnit::Daily => write!(f, "daily"),
            PriceUnit::Hourly => write!(f, "hourly"),
        }
    }
}

/// One sellable training topic and its price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingDetail {
    pub topic: String,
    pub price: f64,
}

impl TrainingDetail {
    pub fn new(topic: impl Into<String>, price: f64) -> Self {
        Self {
            topic: topic.into(),
            price,
        }
    }
}

/// Input for creating a new opportunity.
#[derive(Debug, Clone, Default)]
pub struct NewOpportunity {
    pub customer_id: String,
    pub customer_name: String,
    pub owner_id: Option<String>,
    pub training_details: Vec<TrainingDetail>,
    pub currency: Currency,
    pub price_unit: PriceUnit,
    pub amount: Option<f64>,
    pub description: String,
    pub requested_date: Option<NaiveDate>,
    pub estimated_close_date: Option<NaiveDate>,
}

/// A sales deal tracked through the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Opportunity {
    /// Unique identifier, immutable.
    pub id: OpportunityId,

    pub customer_id: String,

    /// Customer display name, copied at creation time.
    pub customer_name: String,

    /// Sales owner of the deal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,

    pub status: OpportunityStatus,

    /// Topics with their prices. More than one entry makes this a bundle.
    pub training_details: Vec<TrainingDetail>,

    #[serde(default)]
    pub currency: Currency,

    #[serde(default)]
    pub price_unit: PriceUnit,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,

    #[serde(default)]
    pub description: String,

    /// Training dates the customer asked for.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requested_dates: Vec<NaiveDate>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_close_date: Option<NaiveDate>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tasks: Vec<OpportunityTask>,

    /// The bundle this record was split out of, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub split_from: Option<OpportunityId>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl Opportunity {
    /// Create a new opportunity in the `ProposalSent` stage.
    pub fn new(input: NewOpportunity) -> Self {
        let now = Utc::now();
        Self {
            id: OpportunityId::generate(),
            customer_id: input.customer_id,
            customer_name: input.customer_name,
            owner_id: input.owner_id,
            status: OpportunityStatus::ProposalSent,
            training_details: input.training_details,
            currency: input.currency,
            price_unit: input.price_unit,
            amount: input.amount,
            description: input.description,
            requested_dates: input.requested_date.into_iter().collect(),
            estimated_close_date: input.estimated_close_date,
            tasks: Vec::new(),
            split_from: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Topic names in detail order.
    pub fn training_topics(&self) -> Vec<&str> {
        self.training_details
            .iter()
            .map(|d| d.topic.as_str())
            .collect()
    }

    pub fn topic_count(&self) -> usize {
        self.training_details.len()
    }

    /// A bundle has more than one topic; winning it needs per-topic confirmation.
    pub fn is_bundle(&self) -> bool {
        self.topic_count() > 1
    }

    /// Sum of the per-topic prices.
    pub fn details_total(&self) -> f64 {
        self.training_details.iter().map(|d| d.price).sum()
    }

    /// Set the status. Returns `false` (and leaves `updated_at` alone) when
    /// the status is unchanged.
    pub fn set_status(&mut self, status: OpportunityStatus) -> bool {
        if self.status == status {
            return false;
        }
        self.status = status;
        self.touch();
        true
    }

    /// Tasks passing the given filter, in insertion order.
    pub fn tasks_matching(&self, filter: TaskFilter) -> impl Iterator<Item = &OpportunityTask> {
        self.tasks.iter().filter(move |t| filter.matches(t.status))
    }

    /// Mark the record as updated (call after any mutation).
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bundle() -> Opportunity {
        Opportunity::new(NewOpportunity {
            customer_id: "CUS-1".to_string(),
            customer_name: "Acme Lojistik".to_string(),
            training_details: vec![
                TrainingDetail::new("Leadership", 1000.0),
                TrainingDetail::new("Sales Training", 2500.0),
            ],
            ..Default::default()
        })
    }

    #[test]
    fn new_opportunity_starts_in_proposal_sent() {
        let opp = bundle();
        assert_eq!(opp.status, OpportunityStatus::ProposalSent);
        assert!(opp.id.as_str().starts_with("FRS-"));
        assert_eq!(opp.created_at, opp.updated_at);
        assert!(opp.tasks.is_empty());
    }

    #[test]
    fn topics_follow_detail_order() {
        let opp = bundle();
        assert_eq!(opp.training_topics(), vec!["Leadership", "Sales Training"]);
        assert!(opp.is_bundle());
        assert_eq!(opp.details_total(), 3500.0);
    }

    #[test]
    fn new_opportunity_keeps_requested_and_close_dates() {
        let opp = Opportunity::new(NewOpportunity {
            customer_id: "CUS-1".to_string(),
            customer_name: "Acme Lojistik".to_string(),
            training_details: vec![TrainingDetail::new("Leadership", 1000.0)],
            requested_date: NaiveDate::from_ymd_opt(2026, 11, 20),
            estimated_close_date: NaiveDate::from_ymd_opt(2026, 12, 15),
            ..Default::default()
        });
        assert_eq!(
            opp.requested_dates,
            vec![NaiveDate::from_ymd_opt(2026, 11, 20).unwrap()]
        );
        assert_eq!(opp.estimated_close_date, NaiveDate::from_ymd_opt(2026, 12, 15));
        assert_eq!(bundle().estimated_close_date, None);
    }

    #[test]
    fn generated_ids_are_distinct() {
        assert_ne!(OpportunityId::generate(), OpportunityId::generate());
    }

    #[test]
    fn stage_progression() {
        assert_eq!(
            OpportunityStatus::ProposalSent.next_stage(),
            Some(OpportunityStatus::ProposalDiscussed)
        );
        assert_eq!(OpportunityStatus::CloseToClosing.next_stage(), None);
        assert_eq!(OpportunityStatus::Won.next_stage(), None);
        assert_eq!(OpportunityStatus::ProposalDetailed.stage_index(), Some(2));
        assert_eq!(OpportunityStatus::Lost.stage_index(), None);
    }

    #[test]
    fn terminal_statuses_offer_no_targets() {
        assert!(OpportunityStatus::Won.offered_targets().is_empty());
        assert!(OpportunityStatus::Lost.offered_targets().is_empty());

        let offered = OpportunityStatus::ProposalDiscussed.offered_targets();
        assert_eq!(offered.len(), 5);
        assert!(!offered.contains(&OpportunityStatus::ProposalDiscussed));
        assert!(offered.contains(&OpportunityStatus::Won));
        assert!(offered.contains(&OpportunityStatus::Lost));
    }

    #[test]
    fn status_parses_common_spellings() {
        assert_eq!(
            "proposal_sent".parse::<OpportunityStatus>().unwrap(),
            OpportunityStatus::ProposalSent
        );
        assert_eq!(
            "CLOSE_TO_CLOSING".parse::<OpportunityStatus>().unwrap(),
            OpportunityStatus::CloseToClosing
        );
        assert_eq!(
            "proposal-detailed".parse::<OpportunityStatus>().unwrap(),
            OpportunityStatus::ProposalDetailed
        );
        assert!(matches!(
            "shipped".parse::<OpportunityStatus>(),
            Err(PipelineError::UnknownStatus(_))
        ));
    }

    #[test]
    fn status_serializes_screaming_snake_case() {
        let json = serde_json::to_string(&OpportunityStatus::CloseToClosing).unwrap();
        assert_eq!(json, "\"CLOSE_TO_CLOSING\"");
        assert_eq!(OpportunityStatus::CloseToClosing.to_string(), "close_to_closing");
    }

    #[test]
    fn set_status_reports_change() {
        let mut opp = bundle();
        assert!(!opp.set_status(OpportunityStatus::ProposalSent));
        assert!(opp.set_status(OpportunityStatus::ProposalDiscussed));
        assert_eq!(opp.status, OpportunityStatus::ProposalDiscussed);
    }

    #[test]
    fn optional_fields_omitted_from_json() {
        let opp = bundle();
        let json = serde_json::to_string_pretty(&opp).unwrap();
        assert!(!json.contains("split_from"));
        assert!(!json.contains("estimated_close_date"));
        assert!(json.contains("\"currency\": \"TL\""));
        let restored: Opportunity = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, opp);
    }
}
