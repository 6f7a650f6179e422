// opportunity.rs - `crm new` and `crm show`, plus the list views `crm handoff`,
// `crm requests` and `crm mine`.

use std::io::Write;

use chrono::NaiveDate;
use crm_pipeline::{
    handoff, Currency, NewOpportunity, Opportunity, OpportunityId, OpportunityStore,
    OwnerPortfolio, PriceUnit, TaskFilter, TrainingDetail,
};

use super::{format_money, truncate};
use crate::config::CrmConfig;

/// Arguments of `crm new`, already parsed by clap.
#[derive(Debug, Clone)]
pub struct NewArgs {
    pub customer_id: String,
    pub customer_name: String,
    pub owner_id: Option<String>,
    pub topics: Vec<TrainingDetail>,
    pub currency: Currency,
    pub price_unit: PriceUnit,
    pub amount: Option<f64>,
    pub description: String,
    pub requested_date: Option<NaiveDate>,
    pub close_date: Option<NaiveDate>,
}

/// clap value parser for `--topic "Leadership=1500"`. A bare name is priced 0.
pub fn parse_topic(s: &str) -> Result<TrainingDetail, String> {
    let (topic, price) = match s.rsplit_once('=') {
        Some((topic, price)) => {
            let price: f64 = price
                .trim()
                .parse()
                .map_err(|_| format!("invalid price in '{}'", s))?;
            (topic.trim(), price)
        }
        None => (s.trim(), 0.0),
    };
    if topic.is_empty() {
        return Err(format!("missing topic name in '{}'", s));
    }
    if !price.is_finite() || price < 0.0 {
        return Err(format!("price must be a non-negative number in '{}'", s));
    }
    Ok(TrainingDetail::new(topic, price))
}

/// clap value parser for `--amount`.
pub fn parse_amount(s: &str) -> Result<f64, String> {
    let amount: f64 = s
        .trim()
        .parse()
        .map_err(|_| format!("invalid amount '{}'", s))?;
    if !amount.is_finite() || amount < 0.0 {
        return Err(format!("amount must be a non-negative number, got '{}'", s));
    }
    Ok(amount)
}

/// clap value parser for `--currency`.
pub fn parse_currency(s: &str) -> Result<Currency, String> {
    match s.trim().to_uppercase().as_str() {
        "TL" | "TRY" => Ok(Currency::Tl),
        "USD" => Ok(Currency::Usd),
        "EUR" => Ok(Currency::Eur),
        other => Err(format!("unknown currency '{}' (expected TL, USD or EUR)", other)),
    }
}

/// clap value parser for `--unit`.
pub fn parse_price_unit(s: &str) -> Result<PriceUnit, String> {
    match s.trim().to_lowercase().as_str() {
        "total" => Ok(PriceUnit::Total),
        "daily" => Ok(PriceUnit::Daily),
        "hourly" => Ok(PriceUnit::Hourly),
        other => Err(format!("unknown price unit '{}' (expected total, daily or hourly)", other)),
    }
}

pub fn execute_new(config: &CrmConfig, args: NewArgs) -> anyhow::Result<()> {
    if args.topics.is_empty() {
        anyhow::bail!("At least one --topic is required");
    }
    let mut session = super::open_session(config)?;
    let created = session.pipeline.create_opportunity(NewOpportunity {
        customer_id: args.customer_id,
        customer_name: args.customer_name,
        owner_id: args.owner_id,
        training_details: args.topics,
        currency: args.currency,
        price_unit: args.price_unit,
        amount: args.amount,
        description: args.description,
        requested_date: args.requested_date,
        estimated_close_date: args.close_date,
    })?;

    println!("Opportunity created: {}", created.id);
    println!("  Customer: {}", created.customer_name);
    println!("  Topics:   {}", created.training_topics().join(", "));
    println!("  Status:   {}", created.status.label());

    session.commit(config)?;
    Ok(())
}

pub fn execute_show(config: &CrmConfig, id: &str) -> anyhow::Result<()> {
    let pipeline = super::open_pipeline(config)?;
    let id = OpportunityId::new(id);
    let Some(opportunity) = pipeline.store().get(&id) else {
        eprintln!("Opportunity not found: {}", id);
        std::process::exit(1);
    };
    let stdout = std::io::stdout();
    render_detail(opportunity, config.display.currency_decimals, &mut stdout.lock())
}

pub fn execute_handoff(config: &CrmConfig, search: &str) -> anyhow::Result<()> {
    let pipeline = super::open_pipeline(config)?;
    let won = handoff::won_opportunities(pipeline.store().opportunities(), search);
    let stdout = std::io::stdout();
    render_handoff(&won, config.display.currency_decimals, &mut stdout.lock())
}

pub fn execute_requests(config: &CrmConfig) -> anyhow::Result<()> {
    let pipeline = super::open_pipeline(config)?;
    let requests = handoff::date_requests(pipeline.store().opportunities());
    let stdout = std::io::stdout();
    render_requests(&requests, &mut stdout.lock())
}

pub fn execute_mine(config: &CrmConfig, owner: &str) -> anyhow::Result<()> {
    let pipeline = super::open_pipeline(config)?;
    let portfolio = handoff::owned_by(pipeline.store().opportunities(), owner);
    let stdout = std::io::stdout();
    render_portfolio(owner, &portfolio, config.display.currency_decimals, &mut stdout.lock())
}

pub fn render_detail(
    opportunity: &Opportunity,
    decimals: usize,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let o = opportunity;
    writeln!(out, "Opportunity: {}", o.id)?;
    writeln!(out, "Customer:    {} ({})", o.customer_name, o.customer_id)?;
    if let Some(owner) = &o.owner_id {
        writeln!(out, "Owner:       {}", owner)?;
    }
    writeln!(out, "Status:      {}", o.status.label())?;
    match o.status.stage_index() {
        Some(index) => {
            let next = o
                .status
                .next_stage()
                .map(|s| s.label())
                .unwrap_or("won / lost");
            writeln!(out, "Stage:       {} of 4, next: {}", index + 1, next)?;
        }
        None => writeln!(out, "Stage:       closed")?,
    }
    if let Some(parent) = &o.split_from {
        writeln!(out, "Split from:  {}", parent)?;
    }

    writeln!(out, "Topics:")?;
    for (index, detail) in o.training_details.iter().enumerate() {
        writeln!(
            out,
            "  {:<3} {:<40} {:>16}",
            index,
            truncate(&detail.topic, 38),
            format_money(detail.price, o.currency, decimals)
        )?;
    }
    let amount = o.amount.unwrap_or_else(|| o.details_total());
    writeln!(
        out,
        "Amount:      {} ({})",
        format_money(amount, o.currency, decimals),
        o.price_unit
    )?;
    if !o.description.is_empty() {
        writeln!(out, "Description: {}", o.description)?;
    }
    if !o.requested_dates.is_empty() {
        let dates: Vec<String> = o.requested_dates.iter().map(|d| d.to_string()).collect();
        writeln!(out, "Requested:   {}", dates.join(", "))?;
    }
    if let Some(close) = o.estimated_close_date {
        writeln!(out, "Est. close:  {}", close)?;
    }

    let targets = o.status.offered_targets();
    if !targets.is_empty() {
        let names: Vec<String> = targets.iter().map(|s| s.to_string()).collect();
        writeln!(out, "Move to:     {}", names.join(", "))?;
    }

    let task_count = o.tasks_matching(TaskFilter::All).count();
    writeln!(out, "Tasks:       {}", task_count)?;
    writeln!(out, "Created:     {}", o.created_at.to_rfc3339())?;
    writeln!(out, "Updated:     {}", o.updated_at.to_rfc3339())?;
    Ok(())
}

pub fn render_handoff(
    won: &[&Opportunity],
    decimals: usize,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    if won.is_empty() {
        writeln!(out, "No won opportunities found.")?;
        return Ok(());
    }

    writeln!(
        out,
        "{:<16} {:<26} {:<40} {:>16}",
        "ID", "CUSTOMER", "TOPICS", "AMOUNT"
    )?;
    writeln!(out, "{}", "-".repeat(101))?;
    for o in won {
        writeln!(
            out,
            "{:<16} {:<26} {:<40} {:>16}",
            o.id,
            truncate(&o.customer_name, 24),
            truncate(&o.training_topics().join(", "), 38),
            format_money(
                o.amount.unwrap_or_else(|| o.details_total()),
                o.currency,
                decimals
            ),
        )?;
    }
    writeln!(out, "\n{} won opportunity(ies) ready for operations.", won.len())?;
    Ok(())
}

/// Customers waiting for a training date, with the dates they asked for.
pub fn render_requests(requests: &[&Opportunity], out: &mut impl Write) -> anyhow::Result<()> {
    if requests.is_empty() {
        writeln!(out, "No date requests found.")?;
        return Ok(());
    }

    writeln!(
        out,
        "{:<16} {:<26} {:<24} {:<36}",
        "ID", "CUSTOMER", "DATES", "TOPICS"
    )?;
    writeln!(out, "{}", "-".repeat(105))?;
    for o in requests {
        let dates: Vec<String> = o.requested_dates.iter().map(|d| d.to_string()).collect();
        writeln!(
            out,
            "{:<16} {:<26} {:<24} {:<36}",
            o.id,
            truncate(&o.customer_name, 24),
            truncate(&dates.join(", "), 22),
            truncate(&o.training_topics().join(", "), 34),
        )?;
    }
    writeln!(out, "\n{} date request(s).", requests.len())?;
    Ok(())
}

pub fn render_portfolio(
    owner: &str,
    portfolio: &OwnerPortfolio<'_>,
    decimals: usize,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    if portfolio.opportunities.is_empty() {
        writeln!(out, "No opportunities owned by {}.", owner)?;
        return Ok(());
    }

    writeln!(
        out,
        "{:<16} {:<26} {:<20} {:>16}",
        "ID", "CUSTOMER", "STATUS", "AMOUNT"
    )?;
    writeln!(out, "{}", "-".repeat(81))?;
    for o in &portfolio.opportunities {
        writeln!(
            out,
            "{:<16} {:<26} {:<20} {:>16}",
            o.id,
            truncate(&o.customer_name, 24),
            o.status.label(),
            format_money(
                o.amount.unwrap_or_else(|| o.details_total()),
                o.currency,
                decimals
            ),
        )?;
    }
    writeln!(
        out,
        "\n{} opportunity(ies) owned by {}, {} active.",
        portfolio.opportunities.len(),
        owner,
        portfolio.active
    )?;
    Ok(())
}
