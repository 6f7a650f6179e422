// task.rs - Task subcommands: add, cycle, list.

use std::io::Write;

use chrono::{NaiveDate, Utc};
use clap::Subcommand;
use crm_pipeline::{Opportunity, OpportunityId, OpportunityStore, TaskFilter, TaskStatus};
use uuid::Uuid;

use super::truncate;
use crate::config::CrmConfig;

#[derive(Subcommand)]
pub enum TaskCommands {
    /// Add a follow-up task to an opportunity.
    Add {
        /// Opportunity ID.
        id: String,
        /// What needs to be done.
        text: String,
        /// Due date (YYYY-MM-DD, defaults to today).
        #[arg(long)]
        due: Option<NaiveDate>,
    },
    /// Advance a task: todo -> in_progress -> done -> todo.
    Cycle {
        /// Opportunity ID.
        id: String,
        /// Task ID.
        task_id: Uuid,
    },
    /// List an opportunity's tasks.
    List {
        /// Opportunity ID.
        id: String,
        /// Filter by status ("todo", "in_progress", "done").
        #[arg(long, value_parser = parse_task_status)]
        status: Option<TaskStatus>,
    },
}

pub fn execute(cmd: &TaskCommands, config: &CrmConfig) -> anyhow::Result<()> {
    match cmd {
        TaskCommands::Add { id, text, due } => add_task(config, id, text, *due),
        TaskCommands::Cycle { id, task_id } => cycle_task(config, id, *task_id),
        TaskCommands::List { id, status } => list_tasks(config, id, *status),
    }
}

/// clap value parser for task statuses.
pub fn parse_task_status(s: &str) -> Result<TaskStatus, String> {
    match s.trim().to_lowercase().replace('-', "_").as_str() {
        "todo" => Ok(TaskStatus::Todo),
        "in_progress" => Ok(TaskStatus::InProgress),
        "done" => Ok(TaskStatus::Done),
        other => Err(format!("unknown task status '{}'", other)),
    }
}

fn add_task(config: &CrmConfig, id: &str, text: &str, due: Option<NaiveDate>) -> anyhow::Result<()> {
    let mut session = super::open_session(config)?;
    let id = OpportunityId::new(id);
    let due = due.unwrap_or_else(|| Utc::now().date_naive());
    let task = session.pipeline.add_task(&id, text, due)?;

    println!("Task added: {}", task.id);
    println!("  Text: {}", task.text);
    println!("  Due:  {}", task.due_date);

    session.commit(config)?;
    Ok(())
}

fn cycle_task(config: &CrmConfig, id: &str, task_id: Uuid) -> anyhow::Result<()> {
    let mut session = super::open_session(config)?;
    let id = OpportunityId::new(id);
    let status = session.pipeline.cycle_task(&id, task_id)?;
    println!("Task {} is now {}", task_id, status);
    session.commit(config)?;
    Ok(())
}

fn list_tasks(config: &CrmConfig, id: &str, status: Option<TaskStatus>) -> anyhow::Result<()> {
    let pipeline = super::open_pipeline(config)?;
    let id = OpportunityId::new(id);
    super::require_known(&pipeline, &id)?;
    let filter = status.map(TaskFilter::Only).unwrap_or_default();

    if let Some(opportunity) = pipeline.store().get(&id) {
        let stdout = std::io::stdout();
        render_tasks(opportunity, filter, &mut stdout.lock())?;
    }
    Ok(())
}

pub fn render_tasks(
    opportunity: &Opportunity,
    filter: TaskFilter,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    let tasks: Vec<_> = opportunity.tasks_matching(filter).collect();
    if tasks.is_empty() {
        writeln!(out, "No tasks found.")?;
        return Ok(());
    }

    writeln!(
        out,
        "{:<38} {:<12} {:<12} {:<40}",
        "ID", "STATUS", "DUE", "TEXT"
    )?;
    writeln!(out, "{}", "-".repeat(104))?;
    for t in &tasks {
        writeln!(
            out,
            "{:<38} {:<12} {:<12} {:<40}",
            t.id.to_string(),
            t.status.to_string(),
            t.due_date.to_string(),
            truncate(&t.text, 38),
        )?;
    }
    writeln!(out, "\n{} task(s) total.", tasks.len())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crm_pipeline::{InMemoryStore, NewOpportunity, Pipeline, TrainingDetail};

    fn pipeline_with_tasks() -> (Pipeline<InMemoryStore>, OpportunityId) {
        let mut pipeline = Pipeline::new(InMemoryStore::new());
        let id = pipeline
            .create_opportunity(NewOpportunity {
                customer_id: "CUS-8".to_string(),
                customer_name: "Akdeniz Otelcilik".to_string(),
                training_details: vec![TrainingDetail::new("Customer Service", 600.0)],
                ..Default::default()
            })
            .unwrap()
            .id
            .clone();
        let due = NaiveDate::from_ymd_opt(2026, 11, 3).unwrap();
        let first = pipeline.add_task(&id, "Send revised quote", due).unwrap().id;
        pipeline.add_task(&id, "Call HR about dates", due).unwrap();
        pipeline.cycle_task(&id, first).unwrap();
        (pipeline, id)
    }

    fn rendered(filter: TaskFilter) -> String {
        let (pipeline, id) = pipeline_with_tasks();
        let mut out = Vec::new();
        render_tasks(pipeline.store().get(&id).unwrap(), filter, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn status_parser() {
        assert_eq!(parse_task_status("todo"), Ok(TaskStatus::Todo));
        assert_eq!(parse_task_status("In-Progress"), Ok(TaskStatus::InProgress));
        assert!(parse_task_status("blocked").is_err());
    }

    #[test]
    fn list_all_tasks() {
        let text = rendered(TaskFilter::All);
        assert!(text.contains("Send revised quote"));
        assert!(text.contains("Call HR about dates"));
        assert!(text.contains("2 task(s) total."));
    }

    #[test]
    fn list_filtered_tasks() {
        let text = rendered(TaskFilter::Only(TaskStatus::InProgress));
        assert!(text.contains("Send revised quote"));
        assert!(!text.contains("Call HR"));

        let text = rendered(TaskFilter::Only(TaskStatus::Done));
        assert_eq!(text, "No tasks found.\n");
    }
}
