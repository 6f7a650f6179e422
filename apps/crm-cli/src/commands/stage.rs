// stage.rs - `crm move` and `crm status`: change an opportunity's stage.
//
// `move` is the board drag-and-drop: it goes straight to the transition rules.
// `status` is the list-view stage click: it asks for confirmation first.
// Either one may land a bundle in the win-split dialog, which is resolved
// from `--won`, `--cancel`, or interactively on stdin.

use std::collections::BTreeSet;
use std::io::{BufRead, Write};

use crm_pipeline::{
    ConfirmOutcome, InMemoryStore, MoveOutcome, OpportunityId, OpportunityStatus, OpportunityStore,
    Pipeline, SplitOutcome, StatusUpdate,
};

use crate::config::CrmConfig;

/// How to answer the win-split dialog if a move opens it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SplitChoice {
    /// Ask on stdin.
    Interactive,
    /// Topic positions that were won; the rest are lost.
    Won(Vec<usize>),
    /// Dismiss the dialog and leave the opportunity as it was.
    Cancel,
}

impl SplitChoice {
    pub fn from_flags(won: Option<&[usize]>, cancel: bool) -> Self {
        match (won, cancel) {
            (_, true) => SplitChoice::Cancel,
            (Some(indices), false) => SplitChoice::Won(indices.to_vec()),
            (None, false) => SplitChoice::Interactive,
        }
    }
}

/// clap value parser for status arguments.
pub fn parse_status(s: &str) -> Result<OpportunityStatus, String> {
    s.parse::<OpportunityStatus>().map_err(|e| e.to_string())
}

pub fn execute_move(
    config: &CrmConfig,
    id: &str,
    target: OpportunityStatus,
    choice: SplitChoice,
) -> anyhow::Result<()> {
    let mut session = super::open_session(config)?;
    let id = OpportunityId::new(id);
    super::require_known(&session.pipeline, &id)?;

    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    let changed = move_opportunity(
        &mut session.pipeline,
        &id,
        target,
        choice,
        &mut stdin.lock(),
        &mut stdout.lock(),
    )?;
    if changed {
        session.commit(config)?;
    }
    Ok(())
}

pub fn execute_status(
    config: &CrmConfig,
    id: &str,
    target: OpportunityStatus,
    assume_yes: bool,
) -> anyhow::Result<()> {
    let mut session = super::open_session(config)?;
    let id = OpportunityId::new(id);
    super::require_known(&session.pipeline, &id)?;

    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    let changed = change_status(
        &mut session.pipeline,
        &id,
        target,
        assume_yes,
        &mut stdin.lock(),
        &mut stdout.lock(),
    )?;
    if changed {
        session.commit(config)?;
    }
    Ok(())
}

/// Drag `id` onto the `target` column. Returns whether the store changed.
pub fn move_opportunity(
    pipeline: &mut Pipeline<InMemoryStore>,
    id: &OpportunityId,
    target: OpportunityStatus,
    choice: SplitChoice,
    input: &mut impl BufRead,
    out: &mut impl Write,
) -> anyhow::Result<bool> {
    let outcome = pipeline.request_move(id, target)?;
    handle_outcome(pipeline, id, target, outcome, choice, input, out)
}

/// Click a stage in the list view: confirm, then apply through the same rules.
pub fn change_status(
    pipeline: &mut Pipeline<InMemoryStore>,
    id: &OpportunityId,
    target: OpportunityStatus,
    assume_yes: bool,
    input: &mut impl BufRead,
    out: &mut impl Write,
) -> anyhow::Result<bool> {
    let current = pipeline
        .store()
        .get(id)
        .map(|o| o.status)
        .ok_or_else(|| anyhow::anyhow!("Opportunity not found: {}", id))?;
    pipeline.request_status_change(id.clone(), target);

    let confirmed = assume_yes || {
        write!(
            out,
            "Change {} from '{}' to '{}'? [y/N] ",
            id,
            current.label(),
            target.label()
        )?;
        out.flush()?;
        matches!(read_answer(input)?.as_deref(), Some("y") | Some("yes"))
    };
    if !confirmed {
        pipeline.cancel_status_change();
        writeln!(out, "Status change cancelled.")?;
        return Ok(false);
    }

    let outcome = pipeline.confirm_status_change()?;
    handle_outcome(
        pipeline,
        id,
        target,
        outcome,
        SplitChoice::Interactive,
        input,
        out,
    )
}

fn handle_outcome(
    pipeline: &mut Pipeline<InMemoryStore>,
    id: &OpportunityId,
    target: OpportunityStatus,
    outcome: MoveOutcome,
    choice: SplitChoice,
    input: &mut impl BufRead,
    out: &mut impl Write,
) -> anyhow::Result<bool> {
    let dialog_opened = matches!(outcome, MoveOutcome::AwaitingSplitConfirmation);
    if !dialog_opened && choice != SplitChoice::Interactive {
        writeln!(
            out,
            "Note: --won/--cancel ignored; {} needed no win-split confirmation.",
            id
        )?;
    }
    match outcome {
        MoveOutcome::NoOp => {
            writeln!(out, "{} is already in '{}'.", id, target.label())?;
            Ok(false)
        }
        MoveOutcome::Updated(update) => report_update(id, update, out),
        MoveOutcome::AwaitingSplitConfirmation => match choice {
            SplitChoice::Cancel => {
                pipeline.cancel_split();
                writeln!(out, "Win cancelled; {} unchanged.", id)?;
                Ok(false)
            }
            SplitChoice::Won(indices) => {
                apply_selection(pipeline, &indices)?;
                match pipeline.confirm_split()? {
                    ConfirmOutcome::Inert => {
                        pipeline.cancel_split();
                        anyhow::bail!("No topics selected; {} was not marked won", id)
                    }
                    resolved => report_confirm(id, resolved, out),
                }
            }
            SplitChoice::Interactive => run_dialog(pipeline, id, input, out),
        },
    }
}

/// Make the open dialog's selection exactly `indices`.
fn apply_selection(pipeline: &mut Pipeline<InMemoryStore>, indices: &[usize]) -> anyhow::Result<()> {
    let topic_count = match pipeline.workflow().decision() {
        Some(decision) => decision.training_details().len(),
        None => anyhow::bail!("No win-split confirmation is open"),
    };
    if let Some(bad) = indices.iter().find(|&&i| i >= topic_count) {
        pipeline.cancel_split();
        anyhow::bail!(
            "Topic {} out of range (the bundle has {} topics, numbered from 0)",
            bad,
            topic_count
        );
    }

    let wanted: BTreeSet<usize> = indices.iter().copied().collect();
    if let Some(decision) = pipeline.split_decision_mut() {
        for index in 0..topic_count {
            if decision.is_selected(index) != wanted.contains(&index) {
                decision.toggle(index);
            }
        }
    }
    Ok(())
}

/// Toggle topics from stdin until the user confirms or cancels.
/// End of input cancels.
fn run_dialog(
    pipeline: &mut Pipeline<InMemoryStore>,
    id: &OpportunityId,
    input: &mut impl BufRead,
    out: &mut impl Write,
) -> anyhow::Result<bool> {
    loop {
        render_dialog(pipeline, out)?;
        let Some(answer) = read_answer(input)? else {
            pipeline.cancel_split();
            writeln!(out, "Win cancelled; {} unchanged.", id)?;
            return Ok(false);
        };

        match answer.as_str() {
            "" | "y" | "yes" => match pipeline.confirm_split()? {
                ConfirmOutcome::Inert => {
                    writeln!(out, "Select at least one topic, or 'c' to cancel.")?;
                }
                resolved => return report_confirm(id, resolved, out),
            },
            "c" | "cancel" => {
                pipeline.cancel_split();
                writeln!(out, "Win cancelled; {} unchanged.", id)?;
                return Ok(false);
            }
            other => {
                let topic_count = pipeline
                    .workflow()
                    .decision()
                    .map(|d| d.training_details().len())
                    .unwrap_or(0);
                match other.parse::<usize>() {
                    Ok(index) if index < topic_count => {
                        pipeline.toggle_topic(index);
                    }
                    Ok(index) => writeln!(out, "No topic {}.", index)?,
                    Err(_) => writeln!(out, "Unrecognized input '{}'.", other)?,
                }
            }
        }
    }
}

fn render_dialog(pipeline: &Pipeline<InMemoryStore>, out: &mut impl Write) -> anyhow::Result<()> {
    let Some(decision) = pipeline.workflow().decision() else {
        return Ok(());
    };
    writeln!(out, "Which topics of {} were won?", decision.opportunity_id())?;
    for (index, detail) in decision.training_details().iter().enumerate() {
        let mark = if decision.is_selected(index) { "x" } else { " " };
        writeln!(
            out,
            "  [{}] {:<3} {:<40} {:>12.2}",
            mark, index, detail.topic, detail.price
        )?;
    }
    writeln!(out, "  Selected total: {:.2}", decision.selected_total())?;
    write!(out, "Number to toggle, Enter/'y' to confirm, 'c' to cancel: ")?;
    out.flush()?;
    Ok(())
}

/// Next trimmed, lowercased line, or `None` at end of input.
fn read_answer(input: &mut impl BufRead) -> anyhow::Result<Option<String>> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_lowercase()))
}

fn report_update(id: &OpportunityId, update: StatusUpdate, out: &mut impl Write) -> anyhow::Result<bool> {
    match update {
        StatusUpdate::Unchanged => {
            writeln!(out, "{} unchanged.", id)?;
            Ok(false)
        }
        StatusUpdate::Changed { from, to } => {
            writeln!(out, "{}: '{}' -> '{}'", id, from.label(), to.label())?;
            Ok(true)
        }
    }
}

fn report_confirm(id: &OpportunityId, outcome: ConfirmOutcome, out: &mut impl Write) -> anyhow::Result<bool> {
    match outcome {
        ConfirmOutcome::Inert => Ok(false),
        ConfirmOutcome::MarkedWon(update) => report_update(id, update, out),
        ConfirmOutcome::Split(SplitOutcome { won, lost }) => {
            writeln!(out, "Split {}:", id)?;
            writeln!(
                out,
                "  WON  {:<16} {}",
                won.id,
                won.training_topics().join(", ")
            )?;
            writeln!(
                out,
                "  LOST {:<16} {}",
                lost.id,
                lost.training_topics().join(", ")
            )?;
            Ok(true)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crm_pipeline::{NewOpportunity, TrainingDetail};
    use std::io::Cursor;

    fn pipeline_with(topics: &[(&str, f64)]) -> (Pipeline<InMemoryStore>, OpportunityId) {
        let mut pipeline = Pipeline::new(InMemoryStore::new());
        let id = pipeline
            .create_opportunity(NewOpportunity {
                customer_id: "CUS-42".to_string(),
                customer_name: "Bosphorus Bank".to_string(),
                training_details: topics
                    .iter()
                    .map(|(t, p)| TrainingDetail::new(*t, *p))
                    .collect(),
                ..Default::default()
            })
            .unwrap()
            .id
            .clone();
        (pipeline, id)
    }

    fn abc() -> (Pipeline<InMemoryStore>, OpportunityId) {
        pipeline_with(&[("A", 1200.0), ("B", 800.0), ("C", 450.0)])
    }

    fn drive_move(
        pipeline: &mut Pipeline<InMemoryStore>,
        id: &OpportunityId,
        target: OpportunityStatus,
        choice: SplitChoice,
        stdin: &str,
    ) -> (bool, String) {
        let mut input = Cursor::new(stdin.as_bytes().to_vec());
        let mut out = Vec::new();
        let changed = move_opportunity(pipeline, id, target, choice, &mut input, &mut out).unwrap();
        (changed, String::from_utf8(out).unwrap())
    }

    fn status_of(pipeline: &Pipeline<InMemoryStore>, id: &OpportunityId) -> OpportunityStatus {
        pipeline.store().get(id).unwrap().status
    }

    #[test]
    fn choice_from_flags() {
        assert_eq!(SplitChoice::from_flags(None, false), SplitChoice::Interactive);
        assert_eq!(SplitChoice::from_flags(Some(&[0, 2][..]), false), SplitChoice::Won(vec![0, 2]));
        assert_eq!(SplitChoice::from_flags(Some(&[0][..]), true), SplitChoice::Cancel);
    }

    #[test]
    fn parse_status_accepts_cli_spellings() {
        assert_eq!(parse_status("won"), Ok(OpportunityStatus::Won));
        assert_eq!(
            parse_status("close-to-closing"),
            Ok(OpportunityStatus::CloseToClosing)
        );
        assert!(parse_status("archived").is_err());
    }

    #[test]
    fn plain_move_updates_status() {
        let (mut p, id) = pipeline_with(&[("Excel", 300.0)]);
        let (changed, text) = drive_move(
            &mut p,
            &id,
            OpportunityStatus::ProposalDiscussed,
            SplitChoice::Interactive,
            "",
        );
        assert!(changed);
        assert!(text.contains("'Proposal sent' -> 'Proposal discussed'"));
        assert_eq!(status_of(&p, &id), OpportunityStatus::ProposalDiscussed);
    }

    #[test]
    fn move_to_own_column_is_noop() {
        let (mut p, id) = pipeline_with(&[("Excel", 300.0)]);
        let (changed, text) = drive_move(
            &mut p,
            &id,
            OpportunityStatus::ProposalSent,
            SplitChoice::Interactive,
            "",
        );
        assert!(!changed);
        assert!(text.contains("already in 'Proposal sent'"));
    }

    #[test]
    fn won_flag_splits_bundle() {
        let (mut p, id) = abc();
        let (changed, text) = drive_move(
            &mut p,
            &id,
            OpportunityStatus::Won,
            SplitChoice::Won(vec![0, 2]),
            "",
        );
        assert!(changed);
        assert!(text.contains("WON"));
        assert!(text.contains("A, C"));
        assert_eq!(p.store().opportunities().len(), 2);
        assert!(!p.workflow().is_open());
    }

    #[test]
    fn won_flag_with_every_topic_marks_won() {
        let (mut p, id) = abc();
        let (changed, _) = drive_move(
            &mut p,
            &id,
            OpportunityStatus::Won,
            SplitChoice::Won(vec![2, 1, 0]),
            "",
        );
        assert!(changed);
        assert_eq!(status_of(&p, &id), OpportunityStatus::Won);
        assert_eq!(p.store().opportunities().len(), 1);
    }

    #[test]
    fn won_flag_out_of_range_is_error_and_closes_dialog() {
        let (mut p, id) = abc();
        let mut out = Vec::new();
        let result = move_opportunity(
            &mut p,
            &id,
            OpportunityStatus::Won,
            SplitChoice::Won(vec![5]),
            &mut Cursor::new(Vec::new()),
            &mut out,
        );
        assert!(result.is_err());
        assert!(!p.workflow().is_open());
        assert_eq!(status_of(&p, &id), OpportunityStatus::ProposalSent);
    }

    #[test]
    fn cancel_flag_leaves_bundle_alone() {
        let (mut p, id) = abc();
        let (changed, text) = drive_move(
            &mut p,
            &id,
            OpportunityStatus::Won,
            SplitChoice::Cancel,
            "",
        );
        assert!(!changed);
        assert!(text.contains("Win cancelled"));
        assert_eq!(status_of(&p, &id), OpportunityStatus::ProposalSent);
    }

    #[test]
    fn interactive_toggle_then_confirm_splits() {
        let (mut p, id) = abc();
        let (changed, text) = drive_move(
            &mut p,
            &id,
            OpportunityStatus::Won,
            SplitChoice::Interactive,
            "1\ny\n",
        );
        assert!(changed);
        assert!(text.contains("[ ] 1"));
        let won = OpportunityId::new(format!("{}-W", id));
        let lost = OpportunityId::new(format!("{}-L", id));
        assert_eq!(p.store().get(&won).unwrap().training_topics(), vec!["A", "C"]);
        assert_eq!(p.store().get(&lost).unwrap().training_topics(), vec!["B"]);
    }

    #[test]
    fn interactive_empty_selection_stays_open_until_fixed() {
        let (mut p, id) = pipeline_with(&[("A", 1.0), ("B", 2.0)]);
        let (changed, text) = drive_move(
            &mut p,
            &id,
            OpportunityStatus::Won,
            SplitChoice::Interactive,
            "0\n1\ny\n0\n\n",
        );
        assert!(changed);
        assert!(text.contains("Select at least one topic"));
        assert_eq!(p.store().opportunities().len(), 2);
    }

    #[test]
    fn interactive_bad_input_is_reported() {
        let (mut p, id) = abc();
        let (changed, text) = drive_move(
            &mut p,
            &id,
            OpportunityStatus::Won,
            SplitChoice::Interactive,
            "9\nfoo\nc\n",
        );
        assert!(!changed);
        assert!(text.contains("No topic 9."));
        assert!(text.contains("Unrecognized input 'foo'."));
        assert_eq!(status_of(&p, &id), OpportunityStatus::ProposalSent);
    }

    #[test]
    fn end_of_input_cancels_dialog() {
        let (mut p, id) = abc();
        let (changed, _) = drive_move(
            &mut p,
            &id,
            OpportunityStatus::Won,
            SplitChoice::Interactive,
            "1\n",
        );
        assert!(!changed);
        assert!(!p.workflow().is_open());
        assert_eq!(p.store().opportunities().len(), 1);
    }

    #[test]
    fn status_change_needs_confirmation() {
        let (mut p, id) = pipeline_with(&[("Excel", 300.0)]);
        let mut out = Vec::new();
        let changed = change_status(
            &mut p,
            &id,
            OpportunityStatus::Lost,
            false,
            &mut Cursor::new(b"n\n".to_vec()),
            &mut out,
        )
        .unwrap();
        assert!(!changed);
        assert!(!p.prompt().is_pending());
        assert_eq!(status_of(&p, &id), OpportunityStatus::ProposalSent);

        let changed = change_status(
            &mut p,
            &id,
            OpportunityStatus::Lost,
            false,
            &mut Cursor::new(b"y\n".to_vec()),
            &mut out,
        )
        .unwrap();
        assert!(changed);
        assert_eq!(status_of(&p, &id), OpportunityStatus::Lost);
    }

    #[test]
    fn status_change_to_won_on_bundle_opens_dialog() {
        let (mut p, id) = abc();
        let mut out = Vec::new();
        let changed = change_status(
            &mut p,
            &id,
            OpportunityStatus::Won,
            true,
            &mut Cursor::new(b"0\n\n".to_vec()),
            &mut out,
        )
        .unwrap();
        assert!(changed);
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("Which topics of"));
        assert_eq!(p.store().opportunities().len(), 2);
    }

    #[test]
    fn won_flag_on_single_topic_is_reported_as_ignored() {
        let (mut p, id) = pipeline_with(&[("Excel", 300.0)]);
        let (changed, text) = drive_move(
            &mut p,
            &id,
            OpportunityStatus::Won,
            SplitChoice::Won(vec![0, 2]),
            "",
        );
        assert!(changed);
        assert!(text.contains("--won/--cancel ignored"));
        assert_eq!(status_of(&p, &id), OpportunityStatus::Won);

        let (_, text) = drive_move(
            &mut p,
            &id,
            OpportunityStatus::ProposalSent,
            SplitChoice::Interactive,
            "",
        );
        assert!(!text.contains("ignored"));
    }
}
