// board.rs - Kanban projection of the opportunity list.
//
// The board is a pure function of the opportunity list: one column per
// declared status, each holding the matching opportunities in source order.
// Empty columns are kept so the renderer can show an explicit empty state.

use crate::opportunity::{Opportunity, OpportunityStatus};

/// Standard board layout: the four in-progress stages, then WON, then LOST.
pub const BOARD_COLUMNS: [OpportunityStatus; 6] = [
    OpportunityStatus::ProposalSent,
    OpportunityStatus::ProposalDiscussed,
    OpportunityStatus::ProposalDetailed,
    OpportunityStatus::CloseToClosing,
    OpportunityStatus::Won,
    OpportunityStatus::Lost,
];

/// One board column.
#[derive(Debug, Clone, PartialEq)]
pub struct BoardColumn<'a> {
    pub status: OpportunityStatus,
    pub cards: Vec<&'a Opportunity>,
}

impl BoardColumn<'_> {
    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }
}

/// Columns in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct Board<'a> {
    columns: Vec<BoardColumn<'a>>,
}

impl<'a> Board<'a> {
    /// Project onto [`BOARD_COLUMNS`].
    pub fn standard(opportunities: &'a [Opportunity]) -> Self {
        project(opportunities, &BOARD_COLUMNS)
    }

    pub fn columns(&self) -> &[BoardColumn<'a>] {
        &self.columns
    }

    /// Cards in the column for `status`. Undeclared statuses yield an empty slice.
    pub fn column(&self, status: OpportunityStatus) -> &[&'a Opportunity] {
        self.columns
            .iter()
            .find(|c| c.status == status)
            .map(|c| c.cards.as_slice())
            .unwrap_or(&[])
    }

    /// Total number of cards on the board.
    pub fn card_count(&self) -> usize {
        self.columns.iter().map(BoardColumn::len).sum()
    }
}

/// Group `opportunities` by status into `columns`, preserving source order.
pub fn project<'a>(opportunities: &'a [Opportunity], columns: &[OpportunityStatus]) -> Board<'a> {
    let columns = columns
        .iter()
        .map(|&status| BoardColumn {
            status,
            cards: opportunities.iter().filter(|o| o.status == status).collect(),
        })
        .collect();
    Board { columns }
}
