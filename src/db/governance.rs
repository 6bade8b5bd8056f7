//! Governance proposal and vote operations

use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::Serialize;

use super::models::{ProposalStatus, VoteChoice};
use super::new_id;
use super::users::{UserSummary, SUMMARY_COLUMNS};
use crate::error::AppError;

/// Length of a proposal's voting period
pub const VOTING_PERIOD_DAYS: i64 = 7;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalRow {
    pub id: String,
    pub post_id: String,
    pub proposer_id: String,
    pub title: String,
    pub description: String,
    pub proposal_type: String,
    pub status: ProposalStatus,
    pub voting_ends_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl ProposalRow {
    fn from_row(row: &Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            post_id: row.get("post_id")?,
            proposer_id: row.get("proposer_id")?,
            title: row.get("title")?,
            description: row.get("description")?,
            proposal_type: row.get("proposal_type")?,
            status: row.get("status")?,
            voting_ends_at: row.get("voting_ends_at")?,
            created_at: row.get("created_at")?,
        })
    }

    /// Status as of `now`: an active proposal past its end reads as closed.
    /// Votes are still accepted at the end instant itself.
    pub fn effective_status(&self, now: DateTime<Utc>) -> ProposalStatus {
        match self.status {
            ProposalStatus::Active if now > self.voting_ends_at => ProposalStatus::Closed,
            status => status,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRow {
    pub id: String,
    pub proposal_id: String,
    pub voter_id: String,
    pub vote: VoteChoice,
    pub voting_power: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl VoteRow {
    fn from_row(row: &Row) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            proposal_id: row.get("proposal_id")?,
            voter_id: row.get("voter_id")?,
            vote: row.get("vote")?,
            voting_power: row.get("voting_power")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteView {
    #[serde(flatten)]
    pub vote: VoteRow,
    pub voter: UserSummary,
}

/// Proposal with its proposer and ballots
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalView {
    #[serde(flatten)]
    pub proposal: ProposalRow,
    pub proposer: UserSummary,
    pub votes: Vec<VoteView>,
    pub vote_count: usize,
}

/// Input for a new proposal
#[derive(Debug, Clone)]
pub struct NewProposal {
    pub post_id: String,
    pub proposer_id: String,
    pub title: String,
    pub description: String,
    pub proposal_type: String,
}

pub fn create_proposal(
    conn: &Connection,
    input: &NewProposal,
    now: DateTime<Utc>,
) -> Result<ProposalRow, AppError> {
    let id = new_id();
    conn.execute(
        "INSERT INTO governance_proposals
             (id, post_id, proposer_id, title, description, proposal_type, status, voting_ends_at, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            id,
            input.post_id,
            input.proposer_id,
            input.title,
            input.description,
            input.proposal_type,
            ProposalStatus::Active,
            now + Duration::days(VOTING_PERIOD_DAYS),
            now,
        ],
    )?;

    get_proposal(conn, &input.post_id, &id)?
        .ok_or_else(|| AppError::Internal("Proposal vanished after insert".into()))
}

/// Proposal by id, scoped to its post
pub fn get_proposal(conn: &Connection, post_id: &str, id: &str) -> Result<Option<ProposalRow>, AppError> {
    Ok(conn
        .query_row(
            "SELECT * FROM governance_proposals WHERE id = ?1 AND post_id = ?2",
            params![id, post_id],
            ProposalRow::from_row,
        )
        .optional()?)
}

/// Active proposals still open at `now`, newest first
pub fn list_open(
    conn: &Connection,
    post_id: &str,
    now: DateTime<Utc>,
) -> Result<Vec<ProposalView>, AppError> {
    let sql = format!(
        "SELECT p.*, {} FROM governance_proposals p
         JOIN users u ON u.id = p.proposer_id
         WHERE p.post_id = ?1 AND p.status = ?2 AND p.voting_ends_at >= ?3
         ORDER BY p.created_at DESC",
        SUMMARY_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![post_id, ProposalStatus::Active, now], |row| {
            Ok((ProposalRow::from_row(row)?, UserSummary::from_aliased(row)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(proposal, proposer)| {
            let votes = list_votes(conn, &proposal.id)?;
            Ok(ProposalView {
                vote_count: votes.len(),
                proposal,
                proposer,
                votes,
            })
        })
        .collect()
}

/// Ballots on a proposal, heaviest first
pub fn list_votes(conn: &Connection, proposal_id: &str) -> Result<Vec<VoteView>, AppError> {
    let sql = format!(
        "SELECT v.*, {} FROM governance_votes v
         JOIN users u ON u.id = v.voter_id
         WHERE v.proposal_id = ?1
         ORDER BY v.voting_power DESC, v.created_at ASC",
        SUMMARY_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![proposal_id], |row| {
            Ok(VoteView {
                vote: VoteRow::from_row(row)?,
                voter: UserSummary::from_aliased(row)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Record or overwrite a voter's ballot. Returns the row and whether it is new.
pub fn upsert_vote(
    conn: &Connection,
    proposal_id: &str,
    voter_id: &str,
    vote: VoteChoice,
    voting_power: i64,
    now: DateTime<Utc>,
) -> Result<(VoteRow, bool), AppError> {
    let existing: Option<String> = conn
        .query_row(
            "SELECT id FROM governance_votes WHERE proposal_id = ?1 AND voter_id = ?2",
            params![proposal_id, voter_id],
            |row| row.get(0),
        )
        .optional()?;

    let (id, created) = match existing {
        Some(id) => {
            conn.execute(
                "UPDATE governance_votes SET vote = ?1, voting_power = ?2, updated_at = ?3 WHERE id = ?4",
                params![vote, voting_power, now, id],
            )?;
            (id, false)
        }
        None => {
            let id = new_id();
            conn.execute(
                "INSERT INTO governance_votes
                     (id, proposal_id, voter_id, vote, voting_power, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
                params![id, proposal_id, voter_id, vote, voting_power, now],
            )?;
            (id, true)
        }
    };

    let row = conn.query_row(
        "SELECT * FROM governance_votes WHERE id = ?1",
        params![id],
        VoteRow::from_row,
    )?;
    Ok((row, created))
}

/// Persist closure of every active proposal whose voting period ended
pub fn close_expired(conn: &Connection, now: DateTime<Utc>) -> Result<usize, AppError> {
    Ok(conn.execute(
        "UPDATE governance_proposals SET status = ?1 WHERE status = ?2 AND voting_ends_at < ?3",
        params![ProposalStatus::Closed, ProposalStatus::Active, now],
    )?)
}
