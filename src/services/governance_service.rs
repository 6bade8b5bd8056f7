//! Governance service - holder proposals and token-weighted votes

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::governance::{self, NewProposal, ProposalRow, ProposalView, VoteRow, VoteView};
use crate::db::models::{ProposalStatus, VoteChoice};
use crate::db::{holdings, posts, Database};
use crate::error::AppError;
use crate::ledger::{self, VoteTotals};

use super::events::{EventBus, LedgerEvent};

/// Tokens a holder needs before proposing
pub const MIN_PROPOSAL_TOKENS: i64 = 100;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProposalRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub proposal_type: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VoteRequest {
    pub vote: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GovernanceOverview {
    pub proposals: Vec<ProposalView>,
    pub user_voting_power: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteResults {
    pub votes: Vec<VoteView>,
    pub totals: VoteTotals,
    pub voter_count: usize,
}

pub struct GovernanceService {
    db: Arc<Database>,
    events: Arc<EventBus>,
}

impl GovernanceService {
    pub fn new(db: Arc<Database>, events: Arc<EventBus>) -> Self {
        Self { db, events }
    }

    /// Open proposals on a post and the caller's voting power
    pub fn overview(
        &self,
        user_id: &str,
        post_id: &str,
        now: DateTime<Utc>,
    ) -> Result<GovernanceOverview, AppError> {
        self.db.with_conn(|conn| {
            Ok(GovernanceOverview {
                proposals: governance::list_open(conn, post_id, now)?,
                user_voting_power: holdings::sum_for_owner(conn, post_id, user_id)?,
            })
        })
    }

    pub fn propose(
        &self,
        user_id: &str,
        post_id: &str,
        request: ProposalRequest,
        now: DateTime<Utc>,
    ) -> Result<ProposalView, AppError> {
        let required = |field: Option<String>| {
            field
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .ok_or_else(|| AppError::Validation("Title, description, and type are required".into()))
        };
        let title = required(request.title)?;
        let description = required(request.description)?;
        let proposal_type = required(request.proposal_type)?;

        let view = self.db.with_tx(|conn| {
            posts::get_post(conn, post_id)?.ok_or_else(|| AppError::not_found("Post"))?;

            let held = holdings::sum_for_owner(conn, post_id, user_id)?;
            if held < MIN_PROPOSAL_TOKENS {
                return Err(AppError::Forbidden(format!(
                    "You need at least {} tokens to create a proposal",
                    MIN_PROPOSAL_TOKENS
                )));
            }

            let proposal = governance::create_proposal(
                conn,
                &NewProposal {
                    post_id: post_id.to_string(),
                    proposer_id: user_id.to_string(),
                    title,
                    description,
                    proposal_type,
                },
                now,
            )?;
            proposal_view(conn, proposal)
        })?;

        self.events.emit(LedgerEvent::ProposalCreated {
            id: view.proposal.id.clone(),
            post_id: post_id.to_string(),
            proposer_id: user_id.to_string(),
        });

        Ok(view)
    }

    /// Cast or overwrite the caller's vote. The flag is true for a new ballot.
    pub fn vote(
        &self,
        user_id: &str,
        post_id: &str,
        proposal_id: &str,
        request: VoteRequest,
        now: DateTime<Utc>,
    ) -> Result<(VoteRow, bool), AppError> {
        let choice: VoteChoice = request
            .vote
            .as_deref()
            .and_then(|v| v.parse().ok())
            .ok_or_else(|| AppError::Validation(r#"Vote must be "yes", "no", or "abstain""#.into()))?;

        let (row, created) = self.db.with_tx(|conn| {
            let proposal = governance::get_proposal(conn, post_id, proposal_id)?
                .ok_or_else(|| AppError::not_found("Proposal"))?;

            if proposal.status != ProposalStatus::Active {
                return Err(AppError::Rule("Proposal is no longer active".into()));
            }
            if proposal.effective_status(now) != ProposalStatus::Active {
                return Err(AppError::Rule("Voting period has ended".into()));
            }

            let power = holdings::sum_for_owner(conn, &proposal.post_id, user_id)?;
            if power == 0 {
                return Err(AppError::Forbidden("You need tokens in this post to vote".into()));
            }

            governance::upsert_vote(conn, proposal_id, user_id, choice, power, now)
        })?;

        self.events.emit(LedgerEvent::VoteCast {
            proposal_id: proposal_id.to_string(),
            voter_id: user_id.to_string(),
            vote: choice,
            voting_power: row.voting_power,
            replaced: !created,
        });

        Ok((row, created))
    }

    /// Ballots and summed voting power for a proposal
    pub fn results(&self, post_id: &str, proposal_id: &str) -> Result<VoteResults, AppError> {
        self.db.with_conn(|conn| {
            governance::get_proposal(conn, post_id, proposal_id)?
                .ok_or_else(|| AppError::not_found("Proposal"))?;

            let votes = governance::list_votes(conn, proposal_id)?;
            let totals = ledger::tally(votes.iter().map(|v| (v.vote.vote, v.vote.voting_power)));
            Ok(VoteResults {
                voter_count: votes.len(),
                votes,
                totals,
            })
        })
    }
}

fn proposal_view(conn: &rusqlite::Connection, proposal: ProposalRow) -> Result<ProposalView, AppError> {
    let proposer = crate::db::users::get_user(conn, &proposal.proposer_id)?
        .ok_or_else(|| AppError::not_found("User"))?
        .summary();
    let votes = governance::list_votes(conn, &proposal.id)?;
    Ok(ProposalView {
        vote_count: votes.len(),
        proposal,
        proposer,
        votes,
    })
}
