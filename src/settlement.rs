use std::sync::Arc;

use tokio::sync::mpsc;

use crate::constants::{
    FIRST_WIN_ACHIEVEMENT, GUEST_USER_ID, LOSS_COINS, LOSS_EXPERIENCE, LOSS_TROPHIES, WIN_COINS,
    WIN_EXPERIENCE, WIN_TROPHIES,
};
use crate::hub::Participant;
use crate::profile_store::ProfileStore;
use crate::types::Team;

const SETTLEMENT_QUEUE: usize = 64;

/// Everything needed to reward one finished match, captured at the instant
/// it finished.
#[derive(Clone, Debug, PartialEq)]
pub struct MatchSettlement {
    pub winner: Team,
    pub participants: Vec<Participant>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Grant {
    pub external_id: String,
    pub won: bool,
    pub trophies: i64,
    pub coins: i64,
    pub experience: i64,
}

fn is_guest(external_id: Option<&str>) -> bool {
    match external_id.map(str::trim) {
        None | Some("") => true,
        Some(id) => id == GUEST_USER_ID,
    }
}

impl MatchSettlement {
    /// Rewards for every identified participant. Guests earn nothing.
    pub fn grants(&self) -> Vec<Grant> {
        self.participants
            .iter()
            .filter(|member| !is_guest(member.external_id.as_deref()))
            .filter_map(|member| {
                let external_id = member.external_id.as_deref()?.trim().to_string();
                let won = member.team == self.winner;
                let (trophies, coins, experience) = if won {
                    (WIN_TROPHIES, WIN_COINS, WIN_EXPERIENCE)
                } else {
                    (LOSS_TROPHIES, LOSS_COINS, LOSS_EXPERIENCE)
                };
                Some(Grant {
                    external_id,
                    won,
                    trophies,
                    coins,
                    experience,
                })
            })
            .collect()
    }
}

/// Applies one settlement. Store failures are logged per grant and never
/// abort the remaining grants.
pub fn apply(store: &dyn ProfileStore, settlement: &MatchSettlement) {
    for grant in settlement.grants() {
        if grant.won {
            if let Err(error) = store.award_achievement(&grant.external_id, FIRST_WIN_ACHIEVEMENT) {
                tracing::error!(user = %grant.external_id, %error, "failed to award achievement");
            }
        }
        match store.apply_match_result(
            &grant.external_id,
            grant.trophies,
            grant.coins,
            grant.experience,
        ) {
            Ok(()) => tracing::info!(
                user = %grant.external_id,
                won = grant.won,
                trophies = grant.trophies,
                "match result applied"
            ),
            Err(error) => {
                tracing::error!(user = %grant.external_id, %error, "failed to apply match result");
            }
        }
    }
}

/// Starts the detached worker that feeds settlements into the store off the
/// tick path. The returned sender is the only way in.
pub fn spawn_settlement_worker(store: Arc<dyn ProfileStore>) -> mpsc::Sender<MatchSettlement> {
    let (tx, mut rx) = mpsc::channel::<MatchSettlement>(SETTLEMENT_QUEUE);
    tokio::spawn(async move {
        while let Some(settlement) = rx.recv().await {
            let store = Arc::clone(&store);
            let result =
                tokio::task::spawn_blocking(move || apply(store.as_ref(), &settlement)).await;
            if let Err(error) = result {
                tracing::error!(%error, "settlement task panicked");
            }
        }
        tracing::debug!("settlement worker stopped");
    });
    tx
}
