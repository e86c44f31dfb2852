use thiserror::Error;

use crate::constants::{
    king_y, princess_y, ARENA_CENTER_X, BRIDGE_Y, KING_TOWER, LANE_LEFT_X, LANE_RIGHT_X,
    PRINCESS_TOWER, SERVER_OWNER,
};
use crate::types::Team;

use super::{BattleEngine, Entity};

/// Why a spawn request was dropped. Never sent to the client.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum SpawnRejection {
    #[error("match is already over")]
    MatchFinished,
    #[error("actor has no economy state")]
    UnknownActor,
    #[error("target is on the forbidden half")]
    ForbiddenZone,
    #[error("unit key is not in the catalog")]
    UnknownUnit,
    #[error("not enough elixir")]
    NotEnoughElixir,
    #[error("card is not in hand")]
    NotInHand,
}

/// A side may only deploy on its own half; the bridge row counts for both.
pub fn is_forbidden_zone(team: Team, y: f64) -> bool {
    match team {
        Team::Bottom => y < BRIDGE_Y,
        Team::Top => y > BRIDGE_Y,
    }
}

impl BattleEngine {
    pub fn spawn(&mut self, actor_id: &str, key: &str, x: f64, y: f64) -> Result<(), SpawnRejection> {
        if self.outcome.is_some() {
            return Err(SpawnRejection::MatchFinished);
        }
        let team = self
            .actors
            .get(actor_id)
            .map(|actor| actor.team)
            .ok_or(SpawnRejection::UnknownActor)?;
        if is_forbidden_zone(team, y) {
            return Err(SpawnRejection::ForbiddenZone);
        }
        let stats = self
            .catalog
            .get(key)
            .cloned()
            .ok_or(SpawnRejection::UnknownUnit)?;

        let Some(actor) = self.actors.get_mut(actor_id) else {
            return Err(SpawnRejection::UnknownActor);
        };
        let cost = f64::from(stats.cost);
        if actor.economy.elixir() < cost {
            return Err(SpawnRejection::NotEnoughElixir);
        }
        let slot = actor
            .economy
            .hand_slot(key)
            .ok_or(SpawnRejection::NotInHand)?;
        actor.economy.play(slot, cost);

        let id = self.make_id("unit");
        self.entities
            .push(Entity::new(id, actor_id.to_string(), team, x, y, stats));
        Ok(())
    }

    pub(super) fn spawn_towers(&mut self) {
        for team in [Team::Bottom, Team::Top] {
            self.spawn_building(KING_TOWER, team, ARENA_CENTER_X, king_y(team));
            self.spawn_building(PRINCESS_TOWER, team, LANE_LEFT_X, princess_y(team));
            self.spawn_building(PRINCESS_TOWER, team, LANE_RIGHT_X, princess_y(team));
        }
    }

    fn spawn_building(&mut self, key: &str, team: Team, x: f64, y: f64) {
        let Some(stats) = self.catalog.get(key).cloned() else {
            tracing::warn!(key, "building missing from catalog");
            return;
        };
        let id = self.make_id("tower");
        self.entities
            .push(Entity::new(id, SERVER_OWNER.to_string(), team, x, y, stats));
    }
}
