use std::collections::BTreeMap;

use crate::constants::{
    elixir_rate, DURATION_NORMAL_SECS, ELIXIR_CAP, KING_TOWER, PRINCESS_TOWER,
    SUDDEN_DEATH_AT_SECS, SUDDEN_DEATH_DRAIN_PER_SEC,
};
use crate::rng::Rng;
use crate::types::{
    ActorId, EntityView, HandView, MatchOutcome, Phase, StateMessage, Team, UnitStats,
};
use crate::units::{is_tower, UnitCatalog};

mod combat;
mod economy;
mod spawn_system;

pub use self::economy::Economy;
pub use self::spawn_system::{is_forbidden_zone, SpawnRejection};

#[derive(Clone, Debug)]
pub struct Entity {
    pub id: String,
    pub key: String,
    pub owner: ActorId,
    pub team: Team,
    pub x: f64,
    pub y: f64,
    pub hp: f64,
    pub max_hp: f64,
    pub stats: UnitStats,
    /// Match clock second of the last strike.
    pub last_attack_at: Option<f64>,
    pub stunned_until: f64,
}

impl Entity {
    pub fn new(id: String, owner: ActorId, team: Team, x: f64, y: f64, stats: UnitStats) -> Self {
        Self {
            id,
            key: stats.key.clone(),
            owner,
            team,
            x,
            y,
            hp: stats.hp,
            max_hp: stats.hp,
            stats,
            last_attack_at: None,
            stunned_until: 0.0,
        }
    }

    pub fn is_building(&self) -> bool {
        is_tower(&self.key)
    }

    fn ready_to_attack(&self, now: f64) -> bool {
        self.last_attack_at
            .map_or(true, |at| now - at >= self.stats.hit_interval)
    }

    pub fn view(&self) -> EntityView {
        EntityView {
            id: self.id.clone(),
            key: self.key.clone(),
            owner: self.owner.clone(),
            team: self.team.index(),
            x: self.x,
            y: self.y,
            hp: self.hp,
            max_hp: self.max_hp,
        }
    }
}

#[derive(Clone, Debug)]
struct ActorState {
    team: Team,
    economy: Economy,
}

#[derive(Clone, Debug)]
pub struct EngineOptions {
    pub starting_elixir: f64,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            starting_elixir: ELIXIR_CAP,
        }
    }
}

/// The shared part of a state broadcast, built once per tick.
#[derive(Clone, Debug)]
pub struct Frame {
    pub entities: Vec<EntityView>,
    pub time: f64,
    pub game_over: bool,
    pub winner: i32,
    pub overtime: bool,
    pub tiebreaker: bool,
}

impl Frame {
    pub fn personalize(&self, me: Option<HandView>, team: Team) -> StateMessage<'_> {
        StateMessage {
            message_type: "state",
            entities: &self.entities,
            time: self.time,
            game_over: self.game_over,
            winner: self.winner,
            overtime: self.overtime,
            tiebreaker: self.tiebreaker,
            me,
            my_team: team.index(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct BattleEngine {
    catalog: UnitCatalog,
    options: EngineOptions,
    rng: Rng,
    entities: Vec<Entity>,
    actors: BTreeMap<ActorId, ActorState>,
    elapsed_secs: f64,
    clock_phase: Phase,
    outcome: Option<MatchOutcome>,
    outcome_dispatched: bool,
    next_id_counter: u64,
}

impl BattleEngine {
    pub fn new(catalog: UnitCatalog, options: EngineOptions, seed: u32) -> Self {
        let mut engine = Self {
            catalog,
            options,
            rng: Rng::new(seed),
            entities: Vec::new(),
            actors: BTreeMap::new(),
            elapsed_secs: 0.0,
            clock_phase: Phase::Normal,
            outcome: None,
            outcome_dispatched: false,
            next_id_counter: 1,
        };
        engine.spawn_towers();
        engine
    }

    pub fn catalog(&self) -> &UnitCatalog {
        &self.catalog
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.elapsed_secs
    }

    pub fn phase(&self) -> Phase {
        if self.outcome.is_some() {
            return Phase::Finished;
        }
        self.clock_phase
    }

    pub fn is_finished(&self) -> bool {
        self.outcome.is_some()
    }

    pub fn winner(&self) -> Option<Team> {
        self.outcome.map(|outcome| outcome.winner)
    }

    pub fn team_of(&self, actor_id: &str) -> Option<Team> {
        self.actors.get(actor_id).map(|actor| actor.team)
    }

    pub fn economy(&self, actor_id: &str) -> Option<&Economy> {
        self.actors.get(actor_id).map(|actor| &actor.economy)
    }

    /// Deals a fresh economy to an unseen actor. Known actors keep theirs.
    pub fn register_actor(&mut self, actor_id: &str, team: Team) -> Team {
        if let Some(actor) = self.actors.get(actor_id) {
            return actor.team;
        }
        let economy = Economy::deal(&mut self.rng, self.options.starting_elixir);
        self.actors
            .insert(actor_id.to_string(), ActorState { team, economy });
        team
    }

    pub fn forget_actor(&mut self, actor_id: &str) {
        self.actors.remove(actor_id);
    }

    pub fn step(&mut self, dt: f64) {
        if self.outcome.is_some() {
            return;
        }
        self.elapsed_secs += dt;
        self.advance_clock_phase();

        if self.clock_phase == Phase::SuddenDeath {
            self.drain_buildings(dt);
            return;
        }

        self.regenerate_elixir(dt);
        let princesses = self.remove_dead();
        if self.outcome.is_some() {
            return;
        }
        self.update_entities(dt, princesses);
    }

    /// Back to a fresh match: no units, six towers, new hands for everyone
    /// still connected. The tick loop keeps running.
    pub fn reset(&mut self) {
        self.entities.clear();
        self.elapsed_secs = 0.0;
        self.clock_phase = Phase::Normal;
        self.outcome = None;
        self.outcome_dispatched = false;
        for actor in self.actors.values_mut() {
            actor.economy = Economy::deal(&mut self.rng, self.options.starting_elixir);
        }
        self.spawn_towers();
        tracing::info!(actors = self.actors.len(), "match reset");
    }

    /// Hands out the result of a finished match exactly once.
    pub fn take_outcome(&mut self) -> Option<MatchOutcome> {
        if self.outcome_dispatched {
            return None;
        }
        let outcome = self.outcome?;
        self.outcome_dispatched = true;
        Some(outcome)
    }

    pub fn frame(&self) -> Frame {
        Frame {
            entities: self.entities.iter().map(Entity::view).collect(),
            time: self.elapsed_secs,
            game_over: self.outcome.is_some(),
            winner: self
                .outcome
                .map_or(-1, |outcome| i32::from(outcome.winner.index())),
            overtime: self.clock_phase >= Phase::Overtime,
            tiebreaker: self.clock_phase == Phase::SuddenDeath,
        }
    }

    pub fn hand_view(&self, actor_id: &str) -> Option<HandView> {
        self.actors.get(actor_id).map(|actor| actor.economy.view())
    }

    #[cfg(test)]
    pub(crate) fn damage_building(&mut self, key: &str, team: Team, amount: f64) {
        if let Some(entity) = self
            .entities
            .iter_mut()
            .find(|entity| entity.key == key && entity.team == team)
        {
            entity.hp -= amount;
        }
    }

    fn advance_clock_phase(&mut self) {
        if self.clock_phase == Phase::Normal && self.elapsed_secs >= DURATION_NORMAL_SECS {
            self.clock_phase = Phase::Overtime;
            tracing::info!(elapsed = self.elapsed_secs, "overtime");
        }
        if self.clock_phase == Phase::Overtime && self.elapsed_secs >= SUDDEN_DEATH_AT_SECS {
            self.clock_phase = Phase::SuddenDeath;
            tracing::info!(elapsed = self.elapsed_secs, "sudden death");
        }
    }

    fn drain_buildings(&mut self, dt: f64) {
        let drain = SUDDEN_DEATH_DRAIN_PER_SEC * dt;
        let mut fallen = None;
        for entity in self.entities.iter_mut().filter(|entity| entity.is_building()) {
            entity.hp -= drain;
            if entity.hp <= 0.0 {
                entity.hp = 0.0;
                fallen.get_or_insert(entity.team);
            }
        }
        if let Some(loser) = fallen {
            self.finish_game(loser.opponent());
        }
    }

    fn regenerate_elixir(&mut self, dt: f64) {
        let amount = elixir_rate(self.elapsed_secs) * dt;
        for actor in self.actors.values_mut() {
            actor.economy.regenerate(amount);
        }
    }

    /// Drops dead entities and returns surviving princess towers per side.
    /// A fallen king always decides the match; a fallen princess only once
    /// overtime has started.
    fn remove_dead(&mut self) -> [usize; 2] {
        let princess_lethal = self.clock_phase >= Phase::Overtime;
        let mut princesses = [0usize; 2];
        let mut loser = None;
        self.entities.retain(|entity| {
            if entity.hp > 0.0 {
                if entity.key == PRINCESS_TOWER {
                    princesses[usize::from(entity.team.index())] += 1;
                }
                return true;
            }
            let lethal =
                entity.key == KING_TOWER || (princess_lethal && entity.key == PRINCESS_TOWER);
            if lethal && loser.is_none() {
                loser = Some(entity.team);
            }
            false
        });
        if let Some(loser) = loser {
            self.finish_game(loser.opponent());
        }
        princesses
    }

    fn is_dormant_king(entity: &Entity, princesses: [usize; 2]) -> bool {
        entity.key == KING_TOWER
            && entity.hp >= entity.max_hp
            && princesses[usize::from(entity.team.index())] >= 2
    }

    fn update_entities(&mut self, dt: f64, princesses: [usize; 2]) {
        let now = self.elapsed_secs;
        for idx in 0..self.entities.len() {
            {
                let entity = &self.entities[idx];
                if entity.stunned_until > now || Self::is_dormant_king(entity, princesses) {
                    continue;
                }
                if entity.stats.speed <= 0.0 && !entity.is_building() {
                    continue;
                }
            }

            let mobile = self.entities[idx].stats.speed > 0.0;
            match combat::find_target(&self.entities, idx) {
                Some(target_idx) => {
                    if combat::in_attack_range(&self.entities[idx], &self.entities[target_idx]) {
                        if self.entities[idx].ready_to_attack(now) {
                            let damage = self.entities[idx].stats.damage;
                            self.entities[target_idx].hp -= damage;
                            self.entities[idx].last_attack_at = Some(now);
                        }
                    } else if mobile {
                        let (tx, ty) = (self.entities[target_idx].x, self.entities[target_idx].y);
                        combat::move_towards(&mut self.entities[idx], tx, ty, dt);
                    }
                }
                None if mobile => combat::move_down_lane(&mut self.entities[idx], dt),
                None => {}
            }
        }
    }

    fn finish_game(&mut self, winner: Team) {
        if self.outcome.is_some() {
            return;
        }
        self.outcome = Some(MatchOutcome {
            winner,
            elapsed_secs: self.elapsed_secs,
        });
        tracing::info!(
            winner = winner.index(),
            elapsed = self.elapsed_secs,
            "match finished"
        );
    }

    fn make_id(&mut self, prefix: &str) -> String {
        let id = format!("{}_{}", prefix, self.next_id_counter);
        self.next_id_counter = self.next_id_counter.saturating_add(1);
        id
    }
}
