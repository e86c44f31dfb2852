use crate::constants::{
    king_y, ARENA_CENTER_X, ARRIVAL_EPSILON, ATTACK_RANGE_TOLERANCE, BRIDGE_APPROACH, BRIDGE_Y,
    LANE_LEFT_X, LANE_RIGHT_X, UNIT_SIGHT_RANGE,
};
use crate::types::Team;

use super::Entity;

pub(super) fn distance(a: &Entity, b: &Entity) -> f64 {
    (b.x - a.x).hypot(b.y - a.y)
}

/// Buildings see exactly as far as they shoot; mobile units see further.
pub(super) fn sight_range(entity: &Entity) -> f64 {
    if entity.is_building() {
        entity.stats.range
    } else {
        UNIT_SIGHT_RANGE
    }
}

pub(super) fn in_attack_range(attacker: &Entity, target: &Entity) -> bool {
    distance(attacker, target) <= attacker.stats.range + ATTACK_RANGE_TOLERANCE
}

/// Closest living enemy strictly inside sight range. Linear scan, first hit
/// wins ties.
pub(super) fn find_target(entities: &[Entity], seeker_idx: usize) -> Option<usize> {
    let seeker = &entities[seeker_idx];
    let sight = sight_range(seeker);
    let mut best: Option<(usize, f64)> = None;
    for (idx, other) in entities.iter().enumerate() {
        if other.team == seeker.team || other.hp <= 0.0 {
            continue;
        }
        if !seeker.stats.target.can_hit(other.stats.flying) {
            continue;
        }
        let dist = distance(seeker, other);
        if dist >= sight {
            continue;
        }
        if best.map_or(true, |(_, best_dist)| dist < best_dist) {
            best = Some((idx, dist));
        }
    }
    best.map(|(idx, _)| idx)
}

pub(super) fn move_towards(entity: &mut Entity, tx: f64, ty: f64, dt: f64) {
    let dx = tx - entity.x;
    let dy = ty - entity.y;
    let dist = dx.hypot(dy);
    if dist <= ARRIVAL_EPSILON {
        return;
    }
    let step = entity.stats.speed * dt;
    entity.x += dx / dist * step;
    entity.y += dy / dist * step;
}

pub(super) fn lane_x(x: f64) -> f64 {
    if x < ARENA_CENTER_X {
        LANE_LEFT_X
    } else {
        LANE_RIGHT_X
    }
}

fn on_own_half(team: Team, y: f64) -> bool {
    match team {
        Team::Bottom => y > BRIDGE_Y,
        Team::Top => y < BRIDGE_Y,
    }
}

/// Where an idle unit heads: the bridge on its nearest lane while still at
/// home, otherwise the enemy king's row on that lane.
pub(super) fn lane_waypoint(team: Team, x: f64, y: f64) -> (f64, f64) {
    let lane = lane_x(x);
    if on_own_half(team, y) && (y - BRIDGE_Y).abs() > BRIDGE_APPROACH {
        (lane, BRIDGE_Y)
    } else {
        (lane, king_y(team.opponent()))
    }
}

pub(super) fn move_down_lane(entity: &mut Entity, dt: f64) {
    let (tx, ty) = lane_waypoint(entity.team, entity.x, entity.y);
    move_towards(entity, tx, ty, dt);
}
