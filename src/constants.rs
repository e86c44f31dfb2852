use std::time::Duration;

use crate::types::Team;

pub const TICK_RATE: u32 = 30;
/// Wall-clock spacing of ticks. Matches `TICK_DT` to the nanosecond so the
/// match clock keeps pace with real time.
pub const TICK_INTERVAL: Duration = Duration::from_nanos(1_000_000_000 / TICK_RATE as u64);
pub const TICK_DT: f64 = 1.0 / TICK_RATE as f64;

pub const ARENA_WIDTH: f64 = 18.0;
pub const ARENA_HEIGHT: f64 = 32.0;
pub const ARENA_CENTER_X: f64 = ARENA_WIDTH / 2.0;
pub const LANE_LEFT_X: f64 = 3.5;
pub const LANE_RIGHT_X: f64 = 14.5;
pub const BRIDGE_Y: f64 = 16.0;
pub const BRIDGE_APPROACH: f64 = 1.0;

pub const DURATION_NORMAL_SECS: f64 = 120.0;
pub const DURATION_OVERTIME_SECS: f64 = 90.0;
pub const SUDDEN_DEATH_AT_SECS: f64 = DURATION_NORMAL_SECS + DURATION_OVERTIME_SECS;
pub const SUDDEN_DEATH_DRAIN_PER_SEC: f64 = 50.0;

pub const ELIXIR_CAP: f64 = 10.0;
pub const ELIXIR_PER_SEC: f64 = 1.0 / 2.8;
pub const DOUBLE_ELIXIR_AFTER_SECS: f64 = 120.0;
pub const HAND_SIZE: usize = 4;

pub const UNIT_SIGHT_RANGE: f64 = 6.5;
/// Added to a unit's static range when deciding whether it can strike.
/// Tunable; nothing else depends on the exact value.
pub const ATTACK_RANGE_TOLERANCE: f64 = 0.5;
pub const ARRIVAL_EPSILON: f64 = 0.1;

pub const KING_TOWER: &str = "king_tower";
pub const PRINCESS_TOWER: &str = "princess_tower";
pub const SERVER_OWNER: &str = "server";
pub const STARTING_BUILDINGS: usize = 6;

pub const STARTER_DECK: [&str; 8] = [
    "morphilina",
    "dangerlyoha",
    "yuuechka",
    "morphe",
    "classic_morphe",
    "classic_yuu",
    "sasavot",
    "murzik",
];

pub const WIN_TROPHIES: i64 = 30;
pub const WIN_COINS: i64 = 50;
pub const WIN_EXPERIENCE: i64 = 150;
pub const LOSS_TROPHIES: i64 = -15;
pub const LOSS_COINS: i64 = 10;
pub const LOSS_EXPERIENCE: i64 = 25;
pub const FIRST_WIN_ACHIEVEMENT: &str = "first_win";
pub const GUEST_USER_ID: &str = "guest";

/// Y coordinate of the given side's king tower.
pub fn king_y(team: Team) -> f64 {
    match team {
        Team::Bottom => 29.0,
        Team::Top => 3.0,
    }
}

/// Y coordinate of the given side's princess towers.
pub fn princess_y(team: Team) -> f64 {
    match team {
        Team::Bottom => 26.0,
        Team::Top => 6.0,
    }
}

pub fn elixir_rate(elapsed_secs: f64) -> f64 {
    if elapsed_secs > DOUBLE_ELIXIR_AFTER_SECS {
        return ELIXIR_PER_SEC * 2.0;
    }
    ELIXIR_PER_SEC
}
