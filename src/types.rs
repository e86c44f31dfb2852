use serde::{Deserialize, Serialize};

pub type ActorId = String;

/// Arena side. Bottom is side 0, top is side 1 on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Team {
    Bottom,
    Top,
}

impl Team {
    pub fn index(self) -> u8 {
        match self {
            Team::Bottom => 0,
            Team::Top => 1,
        }
    }

    pub fn opponent(self) -> Self {
        match self {
            Team::Bottom => Team::Top,
            Team::Top => Team::Bottom,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    Normal,
    Overtime,
    SuddenDeath,
    Finished,
}

/// What a unit is allowed to attack.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum TargetClass {
    Ground,
    Air,
    #[default]
    All,
}

impl From<String> for TargetClass {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "ground" => TargetClass::Ground,
            "air" | "flying" => TargetClass::Air,
            _ => TargetClass::All,
        }
    }
}

impl TargetClass {
    pub fn can_hit(self, flying: bool) -> bool {
        match self {
            TargetClass::Ground => !flying,
            TargetClass::Air => flying,
            TargetClass::All => true,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct UnitStats {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "elixir", default)]
    pub cost: u32,
    pub hp: f64,
    #[serde(default)]
    pub damage: f64,
    #[serde(rename = "hit_speed", default)]
    pub hit_interval: f64,
    #[serde(default)]
    pub speed: f64,
    #[serde(default)]
    pub range: f64,
    #[serde(rename = "target_type", default)]
    pub target: TargetClass,
    #[serde(default)]
    pub flying: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EntityView {
    pub id: String,
    pub key: String,
    pub owner: String,
    pub team: u8,
    pub x: f64,
    pub y: f64,
    pub hp: f64,
    pub max_hp: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct HandView {
    pub elixir: f64,
    pub hand: Vec<String>,
    pub next: String,
}

/// Per-recipient state broadcast. Borrows the shared entity list so one
/// tick's views are built once and only the private fields differ.
#[derive(Clone, Debug, Serialize)]
pub struct StateMessage<'a> {
    #[serde(rename = "type")]
    pub message_type: &'static str,
    pub entities: &'a [EntityView],
    pub time: f64,
    #[serde(rename = "gameOver")]
    pub game_over: bool,
    pub winner: i32,
    pub overtime: bool,
    pub tiebreaker: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub me: Option<HandView>,
    #[serde(rename = "myTeam")]
    pub my_team: u8,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MatchOutcome {
    pub winner: Team,
    pub elapsed_secs: f64,
}
