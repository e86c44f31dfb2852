use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::constants::{KING_TOWER, PRINCESS_TOWER};
use crate::types::{TargetClass, UnitStats};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    units: HashMap<String, UnitStats>,
}

/// Static unit table. Immutable once the server starts.
#[derive(Clone, Debug)]
pub struct UnitCatalog {
    units: HashMap<String, UnitStats>,
}

impl Default for UnitCatalog {
    fn default() -> Self {
        Self::towers_only()
    }
}

impl UnitCatalog {
    /// Only the two building tiers; what the server runs with when the
    /// unit file is missing.
    pub fn towers_only() -> Self {
        let mut units = HashMap::new();
        for tower in tower_stats() {
            units.insert(tower.key.clone(), tower);
        }
        Self { units }
    }

    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        let parsed: CatalogFile = serde_json::from_str(text)?;
        let mut catalog = Self::towers_only();
        for (key, mut stats) in parsed.units {
            if is_tower(&key) {
                continue;
            }
            stats.key = key.clone();
            catalog.units.insert(key, stats);
        }
        Ok(catalog)
    }

    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let text = fs::read_to_string(path).map_err(|source| CatalogError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text).map_err(|source| CatalogError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Loads the unit file, degrading to towers only on failure.
    pub fn load_or_towers_only(path: &Path) -> Self {
        match Self::load(path) {
            Ok(catalog) => {
                tracing::info!(
                    units = catalog.spawnable_keys().len(),
                    path = %path.display(),
                    "unit catalog loaded"
                );
                catalog
            }
            Err(error) => {
                tracing::warn!(%error, "could not load unit catalog; only towers are available");
                Self::towers_only()
            }
        }
    }

    pub fn insert(&mut self, stats: UnitStats) {
        self.units.insert(stats.key.clone(), stats);
    }

    pub fn get(&self, key: &str) -> Option<&UnitStats> {
        self.units.get(key)
    }

    pub fn spawnable_keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self
            .units
            .keys()
            .map(String::as_str)
            .filter(|key| !is_tower(key))
            .collect();
        keys.sort_unstable();
        keys
    }
}

pub fn is_tower(key: &str) -> bool {
    key == KING_TOWER || key == PRINCESS_TOWER
}

fn tower_stats() -> [UnitStats; 2] {
    [
        UnitStats {
            key: KING_TOWER.to_string(),
            name: "King Tower".to_string(),
            cost: 0,
            hp: 4000.0,
            damage: 100.0,
            hit_interval: 1.0,
            speed: 0.0,
            range: 7.0,
            target: TargetClass::All,
            flying: false,
        },
        UnitStats {
            key: PRINCESS_TOWER.to_string(),
            name: "Princess Tower".to_string(),
            cost: 0,
            hp: 2500.0,
            damage: 80.0,
            hit_interval: 0.8,
            speed: 0.0,
            range: 7.5,
            target: TargetClass::All,
            flying: false,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_units_and_keeps_synthesized_towers() {
        let catalog = UnitCatalog::from_json(
            r#"{"units":{
                "murzik":{"name":"Murzik","elixir":3,"hp":600,"damage":90,"hit_speed":1.1,"speed":1.5,"range":1,"target_type":"ground"},
                "king_tower":{"elixir":0,"hp":1}
            }}"#,
        )
        .expect("catalog should parse");

        let murzik = catalog.get("murzik").expect("murzik exists");
        assert_eq!(murzik.key, "murzik");
        assert_eq!(murzik.cost, 3);
        assert_eq!(murzik.target, TargetClass::Ground);
        assert!(!murzik.flying);

        let king = catalog.get(KING_TOWER).expect("king exists");
        assert_eq!(king.hp, 4000.0);
        assert_eq!(catalog.spawnable_keys(), vec!["murzik"]);
    }

    #[test]
    fn missing_file_degrades_to_towers() {
        let path = std::env::temp_dir().join("tower-clash-missing-units.json");
        assert!(matches!(
            UnitCatalog::load(&path),
            Err(CatalogError::Read { .. })
        ));
        let catalog = UnitCatalog::load_or_towers_only(&path);
        assert!(catalog.get(KING_TOWER).is_some());
        assert!(catalog.get(PRINCESS_TOWER).is_some());
        assert!(catalog.spawnable_keys().is_empty());
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        assert!(UnitCatalog::from_json("{not json").is_err());
    }
}
