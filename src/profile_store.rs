use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

const STORE_VERSION: u8 = 1;
const STARTING_LEVEL: u32 = 1;
const STARTING_MAX_EXP: i64 = 1000;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("profile id must not be empty")]
    EmptyId,
    #[error("profile store lock poisoned")]
    Poisoned,
    #[error("failed to encode profile store: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Persistent player records touched at match end. Implementations must
/// tolerate concurrent calls from several settlements at once.
pub trait ProfileStore: Send + Sync {
    fn award_achievement(&self, external_id: &str, achievement: &str) -> Result<(), StoreError>;

    fn apply_match_result(
        &self,
        external_id: &str,
        trophy_delta: i64,
        coin_delta: i64,
        experience_delta: i64,
    ) -> Result<(), StoreError>;
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub level: u32,
    pub exp: i64,
    pub max_exp: i64,
    pub coins: i64,
    pub trophies: i64,
    #[serde(default)]
    pub achievements: BTreeSet<String>,
    #[serde(rename = "updatedAt", alias = "updated_at", default)]
    pub updated_at: String,
}

impl Profile {
    fn fresh(id: &str) -> Self {
        Self {
            id: id.to_string(),
            level: STARTING_LEVEL,
            exp: 0,
            max_exp: STARTING_MAX_EXP,
            coins: 0,
            trophies: 0,
            achievements: BTreeSet::new(),
            updated_at: now_iso(),
        }
    }

    fn gain_experience(&mut self, delta: i64) {
        self.exp = (self.exp + delta).max(0);
        if self.max_exp <= 0 {
            self.max_exp = STARTING_MAX_EXP;
        }
        while self.exp >= self.max_exp {
            self.exp -= self.max_exp;
            self.level += 1;
        }
    }
}

#[derive(Serialize)]
struct StoreFile<'a> {
    version: u8,
    profiles: &'a BTreeMap<String, Profile>,
}

#[derive(Deserialize)]
struct StoreFileRaw {
    version: u8,
    #[serde(default)]
    profiles: BTreeMap<String, serde_json::Value>,
}

/// Whole-file JSON store. Every write rewrites the file while holding the
/// lock, so concurrent settlements serialize on it.
pub struct JsonProfileStore {
    file_path: PathBuf,
    profiles: Mutex<BTreeMap<String, Profile>>,
}

impl JsonProfileStore {
    pub fn open(file_path: PathBuf) -> Self {
        let profiles = load_profiles(&file_path);
        tracing::info!(path = %file_path.display(), profiles = profiles.len(), "profile store ready");
        Self {
            file_path,
            profiles: Mutex::new(profiles),
        }
    }

    pub fn get_profile(&self, external_id: &str) -> Option<Profile> {
        self.lock().ok()?.get(external_id.trim()).cloned()
    }

    fn lock(&self) -> Result<MutexGuard<'_, BTreeMap<String, Profile>>, StoreError> {
        self.profiles.lock().map_err(|_| StoreError::Poisoned)
    }

    fn update<F>(&self, external_id: &str, apply: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut Profile),
    {
        let key = external_id.trim();
        if key.is_empty() {
            return Err(StoreError::EmptyId);
        }
        let mut profiles = self.lock()?;
        let profile = profiles
            .entry(key.to_string())
            .or_insert_with(|| Profile::fresh(key));
        apply(profile);
        profile.updated_at = now_iso();
        self.save(&profiles)
    }

    fn save(&self, profiles: &BTreeMap<String, Profile>) -> Result<(), StoreError> {
        if let Some(parent) = self.file_path.parent() {
            fs::create_dir_all(parent).map_err(|source| StoreError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let text = serde_json::to_string_pretty(&StoreFile {
            version: STORE_VERSION,
            profiles,
        })?;
        fs::write(&self.file_path, text).map_err(|source| StoreError::Write {
            path: self.file_path.clone(),
            source,
        })
    }
}

impl ProfileStore for JsonProfileStore {
    fn award_achievement(&self, external_id: &str, achievement: &str) -> Result<(), StoreError> {
        self.update(external_id, |profile| {
            profile.achievements.insert(achievement.to_string());
        })
    }

    fn apply_match_result(
        &self,
        external_id: &str,
        trophy_delta: i64,
        coin_delta: i64,
        experience_delta: i64,
    ) -> Result<(), StoreError> {
        self.update(external_id, |profile| {
            profile.trophies = (profile.trophies + trophy_delta).max(0);
            profile.coins += coin_delta;
            profile.gain_experience(experience_delta);
        })
    }
}

fn load_profiles(path: &Path) -> BTreeMap<String, Profile> {
    let text = match fs::read_to_string(path) {
        Ok(value) => value,
        Err(error) => {
            if error.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %path.display(), %error, "failed to read profile store");
            }
            return BTreeMap::new();
        }
    };
    let parsed = match serde_json::from_str::<StoreFileRaw>(&text) {
        Ok(value) if value.version == STORE_VERSION => value,
        Ok(value) => {
            tracing::warn!(path = %path.display(), version = value.version, "unsupported profile store version");
            return BTreeMap::new();
        }
        Err(error) => {
            tracing::warn!(path = %path.display(), %error, "failed to parse profile store");
            return BTreeMap::new();
        }
    };

    let mut profiles = BTreeMap::new();
    for (key, raw) in parsed.profiles {
        match serde_json::from_value::<Profile>(raw) {
            Ok(mut profile) => {
                let key = key.trim().to_string();
                if key.is_empty() {
                    continue;
                }
                profile.id = key.clone();
                profile.trophies = profile.trophies.max(0);
                profiles.insert(key, profile);
            }
            Err(error) => {
                tracing::warn!(path = %path.display(), profile = %key, %error, "skipping malformed profile");
            }
        }
    }
    profiles
}

fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
