use std::path::PathBuf;

use clap::Parser;
use thiserror::Error;

use crate::constants::ELIXIR_CAP;
use crate::engine::EngineOptions;

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_QUEUE_CAPACITY: usize = 256;
const STATIC_DIR_CANDIDATES: [&str; 2] = ["web/static", "static"];

#[derive(Debug, Clone, Default, Parser)]
#[command(name = "server", about = "Authoritative real-time lane battle server")]
pub struct ServerArgs {
    /// Port to listen on (falls back to $PORT, then 8080)
    #[arg(long)]
    pub port: Option<u16>,
    /// Unit catalog JSON (falls back to $UNITS_PATH)
    #[arg(long)]
    pub units: Option<PathBuf>,
    /// Profile store JSON (falls back to $PROFILE_DB_PATH)
    #[arg(long)]
    pub profiles: Option<PathBuf>,
    /// Directory with the browser client (falls back to $STATIC_DIR)
    #[arg(long)]
    pub static_dir: Option<PathBuf>,
    /// Elixir every newly dealt hand starts with
    #[arg(long)]
    pub starting_elixir: Option<f64>,
    /// Per-connection outbound queue length
    #[arg(long)]
    pub queue_capacity: Option<usize>,
    /// Fixed simulation seed; random when omitted
    #[arg(long)]
    pub seed: Option<u32>,
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("port cannot be 0")]
    ZeroPort,
    #[error("queue capacity must be at least 1")]
    ZeroQueue,
    #[error("starting elixir must be within 0..={max}, got {value}")]
    StartingElixir { value: f64, max: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub port: u16,
    pub units_path: PathBuf,
    pub profiles_path: PathBuf,
    pub static_dir: Option<PathBuf>,
    pub starting_elixir: f64,
    pub queue_capacity: usize,
    pub seed: Option<u32>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            units_path: PathBuf::from("data/units.json"),
            profiles_path: PathBuf::from(".data/profiles.json"),
            static_dir: None,
            starting_elixir: ELIXIR_CAP,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            seed: None,
        }
    }
}

impl ServerConfig {
    /// Command line first, then environment, then defaults.
    pub fn from_args(args: ServerArgs) -> Self {
        Self::resolve(args, |key| std::env::var(key).ok())
    }

    fn resolve<F>(args: ServerArgs, env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        match args.port {
            Some(port) => config.port = port,
            None => {
                if let Some(raw) = env("PORT") {
                    match raw.trim().parse::<u16>() {
                        Ok(port) => config.port = port,
                        Err(_) => tracing::warn!("Invalid PORT '{}', using default", raw),
                    }
                }
            }
        }

        if let Some(path) = args.units.or_else(|| env("UNITS_PATH").map(PathBuf::from)) {
            config.units_path = path;
        }
        if let Some(path) = args
            .profiles
            .or_else(|| env("PROFILE_DB_PATH").map(PathBuf::from))
        {
            config.profiles_path = path;
        }
        config.static_dir = args
            .static_dir
            .or_else(|| env("STATIC_DIR").map(PathBuf::from));

        if let Some(value) = args.starting_elixir {
            config.starting_elixir = value;
        }
        if let Some(value) = args.queue_capacity {
            config.queue_capacity = value;
        }
        config.seed = args.seed;
        config
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::ZeroPort);
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::ZeroQueue);
        }
        if !self.starting_elixir.is_finite()
            || !(0.0..=ELIXIR_CAP).contains(&self.starting_elixir)
        {
            return Err(ConfigError::StartingElixir {
                value: self.starting_elixir,
                max: ELIXIR_CAP,
            });
        }
        Ok(())
    }

    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            starting_elixir: self.starting_elixir,
        }
    }

    /// The configured directory if it holds an `index.html`, otherwise the
    /// first conventional location that does.
    pub fn resolve_static_dir(&self) -> Option<PathBuf> {
        if let Some(path) = &self.static_dir {
            if path.join("index.html").is_file() {
                return Some(path.clone());
            }
            tracing::warn!(path = %path.display(), "static dir has no index.html");
        }
        STATIC_DIR_CANDIDATES
            .into_iter()
            .map(PathBuf::from)
            .find(|path| path.join("index.html").is_file())
    }
}
