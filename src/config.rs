use std::{
    fmt,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::PathBuf,
};

use config::{Config as ConfigLoader, Environment};
use is_terminal::IsTerminal;
use once_cell::sync::Lazy;
use serde::Deserialize;

use crate::auth::{DEFAULT_TOKEN_SIZE, MIN_TOKEN_SIZE};

const PREFIX: &str = "ADIAUTH";

pub static CONFIG: Lazy<Config> = Lazy::new(init_config);

#[derive(Debug, Default)]
pub enum LogStyle {
    #[default]
    Auto,
    Always,
    Never,
}

impl LogStyle {
    pub fn is_color(&self) -> bool {
        match self {
            LogStyle::Auto => std::io::stdout().is_terminal(),
            LogStyle::Always => true,
            LogStyle::Never => false,
        }
    }
}

impl<'de> Deserialize<'de> for LogStyle {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?.to_lowercase();
        match s.as_str() {
            "auto" => Ok(LogStyle::Auto),
            "always" => Ok(LogStyle::Always),
            "never" => Ok(LogStyle::Never),
            _ => Err(serde::de::Error::unknown_variant(
                &s,
                &["auto", "always", "never"],
            )),
        }
    }
}

#[derive(Deserialize, Debug)]
#[serde(default)]
pub struct Log {
    pub level: String,
    pub style: LogStyle,
}

impl Default for Log {
    fn default() -> Self {
        Log {
            level: String::from("adiauth=info"),
            style: LogStyle::default(),
        }
    }
}

#[derive(Deserialize)]
#[serde(default)]
pub struct Auth {
    pub admin_token: String,
    pub token_bytes: usize,
}

impl Default for Auth {
    fn default() -> Self {
        Self {
            admin_token: String::new(),
            token_bytes: DEFAULT_TOKEN_SIZE,
        }
    }
}

impl Auth {
    pub fn validate(&self) -> Result<(), String> {
        if self.admin_token.trim().is_empty() {
            return Err("admin token must be set".into());
        }
        if self.token_bytes < MIN_TOKEN_SIZE {
            return Err(format!(
                "token size must be at least {MIN_TOKEN_SIZE} bytes"
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for Auth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Auth")
            .field("admin_token_set", &!self.admin_token.is_empty())
            .field("token_bytes", &self.token_bytes)
            .finish()
    }
}

#[derive(Deserialize, Debug)]
#[serde(default)]
pub struct Config {
    pub log: Log,
    pub addr: SocketAddr,
    pub db_file: PathBuf,
    pub debug: bool,
    pub auth: Auth,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            log: Log::default(),
            addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 3001),
            db_file: PathBuf::from("users.json"),
            debug: false,
            auth: Auth::default(),
        }
    }
}

pub fn init_config() -> Config {
    let config = ConfigLoader::builder()
        .add_source(
            Environment::with_prefix(PREFIX)
                .separator("__")
                .prefix_separator("_")
                .try_parsing(true),
        )
        .build()
        .and_then(|cfg| cfg.try_deserialize::<Config>());

    match config {
        Ok(config) => {
            if let Err(err) = config.auth.validate() {
                panic!("{}", err);
            }
            println!("{:#?}", config);
            config
        }
        Err(err) => {
            panic!("{:?}", err);
        }
    }
}
