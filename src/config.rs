use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    #[serde(default)]
    pub wallet: WalletConfig,
    #[serde(default)]
    pub events: EventsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub access_token_expires_in: i64, // seconds
}

/// Top-up bounds are policy, the ledger itself only knows "amount > 0"
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletConfig {
    pub currency: String,
    /// cents
    pub topup_min: i64,
    /// cents
    pub topup_max: i64,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            currency: "USD".to_string(),
            topup_min: 1_000,
            topup_max: 1_000_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsConfig {
    /// How early before `starts_at` the check-in desk opens
    pub checkin_lead_minutes: i64,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            checkin_lead_minutes: 60,
        }
    }
}

impl Config {
    pub fn from_toml() -> Result<Self, Box<dyn std::error::Error>> {
        let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
        use std::io::ErrorKind;

        let config_result = std::fs::read_to_string(&config_path);

        let mut config: Config = match config_result {
            Ok(config_str) => {
                toml::from_str(&config_str).map_err(|e| format!("Failed to parse config: {e}"))?
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                // no file: environment and defaults only
                fn get_env(name: &str) -> Option<String> {
                    env::var(name).ok()
                }
                fn get_env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
                    env::var(name)
                        .ok()
                        .and_then(|v| v.parse::<T>().ok())
                        .unwrap_or(default)
                }

                let database_url = get_env("DATABASE_URL")
                    .ok_or("DATABASE_URL is not set and no config.toml was found")?;
                let wallet = WalletConfig::default();

                Config {
                    server: ServerConfig {
                        host: get_env("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                        port: get_env_parse("SERVER_PORT", 8080u16),
                    },
                    database: DatabaseConfig {
                        url: database_url,
                        max_connections: get_env_parse("DB_MAX_CONNECTIONS", 10u32),
                    },
                    jwt: JwtConfig {
                        secret: get_env("JWT_SECRET")
                            .unwrap_or_else(|| "change-me-in-production".to_string()),
                        access_token_expires_in: get_env_parse("JWT_ACCESS_EXPIRES_IN", 7200i64),
                    },
                    wallet: WalletConfig {
                        currency: get_env("WALLET_CURRENCY").unwrap_or(wallet.currency),
                        topup_min: get_env_parse("WALLET_TOPUP_MIN", wallet.topup_min),
                        topup_max: get_env_parse("WALLET_TOPUP_MAX", wallet.topup_max),
                    },
                    events: EventsConfig {
                        checkin_lead_minutes: get_env_parse(
                            "EVENTS_CHECKIN_LEAD_MINUTES",
                            EventsConfig::default().checkin_lead_minutes,
                        ),
                    },
                }
            }
            Err(e) => {
                return Err(format!("Cannot read config file {config_path}: {e}").into());
            }
        };

        // environment wins even when the file exists
        if let Ok(v) = env::var("SERVER_HOST") {
            config.server.host = v;
        }
        if let Ok(v) = env::var("SERVER_PORT")
            && let Ok(p) = v.parse()
        {
            config.server.port = p;
        }
        if let Ok(v) = env::var("DATABASE_URL") {
            config.database.url = v;
        }
        if let Ok(v) = env::var("DB_MAX_CONNECTIONS")
            && let Ok(mc) = v.parse()
        {
            config.database.max_connections = mc;
        }
        if let Ok(v) = env::var("JWT_SECRET") {
            config.jwt.secret = v;
        }
        if let Ok(v) = env::var("JWT_ACCESS_EXPIRES_IN")
            && let Ok(n) = v.parse()
        {
            config.jwt.access_token_expires_in = n;
        }
        if let Ok(v) = env::var("WALLET_CURRENCY") {
            config.wallet.currency = v;
        }
        if let Ok(v) = env::var("WALLET_TOPUP_MIN")
            && let Ok(n) = v.parse()
        {
            config.wallet.topup_min = n;
        }
        if let Ok(v) = env::var("WALLET_TOPUP_MAX")
            && let Ok(n) = v.parse()
        {
            config.wallet.topup_max = n;
        }
        if let Ok(v) = env::var("EVENTS_CHECKIN_LEAD_MINUTES")
            && let Ok(n) = v.parse()
        {
            config.events.checkin_lead_minutes = n;
        }

        if config.wallet.topup_min <= 0 || config.wallet.topup_min > config.wallet.topup_max {
            return Err("wallet.topup_min must be positive and not above topup_max".into());
        }

        Ok(config)
    }
}
