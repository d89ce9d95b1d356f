use std::str::FromStr;

use envconfig::Envconfig;
use sqlx::postgres::PgConnectOptions;

#[derive(Envconfig, Debug, Clone)]
pub struct Config {
    #[envconfig(from = "DB_USER", default = "postgres")]
    pub db_user: String,

    #[envconfig(from = "DB_HOST", default = "localhost")]
    pub db_host: String,

    #[envconfig(from = "DB_NAME", default = "pharmora")]
    pub db_name: String,

    #[envconfig(from = "DB_PASSWORD", default = "")]
    pub db_password: String,

    #[envconfig(from = "DB_PORT", default = "5432")]
    pub db_port: u16,

    /// Takes precedence over the `DB_*` variables when set.
    #[envconfig(from = "DATABASE_URL")]
    pub database_url: Option<String>,

    #[envconfig(from = "DB_MAX_CONNECTIONS", default = "10")]
    pub db_max_connections: u32,

    #[envconfig(from = "PORT", default = "5000")]
    pub port: u16,

    #[envconfig(from = "IMAGES_DIR", default = "public/images")]
    pub images_dir: String,

    #[envconfig(
        from = "CORS_ORIGINS",
        default = "http://localhost:3000,http://127.0.0.1:3000,http://localhost:5173,http://127.0.0.1:5173"
    )]
    pub cors_origins: String,

    /// Six-field cron expression for the stock alert job.
    #[envconfig(from = "STOCK_ALERT_SCHEDULE", default = "0 0 8 * * *")]
    pub stock_alert_schedule: String,
}

impl Config {
    pub fn connect_options(&self) -> Result<PgConnectOptions, sqlx::Error> {
        match &self.database_url {
            Some(url) => PgConnectOptions::from_str(url),
            None => Ok(PgConnectOptions::new()
                .host(&self.db_host)
                .port(self.db_port)
                .username(&self.db_user)
                .password(&self.db_password)
                .database(&self.db_name)),
        }
    }

    pub fn cors_origin_list(&self) -> Vec<String> {
        self.cors_origins
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(str::to_string)
            .collect()
    }
}
