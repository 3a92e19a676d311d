//! Engine configuration, layered the way the teacher loads `Settings`: a
//! hardcoded YAML file read through the `config` crate into a `serde`
//! struct. All fields are required; an incomplete file fails fast at
//! startup rather than falling back to defaults.

use std::collections::BTreeMap;
use std::time::Duration;

use config::Config;
use config::ConfigError;
use config::FileFormat;
use secrecy::Secret;
use serde::Deserialize;
use serde::Serialize;

/// How a spreadsheet row is judged eligible for recipient sync — §6's fixed
/// enumeration of sending-criteria strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SendingCriteria {
    ColumnFilled,
    ColumnValueMatch,
    ColumnPatternMatch,
    StatusCheck,
    Custom,
}

/// Which spreadsheet column each recipient field is read from.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RecipientColumnMapping {
    pub domain: String,
    pub email_address: String,
    pub name: String,
    pub salutation: String,
    pub phone_number: String,
    pub initial_email_date: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseSettings {
    pub username: String,
    pub password: Secret<String>,
    pub port: u16,
    pub host: String,
    pub database_name: String,
}

impl DatabaseSettings {
    pub fn connection_string(&self) -> Secret<String> {
        use secrecy::ExposeSecret;
        Secret::new(format!(
            "postgres://{}:{}@{}:{}/{}",
            self.username,
            self.password.expose_secret(),
            self.host,
            self.port,
            self.database_name,
        ))
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GatewaySettings {
    pub sheets_base_url: String,
    pub sheets_access_token: Secret<String>,
    pub mail_base_url: String,
    pub mail_access_token: Secret<String>,
    pub timeout_milliseconds: u64,
}

impl GatewaySettings {
    pub fn timeout(&self) -> Duration { Duration::from_millis(self.timeout_milliseconds) }
}

/// Everything the engine needs to run one tick. Per-plan follow-up counts and
/// the follow-up interval list are kept separate: the former bounds how many
/// templates a plan is allowed, the latter is the default wait-day cadence
/// new plans are seeded with.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EngineSettings {
    pub spreadsheet_id: String,
    pub default_sender: String,
    pub save_as_draft: bool,
    pub plan_followup_counts: BTreeMap<String, u32>,
    pub recipient_columns: RecipientColumnMapping,
    pub sending_criteria: SendingCriteria,
    pub followup_interval_days: Vec<u32>,
    pub database: DatabaseSettings,
    pub gateway: GatewaySettings,
}

/// Load `configuration.yaml` from the current directory. All fields must be
/// present; no defaults are applied.
pub fn get_configuration() -> Result<EngineSettings, ConfigError> {
    let settings = Config::builder().add_source(config::File::new("configuration.yaml", FileFormat::Yaml)).build()?;
    settings.try_deserialize()
}

/// Re-serialize `settings` back to `configuration.yaml`. Used by the
/// `configure modify` subcommand after building a new `EngineSettings` value
/// via struct-update syntax from the loaded one — this function never
/// mutates fields in place, only writes a finished value.
pub fn persist_configuration(settings: &EngineSettings) -> Result<(), anyhow::Error> {
    let yaml = serde_yaml::to_string(settings)?;
    std::fs::write("configuration.yaml", yaml)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::SendingCriteria;

    #[test]
    fn sending_criteria_round_trips_through_json() {
        let value = serde_json::to_value(SendingCriteria::ColumnValueMatch).unwrap();
        assert_eq!(value, serde_json::json!("COLUMN_VALUE_MATCH"));
    }
}
