//! Composition root (C18). Replaces the teacher's `Application`/`startup.rs`
//! pair: instead of an HTTP server bound to a listener, `Engine::build`
//! wires a Postgres pool and the two gateway clients into the repository
//! ports the rest of the crate depends on, and the CLI calls straight into
//! its methods — there is no long-lived server loop to hand off to.

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::configuration::EngineSettings;
use crate::domain::EmailAddress;
use crate::gateway::mail::HttpMailGateway;
use crate::gateway::sheets::HttpSheetsGateway;
use crate::repository::postgres::PgContactRepository;
use crate::repository::postgres::PgEmailRepository;
use crate::repository::postgres::PgPlanRepository;
use crate::repository::postgres::PgRecipientRepository;
use crate::repository::postgres::PgTemplateRepository;

/// Bundles every collaborator a CLI subcommand needs.
pub struct Engine {
    pub settings: EngineSettings,
    pub sender: EmailAddress,
    pub emails: PgEmailRepository,
    pub recipients: PgRecipientRepository,
    pub contacts: PgContactRepository,
    pub templates: PgTemplateRepository,
    pub plans: PgPlanRepository,
    pub sheets: HttpSheetsGateway,
    pub mail: HttpMailGateway,
}

impl Engine {
    pub async fn build(settings: EngineSettings) -> Result<Self, anyhow::Error> {
        let pool = get_connection_pool(&settings.database);
        let sender = EmailAddress::parse(settings.default_sender.clone())
            .map_err(|e| anyhow::anyhow!("invalid default_sender in configuration: {e}"))?;

        let timeout = settings.gateway.timeout();
        let sheets = HttpSheetsGateway::new(
            settings.gateway.sheets_base_url.clone(),
            settings.gateway.sheets_access_token.clone(),
            timeout,
        );
        let mail = HttpMailGateway::new(
            settings.gateway.mail_base_url.clone(),
            settings.gateway.mail_access_token.clone(),
            timeout,
        );

        Ok(Self {
            settings,
            sender,
            emails: PgEmailRepository::new(pool.clone()),
            recipients: PgRecipientRepository::new(pool.clone()),
            contacts: PgContactRepository::new(pool.clone()),
            templates: PgTemplateRepository::new(pool.clone()),
            plans: PgPlanRepository::new(pool.clone()),
            sheets,
            mail,
        })
    }
}

/// `connect_lazy_with` defers the actual connection attempt until first use,
/// so a CLI invocation that never touches the database (e.g. `init`) doesn't
/// pay for a round trip it doesn't need.
pub fn get_connection_pool(db_cfg: &crate::configuration::DatabaseSettings) -> PgPool {
    use secrecy::ExposeSecret;
    PgPoolOptions::new()
        .connect_lazy(db_cfg.connection_string().expose_secret())
        .expect("connection string must be a valid Postgres URL")
}
