use outreach_engine::cli;
use outreach_engine::configuration::get_configuration;
use outreach_engine::engine::Engine;
use outreach_engine::telemetry::get_subscriber;
use outreach_engine::telemetry::init_subscriber;

/// Load config, build the engine, and run exactly one subcommand. Each
/// invocation is one engine tick; the cadence (daily, on demand, cron) is an
/// operator concern outside this binary rather than a built-in worker loop.
#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let subscriber = get_subscriber("outreach-engine", "info", std::io::stdout);
    init_subscriber(subscriber);

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = match cli::Command::parse(&args) {
        Ok(command) => command,
        Err(usage) => {
            eprintln!("{usage}");
            std::process::exit(1);
        }
    };

    let settings = get_configuration()?;
    let engine = Engine::build(settings).await?;
    let today = current_date();

    let succeeded = cli::run(command, &engine, today).await;
    if !succeeded {
        std::process::exit(1);
    }
    Ok(())
}

fn current_date() -> chrono::NaiveDate { chrono::Local::now().date_naive() }
