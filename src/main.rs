use env_logger::Env;
use log::{error, info};
use plate_verifier::lookup::HttpLookup;
use plate_verifier::presenter::{LogPresenter, Presenter, SqlitePresenter};
use plate_verifier::recognizer::AlprCli;
use plate_verifier::source::SourceSpec;
use plate_verifier::{CaptureSession, Collaborators, Config, RegistryHandle};
use std::process;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    info!("Starting plate-verifier");

    if let Err(e) = run().await {
        error!("{}", e);
        process::exit(1);
    }
    info!("Exiting main");
}

async fn run() -> Result<(), failure::Error> {
    let config = Config::from_env()?;
    let source = SourceSpec::parse(&config.source)?.open(config.source_fps)?;

    let presenters: Vec<Box<dyn Presenter>> = vec![
        Box::new(LogPresenter::new()),
        Box::new(SqlitePresenter::open(&config.db_path)?),
    ];
    let collaborators = Collaborators {
        recognizer: Arc::new(AlprCli::from_config(&config)),
        lookup: Arc::new(HttpLookup::new(&config.lookup_url, config.verify_timeout)?),
        presenter: Arc::new(presenters),
    };

    let registry = RegistryHandle::spawn(config.verify_attempts);
    let session = CaptureSession::start(&config, collaborators, source, registry.clone()).await?;

    tokio::signal::ctrl_c().await?;
    info!("Stopping capture");
    session.stop().await?;

    let stats = registry.stats().await?;
    info!(
        "{} plates seen this session, {} verified, {} awaiting lookup",
        stats.live, stats.verified, stats.unverified
    );
    Ok(())
}
