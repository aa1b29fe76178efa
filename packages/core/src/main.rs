use clap::Parser;
use dotenvy::dotenv;

use widget_feed::cli::Cli;
use widget_feed::config::Config;
use widget_feed::error::AppError;
use widget_feed::logging::init_logging;
use widget_feed::paths::extract_paths;
use widget_feed::session::Session;

#[tokio::main]
async fn main() {
    dotenv().ok();
    init_logging();

    let cli = Cli::parse();

    let mut config = Config::from_env()
        .map_err(AppError::Config)
        .unwrap_or_else(|err| {
            tracing::error!("{}", err);
            std::process::exit(1);
        });
    cli.apply(&mut config);

    tracing::info!("Widget feed started with config: {:?}", config);

    let session = Session::new(&config).unwrap_or_else(|err| {
        tracing::error!("{}", err);
        std::process::exit(1);
    });

    if let Err(err) = run(&cli, &session).await {
        tracing::error!("{}", err);
        std::process::exit(1);
    }

    if cli.metrics {
        match session.metrics().render() {
            Ok(text) => print!("{}", text),
            Err(err) => tracing::error!("Failed to render metrics: {}", err),
        }
    }
}

async fn run(cli: &Cli, session: &Session) -> Result<(), AppError> {
    if cli.paths {
        for url in &cli.urls {
            let raw = session.fetch_raw(url).await?;
            println!("# {}", url);
            for path in extract_paths(&raw) {
                println!("{}", path);
            }
        }
        return Ok(());
    }

    if cli.once {
        for url in &cli.urls {
            let result = session.fetch_and_normalize(url, cli.view).await?;
            println!("{}", to_pretty(&result)?);
        }
        return Ok(());
    }

    let interval = session.config().poll_interval_seconds;
    for (index, url) in cli.urls.iter().enumerate() {
        let widget_id = format!("widget-{}", index + 1);
        if session
            .scheduler()
            .start_polling(&widget_id, url, interval, cli.view)
            .is_none()
        {
            tracing::warn!("Skipping {}: empty URL", widget_id);
        }
    }

    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", err);
    }
    tracing::info!("Shutdown signal received");
    session.shutdown().await;

    let snapshot = session.store().read().await.snapshot();
    println!("{}", to_pretty(&snapshot)?);
    Ok(())
}

fn to_pretty<T: serde::Serialize>(value: &T) -> Result<String, AppError> {
    serde_json::to_string_pretty(value).map_err(|err| AppError::parse(err.to_string()))
}
