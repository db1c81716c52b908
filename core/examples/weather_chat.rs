use geoweather::prelude::*;

#[tokio::main]
async fn main() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("configuration error: {e}");
            std::process::exit(1);
        }
    };

    match ask(&config, "현재 서울의 날씨를 알려줄래?").await {
        Ok(outcome) => {
            println!("{}", outcome.answer);
            if outcome.stop_reason != StopReason::Completed {
                eprintln!("stopped early: {:?}", outcome.stop_reason);
            }
        }
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    }
}
