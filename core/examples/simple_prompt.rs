use geoweather::prelude::*;
use geoweather::providers::completions::Gemini;

#[tokio::main]
async fn main() -> Result<(), Error> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = Config::from_env()?;
    let model = Gemini::new(&config.model)?;

    let (reply, usage) = model
        .send(&[Message::user("Explain what a geocoder does in one sentence.")], None)
        .await?;
    println!("{}", reply.text());
    _ = dbg!(usage);
    Ok(())
}
