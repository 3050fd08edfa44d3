use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let matches = neptun::cli::parse_args();
    if let Err(err) = neptun::cli::actions::run(&matches).await {
        log::error!("{err:#}");
        return Err(err);
    }
    Ok(())
}
