#[macro_use]
extern crate log;

use anyhow::{bail, Result};
use std::path::Path;
use wave_bot::render;

const USAGE: &str = "usage: wave-bot [render <input.wav> <output.wav>]";

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    pretty_env_logger::formatted_timed_builder()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();

    match args.as_slice() {
        [] => run_bot().await,
        [cmd, input, output] if cmd == "render" => {
            let summary = render::render_file(Path::new(input), Path::new(output))?;
            info!(
                "{}Hz {} channel(s) {}-byte source -> {} frames",
                summary.source.sample_rate,
                summary.source.channels,
                summary.source.sample_width,
                summary.frames
            );
            Ok(())
        }
        _ => bail!(USAGE),
    }
}

#[cfg(feature = "discord")]
async fn run_bot() -> Result<()> {
    use anyhow::Context;

    let config = wave_bot::config::load().await?;
    let token = config
        .discord_token()
        .context("No Discord token configured, set TOKEN or discord_token in Config.toml")?
        .to_string();

    wave_bot::discord::run(&config, &token).await
}

#[cfg(not(feature = "discord"))]
async fn run_bot() -> Result<()> {
    bail!("wave-bot was built without the `discord` feature, only `render` is available.\n{USAGE}")
}
