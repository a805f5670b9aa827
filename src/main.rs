use anyhow::Result;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "overprint",
    version,
    about = "Overlay translated text onto scanned document images"
)]
struct Cli {
    /// Image file or directory of images to process
    input: String,

    /// Output root directory (default from settings, "output")
    #[arg(short = 'o', long = "output")]
    output: Option<String>,

    /// Target language (default from settings, "en")
    #[arg(short = 'l', long = "lang")]
    lang: Option<String>,

    /// Translation provider (deepl or none)
    #[arg(short = 'p', long = "provider")]
    provider: Option<String>,

    /// API key (overrides environment variables)
    #[arg(short = 'k', long = "key")]
    key: Option<String>,

    /// Read extra settings from a local TOML file
    #[arg(short = 'r', long = "read-settings")]
    read_settings: Option<String>,

    /// Enable verbose logging
    #[arg(long = "verbose")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    overprint::logging::init(cli.verbose)?;

    let output = overprint::run(overprint::Config {
        input: cli.input,
        output: cli.output,
        lang: cli.lang,
        provider: cli.provider,
        key: cli.key,
        settings_path: cli.read_settings,
    })
    .await?;

    println!("{}", output);
    Ok(())
}
