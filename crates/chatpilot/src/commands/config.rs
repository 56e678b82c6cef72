//! Config command - show the effective configuration.

use anyhow::Result;
use chatpilot_config::resolve_api_key;
use clap::Args;

use super::Context;

/// Arguments for the config command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Only list the config files that were checked
    #[arg(long)]
    pub sources: bool,
}

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    let loaded = ctx.load_config()?;

    println!("# Config files (lowest precedence first)");
    for source in &loaded.sources {
        let state = if source.loaded { "loaded" } else { "not found" };
        println!("#   {} ({state})", source.path.display());
    }
    if args.sources {
        return Ok(());
    }

    let llm = loaded.config.llm();
    match llm.provider() {
        Ok(provider) => match resolve_api_key(provider, llm.api_key.as_deref()) {
            Some(secret) => println!("# API key: set via {}", secret.source),
            None => println!("# API key: not configured"),
        },
        Err(e) => println!("# {e}"),
    }
    println!();
    print!("{}", loaded.config.redacted().to_toml()?);
    Ok(())
}
