use anyhow::Result;

use crate::config::Config;

pub fn run(config: &Config) -> Result<()> {
    println!("Version: {}", config.cli_version()?);
    Ok(())
}
