//! Initialize a snake race project directory.

use anyhow::{Context, Result};
use colored::Colorize;
use std::path::PathBuf;

use crate::config::{Config, CONFIG_FILE};

pub fn run(path: Option<String>) -> Result<()> {
    let base_path = match path {
        Some(p) => PathBuf::from(p),
        None => std::env::current_dir().context("Cannot read current directory")?,
    };

    std::fs::create_dir_all(&base_path)
        .with_context(|| format!("Failed to create {}", base_path.display()))?;

    let config_path = base_path.join(CONFIG_FILE);
    if config_path.exists() {
        println!("  {} {} already exists", "•".yellow(), config_path.display());
        return Ok(());
    }

    Config::default().save(&config_path)?;
    println!("  {} Created {}", "✓".green(), config_path.display());
    println!();
    println!("Next steps:");
    println!("  {} edit {} to taste", "1.".blue(), CONFIG_FILE);
    println!("  {} snake-race run --ticks 200 --render", "2.".blue());

    Ok(())
}

/// Print the effective configuration as TOML.
pub fn show(config: &Config) -> Result<()> {
    match crate::config::find_config_file() {
        Some(path) => println!("# loaded from {}", path.display()),
        None => println!("# no {} found, using defaults", CONFIG_FILE),
    }
    print!("{}", config.to_toml()?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_writes_default_config_once() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("race");
        run(Some(target.display().to_string())).unwrap();

        let path = target.join(CONFIG_FILE);
        assert_eq!(Config::load_from(&path).unwrap(), Config::default());

        std::fs::write(&path, "[simulation]\nagents = 9\n").unwrap();
        run(Some(target.display().to_string())).unwrap();
        assert_eq!(Config::load_from(&path).unwrap().simulation.agents, 9);
    }
}
