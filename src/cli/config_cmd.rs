use anyhow::Result;

use crate::cli::output::OutputOptions;
use crate::core::config::Configuration;

pub fn init(_opts: &OutputOptions) -> Result<()> {
    let path = Configuration::config_path();
    if path.exists() {
        eprintln!("Config file already exists at {}", path.display());
        eprintln!("Remove it first if you want to regenerate.");
        return Ok(());
    }

    match Configuration::default().save() {
        Ok(path) => {
            println!("Generated config at {}", path.display());
            println!("  cost_source = today, display_mode = both");
        }
        Err(e) => {
            eprintln!("Failed to generate config: {}", e);
            std::process::exit(1);
        }
    }
    Ok(())
}

pub fn check(_opts: &OutputOptions) -> Result<()> {
    let path = Configuration::config_path();
    if !path.exists() {
        println!("No config file at {}; defaults in effect.", path.display());
        return Ok(());
    }

    let config = match Configuration::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config: {}", e);
            std::process::exit(1);
        }
    };

    let issues = config.validate();
    if issues.is_empty() {
        println!("Config at {} is valid.", path.display());
    } else {
        eprintln!("Config at {} has issues:", path.display());
        for issue in &issues {
            eprintln!("  - {}", issue);
        }
        std::process::exit(1);
    }
    Ok(())
}
