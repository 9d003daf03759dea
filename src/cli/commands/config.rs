use crate::cli::commands::target_dir;
use crate::cli::output::Output;
use crate::cli::ConfigAction;
use crate::config::{ensure_config_dir, get_repo_config_dir, repo_config_file, Settings};
use crate::errors::Result;
use crate::git::find_repository_root;
use std::path::{Path, PathBuf};

/// Handle configuration commands against the tree's config file
pub fn run(path: Option<PathBuf>, action: ConfigAction) -> Result<()> {
    let dir = target_dir(path)?;
    let tree = find_repository_root(&dir).unwrap_or(dir);
    let config_file = repo_config_file(&tree);

    match action {
        ConfigAction::Set { key, value } => set_config_value(&tree, &config_file, &key, &value),
        ConfigAction::Get { key } => get_config_value(&config_file, &key),
        ConfigAction::List => list_config_values(&config_file),
        ConfigAction::Unset { key } => unset_config_value(&tree, &config_file, &key),
    }
}

fn set_config_value(tree: &Path, config_file: &Path, key: &str, value: &str) -> Result<()> {
    let mut settings = Settings::load_from_file(config_file)?;
    settings.set_value(key, value)?;
    settings.validate()?;
    ensure_config_dir(&get_repo_config_dir(tree))?;
    settings.save_to_file(config_file)?;

    Output::success(format!("Configuration updated: {key} = {value}"));
    if key == "patches.categories" {
        Output::tip("Existing patch file names must use one of the new categories.");
    }
    Ok(())
}

fn get_config_value(config_file: &Path, key: &str) -> Result<()> {
    let settings = Settings::load_from_file(config_file)?;
    let value = settings.get_value(key)?;
    println!("{key} = {value}");
    Ok(())
}

fn list_config_values(config_file: &Path) -> Result<()> {
    let settings = Settings::load_from_file(config_file)?;

    Output::section("patchstack configuration");
    if !config_file.exists() {
        Output::info(format!("{} does not exist; showing defaults", config_file.display()));
    }
    for key in Settings::keys() {
        Output::key_value(key, settings.get_value(key)?);
    }
    Ok(())
}

fn unset_config_value(tree: &Path, config_file: &Path, key: &str) -> Result<()> {
    let mut settings = Settings::load_from_file(config_file)?;
    let default = Settings::default().get_value(key)?;
    settings.set_value(key, &default)?;
    ensure_config_dir(&get_repo_config_dir(tree))?;
    settings.save_to_file(config_file)?;

    Output::success(format!("Configuration reset: {key} = {default}"));
    Ok(())
}
