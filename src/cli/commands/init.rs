//! Implementation of the `ratify init` command.

use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use tokio::fs;

use crate::adapters::sqlite::initialize_database;
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::Config;

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Force reinitialization even if already initialized
    #[arg(long, short)]
    pub force: bool,

    /// Target directory (defaults to current directory)
    #[arg(default_value = ".")]
    pub path: PathBuf,
}

#[derive(Debug, serde::Serialize)]
pub struct InitOutput {
    pub success: bool,
    pub message: String,
    pub initialized_path: PathBuf,
    pub database_initialized: bool,
}

impl CommandOutput for InitOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![self.message.clone()];
        if self.database_initialized {
            lines.push("Database initialized at .ratify/ratify.db".to_string());
        }
        lines.join("\n")
    }
}

pub async fn execute(args: InitArgs, json_mode: bool) -> Result<()> {
    let target_path = if args.path.is_absolute() {
        args.path.clone()
    } else {
        std::env::current_dir().context("Failed to get current directory")?.join(&args.path)
    };

    let ratify_dir = target_path.join(".ratify");
    if ratify_dir.exists() && !args.force {
        output(
            &InitOutput {
                success: false,
                message: "Already initialized. Use --force to reinitialize.".to_string(),
                initialized_path: target_path,
                database_initialized: false,
            },
            json_mode,
        );
        return Ok(());
    }

    if args.force && ratify_dir.exists() {
        fs::remove_dir_all(&ratify_dir).await.context("Failed to remove existing .ratify directory")?;
    }
    fs::create_dir_all(&ratify_dir).await.with_context(|| format!("Failed to create {}", ratify_dir.display()))?;

    let config_path = ratify_dir.join("config.yaml");
    let config_yaml =
        serde_yaml::to_string(&Config::default()).context("Failed to serialize default configuration")?;
    fs::write(&config_path, config_yaml)
        .await
        .with_context(|| format!("Failed to write {}", config_path.display()))?;

    let db_path = ratify_dir.join("ratify.db");
    let db_url = format!("sqlite:{}", db_path.display());
    initialize_database(&db_url, None).await.context("Failed to initialize database")?;

    output(
        &InitOutput {
            success: true,
            message: if args.force {
                "Reinitialized successfully.".to_string()
            } else {
                "Initialized successfully.".to_string()
            },
            initialized_path: target_path,
            database_initialized: true,
        },
        json_mode,
    );
    Ok(())
}
