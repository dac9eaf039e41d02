//! Start handler: run one functions instance until Ctrl-C.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use funchost_core::{
    FunctionConfiguration, HarnessSettings, InstanceRequest, flatten_settings_json,
    validate_settings,
};
use funchost_runtime::FunctionsScope;
use tracing::{info, warn};

use crate::commands::StartArgs;

pub async fn execute(args: StartArgs) -> Result<()> {
    let settings = build_settings(&args);
    validate_settings(&settings)?;

    let mut scope = FunctionsScope::new(settings);
    *scope.configuration_mut() = build_configuration(&args)?;

    let port = match args.port {
        Some(port) => port,
        None => scope.controller().port_oracle().find_available_port(None, None)?,
    };

    let request =
        InstanceRequest::new(args.project, port, args.runtime).with_provider(args.provider);

    let started = scope.start(request).await;
    let instance = match started {
        Ok(instance) => instance,
        Err(e) => {
            // Still kill whatever was spawned before surfacing the startup error.
            if let Err(teardown) = scope.teardown().await {
                warn!(error = %teardown, "Teardown after failed start was incomplete");
            }
            return Err(e.into());
        }
    };

    println!("Functions host running on http://localhost:{port}/ (pid {})", instance.pid());
    println!("Press Ctrl-C to stop.");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;

    info!(port = %port, "Stopping functions host");
    scope.teardown().await?;
    Ok(())
}

fn build_settings(args: &StartArgs) -> HarnessSettings {
    let mut settings = HarnessSettings::from_env();
    if let Some(path) = &args.func_path {
        settings = settings.with_func_path(path);
    }
    if let Some(root) = &args.search_root {
        settings = settings.with_search_root(root);
    }
    if let Some(secs) = args.startup_timeout {
        settings = settings.with_startup_timeout(Duration::from_secs(secs));
    }
    settings
}

/// Settings file values first, then `--env` pairs, so the command line wins.
fn build_configuration(args: &StartArgs) -> Result<FunctionConfiguration> {
    let mut configuration = FunctionConfiguration::new();
    if let Some(path) = &args.settings {
        configuration.copy_to_environment_variables(read_settings_file(path)?);
    }
    for (key, value) in &args.env {
        configuration.set(key.clone(), value.clone());
    }
    Ok(configuration)
}

fn read_settings_file(path: &Path) -> Result<Vec<(String, Option<String>)>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read settings file {}", path.display()))?;
    let document: serde_json::Value = serde_json::from_str(&text)
        .with_context(|| format!("invalid JSON in {}", path.display()))?;
    Ok(flatten_settings_json(&document))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Cli, Commands};
    use clap::Parser;

    fn start_args(extra: &[&str]) -> StartArgs {
        let mut argv = vec!["funchost", "start", "--project", "Demo", "--runtime", "net8.0"];
        argv.extend_from_slice(extra);
        match Cli::parse_from(argv).command {
            Commands::Start(args) => args,
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn command_line_env_overrides_settings_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let file = dir.path().join("local.settings.json");
        std::fs::write(
            &file,
            r#"{ "Values": { "ResponseMessage": "Hello" }, "ResponseMessage": "Hi", "Unset": null }"#,
        )
        .unwrap();

        let args = start_args(&[
            "--settings",
            file.to_str().unwrap(),
            "-e",
            "ResponseMessage=Welcome, {name}",
        ]);
        let configuration = build_configuration(&args).unwrap();

        assert_eq!(configuration.get("ResponseMessage"), Some("Welcome, {name}"));
        assert_eq!(configuration.get("Values:ResponseMessage"), Some("Hello"));
        assert_eq!(configuration.get("Unset"), None);
    }

    #[test]
    fn startup_timeout_flag_applies() {
        let args = start_args(&["--startup-timeout", "5", "--func-path", "/opt/func"]);
        let settings = build_settings(&args);
        assert_eq!(settings.startup_timeout(), Duration::from_secs(5));
        assert_eq!(settings.func_path.as_deref(), Some(Path::new("/opt/func")));
    }
}
