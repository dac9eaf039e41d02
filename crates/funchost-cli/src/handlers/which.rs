//! Tool discovery handler.

use anyhow::Result;
use funchost_core::HarnessSettings;
use funchost_runtime::ToolResolver;

pub async fn execute(tool: &str) -> Result<()> {
    let settings = HarnessSettings::from_env();
    let resolver = ToolResolver::new(tool, settings.probe_timeout());
    let path = resolver.resolve().await?;
    println!("{}", path.display());
    Ok(())
}
