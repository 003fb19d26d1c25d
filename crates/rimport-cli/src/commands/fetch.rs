//! `rimport fetch`: resolve one module and report where it came from

use anyhow::Context;
use rimport_loader::RemoteImporter;

use super::CommandContext;

pub async fn execute(module: &str, print: bool, ctx: &CommandContext) -> anyhow::Result<()> {
    let importer = RemoteImporter::from_config(&ctx.config).await?;
    if importer.registry().is_empty() {
        ctx.output.warn("No remotes configured");
    }

    let unit = importer
        .import(module)
        .await
        .with_context(|| format!("Failed to import {}", module))?;

    if print {
        print!("{}", unit.source_text());
        return Ok(());
    }

    let kind = if unit.is_package { "package" } else { "module" };
    ctx.output.success(&format!("{} {} <- {}", kind, unit.module, unit.origin));
    ctx.output.info(&format!("  fingerprint {}", unit.fingerprint));
    ctx.output.info(&format!("  {} bytes", unit.source.len()));
    Ok(())
}
