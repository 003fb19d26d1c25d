//! `rimport check`: resolve each configured namespace root

use anyhow::bail;
use rimport_loader::RemoteImporter;

use super::CommandContext;

pub async fn execute(ctx: &CommandContext) -> anyhow::Result<()> {
    ctx.output.info(&format!("Configuration: {:?}", ctx.source));

    if ctx.config.remotes.is_empty() {
        ctx.output.warn("No remotes configured");
        return Ok(());
    }

    let importer = RemoteImporter::from_config(&ctx.config).await?;
    let mut total = 0;
    let mut failed = 0;

    for remote in &ctx.config.remotes {
        for namespace in &remote.namespaces {
            total += 1;
            match importer.import(namespace).await {
                Ok(unit) if unit.source.is_empty() && unit.is_package => {
                    ctx.output.success(&format!("{} ({}, no initializer)", namespace, remote.location));
                },
                Ok(unit) => {
                    ctx.output.success(&format!("{} <- {}", namespace, unit.origin));
                },
                Err(e) => {
                    failed += 1;
                    ctx.output.error(&format!("{} ({}): {}", namespace, remote.location, e));
                },
            }
        }
    }

    if failed > 0 {
        bail!("{} of {} namespaces unreachable", failed, total);
    }
    Ok(())
}
