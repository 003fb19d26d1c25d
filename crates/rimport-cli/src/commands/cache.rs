//! `rimport cache`: inspect and clean the artifact cache

use rimport_cache::store::format_bytes;
use std::time::Duration;

use super::CommandContext;

pub fn stats(ctx: &CommandContext) -> anyhow::Result<()> {
    let cache = ctx.open_cache()?;
    let stats = cache.stats(ctx.config.defaults().cache_ttl);

    ctx.output.info(&format!("Cache: {}", cache.root_path()));
    ctx.output.info(&format!("  entries  {}", stats.total_entries));
    ctx.output.info(&format!("  fresh    {}", stats.fresh_entries));
    ctx.output.info(&format!("  stale    {}", stats.stale_entries));
    if stats.corrupt_entries > 0 {
        ctx.output.warn(&format!("  corrupt  {}", stats.corrupt_entries));
    }
    ctx.output.info(&format!("  size     {}", format_bytes(stats.total_bytes)));
    Ok(())
}

pub fn clear(ctx: &CommandContext) -> anyhow::Result<()> {
    let cache = ctx.open_cache()?;
    let removed = cache.clear()?;
    ctx.output.success(&format!("Removed {} cached entries", removed));
    Ok(())
}

pub fn prune(older_than: u64, ctx: &CommandContext) -> anyhow::Result<()> {
    let cache = ctx.open_cache()?;
    let result = cache.prune(Duration::from_secs(older_than))?;
    ctx.output.success(&format!(
        "Pruned {} entries, freed {}",
        result.entries_removed,
        result.format_freed_space()
    ));
    Ok(())
}
