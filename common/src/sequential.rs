use anyhow::{Context, Result};
use std::{fs, path::PathBuf};
use tracing::info;

use crate::apps::MapReduceApp;
use crate::job::JobContext;
use crate::map::do_map;
use crate::merge::merge;
use crate::reduce::do_reduce;

/// Corre un job completo en este proceso, sin master ni workers:
/// todos los map, todos los reduce y el merge final.
pub fn run_sequential(ctx: &JobContext, app: &dyn MapReduceApp) -> Result<PathBuf> {
    fs::create_dir_all(&ctx.work_dir)
        .with_context(|| format!("creando {}", ctx.work_dir.display()))?;

    info!(
        "job {} secuencial: {} maps, {} reduces",
        ctx.name,
        ctx.n_map(),
        ctx.n_reduce
    );

    for (m, file) in ctx.map_files.iter().enumerate() {
        do_map(&ctx.work_dir, &ctx.name, m, file, ctx.n_reduce, |f, c| app.map(f, c))
            .with_context(|| format!("map {} ({})", m, file))?;
    }

    for r in 0..ctx.n_reduce {
        do_reduce(
            &ctx.work_dir,
            &ctx.name,
            r,
            &ctx.reduce_output_path(r),
            ctx.n_map(),
            |k, vs| app.reduce(k, vs),
        )
        .with_context(|| format!("reduce {}", r))?;
    }

    let out = merge(&ctx.work_dir, &ctx.name, ctx.n_reduce).context("merge final")?;
    Ok(out)
}
