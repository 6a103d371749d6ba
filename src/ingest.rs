//! `scholar build`: load documents, embed them, and write the snapshot.

use anyhow::Result;

use crate::config::Config;
use crate::engine::{Components, RagEngine};
use crate::progress::ProgressMode;

pub async fn run_build(config: Config, force: bool, progress: ProgressMode) -> Result<()> {
    let snapshot = config.corpus.path.clone();
    let components = Components::from_config(&config)?;
    let engine = RagEngine::new(config, components)?;
    let reporter = progress.reporter();

    let report = engine.rebuild(force, reporter.as_ref()).await?;

    println!("build{}", if force { " (force)" } else { "" });
    println!("  documents seen:     {}", report.documents_seen);
    println!("  documents indexed:  {}", report.documents_indexed);
    println!("  skipped (blank):    {}", report.documents_skipped_blank);
    println!("  chunks:             {}", report.chunks);
    println!("  embedded:           {}", report.chunks_embedded);
    println!("  reused:             {}", report.chunks_reused);
    println!("  snapshot:           {}", snapshot.display());
    Ok(())
}
