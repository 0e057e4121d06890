use crate::aggregator::FeedAggregator;
use crate::config::{CookerConfig, Recipe};
use crate::render::{AtomRenderer, JsonFeedRenderer};
use crate::types::{CookerError, FeedMeta, FeedRenderer, Result};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub output_dir: PathBuf,
    pub repository_owner: String,
    pub repository: String,
    /// Cook only the recipe with this name.
    pub only: Option<String>,
}

/// Summary of one cooked and written feed.
#[derive(Debug, Clone)]
pub struct CookedFeed {
    pub name: String,
    pub items: usize,
    pub sources_ok: usize,
    pub sources_failed: usize,
    pub outputs: Vec<PathBuf>,
}

/// Cooks every selected recipe and writes one JSON Feed and one Atom
/// document per recipe. Source failures never fail the run; configuration
/// and output errors do.
pub async fn cook_all(
    config: &CookerConfig,
    aggregator: &FeedAggregator,
    options: &RunOptions,
) -> Result<Vec<CookedFeed>> {
    let recipes: Vec<&Recipe> = match &options.only {
        Some(name) => vec![config
            .recipe(name)
            .ok_or_else(|| CookerError::Config(format!("No feed named '{}'", name)))?],
        None => config.feeds.iter().collect(),
    };

    tokio::fs::create_dir_all(&options.output_dir).await?;

    let mut cooked = Vec::with_capacity(recipes.len());
    for recipe in recipes {
        let meta = recipe.meta(&options.repository_owner, &options.repository)?;
        let feed = cook_recipe(recipe, config.limit, aggregator, &meta, &options.output_dir).await?;
        cooked.push(feed);
    }
    Ok(cooked)
}

pub async fn cook_recipe(
    recipe: &Recipe,
    default_limit: usize,
    aggregator: &FeedAggregator,
    meta: &FeedMeta,
    output_dir: &Path,
) -> Result<CookedFeed> {
    let urls = recipe.source_urls()?;
    let chain = recipe.filter_chain()?;
    let limit = recipe.effective_limit(default_limit);

    info!("Cooking {} from {} sources (limit {})", recipe.name, urls.len(), limit);
    let report = aggregator.cook_with_report(urls, &chain, limit).await;

    let sources_ok = report.sources.iter().filter(|s| s.succeeded()).count();
    let sources_failed = report.sources.len() - sources_ok;
    if sources_ok == 0 {
        warn!("No source of {} succeeded, writing an empty feed", recipe.name);
    }

    let documents = render_documents(meta, &report.items, recipe, output_dir)?;
    let mut outputs = Vec::with_capacity(documents.len());
    for (path, document) in documents {
        tokio::fs::write(&path, document).await?;
        info!("Wrote {}", path.display());
        outputs.push(path);
    }

    Ok(CookedFeed {
        name: recipe.name.clone(),
        items: report.items.len(),
        sources_ok,
        sources_failed,
        outputs,
    })
}

fn render_documents(
    meta: &FeedMeta,
    items: &[crate::types::FeedItem],
    recipe: &Recipe,
    output_dir: &Path,
) -> Result<Vec<(PathBuf, String)>> {
    let renderers: [&dyn FeedRenderer; 2] = [&JsonFeedRenderer, &AtomRenderer];
    let stem = recipe.file_stem();

    renderers
        .iter()
        .map(|renderer| {
            let document = renderer
                .render(meta, items)
                .map_err(|e| CookerError::Render(format!("{} ({}): {}", recipe.name, renderer.extension(), e)))?;
            Ok((output_dir.join(format!("{}.{}", stem, renderer.extension())), document))
        })
        .collect()
}
