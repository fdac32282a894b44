use std::io::IsTerminal;

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use crate::error::{LinklyticsError, Result};
use crate::extract::ContentExtractor;
use crate::fetch::PageFetcher;
use crate::posts::{EnrichedPost, EnrichedPostSet, RawPostStore};

fn progress_bar(len: usize) -> ProgressBar {
    if !std::io::stderr().is_terminal() {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::with_template("[{elapsed_precise}] {bar:40} {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );
    pb
}

/// Fetch and measure the first `top_n` posts of an already ranked store.
///
/// Pages are fetched one at a time in rank order. A page without the post
/// region is skipped; a failed fetch aborts the run.
pub async fn enrich(
    store: &RawPostStore,
    top_n: usize,
    fetcher: &dyn PageFetcher,
    extractor: &dyn ContentExtractor,
) -> Result<EnrichedPostSet> {
    if top_n > store.len() {
        return Err(LinklyticsError::TopNExceedsPosts {
            requested: top_n,
            available: store.len(),
        });
    }

    let mut enriched = EnrichedPostSet::new();
    if top_n == 0 {
        return Ok(enriched);
    }

    info!(top_n, fetcher = fetcher.name(), "Enriching top posts");
    let pb = progress_bar(top_n);
    let mut skipped = 0usize;

    for (rank, post) in store.posts()[..top_n].iter().enumerate() {
        pb.set_message(post.post_url.clone());
        let html = fetcher.fetch(&post.post_url).await?;

        match extractor.extract(&html) {
            Some(description) => {
                let enriched_post = EnrichedPost::new(post, description);
                info!(
                    rank = rank + 1,
                    url = %post.post_url,
                    words = enriched_post.word_count,
                    lines = enriched_post.line_count,
                    "Enriched post"
                );
                enriched.add_post(enriched_post);
            }
            None => {
                skipped += 1;
                warn!(rank = rank + 1, url = %post.post_url, "No post region found, skipping");
            }
        }
        pb.inc(1);
    }

    pb.finish_and_clear();
    info!(enriched = enriched.len(), skipped, "Enrichment finished");
    Ok(enriched)
}
