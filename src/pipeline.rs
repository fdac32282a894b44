use std::path::Path;

use tracing::{info, warn};

use crate::enrich::enrich;
use crate::error::Result;
use crate::extract::ContentExtractor;
use crate::fetch::PageFetcher;
use crate::posts::RawPostStore;
use crate::reconcile::{self, AccountTotals};
use crate::report::Report;
use crate::sheet::{SheetKind, Table, Workbook, TOP_POSTS_HEADER_OFFSET};

/// Ranked posts and account totals read from one analytics export.
pub struct Analytics {
    pub file_name: String,
    pub store: RawPostStore,
    pub account: Option<AccountTotals>,
}

/// Validate the workbook's sheets and reconcile its post tables.
pub fn load_analytics(path: &Path) -> Result<Analytics> {
    let mut workbook = Workbook::open(path)?;
    workbook.validate()?;

    let engagement = workbook.table(SheetKind::Engagement, 0);
    let top_posts = workbook.table(SheetKind::TopPosts, TOP_POSTS_HEADER_OFFSET)?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    analytics_from_tables(file_name, engagement, &top_posts)
}

/// TOP POSTS must reconcile. The ENGAGEMENT sheet only feeds the account
/// totals, so a sheet that cannot be read drops the totals instead of the run.
fn analytics_from_tables(
    file_name: String,
    engagement: Result<Table>,
    top_posts: &Table,
) -> Result<Analytics> {
    let store = reconcile::reconcile_top_posts(top_posts)?;

    let account = match engagement.and_then(|t| reconcile::parse_engagement_days(&t)) {
        Ok(days) => AccountTotals::from_days(&days),
        Err(e) => {
            warn!(error = %e, "Skipping account totals");
            None
        }
    };

    Ok(Analytics {
        file_name,
        store,
        account,
    })
}

/// Enrich the top posts and aggregate them into a report.
pub async fn analyze(
    analytics: Analytics,
    top_n: usize,
    fetcher: &dyn PageFetcher,
    extractor: &dyn ContentExtractor,
) -> Result<Report> {
    info!(file = %analytics.file_name, posts = analytics.store.len(), top_n, "Analyzing posts");
    let posts = enrich(&analytics.store, top_n, fetcher, extractor).await?;
    Report::build(&analytics.file_name, top_n, posts, analytics.account)
}
