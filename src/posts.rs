use std::collections::HashMap;
use std::fmt;

use chrono::NaiveDate;
use serde::Serialize;

use crate::metrics::ContentMetrics;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RawPost {
    pub post_url: String,
    pub publish_date: NaiveDate,
    pub engagements: Option<u64>,
    pub impressions: Option<u64>,
}

impl RawPost {
    pub fn with_engagements(post_url: &str, publish_date: NaiveDate, engagements: u64) -> Self {
        RawPost {
            post_url: post_url.to_string(),
            publish_date,
            engagements: Some(engagements),
            impressions: None,
        }
    }

    pub fn with_impressions(post_url: &str, publish_date: NaiveDate, impressions: u64) -> Self {
        RawPost {
            post_url: post_url.to_string(),
            publish_date,
            engagements: None,
            impressions: Some(impressions),
        }
    }
}

impl fmt::Display for RawPost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Post URL: {}, Publish Date: {}, Engagements: {}, Impressions: {}",
            self.post_url,
            self.publish_date,
            fmt_count(self.engagements),
            fmt_count(self.impressions),
        )
    }
}

pub fn fmt_count(value: Option<u64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_else(|| "-".into())
}

/// Insertion-ordered posts, one entry per URL.
///
/// Entries only change through [`RawPostStore::add_post`], which merges a
/// partial record into the existing entry for the same URL.
#[derive(Debug, Default, Clone)]
pub struct RawPostStore {
    posts: Vec<RawPost>,
    index: HashMap<String, usize>,
}

impl RawPostStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `post`, or merge it into the entry with the same URL.
    ///
    /// A merge updates at most one field: `engagements` if the incoming post
    /// carries it, otherwise `impressions`. The publish date of the first
    /// insert is kept.
    pub fn add_post(&mut self, post: RawPost) {
        let Some(&idx) = self.index.get(&post.post_url) else {
            self.index.insert(post.post_url.clone(), self.posts.len());
            self.posts.push(post);
            return;
        };

        let existing = &mut self.posts[idx];
        if post.engagements.is_some() {
            existing.engagements = post.engagements;
        } else if post.impressions.is_some() {
            existing.impressions = post.impressions;
        }
    }

    pub fn get_post_by_url(&self, url: &str) -> Option<&RawPost> {
        self.index.get(url).map(|&idx| &self.posts[idx])
    }

    /// Stable sort, highest engagements first. Missing engagements rank as 0.
    pub fn sort_by_engagements(&mut self) {
        self.posts
            .sort_by(|a, b| b.engagements.unwrap_or(0).cmp(&a.engagements.unwrap_or(0)));
        self.index = self
            .posts
            .iter()
            .enumerate()
            .map(|(i, p)| (p.post_url.clone(), i))
            .collect();
    }

    pub fn posts(&self) -> &[RawPost] {
        &self.posts
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }
}

impl fmt::Display for RawPostStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, post) in self.posts.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", post)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnrichedPost {
    #[serde(flatten)]
    pub raw: RawPost,
    pub description: String,
    pub word_count: usize,
    pub line_count: usize,
    pub hook: String,
    pub hook_word_count: usize,
}

impl EnrichedPost {
    pub fn new(raw: &RawPost, description: String) -> Self {
        let metrics = ContentMetrics::of(&description);
        EnrichedPost {
            raw: raw.clone(),
            description,
            word_count: metrics.word_count,
            line_count: metrics.line_count,
            hook: metrics.hook,
            hook_word_count: metrics.hook_word_count,
        }
    }
}

/// Enriched posts in enrichment order.
#[derive(Debug, Default, Clone, Serialize)]
#[serde(transparent)]
pub struct EnrichedPostSet {
    posts: Vec<EnrichedPost>,
}

impl EnrichedPostSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_post(&mut self, post: EnrichedPost) {
        self.posts.push(post);
    }

    pub fn posts(&self) -> &[EnrichedPost] {
        &self.posts
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }
}
