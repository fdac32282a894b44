pub mod stopwords;

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::PathBuf;

use itertools::Itertools;
use serde::Serialize;
use tracing::info;

use crate::config::Workspace;
use crate::error::{LinklyticsError, Result};
use crate::posts::{fmt_count, EnrichedPost, EnrichedPostSet};
use crate::reconcile::AccountTotals;

pub const POPULAR_HOOK_WORDS: usize = 5;

fn average(posts: &EnrichedPostSet, field: impl Fn(&EnrichedPost) -> usize) -> Result<f64> {
    if posts.is_empty() {
        return Err(LinklyticsError::EmptyPostSet);
    }
    let total: usize = posts.posts().iter().map(field).sum();
    Ok(total as f64 / posts.len() as f64)
}

pub fn avg_word_count(posts: &EnrichedPostSet) -> Result<f64> {
    average(posts, |p| p.word_count)
}

pub fn avg_line_count(posts: &EnrichedPostSet) -> Result<f64> {
    average(posts, |p| p.line_count)
}

pub fn avg_hook_word_count(posts: &EnrichedPostSet) -> Result<f64> {
    average(posts, |p| p.hook_word_count)
}

/// Top `k` words across all hooks, excluding English stop words.
pub fn most_popular_hook_words(posts: &EnrichedPostSet, k: usize) -> Vec<(String, usize)> {
    most_popular_words(
        posts.posts().iter().map(|p| p.hook.as_str()),
        &stopwords::ENGLISH_SET,
        k,
    )
}

/// Lower-cased whitespace tokens, counted. Higher counts first; equal counts
/// keep the order in which the words first appeared.
pub fn most_popular_words<'a>(
    texts: impl IntoIterator<Item = &'a str>,
    stop_words: &HashSet<&str>,
    k: usize,
) -> Vec<(String, usize)> {
    let mut counts: Vec<(String, usize)> = Vec::new();
    let mut slots: HashMap<String, usize> = HashMap::new();

    for text in texts {
        for word in text.to_lowercase().split_whitespace() {
            if stop_words.contains(word) {
                continue;
            }
            match slots.get(word) {
                Some(&i) => counts[i].1 += 1,
                None => {
                    slots.insert(word.to_string(), counts.len());
                    counts.push((word.to_string(), 1));
                }
            }
        }
    }

    counts
        .into_iter()
        .sorted_by(|a, b| b.1.cmp(&a.1))
        .take(k)
        .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub top_n: usize,
    pub posts: usize,
    pub avg_word_count: f64,
    pub avg_line_count: f64,
    pub avg_hook_word_count: f64,
    pub popular_hook_words: Vec<(String, usize)>,
    pub account: Option<AccountTotals>,
}

impl Summary {
    pub fn of(posts: &EnrichedPostSet, top_n: usize, account: Option<AccountTotals>) -> Result<Self> {
        Ok(Summary {
            top_n,
            posts: posts.len(),
            avg_word_count: avg_word_count(posts)?,
            avg_line_count: avg_line_count(posts)?,
            avg_hook_word_count: avg_hook_word_count(posts)?,
            popular_hook_words: most_popular_hook_words(posts, POPULAR_HOOK_WORDS),
            account,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub file_name: String,
    pub summary: Summary,
    pub posts: EnrichedPostSet,
}

impl Report {
    pub fn build(
        file_name: &str,
        top_n: usize,
        posts: EnrichedPostSet,
        account: Option<AccountTotals>,
    ) -> Result<Self> {
        let summary = Summary::of(&posts, top_n, account)?;
        Ok(Report {
            file_name: file_name.to_string(),
            summary,
            posts,
        })
    }

    /// File name up to the first dot, used to name the output files.
    pub fn base_name(&self) -> &str {
        self.file_name.split('.').next().unwrap_or(&self.file_name)
    }

    pub fn to_markdown(&self) -> String {
        let s = &self.summary;
        let mut md = format!("# Linkedin Analytics for: {}\n\n", self.file_name);

        md.push_str(&format!("## Summary of top {} posts\n", s.top_n));
        md.push_str(&format!(
            "- **Posts analyzed**: {} of {}\n- **Average word count**: {:.2}\n",
            s.posts, s.top_n, s.avg_word_count
        ));
        md.push_str(&format!(
            "- **Average line count**: {:.2}\n- **Average hook word count**: {:.2}\n",
            s.avg_line_count, s.avg_hook_word_count
        ));
        if !s.popular_hook_words.is_empty() {
            let words = s
                .popular_hook_words
                .iter()
                .map(|(w, n)| format!("{} ({})", w, n))
                .join(", ");
            md.push_str(&format!("- **Most popular hook words**: {}\n", words));
        }
        if let Some(ref a) = s.account {
            md.push_str(&format!(
                "- **Account totals** ({} to {}, {} days): {} impressions, {} engagements\n",
                a.first_day.format("%B %d, %Y"),
                a.last_day.format("%B %d, %Y"),
                a.days,
                a.impressions,
                a.engagements
            ));
        }

        md.push_str("\n## Individual posts\n");
        for post in self.posts.posts() {
            let date = post.raw.publish_date;
            md.push_str(&format!(
                "\n### Post on {} ({})\n",
                date.format("%B %d, %Y"),
                date.format("%A")
            ));
            md.push_str(&format!(
                "- **Engagements**: {}\n- **Impressions**: {}\n",
                fmt_count(post.raw.engagements),
                fmt_count(post.raw.impressions)
            ));
            md.push_str(&format!(
                "- **Word count**: {}\n- **Line count**: {}\n",
                post.word_count, post.line_count
            ));
            md.push_str(&format!("- **Hook**: {}\n", post.hook.trim()));
            md.push_str(&format!("- **Post URL**: [{0}]({0})\n", post.raw.post_url));
            md.push_str("- **Post description**:\n\n");
            for line in post.description.split('\n') {
                if line.is_empty() {
                    md.push_str(">\n");
                } else {
                    md.push_str(&format!("> {}\n", line));
                }
            }
        }

        md
    }

    /// Write `<base>.md` (and `<base>.json` when asked) into the workspace.
    pub fn write(&self, workspace: &Workspace, json: bool) -> Result<Vec<PathBuf>> {
        let mut written = Vec::new();

        let md_path = workspace.output_path(self.base_name(), "md");
        fs::write(&md_path, self.to_markdown())?;
        info!("Report written to {}", md_path.display());
        written.push(md_path);

        if json {
            let json_path = workspace.output_path(self.base_name(), "json");
            let body = serde_json::to_string_pretty(self)
                .map_err(|e| LinklyticsError::Io(std::io::Error::other(e)))?;
            fs::write(&json_path, body)?;
            info!("JSON written to {}", json_path.display());
            written.push(json_path);
        }

        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::posts::RawPost;
    use chrono::NaiveDate;

    fn post(url: &str, body: &str) -> EnrichedPost {
        let raw = RawPost::with_engagements(url, NaiveDate::from_ymd_opt(2024, 3, 5).unwrap(), 10);
        EnrichedPost::new(&raw, body.to_string())
    }

    fn set(posts: Vec<EnrichedPost>) -> EnrichedPostSet {
        let mut s = EnrichedPostSet::new();
        for p in posts {
            s.add_post(p);
        }
        s
    }

    #[test]
    fn popular_words_tie_break_on_first_seen() {
        let stop: HashSet<&str> = ["the"].into_iter().collect();
        let words = most_popular_words(["the cat sat", "the dog sat"], &stop, 5);
        assert_eq!(
            words,
            vec![("sat".to_string(), 2), ("cat".to_string(), 1), ("dog".to_string(), 1)]
        );
    }

    #[test]
    fn popular_words_are_case_folded_and_capped() {
        let stop = HashSet::new();
        let words = most_popular_words(["Rust RUST rust", "a b c d e f"], &stop, 3);
        assert_eq!(
            words,
            vec![("rust".to_string(), 3), ("a".to_string(), 1), ("b".to_string(), 1)]
        );
    }

    #[test]
    fn hook_words_skip_english_stop_words() {
        let posts = set(vec![
            post("https://a", "The secret to hiring\nbody"),
            post("https://b", "My hiring mistake\nbody"),
        ]);
        let words = most_popular_hook_words(&posts, POPULAR_HOOK_WORDS);
        assert_eq!(words[0], ("hiring".to_string(), 2));
        assert!(words.iter().all(|(w, _)| w != "the" && w != "my" && w != "to"));
    }

    #[test]
    fn averages_over_set() {
        let posts = set(vec![
            post("https://a", "one two\nthree"),
            post("https://b", "one\ntwo\nthree\nfour five six"),
        ]);
        assert_eq!(avg_word_count(&posts).unwrap(), 4.5);
        assert_eq!(avg_line_count(&posts).unwrap(), 3.0);
        assert_eq!(avg_hook_word_count(&posts).unwrap(), 1.5);
    }

    #[test]
    fn empty_set_cannot_be_aggregated() {
        let empty = EnrichedPostSet::new();
        assert!(matches!(avg_word_count(&empty), Err(LinklyticsError::EmptyPostSet)));
        assert!(matches!(
            Report::build("x.xlsx", 2, empty, None),
            Err(LinklyticsError::EmptyPostSet)
        ));
    }

    #[test]
    fn markdown_has_summary_and_posts() {
        let account = AccountTotals {
            first_day: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            last_day: NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(),
            days: 91,
            impressions: 12000,
            engagements: 340,
        };
        let posts = set(vec![post("https://p/1", "Shipping beats polish\n\nfull story")]);
        let report = Report::build("Content_2024.xlsx", 2, posts, Some(account)).unwrap();
        let md = report.to_markdown();

        assert!(md.starts_with("# Linkedin Analytics for: Content_2024.xlsx\n"));
        assert!(md.contains("## Summary of top 2 posts"));
        assert!(md.contains("- **Posts analyzed**: 1 of 2"));
        assert!(md.contains("- **Average word count**: 5.00"));
        assert!(md.contains("- **Most popular hook words**: shipping (1), beats (1), polish (1)"));
        assert!(md.contains("(January 01, 2024 to March 31, 2024, 91 days): 12000 impressions, 340 engagements"));
        assert!(md.contains("### Post on March 05, 2024 (Tuesday)"));
        assert!(md.contains("- **Impressions**: -"));
        assert!(md.contains("- **Hook**: Shipping beats polish"));
        assert!(md.contains("[https://p/1](https://p/1)"));
        assert!(md.contains("> Shipping beats polish\n>\n> full story\n"));
    }

    #[test]
    fn blank_post_renders_with_no_hook() {
        let posts = set(vec![post("https://a", "one two three"), post("https://blank", "")]);
        let report = Report::build("Export.xlsx", 2, posts, None).unwrap();
        let md = report.to_markdown();

        assert!(md.contains("- **Average word count**: 1.50"));
        assert!(md.contains("- **Average line count**: 1.00"));
        assert!(md.contains("- **Word count**: 0\n- **Line count**: 1\n- **Hook**: no hook found\n"));
        assert!(md.ends_with("[https://blank](https://blank)\n- **Post description**:\n\n>\n"));
        assert!(!md.contains("Account totals"));
    }

    #[test]
    fn base_name_stops_at_first_dot() {
        let posts = set(vec![post("https://a", "x")]);
        let report = Report::build("Content_2024.01.xlsx", 1, posts, None).unwrap();
        assert_eq!(report.base_name(), "Content_2024");
    }

    #[test]
    fn write_creates_markdown_and_json() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::prepare(dir.path()).unwrap();
        let posts = set(vec![post("https://a", "hello world")]);
        let report = Report::build("Export.xlsx", 1, posts, None).unwrap();

        let written = report.write(&ws, true).unwrap();
        assert_eq!(written, vec![dir.path().join("Export.md"), dir.path().join("Export.json")]);

        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&written[1]).unwrap()).unwrap();
        assert_eq!(json["summary"]["posts"], 1);
        assert_eq!(json["posts"][0]["post_url"], "https://a");
        assert_eq!(json["posts"][0]["hook"], "hello world");
    }
}
