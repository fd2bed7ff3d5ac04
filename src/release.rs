//! Canonical release records.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::category::standard_category;

/// A single search result, normalized across indexers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseInfo {
    /// Identifier unique within one indexer response.
    pub guid: String,
    /// Release title.
    pub title: String,
    /// Free-form description or tags.
    pub description: Option<String>,
    /// Direct download link.
    pub download_url: String,
    /// Detail page.
    pub info_url: Option<String>,
    /// Publication time, UTC.
    pub publish_date: DateTime<Utc>,
    /// Size in bytes.
    pub size: Option<u64>,
    /// Number of downloads.
    pub grabs: Option<u32>,
    /// Number of files.
    pub files: Option<u32>,
    /// Canonical category ids.
    pub categories: Vec<i32>,
    /// Numeric IMDb id (without the `tt` prefix).
    pub imdb_id: Option<u32>,
}

impl ReleaseInfo {
    /// Creates a release; the guid defaults to the download URL.
    pub fn new(
        title: impl Into<String>,
        download_url: impl Into<String>,
        publish_date: DateTime<Utc>,
    ) -> Self {
        let download_url = download_url.into();
        Self {
            guid: download_url.clone(),
            title: title.into(),
            description: None,
            download_url,
            info_url: None,
            publish_date,
            size: None,
            grabs: None,
            files: None,
            categories: Vec::new(),
            imdb_id: None,
        }
    }

    pub fn with_guid(mut self, guid: impl Into<String>) -> Self {
        self.guid = guid.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        let description = description.into();
        if !description.trim().is_empty() {
            self.description = Some(description);
        }
        self
    }

    pub fn with_info_url(mut self, info_url: impl Into<String>) -> Self {
        self.info_url = Some(info_url.into());
        self
    }

    pub fn with_size(mut self, size: Option<u64>) -> Self {
        self.size = size;
        self
    }

    pub fn with_grabs(mut self, grabs: Option<u32>) -> Self {
        self.grabs = grabs;
        self
    }

    pub fn with_files(mut self, files: Option<u32>) -> Self {
        self.files = files;
        self
    }

    pub fn with_categories(mut self, categories: Vec<i32>) -> Self {
        self.categories = categories;
        self
    }

    pub fn with_imdb_id(mut self, imdb_id: Option<u32>) -> Self {
        self.imdb_id = imdb_id.filter(|id| *id > 0);
        self
    }

    /// IMDb id in `tt0000000` form.
    pub fn full_imdb_id(&self) -> Option<String> {
        self.imdb_id.map(|id| format!("tt{:07}", id))
    }

    /// Names of the canonical categories, for display.
    pub fn category_names(&self) -> Vec<&'static str> {
        self.categories
            .iter()
            .filter_map(|id| standard_category(*id))
            .map(|c| c.name)
            .collect()
    }
}

/// Drops releases whose guid was already seen, keeping the first occurrence.
pub fn dedupe_by_guid(releases: Vec<ReleaseInfo>) -> Vec<ReleaseInfo> {
    let mut seen = HashSet::new();
    releases
        .into_iter()
        .filter(|r| seen.insert(r.guid.clone()))
        .collect()
}
