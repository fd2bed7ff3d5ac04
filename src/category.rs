//! Canonical category taxonomy and per-indexer native category mapping.
//!
//! Canonical categories follow the Newznab numbering: parents are multiples
//! of 1000 and subcategories add tens (2040 is Movies/HD).

use serde::{Deserialize, Serialize};

use crate::{IndexerError, Result};

/// Canonical category identifiers.
pub mod cats {
    pub const CONSOLE: i32 = 1000;
    pub const CONSOLE_OTHER: i32 = 1090;
    pub const MOVIES: i32 = 2000;
    pub const MOVIES_FOREIGN: i32 = 2010;
    pub const MOVIES_OTHER: i32 = 2020;
    pub const MOVIES_SD: i32 = 2030;
    pub const MOVIES_HD: i32 = 2040;
    pub const MOVIES_UHD: i32 = 2045;
    pub const MOVIES_BLURAY: i32 = 2050;
    pub const MOVIES_3D: i32 = 2060;
    pub const MOVIES_DVD: i32 = 2070;
    pub const MOVIES_WEBDL: i32 = 2080;
    pub const AUDIO: i32 = 3000;
    pub const AUDIO_MP3: i32 = 3010;
    pub const AUDIO_VIDEO: i32 = 3020;
    pub const AUDIO_AUDIOBOOK: i32 = 3030;
    pub const AUDIO_LOSSLESS: i32 = 3040;
    pub const AUDIO_OTHER: i32 = 3050;
    pub const PC: i32 = 4000;
    pub const PC_0DAY: i32 = 4010;
    pub const PC_ISO: i32 = 4020;
    pub const PC_MAC: i32 = 4030;
    pub const PC_GAMES: i32 = 4050;
    pub const TV: i32 = 5000;
    pub const TV_WEBDL: i32 = 5010;
    pub const TV_FOREIGN: i32 = 5020;
    pub const TV_SD: i32 = 5030;
    pub const TV_HD: i32 = 5040;
    pub const TV_UHD: i32 = 5045;
    pub const TV_OTHER: i32 = 5050;
    pub const TV_SPORT: i32 = 5060;
    pub const TV_ANIME: i32 = 5070;
    pub const TV_DOCUMENTARY: i32 = 5080;
    pub const XXX: i32 = 6000;
    pub const BOOKS: i32 = 7000;
    pub const BOOKS_MAGS: i32 = 7010;
    pub const BOOKS_EBOOK: i32 = 7020;
    pub const BOOKS_COMICS: i32 = 7030;
    pub const BOOKS_TECHNICAL: i32 = 7040;
    pub const BOOKS_FOREIGN: i32 = 7050;
    pub const OTHER: i32 = 8000;
    pub const OTHER_MISC: i32 = 8010;
    pub const OTHER_HASHED: i32 = 8020;
}

/// A canonical category definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StandardCategory {
    pub id: i32,
    pub name: &'static str,
}

impl StandardCategory {
    pub const fn new(id: i32, name: &'static str) -> Self {
        Self { id, name }
    }

    /// Returns the parent id (the category itself for parents).
    pub fn parent_id(&self) -> i32 {
        parent_of(self.id)
    }

    pub fn is_parent(&self) -> bool {
        self.id % 1000 == 0
    }
}

/// The canonical taxonomy.
pub static STANDARD_CATEGORIES: &[StandardCategory] = &[
    StandardCategory::new(cats::CONSOLE, "Console"),
    StandardCategory::new(cats::CONSOLE_OTHER, "Console/Other"),
    StandardCategory::new(cats::MOVIES, "Movies"),
    StandardCategory::new(cats::MOVIES_FOREIGN, "Movies/Foreign"),
    StandardCategory::new(cats::MOVIES_OTHER, "Movies/Other"),
    StandardCategory::new(cats::MOVIES_SD, "Movies/SD"),
    StandardCategory::new(cats::MOVIES_HD, "Movies/HD"),
    StandardCategory::new(cats::MOVIES_UHD, "Movies/UHD"),
    StandardCategory::new(cats::MOVIES_BLURAY, "Movies/BluRay"),
    StandardCategory::new(cats::MOVIES_3D, "Movies/3D"),
    StandardCategory::new(cats::MOVIES_DVD, "Movies/DVD"),
    StandardCategory::new(cats::MOVIES_WEBDL, "Movies/WEB-DL"),
    StandardCategory::new(cats::AUDIO, "Audio"),
    StandardCategory::new(cats::AUDIO_MP3, "Audio/MP3"),
    StandardCategory::new(cats::AUDIO_VIDEO, "Audio/Video"),
    StandardCategory::new(cats::AUDIO_AUDIOBOOK, "Audio/Audiobook"),
    StandardCategory::new(cats::AUDIO_LOSSLESS, "Audio/Lossless"),
    StandardCategory::new(cats::AUDIO_OTHER, "Audio/Other"),
    StandardCategory::new(cats::PC, "PC"),
    StandardCategory::new(cats::PC_0DAY, "PC/0day"),
    StandardCategory::new(cats::PC_ISO, "PC/ISO"),
    StandardCategory::new(cats::PC_MAC, "PC/Mac"),
    StandardCategory::new(cats::PC_GAMES, "PC/Games"),
    StandardCategory::new(cats::TV, "TV"),
    StandardCategory::new(cats::TV_WEBDL, "TV/WEB-DL"),
    StandardCategory::new(cats::TV_FOREIGN, "TV/Foreign"),
    StandardCategory::new(cats::TV_SD, "TV/SD"),
    StandardCategory::new(cats::TV_HD, "TV/HD"),
    StandardCategory::new(cats::TV_UHD, "TV/UHD"),
    StandardCategory::new(cats::TV_OTHER, "TV/Other"),
    StandardCategory::new(cats::TV_SPORT, "TV/Sport"),
    StandardCategory::new(cats::TV_ANIME, "TV/Anime"),
    StandardCategory::new(cats::TV_DOCUMENTARY, "TV/Documentary"),
    StandardCategory::new(cats::XXX, "XXX"),
    StandardCategory::new(cats::BOOKS, "Books"),
    StandardCategory::new(cats::BOOKS_MAGS, "Books/Mags"),
    StandardCategory::new(cats::BOOKS_EBOOK, "Books/EBook"),
    StandardCategory::new(cats::BOOKS_COMICS, "Books/Comics"),
    StandardCategory::new(cats::BOOKS_TECHNICAL, "Books/Technical"),
    StandardCategory::new(cats::BOOKS_FOREIGN, "Books/Foreign"),
    StandardCategory::new(cats::OTHER, "Other"),
    StandardCategory::new(cats::OTHER_MISC, "Other/Misc"),
    StandardCategory::new(cats::OTHER_HASHED, "Other/Hashed"),
];

/// Looks up a canonical category by id.
pub fn standard_category(id: i32) -> Option<&'static StandardCategory> {
    STANDARD_CATEGORIES.iter().find(|c| c.id == id)
}

/// Returns the parent id of a canonical category.
pub fn parent_of(id: i32) -> i32 {
    id - id % 1000
}

/// One native token → canonical category row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryMapping {
    /// The indexer's own category token.
    pub native: String,
    /// Canonical category id.
    pub canonical: i32,
    /// Indexer-side description.
    pub description: Option<String>,
}

impl CategoryMapping {
    pub fn new(native: impl Into<String>, canonical: i32, description: impl Into<String>) -> Self {
        Self {
            native: native.into(),
            canonical,
            description: Some(description.into()),
        }
    }
}

/// Native → canonical category table of one indexer.
///
/// A native token may map to several canonical categories. Lookups of tokens
/// the table does not claim fail with [`IndexerError::Mapping`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryMap {
    mappings: Vec<CategoryMapping>,
}

impl CategoryMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a map where every canonical id is its own native token.
    pub fn standard() -> Self {
        let mut map = Self::new();
        for cat in STANDARD_CATEGORIES {
            map.add(cat.id.to_string(), cat.id, cat.name);
        }
        map
    }

    /// Adds a mapping row.
    pub fn add(&mut self, native: impl Into<String>, canonical: i32, description: impl Into<String>) {
        self.mappings
            .push(CategoryMapping::new(native, canonical, description));
    }

    /// Builder form of [`CategoryMap::add`].
    pub fn with(mut self, native: impl Into<String>, canonical: i32, description: impl Into<String>) -> Self {
        self.add(native, canonical, description);
        self
    }

    pub fn mappings(&self) -> &[CategoryMapping] {
        &self.mappings
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    /// Maps a native token to its canonical categories.
    pub fn category_of(&self, native: &str) -> Result<Vec<i32>> {
        let native = native.trim();
        let mut out: Vec<i32> = Vec::new();
        for mapping in self.mappings.iter().filter(|m| m.native == native) {
            if !out.contains(&mapping.canonical) {
                out.push(mapping.canonical);
            }
        }
        if out.is_empty() {
            return Err(IndexerError::Mapping(native.to_string()));
        }
        Ok(out)
    }

    /// Maps several native tokens, merging the canonical ids in order.
    pub fn categories_of<'a, I>(&self, natives: I) -> Result<Vec<i32>>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut out = Vec::new();
        for native in natives {
            for id in self.category_of(native)? {
                if !out.contains(&id) {
                    out.push(id);
                }
            }
        }
        Ok(out)
    }

    /// Native tokens that cover the requested canonical categories.
    ///
    /// A requested parent selects every native token mapped into its range.
    pub fn native_for(&self, canonical: &[i32]) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for mapping in &self.mappings {
            let wanted = canonical.iter().any(|&cat| {
                cat == mapping.canonical
                    || (cat % 1000 == 0 && parent_of(mapping.canonical) == cat)
            });
            if wanted && !out.contains(&mapping.native) {
                out.push(mapping.native.clone());
            }
        }
        out
    }

    /// Every native token this table claims.
    pub fn claimed_tokens(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for mapping in &self.mappings {
            if !out.contains(&mapping.native.as_str()) {
                out.push(&mapping.native);
            }
        }
        out
    }
}
