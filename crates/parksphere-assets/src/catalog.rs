//! The site catalog: parsed once from the manifest document, then queried by
//! the host UI through the engine.
//!
//! Accepts either a bare JSON array of sites or the `{ "parks": [...],
//! "total": n }` envelope, with numeric or string ids. Entries with invalid
//! coordinates or duplicate ids are dropped with a warning.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

use crate::error::DecodeError;

/// Minimum query length for [`Catalog::search`].
pub const MIN_SEARCH_LEN: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    #[serde(alias = "latitude")]
    pub lat: f64,
    #[serde(alias = "longitude")]
    pub lon: f64,
}

impl Coordinates {
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GalleryImage {
    pub url: String,
    /// Inline placeholder shown while the full image loads.
    #[serde(default)]
    pub blur: Option<String>,
    #[serde(default)]
    pub attribution: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
}

/// One site in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Site {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub name: String,
    #[serde(default, alias = "nps_code")]
    pub code: String,
    #[serde(default)]
    pub country: String,
    pub coordinates: Coordinates,
    #[serde(default, alias = "biome")]
    pub category: String,
    #[serde(default)]
    pub established: Option<i32>,
    #[serde(default)]
    pub area_acres: Option<f64>,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub gallery: Vec<GalleryImage>,
    #[serde(default)]
    pub satellite: Option<String>,
    #[serde(default)]
    pub activities: Vec<String>,
    #[serde(default)]
    pub climate: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Number(i64),
    Text(String),
}

fn deserialize_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match RawId::deserialize(deserializer)? {
        RawId::Number(n) => n.to_string(),
        RawId::Text(s) => s,
    })
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CatalogDocument {
    Envelope {
        #[serde(alias = "sites")]
        parks: Vec<Site>,
        #[serde(default)]
        total: Option<usize>,
    },
    Bare(Vec<Site>),
}

/// Filter for [`Catalog::filter`]. Empty fields match everything.
#[derive(Debug, Clone, Default)]
pub struct SiteFilter {
    pub category: Option<String>,
    pub country: Option<String>,
    pub limit: Option<usize>,
}

/// A name with the number of sites carrying it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Facet {
    pub name: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NamedYear {
    pub name: String,
    pub year: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NamedArea {
    pub name: String,
    pub acres: f64,
}

/// Aggregate figures over the whole catalog.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogStats {
    pub site_count: usize,
    pub category_count: usize,
    pub country_count: usize,
    pub total_area_acres: f64,
    pub oldest: Option<NamedYear>,
    pub largest: Option<NamedArea>,
}

/// Parsed, validated site list with an id index.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    sites: Vec<Site>,
    index: FxHashMap<String, usize>,
}

impl Catalog {
    /// An empty, well-formed catalog.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build from already-parsed sites, dropping invalid and duplicate entries.
    pub fn from_sites(sites: impl IntoIterator<Item = Site>) -> Self {
        let mut catalog = Self::empty();
        for site in sites {
            if !site.coordinates.is_valid() {
                warn!(id = %site.id, "Dropping site with invalid coordinates");
                continue;
            }
            if catalog.index.contains_key(&site.id) {
                warn!(id = %site.id, "Dropping duplicate site id");
                continue;
            }
            catalog.index.insert(site.id.clone(), catalog.sites.len());
            catalog.sites.push(site);
        }
        catalog
    }

    /// Parse a manifest document.
    pub fn from_json(bytes: &[u8]) -> Result<Self, DecodeError> {
        let sites = match serde_json::from_slice::<CatalogDocument>(bytes)? {
            CatalogDocument::Envelope { parks, total } => {
                if let Some(total) = total
                    && total != parks.len()
                {
                    warn!(total, listed = parks.len(), "Catalog total disagrees with entries");
                }
                parks
            }
            CatalogDocument::Bare(sites) => sites,
        };
        Ok(Self::from_sites(sites))
    }

    /// Serialize back to the envelope form.
    pub fn to_json(&self) -> Result<String, DecodeError> {
        #[derive(Serialize)]
        struct Envelope<'a> {
            parks: &'a [Site],
            total: usize,
        }
        Ok(serde_json::to_string(&Envelope {
            parks: &self.sites,
            total: self.sites.len(),
        })?)
    }

    pub fn sites(&self) -> &[Site] {
        &self.sites
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Site> {
        self.index.get(id).map(|&i| &self.sites[i])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Sites matching category and country exactly (case-insensitive), in
    /// catalog order, truncated to `limit`.
    pub fn filter(&self, filter: &SiteFilter) -> Vec<&Site> {
        let matches = |wanted: &Option<String>, value: &str| {
            wanted
                .as_deref()
                .is_none_or(|w| w.is_empty() || w.eq_ignore_ascii_case(value))
        };
        self.sites
            .iter()
            .filter(|s| matches(&filter.category, &s.category))
            .filter(|s| matches(&filter.country, &s.country))
            .take(filter.limit.unwrap_or(usize::MAX))
            .collect()
    }

    /// Case-insensitive substring search over name, code, summary and
    /// country. Queries shorter than [`MIN_SEARCH_LEN`] match nothing.
    pub fn search(&self, query: &str) -> Vec<&Site> {
        let query = query.trim().to_lowercase();
        if query.chars().count() < MIN_SEARCH_LEN {
            return Vec::new();
        }
        self.sites
            .iter()
            .filter(|s| {
                [&s.name, &s.code, &s.summary, &s.country]
                    .iter()
                    .any(|field| field.to_lowercase().contains(&query))
            })
            .collect()
    }

    /// Categories with counts, most common first.
    pub fn categories(&self) -> Vec<Facet> {
        facets(self.sites.iter().map(|s| s.category.as_str()))
    }

    /// Countries with counts, most common first.
    pub fn countries(&self) -> Vec<Facet> {
        facets(self.sites.iter().map(|s| s.country.as_str()))
    }

    pub fn stats(&self) -> CatalogStats {
        let oldest = self
            .sites
            .iter()
            .filter_map(|s| s.established.map(|year| (s, year)))
            .min_by_key(|(_, year)| *year)
            .map(|(s, year)| NamedYear {
                name: s.name.clone(),
                year,
            });
        let largest = self
            .sites
            .iter()
            .filter_map(|s| s.area_acres.filter(|a| a.is_finite()).map(|a| (s, a)))
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(s, acres)| NamedArea {
                name: s.name.clone(),
                acres,
            });
        CatalogStats {
            site_count: self.sites.len(),
            category_count: self.categories().len(),
            country_count: self.countries().len(),
            total_area_acres: self
                .sites
                .iter()
                .filter_map(|s| s.area_acres)
                .filter(|a| a.is_finite())
                .sum(),
            oldest,
            largest,
        }
    }
}

fn facets<'a>(values: impl Iterator<Item = &'a str>) -> Vec<Facet> {
    let mut counts: FxHashMap<&str, usize> = FxHashMap::default();
    for value in values.filter(|v| !v.is_empty()) {
        *counts.entry(value).or_default() += 1;
    }
    let mut facets: Vec<Facet> = counts
        .into_iter()
        .map(|(name, count)| Facet {
            name: name.to_string(),
            count,
        })
        .collect();
    facets.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
    facets
}
