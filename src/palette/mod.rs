//! Thread palette resolution against manufacturer catalogs.
//!
//! Catalogs are built once on first use and never mutated afterwards, so
//! they can be read from any thread without locking.

mod catalogs;

use crate::pattern::Thread;
use crate::types::Rgb;
use indexmap::IndexMap;
use once_cell::sync::Lazy;

/// Brand name of the fallback catalog
pub const GENERIC_BRAND: &str = "Generic";
pub const JANOME_BRAND: &str = "Janome";
pub const BROTHER_BRAND: &str = "Brother";
pub const HUSQVARNA_VIKING_BRAND: &str = "Husqvarna Viking";

/// One thread in a manufacturer catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogEntry {
    pub code: &'static str,
    pub name: &'static str,
    pub color: Rgb,
}

/// An ordered manufacturer thread table keyed by catalog code
#[derive(Debug)]
pub struct Catalog {
    brand: &'static str,
    entries: IndexMap<&'static str, CatalogEntry>,
}

impl Catalog {
    fn from_raw(brand: &'static str, raw: &[catalogs::RawEntry]) -> Self {
        let entries = raw
            .iter()
            .map(|&(code, name, r, g, b)| {
                (
                    code,
                    CatalogEntry {
                        code,
                        name,
                        color: Rgb::new(r, g, b),
                    },
                )
            })
            .collect();
        Catalog { brand, entries }
    }

    pub fn brand(&self) -> &'static str {
        self.brand
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry by catalog code
    pub fn get(&self, code: &str) -> Option<&CatalogEntry> {
        self.entries.get(code)
    }

    /// Entry by position
    pub fn entry(&self, index: usize) -> Option<&CatalogEntry> {
        self.entries.get_index(index).map(|(_, e)| e)
    }

    /// Position of a catalog code
    pub fn index_of(&self, code: &str) -> Option<usize> {
        self.entries.get_index_of(code)
    }

    /// Iterate entries in catalog order
    pub fn iter(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.entries.values()
    }

    /// First entry with exactly this color
    pub fn exact(&self, rgb: Rgb) -> Option<usize> {
        self.iter().position(|e| e.color == rgb)
    }
}

static GENERIC: Lazy<Catalog> = Lazy::new(|| Catalog::from_raw(GENERIC_BRAND, catalogs::GENERIC));
static JANOME: Lazy<Catalog> = Lazy::new(|| Catalog::from_raw(JANOME_BRAND, catalogs::JANOME));
static BROTHER: Lazy<Catalog> = Lazy::new(|| Catalog::from_raw(BROTHER_BRAND, catalogs::BROTHER));
static HUSQVARNA_VIKING: Lazy<Catalog> =
    Lazy::new(|| Catalog::from_raw(HUSQVARNA_VIKING_BRAND, catalogs::HUSQVARNA_VIKING));

/// The fallback catalog
pub fn generic() -> &'static Catalog {
    &GENERIC
}

pub fn janome() -> &'static Catalog {
    &JANOME
}

pub fn brother() -> &'static Catalog {
    &BROTHER
}

pub fn husqvarna_viking() -> &'static Catalog {
    &HUSQVARNA_VIKING
}

/// Catalog for a brand name (case-insensitive), `None` when unknown
pub fn find_catalog(brand: &str) -> Option<&'static Catalog> {
    match brand.trim().to_ascii_lowercase().as_str() {
        "generic" => Some(generic()),
        "janome" => Some(janome()),
        "brother" => Some(brother()),
        "husqvarna viking" | "husqvarna" | "viking" => Some(husqvarna_viking()),
        _ => None,
    }
}

/// Catalog for an optional brand hint, falling back to the generic one
pub fn catalog(brand_hint: Option<&str>) -> &'static Catalog {
    brand_hint.and_then(find_catalog).unwrap_or_else(generic)
}

/// Index of the entry nearest to `rgb` by Euclidean RGB distance.
///
/// Ties go to the earlier entry. Returns 0 for an empty catalog.
pub fn nearest_index(catalog: &Catalog, rgb: Rgb) -> usize {
    let mut best = 0;
    let mut best_distance = u32::MAX;
    for (i, entry) in catalog.iter().enumerate() {
        let d = entry.color.distance_squared(&rgb);
        if d < best_distance {
            best = i;
            best_distance = d;
            if d == 0 {
                break;
            }
        }
    }
    best
}

/// Catalog entry for `rgb`: an exact match if there is one, the nearest otherwise
pub fn resolve_entry(rgb: Rgb, brand_hint: Option<&str>) -> (&'static Catalog, &'static CatalogEntry) {
    let cat = catalog(brand_hint);
    let index = cat.exact(rgb).unwrap_or_else(|| nearest_index(cat, rgb));
    // Built-in catalogs are never empty.
    let entry = cat.entry(index).unwrap_or(&FALLBACK_ENTRY);
    (cat, entry)
}

static FALLBACK_ENTRY: CatalogEntry = CatalogEntry {
    code: "1",
    name: "Black",
    color: Rgb::BLACK,
};

/// Resolve a color to a catalog thread of the hinted brand
pub fn resolve(rgb: Rgb, brand_hint: Option<&str>) -> Thread {
    let (cat, entry) = resolve_entry(rgb, brand_hint);
    Thread::from_catalog(cat, entry)
}
