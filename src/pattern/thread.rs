//! Thread entries of a pattern's palette

use crate::palette::{self, Catalog, CatalogEntry};
use crate::types::Rgb;
use std::fmt;

/// A thread: display color plus optional manufacturer identification
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Thread {
    pub color: Rgb,
    /// Manufacturer catalog code
    pub catalog_code: Option<String>,
    /// Manufacturer (catalog brand) name
    pub brand: Option<String>,
    pub description: Option<String>,
}

impl Thread {
    /// A thread known only by its color
    pub fn new(color: Rgb) -> Self {
        Thread {
            color,
            ..Default::default()
        }
    }

    /// A thread identified by brand and catalog code
    pub fn with_catalog(color: Rgb, brand: impl Into<String>, code: impl Into<String>) -> Self {
        Thread {
            color,
            catalog_code: Some(code.into()),
            brand: Some(brand.into()),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Thread taken directly from a catalog entry
    pub fn from_catalog(catalog: &Catalog, entry: &CatalogEntry) -> Self {
        Thread {
            color: entry.color,
            catalog_code: Some(entry.code.to_string()),
            brand: Some(catalog.brand().to_string()),
            description: Some(entry.name.to_string()),
        }
    }

    /// Catalog entry this thread stands for.
    ///
    /// A known brand with a matching code yields that entry; otherwise the
    /// entry nearest to `color` in the brand's catalog (the generic catalog
    /// for unknown brands).
    pub fn catalog_entry(&self) -> &'static CatalogEntry {
        if let (Some(brand), Some(code)) = (self.brand.as_deref(), self.catalog_code.as_deref()) {
            if let Some(entry) = palette::find_catalog(brand).and_then(|c| c.get(code)) {
                return entry;
            }
        }
        palette::resolve_entry(self.color, self.brand.as_deref()).1
    }

    /// Description, falling back to the resolved catalog name
    pub fn display_name(&self) -> String {
        match &self.description {
            Some(d) if !d.is_empty() => d.clone(),
            _ => self.catalog_entry().name.to_string(),
        }
    }
}

impl fmt::Display for Thread {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.color, self.display_name())?;
        if let Some(brand) = &self.brand {
            write!(f, " ({}", brand)?;
            if let Some(code) = &self.catalog_code {
                write!(f, " {}", code)?;
            }
            write!(f, ")")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_entry_by_code() {
        let t = Thread::with_catalog(Rgb::new(1, 2, 3), "Janome", "225");
        assert_eq!(t.catalog_entry().name, "Red");
    }

    #[test]
    fn test_catalog_entry_unknown_brand() {
        let t = Thread::with_catalog(Rgb::new(255, 0, 0), "X", "1");
        let entry = t.catalog_entry();
        assert_eq!(entry.name, "Red");
        assert_eq!(entry.color, Rgb::new(255, 0, 0));
    }

    #[test]
    fn test_display() {
        let t = Thread::with_catalog(Rgb::new(255, 0, 0), "Janome", "225");
        assert_eq!(t.to_string(), "#FF0000 Red (Janome 225)");
        assert_eq!(Thread::new(Rgb::BLACK).to_string(), "#000000 Black");
    }
}
