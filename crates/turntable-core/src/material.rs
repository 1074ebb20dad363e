//! Fixed catalog of selectable metal finishes.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Linear RGB triple in `[0, 1]`.
pub type Rgb = [f32; 3];

#[derive(Debug, Error, PartialEq)]
pub enum CatalogError {
    #[error("material catalog is empty")]
    Empty,
    #[error("duplicate material id `{0}`")]
    DuplicateId(String),
    #[error("duplicate material slug `{0}`")]
    DuplicateSlug(String),
    #[error("material `{id}` has slug `{slug}`; expected lowercase letters, digits and inner hyphens")]
    InvalidSlug { id: String, slug: String },
    #[error("material `{id}` has out-of-range {field}")]
    OutOfRange { id: String, field: &'static str },
}

/// A named surface preset, e.g. "18K Rose Gold".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialConfig {
    /// Catalog key, e.g. `18k-rose-gold`.
    pub id: String,
    /// Display name shown on the swatch.
    pub name: String,
    /// Token used in archive names, e.g. `rose-gold`.
    pub slug: String,
    pub base_color: Rgb,
    pub metallic: f32,
    pub roughness: f32,
}

impl MaterialConfig {
    fn new(id: &str, name: &str, slug: &str, base_color: Rgb, metallic: f32, roughness: f32) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            slug: slug.to_string(),
            base_color,
            metallic,
            roughness,
        }
    }

    fn validate(&self) -> Result<(), CatalogError> {
        let unit = |v: f32| v.is_finite() && (0.0..=1.0).contains(&v);
        let out_of_range = |field| CatalogError::OutOfRange {
            id: self.id.clone(),
            field,
        };
        if !is_slug(&self.slug) {
            return Err(CatalogError::InvalidSlug {
                id: self.id.clone(),
                slug: self.slug.clone(),
            });
        }
        if !self.base_color.iter().copied().all(unit) {
            return Err(out_of_range("base_color"));
        }
        if !unit(self.metallic) {
            return Err(out_of_range("metallic"));
        }
        if !unit(self.roughness) {
            return Err(out_of_range("roughness"));
        }
        Ok(())
    }
}

/// Slugs end up in archive names, so each one must stay a single path token.
fn is_slug(slug: &str) -> bool {
    !slug.is_empty()
        && !slug.starts_with('-')
        && !slug.ends_with('-')
        && slug
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
}

/// Immutable list of materials; jobs select from it, never add to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<MaterialConfig>", into = "Vec<MaterialConfig>")]
pub struct MaterialCatalog {
    entries: Vec<MaterialConfig>,
}

impl MaterialCatalog {
    pub fn new(entries: Vec<MaterialConfig>) -> Result<Self, CatalogError> {
        if entries.is_empty() {
            return Err(CatalogError::Empty);
        }
        for (idx, entry) in entries.iter().enumerate() {
            entry.validate()?;
            if entries[..idx].iter().any(|prev| prev.id == entry.id) {
                return Err(CatalogError::DuplicateId(entry.id.clone()));
            }
            if entries[..idx].iter().any(|prev| prev.slug == entry.slug) {
                return Err(CatalogError::DuplicateSlug(entry.slug.clone()));
            }
        }
        Ok(Self { entries })
    }

    pub fn get(&self, id: &str) -> Option<&MaterialConfig> {
        self.entries.iter().find(|entry| entry.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn entries(&self) -> &[MaterialConfig] {
        &self.entries
    }

    /// First entry, used as the initial swatch selection.
    pub fn first(&self) -> &MaterialConfig {
        &self.entries[0]
    }
}

impl Default for MaterialCatalog {
    fn default() -> Self {
        Self {
            entries: vec![
                MaterialConfig::new("platinum", "Platinum", "platinum", [0.672, 0.637, 0.585], 1.0, 0.18),
                MaterialConfig::new("18k-white-gold", "18K White Gold", "white-gold", [0.86, 0.85, 0.82], 1.0, 0.2),
                MaterialConfig::new("18k-yellow-gold", "18K Yellow Gold", "yellow-gold", [1.0, 0.766, 0.336], 1.0, 0.22),
                MaterialConfig::new("18k-rose-gold", "18K Rose Gold", "rose-gold", [0.955, 0.637, 0.538], 1.0, 0.22),
            ],
        }
    }
}

impl TryFrom<Vec<MaterialConfig>> for MaterialCatalog {
    type Error = CatalogError;

    fn try_from(entries: Vec<MaterialConfig>) -> Result<Self, Self::Error> {
        Self::new(entries)
    }
}

impl From<MaterialCatalog> for Vec<MaterialConfig> {
    fn from(catalog: MaterialCatalog) -> Self {
        catalog.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_catalog_is_valid() {
        let catalog = MaterialCatalog::default();
        let rebuilt = MaterialCatalog::new(catalog.entries().to_vec()).unwrap();
        assert_eq!(rebuilt, catalog);
        assert_eq!(catalog.get("18k-rose-gold").unwrap().slug, "rose-gold");
        assert!(!catalog.contains("bronze"));
    }

    #[test]
    fn rejects_duplicates_and_bad_values() {
        let gold = MaterialCatalog::default().first().clone();
        assert_eq!(
            MaterialCatalog::new(vec![gold.clone(), gold.clone()]),
            Err(CatalogError::DuplicateId(gold.id.clone()))
        );

        let mut rough = gold;
        rough.roughness = 1.5;
        assert!(matches!(
            MaterialCatalog::new(vec![rough]),
            Err(CatalogError::OutOfRange { field: "roughness", .. })
        ));
        assert_eq!(MaterialCatalog::new(Vec::new()), Err(CatalogError::Empty));
    }

    #[test]
    fn slugs_must_be_unique_path_tokens() {
        let rose = MaterialCatalog::default().get("18k-rose-gold").unwrap().clone();
        let mut fourteen = rose.clone();
        fourteen.id = "14k-rose-gold".into();
        fourteen.name = "14K Rose Gold".into();
        assert_eq!(
            MaterialCatalog::new(vec![fourteen.clone(), rose]),
            Err(CatalogError::DuplicateSlug("rose-gold".into()))
        );

        for slug in ["", "Rose", "rose gold", "rose_gold", "-rose", "rose-", "../rose"] {
            let mut bad = fourteen.clone();
            bad.slug = slug.into();
            assert!(
                matches!(MaterialCatalog::new(vec![bad]), Err(CatalogError::InvalidSlug { .. })),
                "slug {slug:?} accepted"
            );
        }
    }

    #[test]
    fn deserializes_from_list() {
        let json = r#"[{"id":"silver","name":"Sterling Silver","slug":"silver",
            "base_color":[0.97,0.96,0.91],"metallic":1.0,"roughness":0.3}]"#;
        let catalog: MaterialCatalog = serde_json::from_str(json).unwrap();
        assert_eq!(catalog.entries().len(), 1);
        assert!(serde_json::from_str::<MaterialCatalog>("[]").is_err());
    }
}
