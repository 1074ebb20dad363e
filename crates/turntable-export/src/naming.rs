use std::fmt;
use std::str::FromStr;

use crate::ExportError;

const SUFFIX: &str = "-sequence";

/// `{product}-{material}-sequence`, the base name shared by the archive, its
/// directory and every frame file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SequenceName {
    product_slug: String,
    material_slug: String,
}

impl SequenceName {
    pub fn new(product_slug: &str, material_slug: &str) -> Result<Self, ExportError> {
        if !is_product_slug(product_slug) {
            return Err(ExportError::InvalidName(format!(
                "product slug `{product_slug}` must match [a-z0-9_]+"
            )));
        }
        if !is_material_slug(material_slug) {
            return Err(ExportError::InvalidName(format!(
                "material slug `{material_slug}` must match [a-z0-9-]+"
            )));
        }
        Ok(Self {
            product_slug: product_slug.to_string(),
            material_slug: material_slug.to_string(),
        })
    }

    /// Builds the name from free-form product and ring type labels, e.g.
    /// `("Doji Diamond", "ring", "rose-gold")`.
    pub fn for_product(product: &str, ring_type: &str, material_slug: &str) -> Result<Self, ExportError> {
        let joined = if ring_type.trim().is_empty() {
            product.to_string()
        } else {
            format!("{product}_{ring_type}")
        };
        Self::new(&slugify_product(&joined), &slugify_material(material_slug))
    }

    pub fn parse(name: &str) -> Result<Self, ExportError> {
        let invalid = || ExportError::InvalidName(format!("`{name}` is not a sequence name"));
        let stem = name.strip_suffix(SUFFIX).ok_or_else(invalid)?;
        // Product slugs never contain '-', so the first one ends the product.
        let (product, material) = stem.split_once('-').ok_or_else(invalid)?;
        Self::new(product, material)
    }

    pub fn product_slug(&self) -> &str {
        &self.product_slug
    }

    pub fn material_slug(&self) -> &str {
        &self.material_slug
    }
}

impl fmt::Display for SequenceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}{SUFFIX}", self.product_slug, self.material_slug)
    }
}

impl FromStr for SequenceName {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn is_product_slug(s: &str) -> bool {
    !s.is_empty()
        && s.bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_')
}

fn is_material_slug(s: &str) -> bool {
    !s.is_empty()
        && !s.starts_with('-')
        && !s.ends_with('-')
        && s.bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
}

/// Lowercases and joins alphanumeric runs with `_`.
pub fn slugify_product(input: &str) -> String {
    slugify(input, '_')
}

/// Lowercases and joins alphanumeric runs with `-`.
pub fn slugify_material(input: &str) -> String {
    slugify(input, '-')
}

fn slugify(input: &str, sep: char) -> String {
    input
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(str::to_ascii_lowercase)
        .collect::<Vec<_>>()
        .join(&sep.to_string())
}

/// Digits used for frame indices; never fewer than three.
pub(crate) fn index_width(frame_count: usize) -> usize {
    frame_count.saturating_sub(1).to_string().len().max(3)
}

/// `{name}-{index}.png` with the index zero-padded for `frame_count` frames.
pub fn frame_file_name(name: &SequenceName, index: u32, frame_count: usize) -> String {
    let width = index_width(frame_count);
    format!("{name}-{index:0width$}.png")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doji_ring_rose_gold() {
        let name = SequenceName::for_product("doji_diamond", "ring", "rose-gold").unwrap();
        assert_eq!(name.to_string(), "doji_diamond_ring-rose-gold-sequence");
        let parsed = SequenceName::parse("doji_diamond_ring-rose-gold-sequence").unwrap();
        assert_eq!(parsed, name);
        assert_eq!(parsed.product_slug(), "doji_diamond_ring");
        assert_eq!(parsed.material_slug(), "rose-gold");
    }

    #[test]
    fn free_form_labels_are_slugified() {
        let name = SequenceName::for_product("Doji Diamond", "Ring", "Rose Gold").unwrap();
        assert_eq!(name.to_string(), "doji_diamond_ring-rose-gold-sequence");
        assert_eq!(slugify_product("  Halo--Band 2 "), "halo_band_2");
        assert_eq!(slugify_material("18K White_Gold"), "18k-white-gold");
    }

    #[test]
    fn rejects_malformed_names() {
        for bad in [
            "doji_ring-rose-gold",
            "-rose-gold-sequence",
            "doji_ring--sequence",
            "Doji-rose-gold-sequence",
            "doji_ring-rose_gold-sequence",
            "",
        ] {
            assert!(
                matches!(SequenceName::parse(bad), Err(ExportError::InvalidName(_))),
                "{bad}"
            );
        }
        assert!(SequenceName::for_product("", "", "platinum").is_err());
        assert!(SequenceName::for_product("band", "", "!!").is_err());
    }

    #[test]
    fn frame_names_are_zero_padded() {
        let name = SequenceName::new("band", "platinum").unwrap();
        assert_eq!(frame_file_name(&name, 7, 36), "band-platinum-sequence-007.png");
        assert_eq!(frame_file_name(&name, 7, 1200), "band-platinum-sequence-0007.png");
        assert_eq!(index_width(1000), 3);
        assert_eq!(index_width(1001), 4);
    }
}
