use std::ops::Range;

use turntable_core::{MaterialCatalog, MaterialConfig, Rgb};

use crate::{Aabb, GeomError, LoadError, TriMesh};

/// A contiguous run of triangles sharing one material slot.
#[derive(Debug, Clone, PartialEq)]
pub struct Surface {
    pub name: String,
    /// Range into the asset's index buffer, always a multiple of three.
    pub indices: Range<usize>,
    /// Base color authored in the model file, used until a material is bound.
    pub fallback_color: Rgb,
    material: Option<MaterialConfig>,
}

impl Surface {
    pub fn new(name: impl Into<String>, indices: Range<usize>, fallback_color: Rgb) -> Self {
        Self {
            name: name.into(),
            indices,
            fallback_color,
            material: None,
        }
    }

    pub fn material(&self) -> Option<&MaterialConfig> {
        self.material.as_ref()
    }
}

/// A loaded model: model-space triangles, material slots and cached bounds.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneAsset {
    name: String,
    mesh: TriMesh,
    surfaces: Vec<Surface>,
    bounds: Aabb,
}

impl SceneAsset {
    /// Builds an asset from in-memory geometry as a single surface.
    ///
    /// Every index must name a vertex; a trailing partial triangle is dropped.
    pub fn from_mesh(name: impl Into<String>, mut mesh: TriMesh) -> Result<Self, LoadError> {
        let name = name.into();
        let count = mesh.positions.len();
        if let Some(&index) = mesh.indices.iter().find(|&&idx| idx as usize >= count) {
            return Err(LoadError::InvalidIndex {
                primitive: name,
                index,
                count,
            });
        }
        let whole = mesh.indices.len() - mesh.indices.len() % 3;
        mesh.indices.truncate(whole);
        if mesh.normals.len() != count {
            mesh.compute_normals();
        }
        let surface = Surface::new(name.clone(), 0..mesh.indices.len(), [0.78, 0.8, 0.84]);
        Ok(Self::from_parts(name, mesh, vec![surface]))
    }

    pub(crate) fn from_parts(name: String, mesh: TriMesh, surfaces: Vec<Surface>) -> Self {
        let bounds = mesh.bounds();
        Self {
            name,
            mesh,
            surfaces,
            bounds,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn mesh(&self) -> &TriMesh {
        &self.mesh
    }

    pub fn surfaces(&self) -> &[Surface] {
        &self.surfaces
    }

    pub fn bounds(&self) -> Aabb {
        self.bounds
    }

    /// Id of the material bound to every surface, if one is.
    pub fn bound_material(&self) -> Option<&str> {
        let first = self.surfaces.first()?.material()?;
        self.surfaces
            .iter()
            .all(|s| s.material().map(|m| m.id.as_str()) == Some(first.id.as_str()))
            .then_some(first.id.as_str())
    }
}

/// Applies a catalog material to every surface of `asset`.
///
/// The catalog's entry replaces whatever was bound before on all surfaces.
/// Returns `false` when the asset already carried exactly that material.
pub fn bind_material(
    asset: &mut SceneAsset,
    catalog: &MaterialCatalog,
    material: &MaterialConfig,
) -> Result<bool, GeomError> {
    let canonical = catalog
        .get(&material.id)
        .ok_or_else(|| GeomError::UnknownMaterial(material.id.clone()))?;

    let mut changed = false;
    for surface in &mut asset.surfaces {
        if surface.material.as_ref() != Some(canonical) {
            surface.material = Some(canonical.clone());
            changed = true;
        }
    }
    if changed {
        tracing::debug!(asset = %asset.name, material = %canonical.id, "material bound");
    }
    Ok(changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::box_mesh;

    fn two_surface_asset() -> SceneAsset {
        let mut mesh = box_mesh([0.0, 0.0, 0.0], [1.0, 1.0, 1.0]);
        mesh.append_transformed(
            &box_mesh([0.0, 0.0, 0.0], [0.2, 0.2, 0.2]),
            glam::Mat4::from_translation(glam::Vec3::Y * 1.5),
        );
        let surfaces = vec![
            Surface::new("band", 0..36, [0.5, 0.5, 0.5]),
            Surface::new("stone", 36..72, [0.9, 0.9, 1.0]),
        ];
        SceneAsset::from_parts("ring".to_string(), mesh, surfaces)
    }

    #[test]
    fn binding_twice_matches_binding_once() {
        let catalog = MaterialCatalog::default();
        let rose = catalog.get("18k-rose-gold").unwrap().clone();

        let mut once = two_surface_asset();
        assert!(bind_material(&mut once, &catalog, &rose).unwrap());

        let mut twice = once.clone();
        assert!(!bind_material(&mut twice, &catalog, &rose).unwrap());
        assert_eq!(once, twice);
        assert_eq!(twice.bound_material(), Some("18k-rose-gold"));
    }

    #[test]
    fn rebinding_overwrites_every_surface() {
        let catalog = MaterialCatalog::default();
        let mut asset = two_surface_asset();
        bind_material(&mut asset, &catalog, catalog.get("platinum").unwrap()).unwrap();
        bind_material(&mut asset, &catalog, catalog.get("18k-yellow-gold").unwrap()).unwrap();
        for surface in asset.surfaces() {
            assert_eq!(surface.material().unwrap().id, "18k-yellow-gold");
        }
    }

    #[test]
    fn binding_uses_catalog_entry_not_caller_copy() {
        let catalog = MaterialCatalog::default();
        let mut tweaked = catalog.get("platinum").unwrap().clone();
        tweaked.roughness = 0.9;
        let mut asset = two_surface_asset();
        bind_material(&mut asset, &catalog, &tweaked).unwrap();
        assert_eq!(asset.surfaces()[0].material(), catalog.get("platinum"));
    }

    #[test]
    fn unknown_material_is_rejected_without_mutation() {
        let catalog = MaterialCatalog::default();
        let mut bronze = catalog.first().clone();
        bronze.id = "bronze".to_string();
        let mut asset = two_surface_asset();
        let before = asset.clone();
        let err = bind_material(&mut asset, &catalog, &bronze).unwrap_err();
        assert!(matches!(err, GeomError::UnknownMaterial(id) if id == "bronze"));
        assert_eq!(asset, before);
    }

    #[test]
    fn from_mesh_rejects_dangling_indices() {
        let mut mesh = box_mesh([0.0, 0.0, 0.0], [1.0, 1.0, 1.0]);
        mesh.indices.extend([0, 1, 99]);
        let err = SceneAsset::from_mesh("cube", mesh).unwrap_err();
        assert!(matches!(
            err,
            LoadError::InvalidIndex { index: 99, count: 8, .. }
        ));

        let mut ragged = box_mesh([0.0, 0.0, 0.0], [1.0, 1.0, 1.0]);
        ragged.indices.extend([0, 1]);
        let asset = SceneAsset::from_mesh("cube", ragged).unwrap();
        assert_eq!(asset.mesh().indices.len(), 36);
        assert_eq!(asset.surfaces()[0].indices, 0..36);
    }

    #[test]
    fn from_mesh_generates_missing_normals() {
        let mut mesh = box_mesh([0.0, 0.0, 0.0], [1.0, 1.0, 1.0]);
        mesh.normals.clear();
        let asset = SceneAsset::from_mesh("cube", mesh).unwrap();
        assert_eq!(asset.mesh().normals.len(), 8);
        assert_eq!(asset.surfaces()[0].indices, 0..36);
        assert_eq!(asset.bound_material(), None);
    }
}
