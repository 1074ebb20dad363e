//! glTF / glb loading into a flattened [`SceneAsset`].

use std::collections::HashSet;

use glam::Mat4;
use gltf::mesh::Mode;
use thiserror::Error;

use crate::{SceneAsset, Surface, TriMesh};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("not a valid glTF model: {0}")]
    Parse(#[from] gltf::Error),
    #[error("model contains no renderable triangle geometry")]
    NoRenderableGeometry,
    #[error("primitive `{primitive}` references vertex {index} but has {count} vertices")]
    InvalidIndex {
        primitive: String,
        index: u32,
        count: usize,
    },
    #[error("node {node} is reachable more than once; the node hierarchy must be a tree")]
    NodeCycle { node: usize },
}

/// Parses glb (or self-contained glTF JSON) bytes into a scene asset.
///
/// Every triangle primitive reachable from the default scene is transformed
/// into model space; each primitive becomes one surface slot.
pub fn load(model_bytes: &[u8]) -> Result<SceneAsset, LoadError> {
    let gltf::Gltf { document, blob } = gltf::Gltf::from_slice(model_bytes)?;
    let buffers = gltf::import_buffers(&document, None, blob)?;

    let Some(scene) = document.default_scene().or_else(|| document.scenes().next()) else {
        return Err(LoadError::NoRenderableGeometry);
    };

    let mut builder = AssetBuilder::default();
    builder.walk(scene.nodes(), &buffers)?;

    let name = scene
        .name()
        .or_else(|| document.meshes().find_map(|mesh| mesh.name()))
        .unwrap_or("model")
        .to_string();
    let asset = builder.finish(name)?;
    tracing::info!(
        asset = asset.name(),
        triangles = asset.mesh().triangle_count(),
        surfaces = asset.surfaces().len(),
        "model loaded"
    );
    Ok(asset)
}

#[derive(Default)]
struct AssetBuilder {
    mesh: TriMesh,
    surfaces: Vec<Surface>,
}

impl AssetBuilder {
    /// Depth-first over the node forest with an explicit stack, in document
    /// order. A node seen twice (a cycle or a shared child) is rejected.
    fn walk<'a>(
        &mut self,
        roots: impl Iterator<Item = gltf::Node<'a>>,
        buffers: &[gltf::buffer::Data],
    ) -> Result<(), LoadError> {
        let mut seen = HashSet::new();
        let mut pending: Vec<(gltf::Node<'a>, Mat4)> =
            roots.map(|node| (node, Mat4::IDENTITY)).collect();
        pending.reverse();

        while let Some((node, parent)) = pending.pop() {
            if !seen.insert(node.index()) {
                return Err(LoadError::NodeCycle { node: node.index() });
            }
            let transform = parent * Mat4::from_cols_array_2d(&node.transform().matrix());
            self.visit(&node, transform, buffers)?;
            let first_child = pending.len();
            pending.extend(node.children().map(|child| (child, transform)));
            pending[first_child..].reverse();
        }
        Ok(())
    }

    fn visit(
        &mut self,
        node: &gltf::Node,
        transform: Mat4,
        buffers: &[gltf::buffer::Data],
    ) -> Result<(), LoadError> {
        if let Some(mesh) = node.mesh() {
            for (prim_idx, primitive) in mesh.primitives().enumerate() {
                if primitive.mode() != Mode::Triangles {
                    continue;
                }
                let label = format!("{}#{prim_idx}", mesh.name().unwrap_or("mesh"));
                let Some(local) = read_primitive(&primitive, buffers, &label)? else {
                    continue;
                };
                if local.indices.is_empty() {
                    continue;
                }

                let start = self.mesh.indices.len();
                self.mesh.append_transformed(&local, transform);
                let end = self.mesh.indices.len();

                let material = primitive.material();
                let [r, g, b, _] = material.pbr_metallic_roughness().base_color_factor();
                let name = material.name().map(str::to_string).unwrap_or(label);
                self.surfaces.push(Surface::new(name, start..end, [r, g, b]));
            }
        }
        Ok(())
    }

    fn finish(self, name: String) -> Result<SceneAsset, LoadError> {
        if self.surfaces.is_empty() || self.mesh.indices.is_empty() {
            return Err(LoadError::NoRenderableGeometry);
        }
        Ok(SceneAsset::from_parts(name, self.mesh, self.surfaces))
    }
}

fn read_primitive(
    primitive: &gltf::Primitive,
    buffers: &[gltf::buffer::Data],
    label: &str,
) -> Result<Option<TriMesh>, LoadError> {
    let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(|data| data.0.as_slice()));
    let Some(positions) = reader.read_positions() else {
        return Ok(None);
    };
    let positions: Vec<[f32; 3]> = positions.collect();
    let count = positions.len();

    let indices: Vec<u32> = match reader.read_indices() {
        Some(indices) => indices.into_u32().collect(),
        None => (0..count as u32).collect(),
    };
    if let Some(&index) = indices.iter().find(|&&idx| idx as usize >= count) {
        return Err(LoadError::InvalidIndex {
            primitive: label.to_string(),
            index,
            count,
        });
    }
    // Drop a trailing partial triangle rather than misreading it.
    let whole = indices.len() - indices.len() % 3;

    let mut mesh = TriMesh {
        positions,
        normals: Vec::new(),
        indices: indices[..whole].to_vec(),
    };
    match reader.read_normals() {
        Some(normals) => {
            mesh.normals = normals.collect();
            if mesh.normals.len() != count {
                mesh.compute_normals();
            }
        }
        None => mesh.compute_normals(),
    }
    Ok(Some(mesh))
}

#[cfg(test)]
pub(crate) mod glb {
    //! Minimal GLB writer for test fixtures.

    use serde_json::json;

    pub struct Primitive<'a> {
        pub positions: &'a [[f32; 3]],
        pub indices: &'a [u16],
        pub translation: [f32; 3],
    }

    pub fn build(primitives: &[Primitive]) -> Vec<u8> {
        let mut bin = Vec::new();
        let mut views = Vec::new();
        let mut accessors = Vec::new();
        let mut meshes = Vec::new();
        let mut nodes = Vec::new();

        for (idx, prim) in primitives.iter().enumerate() {
            let pos_offset = bin.len();
            for p in prim.positions {
                for c in p {
                    bin.extend_from_slice(&c.to_le_bytes());
                }
            }
            let pos_len = bin.len() - pos_offset;
            let idx_offset = bin.len();
            for i in prim.indices {
                bin.extend_from_slice(&i.to_le_bytes());
            }
            let idx_len = bin.len() - idx_offset;
            while bin.len() % 4 != 0 {
                bin.push(0);
            }

            let mut min = [f32::INFINITY; 3];
            let mut max = [f32::NEG_INFINITY; 3];
            for p in prim.positions {
                for axis in 0..3 {
                    min[axis] = min[axis].min(p[axis]);
                    max[axis] = max[axis].max(p[axis]);
                }
            }

            views.push(json!({"buffer": 0, "byteOffset": pos_offset, "byteLength": pos_len}));
            views.push(json!({"buffer": 0, "byteOffset": idx_offset, "byteLength": idx_len}));
            accessors.push(json!({
                "bufferView": 2 * idx, "componentType": 5126, "count": prim.positions.len(),
                "type": "VEC3", "min": min, "max": max
            }));
            accessors.push(json!({
                "bufferView": 2 * idx + 1, "componentType": 5123,
                "count": prim.indices.len(), "type": "SCALAR"
            }));
            meshes.push(json!({
                "name": format!("part{idx}"),
                "primitives": [{
                    "attributes": {"POSITION": 2 * idx},
                    "indices": 2 * idx + 1,
                    "material": 0
                }]
            }));
            nodes.push(json!({"mesh": idx, "translation": prim.translation}));
        }

        let node_ids: Vec<usize> = (0..primitives.len()).collect();
        let doc = json!({
            "asset": {"version": "2.0"},
            "scene": 0,
            "scenes": [{"name": "ring", "nodes": node_ids}],
            "nodes": nodes,
            "meshes": meshes,
            "materials": [{
                "name": "metal",
                "pbrMetallicRoughness": {"baseColorFactor": [0.8, 0.7, 0.2, 1.0]}
            }],
            "buffers": [{"byteLength": bin.len()}],
            "bufferViews": views,
            "accessors": accessors
        });

        let mut json_chunk = serde_json::to_vec(&doc).unwrap();
        while json_chunk.len() % 4 != 0 {
            json_chunk.push(b' ');
        }

        let total = 12 + 8 + json_chunk.len() + 8 + bin.len();
        let mut out = Vec::with_capacity(total);
        out.extend_from_slice(b"glTF");
        out.extend_from_slice(&2u32.to_le_bytes());
        out.extend_from_slice(&(total as u32).to_le_bytes());
        out.extend_from_slice(&(json_chunk.len() as u32).to_le_bytes());
        out.extend_from_slice(b"JSON");
        out.extend_from_slice(&json_chunk);
        out.extend_from_slice(&(bin.len() as u32).to_le_bytes());
        out.extend_from_slice(b"BIN\0");
        out.extend_from_slice(&bin);
        out
    }
}
