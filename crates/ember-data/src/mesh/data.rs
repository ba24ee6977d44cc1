// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! CPU-side mesh data and vertex layouts.

use crate::mesh::MeshHeapError;
use ember_core::renderer::api::IndexType;
use serde::{Deserialize, Serialize};

/// What a vertex attribute holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VertexSemantic {
    /// Object-space position.
    Position,
    /// Surface normal.
    Normal,
    /// Surface tangent.
    Tangent,
    /// Vertex color.
    Color,
    /// Texture coordinates of the given set.
    TexCoord(u8),
}

/// Storage format of a vertex attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VertexFormat {
    /// One `f32`.
    Float32,
    /// Two `f32`.
    Float32x2,
    /// Three `f32`.
    Float32x3,
    /// Four `f32`.
    Float32x4,
    /// Four normalized `u8`.
    Unorm8x4,
}

impl VertexFormat {
    /// Size of the attribute in bytes.
    pub const fn size(self) -> u32 {
        match self {
            VertexFormat::Float32 => 4,
            VertexFormat::Float32x2 => 8,
            VertexFormat::Float32x3 => 12,
            VertexFormat::Float32x4 => 16,
            VertexFormat::Unorm8x4 => 4,
        }
    }
}

/// One attribute of an interleaved vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VertexAttribute {
    /// What the attribute holds.
    pub semantic: VertexSemantic,
    /// How it is stored.
    pub format: VertexFormat,
}

/// The interleaved layout of a vertex: attributes packed in order, no padding.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VertexLayout {
    attributes: Vec<VertexAttribute>,
}

impl VertexLayout {
    /// Creates a layout from its attributes, in memory order.
    pub fn new(attributes: Vec<VertexAttribute>) -> Self {
        Self { attributes }
    }

    /// A layout with a single 3D position.
    pub fn position() -> Self {
        Self::new(vec![VertexAttribute {
            semantic: VertexSemantic::Position,
            format: VertexFormat::Float32x3,
        }])
    }

    /// Position, normal and one set of texture coordinates.
    pub fn position_normal_uv() -> Self {
        Self::new(vec![
            VertexAttribute {
                semantic: VertexSemantic::Position,
                format: VertexFormat::Float32x3,
            },
            VertexAttribute {
                semantic: VertexSemantic::Normal,
                format: VertexFormat::Float32x3,
            },
            VertexAttribute {
                semantic: VertexSemantic::TexCoord(0),
                format: VertexFormat::Float32x2,
            },
        ])
    }

    /// The attributes, in memory order.
    pub fn attributes(&self) -> &[VertexAttribute] {
        &self.attributes
    }

    /// Size of one vertex in bytes.
    pub fn stride(&self) -> u32 {
        self.attributes.iter().map(|a| a.format.size()).sum()
    }

    /// Byte offset of the first attribute with `semantic`.
    pub fn offset_of(&self, semantic: VertexSemantic) -> Option<u32> {
        let mut offset = 0;
        for attribute in &self.attributes {
            if attribute.semantic == semantic {
                return Some(offset);
            }
            offset += attribute.format.size();
        }
        None
    }
}

impl Default for VertexLayout {
    fn default() -> Self {
        Self::position()
    }
}

/// Index data of a mesh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Indices {
    /// 16-bit indices.
    U16(Vec<u16>),
    /// 32-bit indices.
    U32(Vec<u32>),
}

impl Indices {
    /// The matching index type.
    pub fn index_type(&self) -> IndexType {
        match self {
            Indices::U16(_) => IndexType::U16,
            Indices::U32(_) => IndexType::U32,
        }
    }

    /// Number of indices.
    pub fn len(&self) -> usize {
        match self {
            Indices::U16(indices) => indices.len(),
            Indices::U32(indices) => indices.len(),
        }
    }

    /// Returns `true` if there are no indices.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn as_bytes(&self) -> &[u8] {
        match self {
            Indices::U16(indices) => bytemuck::cast_slice(indices),
            Indices::U32(indices) => bytemuck::cast_slice(indices),
        }
    }
}

/// Vertices and indices of one mesh, ready to be uploaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeshData {
    layout: VertexLayout,
    vertices: Vec<u8>,
    indices: Indices,
}

impl MeshData {
    /// Builds mesh data from raw interleaved vertex bytes.
    ///
    /// ## Errors
    /// * `MeshHeapError::InvalidStreamData` - If there are no vertices or the
    ///   byte count is not a multiple of the layout's stride.
    pub fn from_bytes(
        layout: VertexLayout,
        vertices: Vec<u8>,
        indices: Indices,
    ) -> Result<Self, MeshHeapError> {
        let stride = layout.stride() as usize;
        if vertices.is_empty() || stride == 0 || vertices.len() % stride != 0 {
            return Err(MeshHeapError::InvalidStreamData {
                stream: "vertex",
                len: vertices.len(),
                element_size: stride,
            });
        }
        Ok(Self {
            layout,
            vertices,
            indices,
        })
    }

    /// Builds mesh data from typed vertices, which must match the layout's stride.
    pub fn from_vertices<V: bytemuck::Pod>(
        layout: VertexLayout,
        vertices: &[V],
        indices: Indices,
    ) -> Result<Self, MeshHeapError> {
        let actual = std::mem::size_of::<V>() as u32;
        if actual != layout.stride() {
            return Err(MeshHeapError::VertexStrideMismatch {
                expected: layout.stride(),
                actual,
            });
        }
        Self::from_bytes(layout, bytemuck::cast_slice(vertices).to_vec(), indices)
    }

    /// The vertex layout.
    pub fn layout(&self) -> &VertexLayout {
        &self.layout
    }

    /// Interleaved vertex bytes.
    pub fn vertex_bytes(&self) -> &[u8] {
        &self.vertices
    }

    /// Index bytes, in the mesh's index type.
    pub fn index_bytes(&self) -> &[u8] {
        self.indices.as_bytes()
    }

    /// The indices.
    pub fn indices(&self) -> &Indices {
        &self.indices
    }

    /// The index type.
    pub fn index_type(&self) -> IndexType {
        self.indices.index_type()
    }

    /// Number of vertices.
    pub fn num_vertices(&self) -> u32 {
        (self.vertices.len() / self.layout.stride() as usize) as u32
    }

    /// Number of indices.
    pub fn num_indices(&self) -> u32 {
        self.indices.len() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_stride_and_offsets() {
        let layout = VertexLayout::position_normal_uv();
        assert_eq!(layout.stride(), 32);
        assert_eq!(layout.offset_of(VertexSemantic::Normal), Some(12));
        assert_eq!(layout.offset_of(VertexSemantic::TexCoord(0)), Some(24));
        assert_eq!(layout.offset_of(VertexSemantic::Color), None);
    }

    #[test]
    fn test_mesh_counts() {
        let vertices = [[0.0f32; 3]; 4];
        let mesh = MeshData::from_vertices(
            VertexLayout::position(),
            &vertices,
            Indices::U16(vec![0, 1, 2, 2, 3, 0]),
        )
        .unwrap();
        assert_eq!(mesh.num_vertices(), 4);
        assert_eq!(mesh.num_indices(), 6);
        assert_eq!(mesh.index_bytes().len(), 12);
        assert_eq!(mesh.index_type(), IndexType::U16);
    }

    #[test]
    fn test_rejects_bad_streams() {
        assert!(matches!(
            MeshData::from_bytes(VertexLayout::position(), vec![0; 13], Indices::U32(vec![])),
            Err(MeshHeapError::InvalidStreamData { stream: "vertex", len: 13, element_size: 12 })
        ));
        assert!(matches!(
            MeshData::from_vertices(VertexLayout::position(), &[[0.0f32; 2]], Indices::U32(vec![])),
            Err(MeshHeapError::VertexStrideMismatch { expected: 12, actual: 8 })
        ));
    }

    #[test]
    fn test_layout_from_json() {
        let json = r#"{"attributes":[{"semantic":"position","format":"float32x3"},{"semantic":{"tex_coord":1},"format":"float32x2"}]}"#;
        let layout: VertexLayout = serde_json::from_str(json).unwrap();
        assert_eq!(layout.stride(), 20);
        assert_eq!(layout.offset_of(VertexSemantic::TexCoord(1)), Some(12));
    }
}
