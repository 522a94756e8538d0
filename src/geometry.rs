use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use crate::error::{RendererError, Result};
use crate::mesh::Mesh;

/// Interleaved vertex as stored in the vertex buffer.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

impl Vertex {
    /// Byte stride between consecutive vertices.
    pub const STRIDE: u64 = std::mem::size_of::<Self>() as u64;

    const ATTRIBUTES: [wgpu::VertexAttribute; 2] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3];

    /// Layout shared by the shadow and colour pipelines.
    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: Self::STRIDE,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

/// Largest vertex count a 16-bit index buffer can address.
pub const MAX_INDEXED_VERTICES: usize = u16::MAX as usize + 1;

/// CPU-side vertex and index data ready for upload.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PackedGeometry {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u16>,
}

impl PackedGeometry {
    /// Interleaves positions with normals and flattens triangles into 16-bit indices.
    ///
    /// Fails when either the vertex count or the index count exceeds the
    /// 16-bit range.
    pub fn pack(mesh: &Mesh) -> Result<Self> {
        let vertex_count = mesh.vertex_count();
        let index_count = mesh.triangle_count() * 3;
        let overflow = || RendererError::IndexOverflow {
            vertex_count,
            index_count,
            max: MAX_INDEXED_VERTICES,
        };
        if vertex_count > MAX_INDEXED_VERTICES || index_count > MAX_INDEXED_VERTICES {
            return Err(overflow());
        }

        let vertices = mesh
            .positions()
            .iter()
            .zip(mesh.normals())
            .map(|(position, normal)| Vertex {
                position: position.to_array(),
                normal: normal.to_array(),
            })
            .collect();

        let mut indices = Vec::with_capacity(index_count);
        for triangle in mesh.triangles() {
            for &index in triangle {
                indices.push(u16::try_from(index).map_err(|_| overflow())?);
            }
        }

        Ok(Self { vertices, indices })
    }

    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }

    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }
}

/// Immutable vertex and index buffers on the device.
pub struct GeometryBuffers {
    pub vertex: wgpu::Buffer,
    pub index: wgpu::Buffer,
    pub index_count: u32,
}

impl GeometryBuffers {
    pub const INDEX_FORMAT: wgpu::IndexFormat = wgpu::IndexFormat::Uint16;

    /// Binds both buffers and draws `index_count` indices. Slicing an empty
    /// buffer panics, so callers skip empty draws.
    pub fn draw(&self, pass: &mut wgpu::RenderPass<'_>, index_count: u32) {
        pass.set_vertex_buffer(0, self.vertex.slice(..));
        pass.set_index_buffer(self.index.slice(..), Self::INDEX_FORMAT);
        pass.draw_indexed(0..index_count, 0, 0..1);
    }

    pub fn upload(device: &wgpu::Device, packed: &PackedGeometry, label: &str) -> Self {
        let vertex = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label}-vertices")),
            contents: packed.vertex_bytes(),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label}-indices")),
            contents: packed.index_bytes(),
            usage: wgpu::BufferUsages::INDEX,
        });
        Self {
            vertex,
            index,
            index_count: packed.index_count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::{load_mesh_from_str, MeshBuilder, UNIT_CUBE_OBJ};
    use glam::Vec3;

    fn read_f32(bytes: &[u8], offset: usize) -> f32 {
        f32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap())
    }

    #[test]
    fn stride_is_24_bytes() {
        assert_eq!(Vertex::STRIDE, 24);
        assert_eq!(Vertex::layout().attributes[1].offset, 12);
    }

    #[test]
    fn vertex_bytes_pair_position_and_normal() {
        let mut mesh = load_mesh_from_str(UNIT_CUBE_OBJ).unwrap();
        mesh.normalize();
        let packed = PackedGeometry::pack(&mesh).unwrap();
        let bytes = packed.vertex_bytes();
        assert_eq!(bytes.len(), mesh.vertex_count() * 24);
        for (i, (position, normal)) in mesh.positions().iter().zip(mesh.normals()).enumerate() {
            let base = 24 * i;
            for axis in 0..3 {
                assert_eq!(read_f32(bytes, base + axis * 4), position[axis]);
                assert_eq!(read_f32(bytes, base + 12 + axis * 4), normal[axis]);
            }
        }
    }

    #[test]
    fn indices_follow_triangle_order() {
        let mesh = load_mesh_from_str("v 0 0 0\nv 1 0 0\nv 0 1 0\nf 3 1 2\nf 1 2 3\n").unwrap();
        let packed = PackedGeometry::pack(&mesh).unwrap();
        assert_eq!(packed.indices, vec![2, 0, 1, 0, 1, 2]);
        assert_eq!(packed.index_bytes().len(), 12);
    }

    #[test]
    fn too_many_vertices_overflow() {
        let mut builder = MeshBuilder::new();
        for i in 0..=MAX_INDEXED_VERTICES {
            builder.position(Vec3::new(i as f32, 0.0, 0.0));
        }
        let last = MAX_INDEXED_VERTICES as u32;
        builder.triangle(1, [0, 1, last]);
        let mesh = builder.finish().unwrap();
        assert!(matches!(
            PackedGeometry::pack(&mesh),
            Err(RendererError::IndexOverflow { .. })
        ));
    }

    fn repeated_triangle_mesh(triangles: usize) -> Mesh {
        let mut builder = MeshBuilder::new();
        builder
            .position(Vec3::ZERO)
            .position(Vec3::X)
            .position(Vec3::Y);
        for line in 0..triangles {
            builder.triangle(line + 4, [0, 1, 2]);
        }
        builder.finish().unwrap()
    }

    #[test]
    fn index_count_at_limit_packs() {
        let packed = PackedGeometry::pack(&repeated_triangle_mesh(21_845)).unwrap();
        assert_eq!(packed.index_count(), 65_535);
    }

    #[test]
    fn too_many_indices_overflow() {
        let result = PackedGeometry::pack(&repeated_triangle_mesh(21_846));
        assert!(matches!(
            result,
            Err(RendererError::IndexOverflow {
                vertex_count: 3,
                index_count: 65_538,
                ..
            })
        ));
    }
}
