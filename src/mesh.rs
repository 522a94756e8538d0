use glam::{Vec2, Vec3};
use log::{debug, warn};

use crate::error::{RendererError, Result};

/// Largest absolute coordinate a mesh has after [`Mesh::normalize`].
pub const NORMALIZED_EXTENT: f32 = 1.5;

/// Axis-aligned unit cube with outward corner normals, used when no mesh is supplied.
pub const UNIT_CUBE_OBJ: &str = "\
# unit cube
v -0.5 -0.5 -0.5
v 0.5 -0.5 -0.5
v 0.5 0.5 -0.5
v -0.5 0.5 -0.5
v -0.5 -0.5 0.5
v 0.5 -0.5 0.5
v 0.5 0.5 0.5
v -0.5 0.5 0.5
vn -0.57735 -0.57735 -0.57735
vn 0.57735 -0.57735 -0.57735
vn 0.57735 0.57735 -0.57735
vn -0.57735 0.57735 -0.57735
vn -0.57735 -0.57735 0.57735
vn 0.57735 -0.57735 0.57735
vn 0.57735 0.57735 0.57735
vn -0.57735 0.57735 0.57735
f 5//5 6//6 7//7
f 5//5 7//7 8//8
f 2//2 1//1 4//4
f 2//2 4//4 3//3
f 6//6 2//2 3//3
f 6//6 3//3 7//7
f 1//1 5//5 8//8
f 1//1 8//8 4//4
f 8//8 7//7 3//3
f 8//8 3//3 4//4
f 1//1 2//2 6//6
f 1//1 6//6 5//5
";

/// Triangle mesh with one normal and one UV per position.
///
/// Built through [`MeshBuilder`] so every triangle index is known to be in
/// range. Positions change only once, through [`Mesh::normalize`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Mesh {
    positions: Vec<Vec3>,
    normals: Vec<Vec3>,
    triangles: Vec<[u32; 3]>,
    uvs: Vec<Vec2>,
    scale: Option<f32>,
}

impl Mesh {
    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    pub fn normals(&self) -> &[Vec3] {
        &self.normals
    }

    pub fn triangles(&self) -> &[[u32; 3]] {
        &self.triangles
    }

    pub fn uvs(&self) -> &[Vec2] {
        &self.uvs
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    /// Scale applied by [`Mesh::normalize`], if it has run.
    pub fn normalization_scale(&self) -> Option<f32> {
        self.scale
    }

    /// Largest absolute coordinate over every axis of every position.
    pub fn max_abs_coordinate(&self) -> f32 {
        self.positions
            .iter()
            .map(|position| position.abs().max_element())
            .fold(0.0, f32::max)
    }

    /// Uniformly rescales positions so the largest absolute coordinate is
    /// [`NORMALIZED_EXTENT`] and returns the applied factor.
    ///
    /// The rescale happens once; later calls return the stored factor.
    /// Normals are left alone since a uniform scale keeps their direction.
    pub fn normalize(&mut self) -> f32 {
        if let Some(scale) = self.scale {
            return scale;
        }
        let max_coord = self.max_abs_coordinate();
        let scale = if max_coord > f32::EPSILON {
            NORMALIZED_EXTENT / max_coord
        } else {
            warn!("mesh has no extent; skipping normalization");
            1.0
        };
        for position in &mut self.positions {
            *position *= scale;
        }
        debug!("normalized mesh with max coordinate {max_coord} (scale {scale})");
        self.scale = Some(scale);
        scale
    }
}

/// Accumulates mesh records and validates them in [`MeshBuilder::finish`].
#[derive(Debug, Default)]
pub struct MeshBuilder {
    positions: Vec<Vec3>,
    normals: Vec<Vec3>,
    faces: Vec<PendingFace>,
    first_normal_line: Option<usize>,
}

#[derive(Debug, Clone, Copy)]
struct PendingFace {
    line: usize,
    indices: [i64; 3],
}

impl MeshBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn position(&mut self, position: Vec3) -> &mut Self {
        self.positions.push(position);
        self
    }

    pub fn normal(&mut self, normal: Vec3) -> &mut Self {
        self.normals.push(normal);
        self
    }

    /// Adds a triangle of zero-based indices. `line` is reported on validation errors.
    pub fn triangle(&mut self, line: usize, indices: [u32; 3]) -> &mut Self {
        self.faces.push(PendingFace {
            line,
            indices: indices.map(i64::from),
        });
        self
    }

    /// Validates the accumulated records and produces the immutable mesh.
    pub fn finish(self) -> Result<Mesh> {
        let MeshBuilder {
            positions,
            normals,
            faces,
            first_normal_line,
        } = self;

        if positions.is_empty() {
            return Err(RendererError::malformed(0, "mesh does not define any vertices"));
        }

        let vertex_count = positions.len() as i64;
        let mut triangles = Vec::with_capacity(faces.len());
        for face in faces {
            let mut triangle = [0u32; 3];
            for (slot, index) in triangle.iter_mut().zip(face.indices) {
                if !(0..vertex_count).contains(&index) {
                    return Err(RendererError::malformed(
                        face.line,
                        format!(
                            "face references vertex {} but only {vertex_count} are defined",
                            index + 1
                        ),
                    ));
                }
                *slot = index as u32;
            }
            triangles.push(triangle);
        }
        if triangles.is_empty() {
            return Err(RendererError::malformed(0, "mesh does not define any faces"));
        }

        let normals = if normals.is_empty() {
            compute_normals(&positions, &triangles)
        } else if normals.len() != positions.len() {
            return Err(RendererError::malformed(
                first_normal_line.unwrap_or(0),
                format!(
                    "{} normals do not pair with {} positions",
                    normals.len(),
                    positions.len()
                ),
            ));
        } else {
            normals
        };

        let uvs = compute_projected_plane_uvs(&positions, ProjectedPlane::Xy);

        Ok(Mesh {
            positions,
            normals,
            triangles,
            uvs,
            scale: None,
        })
    }
}

/// Parses line-oriented OBJ text (`v`, `vn`, `f` records) into a [`Mesh`].
///
/// Face indices are 1-based; negative indices count back from the last
/// position seen. Only the position sub-field of a face vertex is used,
/// polygons are fanned into triangles and unknown tags are skipped.
pub fn load_mesh_from_str(data: &str) -> Result<Mesh> {
    let mut builder = MeshBuilder::new();

    for (line_no, line) in data.lines().enumerate() {
        let line_no = line_no + 1;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let mut parts = trimmed.split_whitespace();
        let Some(tag) = parts.next() else {
            continue;
        };
        match tag {
            "v" => {
                let position = parse_vec3(parts, line_no)?;
                builder.position(position);
            }
            "vn" => {
                let normal = parse_vec3(parts, line_no)?;
                builder.first_normal_line.get_or_insert(line_no);
                builder.normal(normal);
            }
            "f" => {
                let polygon = parse_face(parts, line_no, builder.positions.len())?;
                for i in 1..(polygon.len() - 1) {
                    builder.faces.push(PendingFace {
                        line: line_no,
                        indices: [polygon[0], polygon[i], polygon[i + 1]],
                    });
                }
            }
            _ => {}
        }
    }

    builder.finish()
}

fn parse_vec3<'a>(mut parts: impl Iterator<Item = &'a str>, line: usize) -> Result<Vec3> {
    let mut component = || -> Result<f32> {
        let token = parts
            .next()
            .ok_or_else(|| RendererError::malformed(line, "expected three components"))?;
        let value = token.parse::<f32>().map_err(|err| {
            RendererError::malformed(line, format!("invalid number {token:?}: {err}"))
        })?;
        if !value.is_finite() {
            return Err(RendererError::malformed(
                line,
                format!("coordinate {token:?} is not finite"),
            ));
        }
        Ok(value)
    };
    let x = component()?;
    let y = component()?;
    let z = component()?;
    Ok(Vec3::new(x, y, z))
}

fn parse_face<'a>(
    parts: impl Iterator<Item = &'a str>,
    line: usize,
    positions_so_far: usize,
) -> Result<Vec<i64>> {
    let mut indices = Vec::new();
    for part in parts {
        let mut segments = part.split('/');
        let vertex = segments.next().unwrap_or_default();
        let vertex = vertex.parse::<i64>().map_err(|err| {
            RendererError::malformed(line, format!("invalid vertex index {vertex:?}: {err}"))
        })?;
        if let Some(texcoord) = segments.next().filter(|s| !s.is_empty()) {
            texcoord.parse::<i64>().map_err(|err| {
                RendererError::malformed(line, format!("invalid texture index {texcoord:?}: {err}"))
            })?;
        }
        let resolved = match vertex {
            0 => return Err(RendererError::malformed(line, "face indices are 1-based")),
            v if v > 0 => v - 1,
            v => positions_so_far as i64 + v,
        };
        indices.push(resolved);
    }
    if indices.len() < 3 {
        return Err(RendererError::malformed(
            line,
            "faces must reference at least 3 vertices",
        ));
    }
    Ok(indices)
}

fn compute_normals(positions: &[Vec3], triangles: &[[u32; 3]]) -> Vec<Vec3> {
    let mut accum = vec![Vec3::ZERO; positions.len()];

    for triangle in triangles {
        let [i0, i1, i2] = triangle.map(|i| i as usize);
        let normal = (positions[i1] - positions[i0]).cross(positions[i2] - positions[i0]);
        if normal.length_squared() > f32::EPSILON {
            let normal = normal.normalize();
            accum[i0] += normal;
            accum[i1] += normal;
            accum[i2] += normal;
        }
    }

    accum.into_iter().map(Vec3::normalize_or_zero).collect()
}

/// Plane positions are projected onto when deriving UVs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectedPlane {
    Xy,
    Xz,
    Yz,
}

/// Projects positions onto `plane` and remaps the bounding rectangle to `[0, 1]²`.
pub fn compute_projected_plane_uvs(positions: &[Vec3], plane: ProjectedPlane) -> Vec<Vec2> {
    let project = |p: &Vec3| match plane {
        ProjectedPlane::Xy => Vec2::new(p.x, p.y),
        ProjectedPlane::Xz => Vec2::new(p.x, p.z),
        ProjectedPlane::Yz => Vec2::new(p.y, p.z),
    };
    let (min, max) = positions.iter().map(project).fold(
        (Vec2::splat(f32::INFINITY), Vec2::splat(f32::NEG_INFINITY)),
        |(min, max), uv| (min.min(uv), max.max(uv)),
    );
    let extent = max - min;
    positions
        .iter()
        .map(|p| {
            let uv = project(p) - min;
            Vec2::new(
                if extent.x > 0.0 { uv.x / extent.x } else { 0.0 },
                if extent.y > 0.0 { uv.y / extent.y } else { 0.0 },
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_triangle() {
        let obj = "\nv 0 0 0\nv 1 0 0\nv 0 1 0\nvn 0 0 1\nvn 0 0 1\nvn 0 0 1\nf 1 2 3\n";
        let mesh = load_mesh_from_str(obj).unwrap();
        assert_eq!(mesh.triangles(), &[[0, 1, 2]]);
        assert_eq!(mesh.vertex_count(), 3);
        assert_eq!(mesh.normals().len(), 3);
    }

    #[test]
    fn face_indices_are_decremented() {
        let obj = "v 0 0 0\nv 1 0 0\nv 0 1 0\nv 1 1 0\nf 4/1/1 2/2/2 3/3/3\n";
        let mesh = load_mesh_from_str(obj).unwrap();
        assert_eq!(mesh.triangles(), &[[3, 1, 2]]);
    }

    #[test]
    fn negative_indices_count_back() {
        let obj = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf -3 -2 -1\n";
        let mesh = load_mesh_from_str(obj).unwrap();
        assert_eq!(mesh.triangles(), &[[0, 1, 2]]);
    }

    #[test]
    fn quads_are_fanned() {
        let obj = "v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nf 1 2 3 4\n";
        let mesh = load_mesh_from_str(obj).unwrap();
        assert_eq!(mesh.triangles(), &[[0, 1, 2], [0, 2, 3]]);
    }

    #[test]
    fn out_of_range_face_is_malformed() {
        let obj = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 9\n";
        match load_mesh_from_str(obj) {
            Err(RendererError::MalformedMesh { line, .. }) => assert_eq!(line, 4),
            other => panic!("expected malformed mesh, got {other:?}"),
        }
    }

    #[test]
    fn short_vertex_is_malformed() {
        let obj = "v 0 0\n";
        assert!(matches!(
            load_mesh_from_str(obj),
            Err(RendererError::MalformedMesh { line: 1, .. })
        ));
    }

    #[test]
    fn two_vertex_face_is_malformed() {
        let obj = "v 0 0 0\nv 1 0 0\nf 1 2\n";
        assert!(matches!(
            load_mesh_from_str(obj),
            Err(RendererError::MalformedMesh { line: 3, .. })
        ));
    }

    #[test]
    fn mismatched_normal_count_is_malformed() {
        let obj = "v 0 0 0\nv 1 0 0\nv 0 1 0\nvn 0 0 1\nf 1 2 3\n";
        assert!(matches!(
            load_mesh_from_str(obj),
            Err(RendererError::MalformedMesh { line: 4, .. })
        ));
    }

    #[test]
    fn empty_source_is_malformed() {
        assert!(load_mesh_from_str("# nothing here\n").is_err());
    }

    #[test]
    fn vertices_without_faces_are_malformed() {
        let obj = "v 0 0 0\nv 1 0 0\nv 0 1 0\n";
        assert!(matches!(
            load_mesh_from_str(obj),
            Err(RendererError::MalformedMesh { line: 0, .. })
        ));
    }

    #[test]
    fn non_finite_coordinates_are_malformed() {
        for token in ["inf", "-inf", "NaN"] {
            let obj = format!("v 0 0 0\nv {token} 0 0\nv 0 1 0\nf 1 2 3\n");
            assert!(matches!(
                load_mesh_from_str(&obj),
                Err(RendererError::MalformedMesh { line: 2, .. })
            ));
        }
    }

    #[test]
    fn unknown_tags_are_ignored() {
        let obj = "o teapot\nv 0 0 0\nv 1 0 0\nv 0 1 0\nvt 0 0\ns off\nf 1 2 3\n";
        let mesh = load_mesh_from_str(obj).unwrap();
        assert_eq!(mesh.triangle_count(), 1);
    }

    #[test]
    fn computes_missing_normals() {
        let obj = "\nv 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n";
        let mesh = load_mesh_from_str(obj).unwrap();
        for normal in mesh.normals() {
            assert!((normal.length() - 1.0).abs() < 1e-5);
            assert!((normal.z - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn normalize_fits_extent() {
        let obj = "v 4 -2 1\nv -8 3 0.5\nv 0 6 -1\nf 1 2 3\n";
        let mut mesh = load_mesh_from_str(obj).unwrap();
        let scale = mesh.normalize();
        assert!((scale - 1.5 / 8.0).abs() < 1e-6);
        assert!((mesh.max_abs_coordinate() - NORMALIZED_EXTENT).abs() < 1e-5);
        for position in mesh.positions() {
            assert!(position.abs().max_element() <= NORMALIZED_EXTENT + 1e-5);
        }
    }

    #[test]
    fn normalize_runs_once() {
        let mut mesh = load_mesh_from_str("v 3 0 0\nv 0 1 0\nv 0 0 1\nf 1 2 3\n").unwrap();
        let first = mesh.normalize();
        let snapshot = mesh.positions().to_vec();
        let second = mesh.normalize();
        assert_eq!(first, second);
        assert_eq!(mesh.positions(), snapshot.as_slice());
    }

    #[test]
    fn flat_mesh_is_left_unscaled() {
        let mut mesh = load_mesh_from_str("v 0 0 0\nv 0 0 0\nv 0 0 0\nf 1 2 3\n").unwrap();
        assert_eq!(mesh.normalize(), 1.0);
    }

    #[test]
    fn uvs_cover_unit_square() {
        let positions = [
            Vec3::new(-2.0, 1.0, 0.0),
            Vec3::new(2.0, 1.0, 0.0),
            Vec3::new(0.0, 3.0, 0.0),
        ];
        let uvs = compute_projected_plane_uvs(&positions, ProjectedPlane::Xy);
        assert_eq!(uvs[0], Vec2::new(0.0, 0.0));
        assert_eq!(uvs[1], Vec2::new(1.0, 0.0));
        assert_eq!(uvs[2], Vec2::new(0.5, 1.0));
    }

    #[test]
    fn builder_rejects_out_of_range_triangle() {
        let mut builder = MeshBuilder::new();
        builder
            .position(Vec3::ZERO)
            .position(Vec3::X)
            .position(Vec3::Y)
            .triangle(7, [0, 1, 3]);
        assert!(matches!(
            builder.finish(),
            Err(RendererError::MalformedMesh { line: 7, .. })
        ));
    }

    #[test]
    fn unit_cube_is_well_formed() {
        let mesh = load_mesh_from_str(UNIT_CUBE_OBJ).unwrap();
        assert_eq!(mesh.vertex_count(), 8);
        assert_eq!(mesh.triangle_count(), 12);
        for (position, normal) in mesh.positions().iter().zip(mesh.normals()) {
            assert!(position.dot(*normal) > 0.0);
        }
    }
}
