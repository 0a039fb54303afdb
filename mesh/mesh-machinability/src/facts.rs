//! Per-mesh geometric facts shared by all detectors.
//!
//! Everything here is computed once per analyzed mesh and read from many
//! threads. The ray caster and convex hull are built on first use, since
//! some detector selections never need them.

use std::sync::OnceLock;

use mesh_types::{Aabb, IndexedMesh, MeshBounds, MeshEdge, Point3, Triangle, Vector3};
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::error::{MachinabilityError, MachinabilityResult};
use crate::raycast::RayCaster;

/// Per-face and per-mesh quantities derived from an [`IndexedMesh`].
///
/// Face indices match the source mesh's `faces`.
#[derive(Debug)]
pub struct MeshFacts {
    vertices: Vec<Point3<f64>>,
    triangles: Vec<Triangle>,
    centroids: Vec<Point3<f64>>,
    normals: Vec<Vector3<f64>>,
    areas: Vec<f64>,
    edges: Vec<MeshEdge>,
    bounds: Aabb,
    is_watertight: bool,
    volume: f64,
    vertex_mean: Point3<f64>,
    face_center_mean: Point3<f64>,
    degenerate_faces: usize,
    ray_caster: OnceLock<Option<RayCaster>>,
    convex_hull_volume: OnceLock<Result<f64, String>>,
}

impl MeshFacts {
    /// Derive facts from a mesh.
    ///
    /// Degenerate faces get a zero normal and are counted, not rejected.
    ///
    /// # Errors
    ///
    /// Returns an input error if the mesh has no vertices or faces, a face
    /// references a missing vertex, or a vertex is not finite.
    ///
    /// # Example
    ///
    /// ```
    /// use mesh_machinability::MeshFacts;
    /// use mesh_types::{axis_box, Point3};
    ///
    /// let block = axis_box(Point3::origin(), Point3::new(10.0, 10.0, 10.0));
    /// let facts = MeshFacts::from_mesh(&block).unwrap();
    /// assert_eq!(facts.face_count(), 12);
    /// assert!(facts.is_watertight());
    /// ```
    pub fn from_mesh(mesh: &IndexedMesh) -> MachinabilityResult<Self> {
        if mesh.vertices.is_empty() {
            return Err(MachinabilityError::EmptyMesh);
        }
        if mesh.faces.is_empty() {
            return Err(MachinabilityError::NoFaces);
        }
        if let Some(face) = mesh.first_invalid_face() {
            return Err(MachinabilityError::InvalidFaceIndex { face });
        }
        let non_finite = mesh.vertices.iter().filter(|v| !v.is_finite()).count();
        if non_finite > 0 {
            return Err(MachinabilityError::NonFiniteVertices { count: non_finite });
        }

        let vertices: Vec<Point3<f64>> = mesh.vertices.iter().map(|v| v.position).collect();
        let triangles: Vec<Triangle> = mesh.triangles().collect();

        let per_face: Vec<(Point3<f64>, Option<Vector3<f64>>, f64)> = triangles
            .par_iter()
            .map(|tri| (tri.centroid(), tri.normal(), tri.area()))
            .collect();

        let degenerate_faces = per_face.iter().filter(|(_, n, _)| n.is_none()).count();
        let mut centroids = Vec::with_capacity(per_face.len());
        let mut normals = Vec::with_capacity(per_face.len());
        let mut areas = Vec::with_capacity(per_face.len());
        for (c, n, a) in per_face {
            centroids.push(c);
            normals.push(n.unwrap_or_else(Vector3::zeros));
            areas.push(a);
        }

        if degenerate_faces > 0 {
            warn!(
                degenerate = degenerate_faces,
                "Zero-area faces get a zero normal"
            );
        }

        let is_watertight = mesh.is_watertight();
        if !is_watertight {
            debug!(
                boundary_edges = mesh.boundary_edge_count(),
                "Mesh is open or inconsistently wound"
            );
        }

        let facts = Self {
            vertex_mean: mean_point(&vertices),
            face_center_mean: mean_point(&centroids),
            bounds: mesh.bounds(),
            is_watertight,
            volume: mesh.volume(),
            edges: mesh.unique_edges(),
            vertices,
            triangles,
            centroids,
            normals,
            areas,
            degenerate_faces,
            ray_caster: OnceLock::new(),
            convex_hull_volume: OnceLock::new(),
        };

        info!(
            vertices = facts.vertex_count(),
            faces = facts.face_count(),
            edges = facts.edges.len(),
            watertight = facts.is_watertight,
            "Mesh facts computed"
        );

        Ok(facts)
    }

    /// Number of faces.
    #[must_use]
    pub fn face_count(&self) -> usize {
        self.triangles.len()
    }

    /// Number of vertices.
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Vertex positions.
    #[must_use]
    pub fn vertices(&self) -> &[Point3<f64>] {
        &self.vertices
    }

    /// Resolved face triangles.
    #[must_use]
    pub fn triangles(&self) -> &[Triangle] {
        &self.triangles
    }

    /// Face centroids.
    #[must_use]
    pub fn centroids(&self) -> &[Point3<f64>] {
        &self.centroids
    }

    /// Unit face normals; zero for degenerate faces.
    #[must_use]
    pub fn normals(&self) -> &[Vector3<f64>] {
        &self.normals
    }

    /// Face areas.
    #[must_use]
    pub fn areas(&self) -> &[f64] {
        &self.areas
    }

    /// Unique undirected edges.
    #[must_use]
    pub fn edges(&self) -> &[MeshEdge] {
        &self.edges
    }

    /// Axis-aligned bounds, the stand-in for stock material.
    #[must_use]
    pub const fn bounds(&self) -> &Aabb {
        &self.bounds
    }

    /// Whether every edge is shared by exactly two consistently wound faces.
    #[must_use]
    pub const fn is_watertight(&self) -> bool {
        self.is_watertight
    }

    /// Enclosed volume; meaningful only when watertight.
    #[must_use]
    pub const fn volume(&self) -> f64 {
        self.volume
    }

    /// Mean vertex position.
    #[must_use]
    pub const fn vertex_mean(&self) -> Point3<f64> {
        self.vertex_mean
    }

    /// Mean face centroid.
    #[must_use]
    pub const fn face_center_mean(&self) -> Point3<f64> {
        self.face_center_mean
    }

    /// Faces whose normal could not be computed.
    #[must_use]
    pub const fn degenerate_face_count(&self) -> usize {
        self.degenerate_faces
    }

    /// Ray caster over all faces, built on first use.
    #[must_use]
    pub fn ray_caster(&self) -> Option<&RayCaster> {
        self.ray_caster
            .get_or_init(|| {
                let caster = RayCaster::build(&self.triangles);
                debug!(faces = self.triangles.len(), "Ray caster built");
                caster
            })
            .as_ref()
    }

    /// Volume of the convex hull of all vertices, computed on first use.
    ///
    /// # Errors
    ///
    /// Returns [`MachinabilityError::ConvexHull`] if the vertices are
    /// coplanar, too few, or the hull could not be built.
    pub fn convex_hull_volume(&self) -> MachinabilityResult<f64> {
        self.convex_hull_volume
            .get_or_init(|| hull_volume(&self.vertices))
            .clone()
            .map_err(MachinabilityError::convex_hull)
    }
}

#[allow(clippy::cast_precision_loss)]
fn mean_point(points: &[Point3<f64>]) -> Point3<f64> {
    if points.is_empty() {
        return Point3::origin();
    }
    let sum: Vector3<f64> = points.iter().map(|p| p.coords).sum();
    Point3::from(sum / points.len() as f64)
}

fn hull_volume(vertices: &[Point3<f64>]) -> Result<f64, String> {
    use parry3d_f64::math::Point;
    use parry3d_f64::transformation::try_convex_hull;

    if vertices.len() < 4 {
        return Err(format!("{} vertices cannot span a volume", vertices.len()));
    }

    let points: Vec<Point<f64>> = vertices.iter().map(|p| Point::new(p.x, p.y, p.z)).collect();
    let (hull_points, hull_faces) =
        try_convex_hull(&points).map_err(|err| format!("{err:?}"))?;

    let hull = IndexedMesh::from_parts(
        hull_points
            .iter()
            .map(|p| mesh_types::Vertex::from_coords(p.x, p.y, p.z))
            .collect(),
        hull_faces,
    );
    let volume = hull.volume();

    if volume.is_finite() && volume > f64::EPSILON {
        Ok(volume)
    } else {
        Err(format!("degenerate hull with volume {volume}"))
    }
}
