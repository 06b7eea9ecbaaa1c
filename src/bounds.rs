//! Bounding volumes of scene content

use glam::{Mat4, Vec3};

use crate::scene::Node;

/// Axis-aligned bounding box. An empty box has `min > max` on every axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Default for Aabb {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl Aabb {
    pub const EMPTY: Self = Self {
        min: Vec3::new(f32::INFINITY, f32::INFINITY, f32::INFINITY),
        max: Vec3::new(f32::NEG_INFINITY, f32::NEG_INFINITY, f32::NEG_INFINITY),
    };

    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Self {
        let mut aabb = Self::EMPTY;
        for point in points {
            aabb.expand_by_point(point);
        }
        aabb
    }

    pub fn make_empty(&mut self) {
        *self = Self::EMPTY;
    }

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    pub fn expand_by_point(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    pub fn union(&mut self, other: &Aabb) {
        if other.is_empty() {
            return;
        }
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }

    /// Center of the box; the origin for an empty box
    pub fn center(&self) -> Vec3 {
        if self.is_empty() {
            Vec3::ZERO
        } else {
            (self.min + self.max) * 0.5
        }
    }

    /// Extent along each axis; zero for an empty box
    pub fn size(&self) -> Vec3 {
        if self.is_empty() {
            Vec3::ZERO
        } else {
            self.max - self.min
        }
    }

    pub fn corners(&self) -> [Vec3; 8] {
        let (a, b) = (self.min, self.max);
        [
            Vec3::new(a.x, a.y, a.z),
            Vec3::new(b.x, a.y, a.z),
            Vec3::new(a.x, b.y, a.z),
            Vec3::new(b.x, b.y, a.z),
            Vec3::new(a.x, a.y, b.z),
            Vec3::new(b.x, a.y, b.z),
            Vec3::new(a.x, b.y, b.z),
            Vec3::new(b.x, b.y, b.z),
        ]
    }

    /// Smallest box enclosing this box after applying `matrix`
    pub fn transformed(&self, matrix: &Mat4) -> Aabb {
        if self.is_empty() {
            return Self::EMPTY;
        }
        Self::from_points(self.corners().map(|corner| matrix.transform_point3(corner)))
    }
}

/// World-space bounds of a subtree
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingVolume {
    pub aabb: Aabb,
    pub center: Vec3,
    pub size: Vec3,
    /// Largest extent of the box, used to frame cameras
    pub characteristic_scale: f32,
}

/// Computes bounding volumes and recenters content.
///
/// Keeps scratch storage reused across calls, so a fitter is meant to be
/// owned by one (single-threaded) caller.
#[derive(Debug, Default)]
pub struct BoundsFitter {
    scratch: Aabb,
    center: Vec3,
    size: Vec3,
}

impl BoundsFitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Minimal world-space box around every mesh below `node` (including the
    /// node's own transform). An empty subtree yields a zero-sized box at the
    /// origin.
    pub fn compute_bounds(&mut self, node: &Node) -> BoundingVolume {
        self.scratch.make_empty();
        let scratch = &mut self.scratch;
        node.visit_meshes(Mat4::IDENTITY, &mut |mesh, world| {
            scratch.union(&mesh.geometry.bounds().transformed(&world));
        });

        if self.scratch.is_empty() {
            self.scratch = Aabb::new(Vec3::ZERO, Vec3::ZERO);
        }
        self.center = self.scratch.center();
        self.size = self.scratch.size();

        BoundingVolume {
            aabb: self.scratch,
            center: self.center,
            size: self.size,
            characteristic_scale: self.size.max_element(),
        }
    }

    /// Translate `node` so its bounding box is centered on the origin.
    /// Returns the translation applied.
    pub fn center_in_place(&mut self, node: &mut Node) -> Vec3 {
        let offset = -self.compute_bounds(node).center;
        node.transform.translate(offset);
        offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::{Geometry, Material};
    use crate::scene::Transform;
    use glam::Quat;
    use std::sync::Arc;

    fn cuboid(w: f32, h: f32, d: f32) -> Node {
        Node::mesh(
            "box",
            Arc::new(Geometry::cuboid(w, h, d)),
            Material::basic(Vec3::ONE).into_shared(),
        )
    }

    #[test]
    fn offset_box_is_recentered() {
        let mut fitter = BoundsFitter::new();
        let mut node = Node::group("model").with_child(
            cuboid(4.0, 2.0, 6.0).with_transform(Transform::from_position(Vec3::new(3.0, -1.0, 7.0))),
        );

        let offset = fitter.center_in_place(&mut node);
        assert!((offset - Vec3::new(-3.0, 1.0, -7.0)).length() < 1e-5);

        let volume = fitter.compute_bounds(&node);
        assert!(volume.center.length() < 1e-4);
        assert!((volume.size - Vec3::new(4.0, 2.0, 6.0)).length() < 1e-5);
        assert_eq!(volume.characteristic_scale, 6.0);
    }

    #[test]
    fn nested_transforms_are_accumulated() {
        let mut fitter = BoundsFitter::new();
        let node = Node::group("model")
            .with_transform(Transform::from_position_rotation_scale(
                Vec3::ZERO,
                Quat::IDENTITY,
                Vec3::splat(2.0),
            ))
            .with_child(cuboid(1.0, 1.0, 1.0).with_transform(Transform::from_position(Vec3::X)));

        let volume = fitter.compute_bounds(&node);
        assert!((volume.center - Vec3::new(2.0, 0.0, 0.0)).length() < 1e-5);
        assert!((volume.size - Vec3::splat(2.0)).length() < 1e-5);
    }

    #[test]
    fn rotation_grows_the_box() {
        let mut fitter = BoundsFitter::new();
        let node = cuboid(2.0, 2.0, 2.0).with_transform(Transform::from_position_rotation_scale(
            Vec3::ZERO,
            Quat::from_rotation_y(std::f32::consts::FRAC_PI_4),
            Vec3::ONE,
        ));
        let volume = fitter.compute_bounds(&node);
        assert!((volume.size.x - 2.0 * std::f32::consts::SQRT_2).abs() < 1e-4);
        assert!((volume.size.y - 2.0).abs() < 1e-5);
    }

    #[test]
    fn empty_subtree_is_a_point_at_origin() {
        let mut fitter = BoundsFitter::new();
        let mut node = Node::group("empty");
        let volume = fitter.compute_bounds(&node);
        assert_eq!(volume.center, Vec3::ZERO);
        assert_eq!(volume.size, Vec3::ZERO);
        assert_eq!(volume.characteristic_scale, 0.0);
        assert_eq!(fitter.center_in_place(&mut node), Vec3::ZERO);
    }

    #[test]
    fn empty_aabb_union_is_identity() {
        let mut aabb = Aabb::new(Vec3::ZERO, Vec3::ONE);
        aabb.union(&Aabb::EMPTY);
        assert_eq!(aabb, Aabb::new(Vec3::ZERO, Vec3::ONE));
        assert!(Aabb::EMPTY.transformed(&Mat4::IDENTITY).is_empty());
    }
}
