//! Camera system

use glam::{Mat4, Vec3};

/// Camera projection type
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Projection {
    Perspective {
        fov_y: f32,
        aspect: f32,
        near: f32,
        far: f32,
    },
    Orthographic {
        left: f32,
        right: f32,
        bottom: f32,
        top: f32,
        near: f32,
        far: f32,
    },
}

impl Default for Projection {
    fn default() -> Self {
        Projection::Perspective {
            fov_y: 75f32.to_radians(),
            aspect: 1.0,
            near: 0.1,
            far: 1000.0,
        }
    }
}

impl Projection {
    pub fn perspective(fov_y_degrees: f32, aspect: f32, near: f32, far: f32) -> Self {
        Projection::Perspective {
            fov_y: fov_y_degrees.to_radians(),
            aspect,
            near,
            far,
        }
    }

    /// Symmetric orthographic frustum with the given half extents
    pub fn orthographic(half_width: f32, half_height: f32, near: f32, far: f32) -> Self {
        Projection::Orthographic {
            left: -half_width,
            right: half_width,
            bottom: -half_height,
            top: half_height,
            near,
            far,
        }
    }

    pub fn matrix(&self) -> Mat4 {
        match self {
            Projection::Perspective {
                fov_y,
                aspect,
                near,
                far,
            } => Mat4::perspective_rh(*fov_y, *aspect, *near, *far),
            Projection::Orthographic {
                left,
                right,
                bottom,
                top,
                near,
                far,
            } => Mat4::orthographic_rh(*left, *right, *bottom, *top, *near, *far),
        }
    }

    pub fn near(&self) -> f32 {
        match self {
            Projection::Perspective { near, .. } => *near,
            Projection::Orthographic { near, .. } => *near,
        }
    }

    pub fn far(&self) -> f32 {
        match self {
            Projection::Perspective { far, .. } => *far,
            Projection::Orthographic { far, .. } => *far,
        }
    }

    pub fn is_orthographic(&self) -> bool {
        matches!(self, Projection::Orthographic { .. })
    }

    pub fn set_aspect(&mut self, aspect: f32) {
        if let Projection::Perspective { aspect: a, .. } = self {
            *a = aspect;
        }
    }
}

/// Orthographic frustum planes (left, right, top, bottom)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frustum {
    pub left: f32,
    pub right: f32,
    pub top: f32,
    pub bottom: f32,
}

/// Camera for viewing the scene
#[derive(Debug, Clone)]
pub struct Camera {
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub projection: Projection,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 2.0, 5.0),
            target: Vec3::ZERO,
            up: Vec3::Y,
            projection: Projection::default(),
        }
    }
}

impl Camera {
    pub fn new(position: Vec3, target: Vec3) -> Self {
        Self {
            position,
            target,
            up: Vec3::Y,
            projection: Projection::default(),
        }
    }

    pub fn with_up(mut self, up: Vec3) -> Self {
        self.up = up;
        self
    }

    pub fn with_projection(mut self, projection: Projection) -> Self {
        self.projection = projection;
        self
    }

    pub fn look_at(&mut self, target: Vec3) {
        self.target = target;
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
    }

    /// Get the view matrix
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, self.up)
    }

    /// Get the projection matrix
    pub fn projection_matrix(&self) -> Mat4 {
        self.projection.matrix()
    }

    /// Get combined view-projection matrix
    pub fn view_projection_matrix(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    /// Get the forward direction
    pub fn forward(&self) -> Vec3 {
        (self.target - self.position).normalize_or_zero()
    }

    /// Distance between the camera and the point it looks at
    pub fn distance_to_target(&self) -> f32 {
        self.position.distance(self.target)
    }

    /// Update aspect ratio for perspective projection
    pub fn set_aspect(&mut self, width: f32, height: f32) {
        let aspect = if height > 0.0 { width / height } else { 1.0 };
        self.projection.set_aspect(aspect);
    }

    /// Replace the planes of an orthographic projection, keeping near/far.
    /// Perspective cameras are left untouched.
    pub fn set_frustum(&mut self, frustum: Frustum) {
        if let Projection::Orthographic {
            left,
            right,
            bottom,
            top,
            ..
        } = &mut self.projection
        {
            *left = frustum.left;
            *right = frustum.right;
            *top = frustum.top;
            *bottom = frustum.bottom;
        }
    }

    /// Current orthographic planes, if the camera is orthographic
    pub fn frustum(&self) -> Option<Frustum> {
        match self.projection {
            Projection::Orthographic {
                left,
                right,
                bottom,
                top,
                ..
            } => Some(Frustum {
                left,
                right,
                top,
                bottom,
            }),
            Projection::Perspective { .. } => None,
        }
    }
}
