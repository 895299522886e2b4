use glam::{Mat3, Mat4, Quat, Vec3};

/// Read-only view of the camera a batch renders through.
///
/// Owned by the view/culling layer; batches borrow it for the frame.
#[derive(Debug, Clone)]
pub struct Camera {
    world_position: Vec3,
    world_rotation: Quat,
    projection: Mat4,
    near_clip: f32,
    far_clip: f32,
}

impl Camera {
    pub fn new(
        world_position: Vec3,
        world_rotation: Quat,
        projection: Mat4,
        near_clip: f32,
        far_clip: f32,
    ) -> Self {
        Self {
            world_position,
            world_rotation,
            projection,
            near_clip,
            far_clip,
        }
    }

    pub fn world_position(&self) -> Vec3 {
        self.world_position
    }

    pub fn world_rotation(&self) -> Quat {
        self.world_rotation
    }

    pub fn rotation_matrix(&self) -> Mat3 {
        Mat3::from_quat(self.world_rotation)
    }

    pub fn projection(&self) -> Mat4 {
        self.projection
    }

    pub fn near_clip(&self) -> f32 {
        self.near_clip
    }

    pub fn far_clip(&self) -> f32 {
        self.far_clip
    }

    pub fn world_transform(&self) -> Mat4 {
        Mat4::from_rotation_translation(self.world_rotation, self.world_position)
    }

    pub fn inverse_world_transform(&self) -> Mat4 {
        self.world_transform().inverse()
    }

    /// Combined projection * view, the standard vertex transform.
    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.inverse_world_transform()
    }

    pub fn right(&self) -> Vec3 {
        self.world_rotation * Vec3::X
    }

    pub fn up(&self) -> Vec3 {
        self.world_rotation * Vec3::Y
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn view_projection_cancels_camera_transform() {
        let camera = Camera::new(
            Vec3::new(3.0, 4.0, 5.0),
            Quat::from_rotation_y(0.7),
            Mat4::IDENTITY,
            0.1,
            100.0,
        );
        // A point at the camera position lands at the view-space origin.
        let projected = camera.view_projection() * camera.world_position().extend(1.0);
        assert!(projected.truncate().length() < 1e-5);
    }

    #[test]
    fn basis_vectors_follow_rotation() {
        let camera = Camera::new(
            Vec3::ZERO,
            Quat::from_rotation_z(std::f32::consts::FRAC_PI_2),
            Mat4::IDENTITY,
            0.1,
            10.0,
        );
        assert!(camera.right().abs_diff_eq(Vec3::Y, 1e-6));
        assert!(camera.up().abs_diff_eq(-Vec3::X, 1e-6));
    }
}
