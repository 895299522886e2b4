use bytemuck::{Pod, Zeroable};
use glam::Mat4;

use super::VertexStream;

/// One instancing-buffer element: a 3x4 affine world transform stored as
/// three row vectors, the layout the per-instance vertex stream feeds to the
/// INSTANCEMATRIX1..3 elements.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct InstanceTransform {
    pub rows: [[f32; 4]; 3],
}

impl InstanceTransform {
    pub fn from_matrix(matrix: &Mat4) -> Self {
        let t = matrix.transpose();
        Self {
            rows: [
                t.x_axis.to_array(),
                t.y_axis.to_array(),
                t.z_axis.to_array(),
            ],
        }
    }
}

impl From<&Mat4> for InstanceTransform {
    fn from(matrix: &Mat4) -> Self {
        Self::from_matrix(matrix)
    }
}

/// The shared per-instance transform buffer (a fixed-size discard buffer
/// owned by the graphics layer).
///
/// Writes go through [`write_discard`](Self::write_discard), a scoped
/// acquisition: the implementation locks exactly `count` elements, exposes
/// them as a typed slice, and releases the lock when the closure returns —
/// on success and failure alike, so callers never hold a dangling lock and
/// never see a partially committed region.
pub trait InstancingBuffer {
    /// Capacity in transforms.
    fn transform_count(&self) -> u32;

    /// Stream descriptor for composing this buffer into a draw's vertex
    /// stream list.
    fn stream(&self) -> VertexStream;

    /// Locks `count` elements with discard semantics and passes the writable
    /// view to `fill`. Returns false when the lock fails; nothing is written
    /// and no state is left to restore.
    fn write_discard(&mut self, count: u32, fill: &mut dyn FnMut(&mut [InstanceTransform]))
        -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn instance_transform_stores_row_major_affine() {
        let matrix = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));
        let transform = InstanceTransform::from_matrix(&matrix);
        assert_eq!(transform.rows[0], [1.0, 0.0, 0.0, 1.0]);
        assert_eq!(transform.rows[1], [0.0, 1.0, 0.0, 2.0]);
        assert_eq!(transform.rows[2], [0.0, 0.0, 1.0, 3.0]);
    }

    #[test]
    fn instance_transform_is_48_bytes() {
        assert_eq!(std::mem::size_of::<InstanceTransform>(), 48);
    }
}
