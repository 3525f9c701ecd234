//! Transform stack for nested instancing and linked documents.
//!
//! Instance and link events push affine transforms composed with whatever
//! is already on the stack, so the top is always the effective
//! model-to-world transform at the current traversal depth. Proper
//! push/pop nesting is guaranteed by the driving traversal engine and is
//! not re-verified here.

use glam::{DAffine3, DMat3};

/// Stack of affine transforms, seeded with identity at session start.
#[derive(Debug, Clone)]
pub struct TransformStack {
    stack: Vec<DAffine3>,
}

impl TransformStack {
    #[must_use]
    pub fn new() -> Self {
        Self {
            stack: vec![DAffine3::IDENTITY],
        }
    }

    /// Pushes `current * transform`, composing with the effective
    /// transform at this depth.
    pub fn push_composed(&mut self, transform: DAffine3) {
        let composed = self.current() * transform;
        self.stack.push(composed);
    }

    /// Pushes `transform` without composing.
    pub fn push_raw(&mut self, transform: DAffine3) {
        self.stack.push(transform);
    }

    /// Pops and returns the top transform.
    pub fn pop(&mut self) -> DAffine3 {
        debug_assert!(self.stack.len() > 1, "pop below the session root");
        self.stack.pop().unwrap_or(DAffine3::IDENTITY)
    }

    /// The effective transform at the current depth.
    #[inline]
    #[must_use]
    pub fn current(&self) -> DAffine3 {
        *self.stack.last().unwrap_or(&DAffine3::IDENTITY)
    }

    /// Number of entries above the session root.
    #[inline]
    #[must_use]
    pub fn depth(&self) -> usize {
        self.stack.len().saturating_sub(1)
    }
}

impl Default for TransformStack {
    fn default() -> Self {
        Self::new()
    }
}

/// Column-major 16-value layout of an affine transform:
/// `[Xx,Xy,Xz,0, Yx,Yy,Yz,0, Zx,Zy,Zz,0, Tx,Ty,Tz,1]`.
#[must_use]
pub fn column_major(transform: &DAffine3) -> [f64; 16] {
    let x = transform.matrix3.x_axis;
    let y = transform.matrix3.y_axis;
    let z = transform.matrix3.z_axis;
    let t = transform.translation;
    [
        x.x, x.y, x.z, 0.0, //
        y.x, y.y, y.z, 0.0, //
        z.x, z.y, z.z, 0.0, //
        t.x, t.y, t.z, 1.0,
    ]
}

/// Matrix for transforming normals under `transform`.
///
/// The plain linear part is exact for rotation and uniform scale; under
/// non-uniform scale normals require the inverse-transpose of the linear
/// part. Transformed normals must be renormalized either way.
#[must_use]
pub fn normal_matrix(transform: &DAffine3) -> DMat3 {
    let linear = transform.matrix3;
    let sx = linear.x_axis.length_squared();
    let sy = linear.y_axis.length_squared();
    let sz = linear.z_axis.length_squared();
    let uniform = (sx - sy).abs() < 1.0e-9 && (sy - sz).abs() < 1.0e-9;
    if uniform {
        linear
    } else {
        linear.inverse().transpose()
    }
}

/// Rotation taking Z-up model space to glTF's Y-up convention.
#[must_use]
pub fn z_up_to_y_up() -> DAffine3 {
    DAffine3::from_cols_array(&[
        1.0, 0.0, 0.0, // X stays X
        0.0, 0.0, -1.0, // Y becomes -Z
        0.0, 1.0, 0.0, // Z becomes Y
        0.0, 0.0, 0.0,
    ])
}
