//! 3D仿射变换
//!
//! 块插入使用的缩放、绕Z轴旋转和平移，以及它们的组合。

use crate::math::{Matrix4, Point3, Vector3};
use serde::{Deserialize, Serialize};

/// 3D仿射变换
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform3D {
    matrix: Matrix4,
}

impl Transform3D {
    /// 创建单位变换
    pub fn identity() -> Self {
        Self {
            matrix: Matrix4::identity(),
        }
    }

    /// 创建平移变换
    pub fn translation(dx: f64, dy: f64, dz: f64) -> Self {
        Self {
            matrix: Matrix4::new_translation(&Vector3::new(dx, dy, dz)),
        }
    }

    /// 创建绕Z轴（过原点）的旋转变换
    pub fn rotation_z(angle: f64) -> Self {
        let cos = angle.cos();
        let sin = angle.sin();
        Self {
            matrix: Matrix4::new(
                cos, -sin, 0.0, 0.0,
                sin, cos, 0.0, 0.0,
                0.0, 0.0, 1.0, 0.0,
                0.0, 0.0, 0.0, 1.0,
            ),
        }
    }

    /// 创建缩放变换（绕原点，各轴独立）
    pub fn scale(sx: f64, sy: f64, sz: f64) -> Self {
        Self {
            matrix: Matrix4::new_nonuniform_scaling(&Vector3::new(sx, sy, sz)),
        }
    }

    /// 组合两个变换（self 在后，other 在前）
    pub fn then(&self, other: &Transform3D) -> Self {
        Self {
            matrix: self.matrix * other.matrix,
        }
    }

    /// 变换一个点
    pub fn transform_point(&self, point: &Point3) -> Point3 {
        self.matrix.transform_point(point)
    }

    /// 变换一个向量（不受平移影响）
    pub fn transform_vector(&self, vector: &Vector3) -> Vector3 {
        self.matrix.transform_vector(vector)
    }

    /// 获取逆变换
    pub fn inverse(&self) -> Option<Self> {
        self.matrix.try_inverse().map(|m| Self { matrix: m })
    }

    /// 获取变换矩阵
    pub fn matrix(&self) -> &Matrix4 {
        &self.matrix
    }
}

impl Default for Transform3D {
    fn default() -> Self {
        Self::identity()
    }
}

impl std::ops::Mul for Transform3D {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self::Output {
        Self {
            matrix: self.matrix * rhs.matrix,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::approx_eq;

    #[test]
    fn test_translation() {
        let t = Transform3D::translation(10.0, 20.0, 30.0);
        let result = t.transform_point(&Point3::new(5.0, 5.0, 5.0));

        assert!(approx_eq(result.x, 15.0));
        assert!(approx_eq(result.y, 25.0));
        assert!(approx_eq(result.z, 35.0));
    }

    #[test]
    fn test_rotation_z() {
        let t = Transform3D::rotation_z(std::f64::consts::FRAC_PI_2);
        let result = t.transform_point(&Point3::new(1.0, 0.0, 2.0));

        assert!(approx_eq(result.x, 0.0));
        assert!(approx_eq(result.y, 1.0));
        assert!(approx_eq(result.z, 2.0));
    }

    #[test]
    fn test_scale_rotate_translate_order() {
        // 先缩放，再旋转，最后平移
        let t = Transform3D::translation(100.0, 0.0, 0.0)
            .then(&Transform3D::rotation_z(std::f64::consts::FRAC_PI_2))
            .then(&Transform3D::scale(2.0, 1.0, 1.0));
        let result = t.transform_point(&Point3::new(1.0, 0.0, 0.0));

        assert!(approx_eq(result.x, 100.0));
        assert!(approx_eq(result.y, 2.0));
    }

    #[test]
    fn test_inverse() {
        let t = Transform3D::translation(10.0, 20.0, 0.0)
            .then(&Transform3D::rotation_z(0.5))
            .then(&Transform3D::scale(2.0, 3.0, 1.0));

        let inv = t.inverse().unwrap();
        let p = Point3::new(100.0, 200.0, 0.0);
        let restored = inv.transform_point(&t.transform_point(&p));

        assert!((restored.x - p.x).abs() < 1e-9);
        assert!((restored.y - p.y).abs() < 1e-9);
    }
}
