use glam::{DMat3, DQuat, DVec3};

/// Rotation as consumed by [`build_cov`] from the stored `rot_0..rot_3`
/// properties, which hold (w, x, y, z).
#[inline]
pub fn rotation_from_stored(rot_0: f64, rot_1: f64, rot_2: f64, rot_3: f64) -> DQuat {
    DQuat::from_xyzw(rot_1, rot_2, rot_3, rot_0)
}

/// Upper triangle `[m00, m01, m02, m11, m12, m22]` of `(R S)(R S)^T`.
///
/// `scale` must already be exponentiated. The quaternion is used as given;
/// a non-unit input produces a defined but meaningless matrix.
pub fn build_cov(rot: DQuat, scale: DVec3) -> [f64; 6] {
    let r = DMat3::from_quat(rot);
    let s = DMat3::from_diagonal(scale);
    let l = r * s;
    let m = l * l.transpose();
    // column-major, symmetric
    [
        m.x_axis.x, m.x_axis.y, m.x_axis.z, m.y_axis.y, m.y_axis.z, m.z_axis.z,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_1_SQRT_2;

    fn assert_close(actual: [f64; 6], expected: [f64; 6]) {
        for (a, e) in actual.iter().zip(expected.iter()) {
            assert!((a - e).abs() < 1e-12, "got {:?}, expected {:?}", actual, expected);
        }
    }

    #[test]
    fn test_identity_rotation() {
        let cov = build_cov(DQuat::IDENTITY, DVec3::new(2.0, 3.0, 0.5));
        assert_close(cov, [4.0, 0.0, 0.0, 9.0, 0.0, 0.25]);
    }

    #[test]
    fn test_stored_identity_is_w_first() {
        let rot = rotation_from_stored(1.0, 0.0, 0.0, 0.0);
        assert_eq!(rot, DQuat::IDENTITY);
    }

    #[test]
    fn test_quarter_turn_about_z() {
        // stored (w, x, y, z) for 90 degrees about +z
        let rot = rotation_from_stored(FRAC_1_SQRT_2, 0.0, 0.0, FRAC_1_SQRT_2);
        let cov = build_cov(rot, DVec3::new(2.0, 3.0, 5.0));
        // x and y extents swap
        assert_close(cov, [9.0, 0.0, 0.0, 4.0, 0.0, 25.0]);
    }

    #[test]
    fn test_quarter_turn_about_x() {
        let rot = rotation_from_stored(FRAC_1_SQRT_2, FRAC_1_SQRT_2, 0.0, 0.0);
        let cov = build_cov(rot, DVec3::new(2.0, 3.0, 5.0));
        assert_close(cov, [4.0, 0.0, 0.0, 25.0, 0.0, 9.0]);
    }

    #[test]
    fn test_off_diagonal_terms() {
        // 45 degrees about z with unequal scales couples x and y
        let half = std::f64::consts::FRAC_PI_8;
        let rot = DQuat::from_xyzw(0.0, 0.0, half.sin(), half.cos());
        let cov = build_cov(rot, DVec3::new(2.0, 1.0, 1.0));
        // R diag(4,1,1) R^T with R a 45 degree turn
        assert_close(cov, [2.5, 1.5, 0.0, 2.5, 0.0, 1.0]);
    }
}
