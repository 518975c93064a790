//! Spherical-harmonic layout resolution.

use crate::common::{degree_for_rest_coeffs, n_sh_coeffs};
use crate::error::SplatError;
use crate::ply::PropertyTypeMap;
use tracing::debug;

const DC_PREFIX: &str = "f_dc_";
const REST_PREFIX: &str = "f_rest_";

/// Read order of the SH coefficient properties for the flat output layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShLayout {
    pub degree: u32,
    /// Coefficients per channel, `(degree + 1)^2`.
    pub num_coeffs: usize,
    /// Property names: DC terms for R, G, B, then rest terms interleaved per channel.
    pub order: Vec<String>,
    /// `order` resolved to property indices.
    pub indices: Vec<usize>,
}

/// Infers the SH degree from the number of `f_rest_*` properties and builds
/// the coefficient read order.
pub fn resolve_sh_layout(types: &PropertyTypeMap) -> Result<ShLayout, SplatError> {
    let n_rest_coeffs = types
        .names()
        .filter(|name| name.starts_with(REST_PREFIX))
        .count();
    if n_rest_coeffs % 3 != 0 {
        return Err(SplatError::UnsupportedLayout(format!(
            "{} f_rest_* properties is not a multiple of 3 channels",
            n_rest_coeffs
        )));
    }
    let n_coeffs_per_channel = n_rest_coeffs / 3;
    let degree = degree_for_rest_coeffs(n_coeffs_per_channel).ok_or_else(|| {
        SplatError::UnsupportedLayout(format!(
            "{} rest coefficients per channel does not match any SH degree",
            n_coeffs_per_channel
        ))
    })?;
    let num_coeffs = n_sh_coeffs(degree);

    let mut order = Vec::with_capacity(3 * num_coeffs);
    for rgb in 0..3 {
        order.push(format!("{}{}", DC_PREFIX, rgb));
    }
    for i in 0..n_coeffs_per_channel {
        for rgb in 0..3 {
            order.push(format!("{}{}", REST_PREFIX, rgb * n_coeffs_per_channel + i));
        }
    }
    if order.len() != 3 * num_coeffs {
        return Err(SplatError::UnsupportedLayout(format!(
            "SH layout has {} entries, expected {}",
            order.len(),
            3 * num_coeffs
        )));
    }

    let indices = order
        .iter()
        .map(|name| {
            types.index_of(name).ok_or_else(|| {
                SplatError::UnsupportedLayout(format!("Missing required field: {}", name))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    debug!(degree, num_coeffs, "resolved SH layout");

    Ok(ShLayout {
        degree,
        num_coeffs,
        order,
        indices,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ply::ScalarType;

    fn types_with_rest(n_rest: usize) -> PropertyTypeMap {
        let mut types = PropertyTypeMap::new();
        for name in ["x", "y", "z", "f_dc_0", "f_dc_1", "f_dc_2"] {
            types.push(name, ScalarType::F32).unwrap();
        }
        for i in 0..n_rest {
            types.push(&format!("f_rest_{}", i), ScalarType::F32).unwrap();
        }
        types
    }

    #[test]
    fn test_degree_zero() {
        let layout = resolve_sh_layout(&types_with_rest(0)).expect("degree 0");
        assert_eq!(layout.degree, 0);
        assert_eq!(layout.num_coeffs, 1);
        assert_eq!(layout.order, vec!["f_dc_0", "f_dc_1", "f_dc_2"]);
        assert_eq!(layout.indices, vec![3, 4, 5]);
    }

    #[test]
    fn test_degree_one_ordering() {
        let layout = resolve_sh_layout(&types_with_rest(9)).expect("degree 1");
        assert_eq!(layout.degree, 1);
        assert_eq!(layout.num_coeffs, 4);
        assert_eq!(
            layout.order,
            vec![
                "f_dc_0", "f_dc_1", "f_dc_2", "f_rest_0", "f_rest_3", "f_rest_6", "f_rest_1",
                "f_rest_4", "f_rest_7", "f_rest_2", "f_rest_5", "f_rest_8",
            ]
        );
    }

    #[test]
    fn test_layout_length_matches_degree() {
        for (n_rest, degree) in [(0, 0), (9, 1), (24, 2), (45, 3)] {
            let layout = resolve_sh_layout(&types_with_rest(n_rest)).expect("valid degree");
            assert_eq!(layout.degree, degree);
            let d = degree as usize + 1;
            assert_eq!(layout.num_coeffs, d * d);
            assert_eq!(layout.order.len(), 3 + 3 * (layout.num_coeffs - 1));
            assert_eq!(layout.indices.len(), layout.order.len());
        }
    }

    #[test]
    fn test_rest_count_not_divisible_by_three() {
        let result = resolve_sh_layout(&types_with_rest(10));
        assert!(matches!(result, Err(SplatError::UnsupportedLayout(_))));
    }

    #[test]
    fn test_rest_count_without_integer_degree() {
        // 2 per channel: 3 total coefficients is not a square
        let result = resolve_sh_layout(&types_with_rest(6));
        assert!(matches!(result, Err(SplatError::UnsupportedLayout(_))));
    }

    #[test]
    fn test_missing_rest_index() {
        let mut types = types_with_rest(8);
        types.push("f_rest_extra", ScalarType::F32).unwrap();
        let result = resolve_sh_layout(&types);
        assert!(matches!(result, Err(SplatError::UnsupportedLayout(_))));
    }

    #[test]
    fn test_missing_dc_term() {
        let mut types = PropertyTypeMap::new();
        types.push("f_dc_0", ScalarType::F32).unwrap();
        types.push("f_dc_1", ScalarType::F32).unwrap();
        let result = resolve_sh_layout(&types);
        assert!(matches!(result, Err(SplatError::UnsupportedLayout(_))));
    }
}
