use crate::common::{float_to_half, sigmoid, GAUSSIAN_3D_SLOTS};
use crate::covariance::{build_cov, rotation_from_stored};
use crate::error::SplatError;
use crate::ply::{read_raw_vertex, PropertyTypeMap, RawVertex};
use crate::sh::ShLayout;
use glam::DVec3;
use half::f16;

/// Record indices of the per-point fields, resolved once per file.
#[derive(Debug, Clone, Copy)]
pub struct SplatFields {
    x: usize,
    y: usize,
    z: usize,
    opacity: usize,
    rot: [usize; 4],
    scale: [usize; 3],
}

#[inline(always)]
fn idx_of(types: &PropertyTypeMap, name: &str) -> Result<usize, SplatError> {
    types
        .index_of(name)
        .ok_or_else(|| SplatError::UnsupportedLayout(format!("Missing required field: {}", name)))
}

impl SplatFields {
    pub fn resolve(types: &PropertyTypeMap) -> Result<Self, SplatError> {
        Ok(Self {
            x: idx_of(types, "x")?,
            y: idx_of(types, "y")?,
            z: idx_of(types, "z")?,
            opacity: idx_of(types, "opacity")?,
            rot: [
                idx_of(types, "rot_0")?,
                idx_of(types, "rot_1")?,
                idx_of(types, "rot_2")?,
                idx_of(types, "rot_3")?,
            ],
            scale: [
                idx_of(types, "scale_0")?,
                idx_of(types, "scale_1")?,
                idx_of(types, "scale_2")?,
            ],
        })
    }
}

/// Writes one point's position, opacity and covariance into `out`
/// (at least 10 slots).
fn write_gaussian(vertex: &RawVertex, fields: &SplatFields, out: &mut [f16]) {
    let rot = rotation_from_stored(
        vertex.value(fields.rot[0]),
        vertex.value(fields.rot[1]),
        vertex.value(fields.rot[2]),
        vertex.value(fields.rot[3]),
    );
    let scale = DVec3::new(
        vertex.value(fields.scale[0]).exp(),
        vertex.value(fields.scale[1]).exp(),
        vertex.value(fields.scale[2]).exp(),
    );
    let cov = build_cov(rot, scale);

    out[0] = float_to_half(vertex.value(fields.x));
    out[1] = float_to_half(vertex.value(fields.y));
    out[2] = float_to_half(vertex.value(fields.z));
    // sigmoid applied twice
    out[3] = float_to_half(sigmoid(sigmoid(vertex.value(fields.opacity))));
    for (dst, &c) in out[4..10].iter_mut().zip(cov.iter()) {
        *dst = float_to_half(c);
    }
}

/// Reads `vertex_count` records from `vertex_data` in order and writes the
/// packed gaussians and SH coefficients. Returns the number of bytes consumed.
///
/// Both destinations must be sized exactly for `vertex_count` points. On error
/// their contents are unspecified.
pub fn transcode_points(
    vertex_count: usize,
    vertex_data: &[u8],
    types: &PropertyTypeMap,
    fields: &SplatFields,
    sh_layout: &ShLayout,
    gaussians: &mut [f16],
    sh: &mut [f16],
) -> Result<usize, SplatError> {
    let sh_per_point = sh_layout.num_coeffs * 3;
    if sh_layout.indices.len() != sh_per_point {
        return Err(SplatError::UnsupportedLayout(format!(
            "SH layout lists {} fields for {} coefficients",
            sh_layout.indices.len(),
            sh_layout.num_coeffs
        )));
    }

    let expected_gaussians = vertex_count.checked_mul(GAUSSIAN_3D_SLOTS);
    let expected_sh = vertex_count.checked_mul(sh_per_point);
    if expected_gaussians != Some(gaussians.len()) || expected_sh != Some(sh.len()) {
        return Err(SplatError::AllocationFailure(format!(
            "Destination sizes ({}, {}) do not fit {} points",
            gaussians.len(),
            sh.len(),
            vertex_count
        )));
    }

    let mut vertex = RawVertex::for_types(types);
    let mut read_offset = 0;

    let points = gaussians
        .chunks_exact_mut(GAUSSIAN_3D_SLOTS)
        .zip(sh.chunks_exact_mut(sh_per_point));
    for (gaussian, coeffs) in points {
        read_offset = read_raw_vertex(read_offset, vertex_data, types, &mut vertex)?;

        // row-major: coefficient order, then channel
        for (dst, &idx) in coeffs.iter_mut().zip(sh_layout.indices.iter()) {
            *dst = float_to_half(vertex.value(idx));
        }
        write_gaussian(&vertex, fields, gaussian);
    }

    Ok(read_offset)
}
