pub mod buffer;
pub mod common;
pub mod covariance;
pub mod error;
pub mod ply;
pub mod sh;
mod structures;
pub mod transcode;

use buffer::BufferAllocator;
use buffer::BufferDescriptor;
use buffer::BufferUsages;
use buffer::PackBuffer;
use common::c_size_sh_coef;
use common::C_SIZE_2D_SPLAT;
use common::C_SIZE_3D_GAUSSIAN;
use error::SplatError;
use ply::decode_header;
use ply::DecodedPly;
use sh::resolve_sh_layout;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};
use transcode::transcode_points;
use transcode::SplatFields;

pub use structures::PointCloud;

#[inline]
fn buffer_size(num_points: usize, stride: usize, label: &str) -> Result<u64, SplatError> {
    num_points
        .checked_mul(stride)
        .and_then(|n| u64::try_from(n).ok())
        .ok_or_else(|| {
            SplatError::AllocationFailure(format!("Overflow sizing '{}' buffer", label))
        })
}

/// Allocates the three destination buffers, transcodes every vertex record
/// into the first two and unmaps them. Nothing is returned unless all of it
/// succeeds.
#[inline(never)]
pub fn pack_point_cloud<A: BufferAllocator>(
    allocator: &A,
    ply: &DecodedPly<'_>,
) -> Result<PointCloud<A::Buffer>, SplatError> {
    let types = &ply.property_types;
    let sh_layout = resolve_sh_layout(types)?;
    let fields = SplatFields::resolve(types)?;
    let num_points = ply.vertex_count;
    let num_coeffs = sh_layout.num_coeffs;

    let expected = num_points
        .checked_mul(types.stride())
        .ok_or_else(|| SplatError::MalformedRecord("Overflow in byte calculation".to_string()))?;
    if ply.vertex_data.len() < expected {
        return Err(SplatError::MalformedRecord(format!(
            "Binary data is too short, need {} bytes, have {}",
            expected,
            ply.vertex_data.len()
        )));
    }

    info!(
        num_points,
        sh_degree = sh_layout.degree,
        "processing loaded attributes"
    );

    let gaussian_label = "ply input 3d gaussians data buffer";
    let sh_label = "ply input sh coefficients buffer";
    let splat_label = "2d gaussians buffer";

    // xyz (position), opacity, cov (from rot and scale)
    let mut gaussian_3d_buffer = allocator.create_buffer(&BufferDescriptor {
        label: gaussian_label,
        size: buffer_size(num_points, C_SIZE_3D_GAUSSIAN, gaussian_label)?,
        usage: BufferUsages::COPY_DST | BufferUsages::STORAGE,
        mapped_at_creation: true,
    })?;
    // Spherical harmonic function coeffs
    let mut sh_buffer = allocator.create_buffer(&BufferDescriptor {
        label: sh_label,
        size: buffer_size(num_points, c_size_sh_coef(num_coeffs), sh_label)?,
        usage: BufferUsages::COPY_DST | BufferUsages::STORAGE,
        mapped_at_creation: true,
    })?;
    let splat_2d_buffer = allocator.create_buffer(&BufferDescriptor {
        label: splat_label,
        size: buffer_size(num_points, C_SIZE_2D_SPLAT, splat_label)?,
        usage: BufferUsages::VERTEX | BufferUsages::STORAGE,
        mapped_at_creation: false,
    })?;

    let start = Instant::now();
    {
        let gaussians = gaussian_3d_buffer.mapped_f16_mut().ok_or_else(|| {
            SplatError::AllocationFailure(format!("'{}' is not mapped", gaussian_label))
        })?;
        let sh = sh_buffer.mapped_f16_mut().ok_or_else(|| {
            SplatError::AllocationFailure(format!("'{}' is not mapped", sh_label))
        })?;

        let consumed = transcode_points(
            num_points,
            ply.vertex_data,
            types,
            &fields,
            &sh_layout,
            gaussians,
            sh,
        )?;
        debug!(consumed, "read vertex records");
    }
    gaussian_3d_buffer.unmap();
    sh_buffer.unmap();

    info!(
        elapsed_ms = start.elapsed().as_millis() as u64,
        "packed point cloud"
    );

    Ok(PointCloud {
        num_points,
        sh_degree: sh_layout.degree,
        num_coeffs,
        gaussian_3d_buffer,
        sh_buffer,
        splat_2d_buffer,
    })
}

/// Decodes a binary PLY file already in memory and packs it.
pub fn load<A: BufferAllocator>(
    raw_data: &[u8],
    allocator: &A,
) -> Result<PointCloud<A::Buffer>, SplatError> {
    let ply = decode_header(raw_data)?;
    pack_point_cloud(allocator, &ply)
}

pub fn load_file<A: BufferAllocator>(
    path: impl AsRef<Path>,
    allocator: &A,
) -> Result<PointCloud<A::Buffer>, SplatError> {
    let raw_data = std::fs::read(path)?;
    load(&raw_data, allocator)
}

cfg_if::cfg_if! {
if #[cfg(feature = "async")] {
    /// Reads the file asynchronously; decoding and packing run synchronously
    /// once the bytes are in memory.
    #[inline(never)]
    pub async fn load_file_async<A: BufferAllocator>(
        path: impl AsRef<Path>,
        allocator: &A,
    ) -> Result<PointCloud<A::Buffer>, SplatError> {
        let raw_data = tokio::fs::read(path).await?;
        load(&raw_data, allocator)
    }
}
}
