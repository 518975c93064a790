/// The three packed buffers of a loaded point cloud.
///
/// `gaussian_3d_buffer` holds `num_points` entries of
/// [`C_SIZE_3D_GAUSSIAN`](crate::common::C_SIZE_3D_GAUSSIAN) bytes,
/// `sh_buffer` holds `num_points` entries of
/// [`c_size_sh_coef`](crate::common::c_size_sh_coef) bytes and
/// `splat_2d_buffer` is left zeroed for the rasterizer.
#[derive(Debug)]
pub struct PointCloud<B> {
    pub num_points: usize,
    pub sh_degree: u32,
    pub num_coeffs: usize,
    pub gaussian_3d_buffer: B,
    pub sh_buffer: B,
    pub splat_2d_buffer: B,
}
