//! Destination buffer primitives.
//!
//! The packer only needs to create buffers, write half floats into a mapped
//! range and unmap it. [`HostAllocator`] backs buffers with plain memory; a GPU
//! backend implements [`BufferAllocator`] over its own device.

use crate::common::C_SIZE_FLOAT;
use crate::error::SplatError;
use half::f16;
use std::ops::BitOr;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BufferUsages(u32);

impl BufferUsages {
    pub const COPY_DST: Self = Self(1 << 3);
    pub const VERTEX: Self = Self(1 << 5);
    pub const STORAGE: Self = Self(1 << 7);

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for BufferUsages {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

#[derive(Debug, Clone)]
pub struct BufferDescriptor<'a> {
    pub label: &'a str,
    /// Size in bytes.
    pub size: u64,
    pub usage: BufferUsages,
    pub mapped_at_creation: bool,
}

pub trait PackBuffer {
    fn size(&self) -> u64;

    fn usage(&self) -> BufferUsages;

    /// The mapped range as half floats, or `None` once unmapped.
    fn mapped_f16_mut(&mut self) -> Option<&mut [f16]>;

    fn unmap(&mut self);
}

pub trait BufferAllocator {
    type Buffer: PackBuffer;

    fn create_buffer(&self, desc: &BufferDescriptor<'_>) -> Result<Self::Buffer, SplatError>;
}

#[derive(Debug, Clone, Default)]
pub struct HostAllocator {
    max_buffer_size: Option<u64>,
}

impl HostAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_buffer_size(max_buffer_size: u64) -> Self {
        Self {
            max_buffer_size: Some(max_buffer_size),
        }
    }
}

impl BufferAllocator for HostAllocator {
    type Buffer = HostBuffer;

    fn create_buffer(&self, desc: &BufferDescriptor<'_>) -> Result<HostBuffer, SplatError> {
        if let Some(max) = self.max_buffer_size {
            if desc.size > max {
                return Err(SplatError::AllocationFailure(format!(
                    "'{}' needs {} bytes, limit is {}",
                    desc.label, desc.size, max
                )));
            }
        }
        if desc.size % C_SIZE_FLOAT as u64 != 0 {
            return Err(SplatError::AllocationFailure(format!(
                "'{}' size {} is not a multiple of {}",
                desc.label, desc.size, C_SIZE_FLOAT
            )));
        }
        let len = usize::try_from(desc.size / C_SIZE_FLOAT as u64).map_err(|e| {
            SplatError::AllocationFailure(format!("'{}' is too large: {}", desc.label, e))
        })?;

        let mut data = Vec::new();
        data.try_reserve_exact(len).map_err(|e| {
            SplatError::AllocationFailure(format!("'{}': {}", desc.label, e))
        })?;
        data.resize(len, f16::ZERO);

        debug!(label = desc.label, size = desc.size, "created host buffer");

        Ok(HostBuffer {
            usage: desc.usage,
            mapped: desc.mapped_at_creation,
            data,
        })
    }
}

#[derive(Debug, Clone)]
pub struct HostBuffer {
    usage: BufferUsages,
    mapped: bool,
    data: Vec<f16>,
}

impl HostBuffer {
    pub fn is_mapped(&self) -> bool {
        self.mapped
    }

    pub fn as_f16(&self) -> &[f16] {
        &self.data
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.data)
    }
}

impl PackBuffer for HostBuffer {
    fn size(&self) -> u64 {
        (self.data.len() * C_SIZE_FLOAT) as u64
    }

    fn usage(&self) -> BufferUsages {
        self.usage
    }

    fn mapped_f16_mut(&mut self) -> Option<&mut [f16]> {
        if self.mapped {
            Some(&mut self.data)
        } else {
            None
        }
    }

    fn unmap(&mut self) {
        self.mapped = false;
    }
}
