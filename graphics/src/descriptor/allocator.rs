//! Growable pool-of-pools descriptor set allocator.
//!
//! ```text
//!   allocate(layout)
//!        │
//!        ▼
//!   ready pools ──pop──▶ try allocate ──ok──▶ push back to ready
//!        ▲                    │
//!        │               pool exhausted
//!        │                    ▼
//!      clear() ◀──────── full pools      (next ready pool, then a fresh one)
//! ```
//!
//! Pools are never freed individually. [`DescriptorAllocator::clear`] resets
//! every pool at once, after which full pools are reused.

use std::sync::Arc;

use crate::backend::{
    DebugObject, GpuBackend, GpuDescriptorPool, GpuDescriptorSet, GpuDescriptorSetLayout,
};
use crate::error::{GraphicsError, fatal};
use crate::types::{DescriptorPoolSize, PoolSizeRatio};

/// Upper bound on sets per pool when growing.
pub const MAX_SETS_PER_POOL: u32 = 4096;

/// Allocates descriptor sets from a growing list of pools.
pub struct DescriptorAllocator {
    backend: Arc<dyn GpuBackend>,
    ratios: Vec<PoolSizeRatio>,
    ready_pools: Vec<GpuDescriptorPool>,
    full_pools: Vec<GpuDescriptorPool>,
    /// Sets in the next pool created.
    sets_per_pool: u32,
    pools_created: usize,
}

impl DescriptorAllocator {
    /// Create an allocator with one pool of `max_sets` sets.
    ///
    /// Each pool holds `ratio * sets` descriptors of every type in `ratios`.
    pub fn new(
        backend: Arc<dyn GpuBackend>,
        max_sets: u32,
        ratios: &[PoolSizeRatio],
    ) -> Result<Self, GraphicsError> {
        if max_sets > MAX_SETS_PER_POOL {
            log::warn!(
                "Descriptor pool size of {} sets exceeds the limit, using {}",
                max_sets,
                MAX_SETS_PER_POOL
            );
        }

        let mut allocator = Self {
            backend,
            ratios: ratios.to_vec(),
            ready_pools: Vec::new(),
            full_pools: Vec::new(),
            sets_per_pool: max_sets.clamp(1, MAX_SETS_PER_POOL),
            pools_created: 0,
        };

        let pool = allocator.create_pool(allocator.sets_per_pool)?;
        allocator.ready_pools.push(pool);
        allocator.sets_per_pool = grow(allocator.sets_per_pool);

        log::debug!(
            "Created descriptor allocator ({} sets, {} descriptor types)",
            max_sets,
            allocator.ratios.len()
        );
        Ok(allocator)
    }

    /// Allocate one set with `layout`.
    ///
    /// Exhausted pools are moved to the full list and the next ready pool is
    /// tried. Once no ready pool is left, a fresh pool is created at the
    /// current growth target.
    ///
    /// # Panics
    ///
    /// Panics if the set does not fit into a fresh pool either.
    pub fn allocate(
        &mut self,
        layout: GpuDescriptorSetLayout,
    ) -> Result<GpuDescriptorSet, GraphicsError> {
        loop {
            let (pool, fresh) = match self.ready_pools.pop() {
                Some(pool) => (pool, false),
                None => (self.grow_pool()?, true),
            };

            match self.backend.allocate_descriptor_set(pool, layout) {
                Ok(set) => {
                    self.ready_pools.push(pool);
                    return Ok(set);
                }
                Err(e) if e.is_pool_exhausted() => {
                    self.full_pools.push(pool);
                    if fresh {
                        fatal!(
                            "descriptor set with layout {:?} does not fit into a fresh pool ({}); \
                             check the pool size ratios",
                            layout,
                            e
                        );
                    }
                    log::trace!("Descriptor pool {:?} exhausted ({})", pool, e);
                }
                Err(e) => {
                    self.ready_pools.push(pool);
                    return Err(e);
                }
            }
        }
    }

    /// Reset every pool and make all of them available again.
    ///
    /// Every set allocated so far becomes invalid.
    pub fn clear(&mut self) -> Result<(), GraphicsError> {
        for pool in &self.ready_pools {
            self.backend.reset_descriptor_pool(*pool)?;
        }
        for pool in &self.full_pools {
            self.backend.reset_descriptor_pool(*pool)?;
        }
        self.ready_pools.append(&mut self.full_pools);
        log::trace!("Cleared {} descriptor pools", self.ready_pools.len());
        Ok(())
    }

    /// Destroy every pool.
    ///
    /// Call this only while the device is idle.
    pub fn destroy_pools(&mut self) {
        let count = self.ready_pools.len() + self.full_pools.len();
        for pool in self.ready_pools.drain(..).chain(self.full_pools.drain(..)) {
            self.backend.destroy_descriptor_pool(pool);
        }
        if count > 0 {
            log::debug!("Destroyed {} descriptor pools", count);
        }
    }

    /// Pools with room left.
    pub fn ready_count(&self) -> usize {
        self.ready_pools.len()
    }

    /// Pools that ran out of room since the last [`clear`](Self::clear).
    pub fn full_count(&self) -> usize {
        self.full_pools.len()
    }

    /// Total number of pools ever created.
    pub fn pools_created(&self) -> usize {
        self.pools_created
    }

    /// Sets in the next pool that will be created.
    pub fn sets_per_pool(&self) -> u32 {
        self.sets_per_pool
    }

    fn grow_pool(&mut self) -> Result<GpuDescriptorPool, GraphicsError> {
        let pool = self.create_pool(self.sets_per_pool)?;
        self.sets_per_pool = grow(self.sets_per_pool);
        Ok(pool)
    }

    fn create_pool(&mut self, sets: u32) -> Result<GpuDescriptorPool, GraphicsError> {
        let sizes: Vec<DescriptorPoolSize> = self
            .ratios
            .iter()
            .map(|ratio| ratio.pool_size(sets))
            .collect();
        let pool = self.backend.create_descriptor_pool(sets, &sizes)?;
        self.pools_created += 1;

        let name = format!("descriptor pool #{}", self.pools_created);
        self.backend
            .set_debug_name(DebugObject::DescriptorPool(pool), &name);
        log::debug!("Created {} with {} sets", name, sets);
        Ok(pool)
    }
}

fn grow(sets: u32) -> u32 {
    sets.saturating_add(sets.div_ceil(2)).min(MAX_SETS_PER_POOL)
}

impl std::fmt::Debug for DescriptorAllocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DescriptorAllocator")
            .field("ready", &self.ready_pools.len())
            .field("full", &self.full_pools.len())
            .field("sets_per_pool", &self.sets_per_pool)
            .field("pools_created", &self.pools_created)
            .finish()
    }
}

impl Drop for DescriptorAllocator {
    fn drop(&mut self) {
        self.destroy_pools();
    }
}
