//! Vulkan command pool and immediate submission.

use ash::vk;

use crate::error::GraphicsError;

/// Create a command pool for graphics operations.
pub fn create_command_pool(
    device: &ash::Device,
    queue_family_index: u32,
) -> Result<vk::CommandPool, GraphicsError> {
    let pool_info = vk::CommandPoolCreateInfo::default()
        .queue_family_index(queue_family_index)
        .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);

    let pool = unsafe { device.create_command_pool(&pool_info, None) }.map_err(|e| {
        GraphicsError::InitializationFailed(format!("Failed to create command pool: {:?}", e))
    })?;

    Ok(pool)
}

/// Allocate one primary command buffer from `pool`.
pub fn allocate_command_buffer(
    device: &ash::Device,
    pool: vk::CommandPool,
) -> Result<vk::CommandBuffer, GraphicsError> {
    let alloc_info = vk::CommandBufferAllocateInfo::default()
        .command_pool(pool)
        .level(vk::CommandBufferLevel::PRIMARY)
        .command_buffer_count(1);

    let buffers = unsafe { device.allocate_command_buffers(&alloc_info) }.map_err(|e| {
        GraphicsError::ResourceCreationFailed(format!("Failed to allocate command buffer: {:?}", e))
    })?;

    buffers.into_iter().next().ok_or_else(|| {
        GraphicsError::Internal("Command buffer allocation returned nothing".to_string())
    })
}

/// Dedicated command buffer and fence for blocking one-shot submissions.
pub struct ImmediateContext {
    pub command_pool: vk::CommandPool,
    pub command_buffer: vk::CommandBuffer,
    pub fence: vk::Fence,
}

impl ImmediateContext {
    /// Create the pool, command buffer and fence.
    pub fn new(device: &ash::Device, queue_family_index: u32) -> Result<Self, GraphicsError> {
        let command_pool = create_command_pool(device, queue_family_index)?;
        let command_buffer = allocate_command_buffer(device, command_pool)?;

        let fence_info = vk::FenceCreateInfo::default();
        let fence = unsafe { device.create_fence(&fence_info, None) }.map_err(|e| {
            GraphicsError::InitializationFailed(format!("Failed to create fence: {:?}", e))
        })?;

        Ok(Self {
            command_pool,
            command_buffer,
            fence,
        })
    }

    /// Record with `record`, submit to `queue` and wait for completion.
    ///
    /// # Safety
    ///
    /// The caller must hold exclusive access to this context and `queue`.
    pub unsafe fn submit(
        &self,
        device: &ash::Device,
        queue: vk::Queue,
        record: impl FnOnce(vk::CommandBuffer),
    ) -> Result<(), GraphicsError> {
        let cmd = self.command_buffer;

        unsafe {
            device
                .reset_command_buffer(cmd, vk::CommandBufferResetFlags::empty())
                .map_err(|e| {
                    GraphicsError::Internal(format!("Failed to reset command buffer: {:?}", e))
                })?;

            let begin_info = vk::CommandBufferBeginInfo::default()
                .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
            device.begin_command_buffer(cmd, &begin_info).map_err(|e| {
                GraphicsError::Internal(format!("Failed to begin command buffer: {:?}", e))
            })?;

            record(cmd);

            device.end_command_buffer(cmd).map_err(|e| {
                GraphicsError::Internal(format!("Failed to end command buffer: {:?}", e))
            })?;

            let command_buffers = [cmd];
            let submit_info = vk::SubmitInfo::default().command_buffers(&command_buffers);
            device
                .queue_submit(queue, &[submit_info], self.fence)
                .map_err(map_submit_error)?;

            let waited = device.wait_for_fences(&[self.fence], true, u64::MAX);
            finish_wait(waited, || device.reset_fences(&[self.fence]))
        }
    }

    /// Release the pool (and its command buffer) and the fence.
    ///
    /// # Safety
    ///
    /// No submission from this context may be in flight.
    pub unsafe fn destroy(&self, device: &ash::Device) {
        unsafe {
            device.destroy_fence(self.fence, None);
            device.destroy_command_pool(self.command_pool, None);
        }
    }
}

/// Reset the fence whatever the wait returned, then report the wait first.
fn finish_wait(
    waited: Result<(), vk::Result>,
    reset: impl FnOnce() -> Result<(), vk::Result>,
) -> Result<(), GraphicsError> {
    let reset = reset();
    waited.map_err(map_submit_error)?;
    reset.map_err(|e| GraphicsError::Internal(format!("Failed to reset fence: {:?}", e)))
}

fn map_submit_error(e: vk::Result) -> GraphicsError {
    match e {
        vk::Result::ERROR_DEVICE_LOST => GraphicsError::DeviceLost,
        vk::Result::ERROR_OUT_OF_DEVICE_MEMORY | vk::Result::ERROR_OUT_OF_HOST_MEMORY => {
            GraphicsError::OutOfMemory
        }
        other => GraphicsError::Internal(format!("Queue submission failed: {:?}", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_fence_reset_after_failed_wait() {
        let resets = Cell::new(0);
        let result = finish_wait(Err(vk::Result::ERROR_DEVICE_LOST), || {
            resets.set(resets.get() + 1);
            Ok(())
        });
        assert_eq!(result, Err(GraphicsError::DeviceLost));
        assert_eq!(resets.get(), 1);
    }

    #[test]
    fn test_fence_reset_failure_is_reported() {
        let result = finish_wait(Ok(()), || Err(vk::Result::ERROR_OUT_OF_HOST_MEMORY));
        assert!(matches!(result, Err(GraphicsError::Internal(_))));
        assert_eq!(finish_wait(Ok(()), || Ok(())), Ok(()));
    }
}
