//! Image layout states and the barrier masks used to move between them.
//!
//! Every layout transition is expressed as a single barrier whose source
//! half is derived from the layout the image is leaving and whose destination
//! half is derived from the layout it is entering. [`transition_masks`] is
//! the lookup table; [`LayoutTransitionTable`] is the optional strict check
//! of which transitions an image can legally make at all.

use bitflags::bitflags;

use super::ImageUsage;

/// Number of distinct image layout states.
pub const IMAGE_LAYOUT_COUNT: usize = 8;

/// Memory organization of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(usize)]
pub enum ImageLayout {
    /// Initial state, contents undefined.
    #[default]
    Undefined = 0,
    /// Optimal for transfer source operations.
    TransferSrc = 1,
    /// Optimal for transfer destination operations.
    TransferDst = 2,
    /// Optimal for shader sampling.
    ShaderReadOnly = 3,
    /// Optimal for color attachment writes.
    ColorAttachment = 4,
    /// Optimal for depth/stencil attachment reads and writes.
    DepthStencilAttachment = 5,
    /// Ready for presentation.
    Present = 6,
    /// Supports every access, optimal for none.
    General = 7,
}

impl ImageLayout {
    /// Every layout, in declaration order.
    pub const ALL: [ImageLayout; IMAGE_LAYOUT_COUNT] = [
        Self::Undefined,
        Self::TransferSrc,
        Self::TransferDst,
        Self::ShaderReadOnly,
        Self::ColorAttachment,
        Self::DepthStencilAttachment,
        Self::Present,
        Self::General,
    ];
}

bitflags! {
    /// Pipeline stages a barrier waits on or blocks.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PipelineStages: u32 {
        const TOP_OF_PIPE = 1 << 0;
        const VERTEX_SHADER = 1 << 1;
        const FRAGMENT_SHADER = 1 << 2;
        const EARLY_FRAGMENT_TESTS = 1 << 3;
        const LATE_FRAGMENT_TESTS = 1 << 4;
        const COLOR_ATTACHMENT_OUTPUT = 1 << 5;
        const COMPUTE_SHADER = 1 << 6;
        const TRANSFER = 1 << 7;
        const BOTTOM_OF_PIPE = 1 << 8;
        const ALL_COMMANDS = 1 << 9;
    }
}

bitflags! {
    /// Memory accesses a barrier makes available or visible.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AccessFlags: u32 {
        const SHADER_READ = 1 << 0;
        const SHADER_WRITE = 1 << 1;
        const COLOR_ATTACHMENT_READ = 1 << 2;
        const COLOR_ATTACHMENT_WRITE = 1 << 3;
        const DEPTH_STENCIL_ATTACHMENT_READ = 1 << 4;
        const DEPTH_STENCIL_ATTACHMENT_WRITE = 1 << 5;
        const TRANSFER_READ = 1 << 6;
        const TRANSFER_WRITE = 1 << 7;
        const MEMORY_READ = 1 << 8;
        const MEMORY_WRITE = 1 << 9;
    }
}

/// Stage and access masks for one layout transition barrier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransitionMasks {
    /// Stages that must finish before the transition.
    pub src_stage: PipelineStages,
    /// Writes that must be made available before the transition.
    pub src_access: AccessFlags,
    /// Stages that wait for the transition.
    pub dst_stage: PipelineStages,
    /// Accesses that see the transitioned image.
    pub dst_access: AccessFlags,
    /// At least one half of the barrier used the conservative fallback.
    pub fallback: bool,
}

/// Stage and access mask covering every command and memory access.
pub const CONSERVATIVE_MASKS: (PipelineStages, AccessFlags) = (
    PipelineStages::ALL_COMMANDS,
    AccessFlags::MEMORY_READ.union(AccessFlags::MEMORY_WRITE),
);

/// Source half of a barrier leaving `layout`.
fn source_masks(layout: ImageLayout) -> Option<(PipelineStages, AccessFlags)> {
    let masks = match layout {
        ImageLayout::Undefined => (PipelineStages::TOP_OF_PIPE, AccessFlags::empty()),
        ImageLayout::TransferSrc => (PipelineStages::TRANSFER, AccessFlags::TRANSFER_READ),
        ImageLayout::TransferDst => (PipelineStages::TRANSFER, AccessFlags::TRANSFER_WRITE),
        ImageLayout::ShaderReadOnly => (PipelineStages::FRAGMENT_SHADER, AccessFlags::SHADER_READ),
        ImageLayout::ColorAttachment => (
            PipelineStages::COLOR_ATTACHMENT_OUTPUT,
            AccessFlags::COLOR_ATTACHMENT_WRITE,
        ),
        ImageLayout::DepthStencilAttachment => (
            PipelineStages::LATE_FRAGMENT_TESTS,
            AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
        ),
        ImageLayout::Present => (PipelineStages::BOTTOM_OF_PIPE, AccessFlags::empty()),
        ImageLayout::General => CONSERVATIVE_MASKS,
    };
    Some(masks)
}

/// Destination half of a barrier entering `layout`.
///
/// Entering `Undefined` discards contents and has no meaningful
/// destination masks.
fn destination_masks(layout: ImageLayout) -> Option<(PipelineStages, AccessFlags)> {
    let masks = match layout {
        ImageLayout::Undefined => return None,
        ImageLayout::TransferSrc => (PipelineStages::TRANSFER, AccessFlags::TRANSFER_READ),
        ImageLayout::TransferDst => (PipelineStages::TRANSFER, AccessFlags::TRANSFER_WRITE),
        ImageLayout::ShaderReadOnly => (PipelineStages::FRAGMENT_SHADER, AccessFlags::SHADER_READ),
        ImageLayout::ColorAttachment => (
            PipelineStages::COLOR_ATTACHMENT_OUTPUT,
            AccessFlags::COLOR_ATTACHMENT_READ | AccessFlags::COLOR_ATTACHMENT_WRITE,
        ),
        ImageLayout::DepthStencilAttachment => (
            PipelineStages::EARLY_FRAGMENT_TESTS,
            AccessFlags::DEPTH_STENCIL_ATTACHMENT_READ
                | AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
        ),
        ImageLayout::Present => (PipelineStages::BOTTOM_OF_PIPE, AccessFlags::empty()),
        ImageLayout::General => CONSERVATIVE_MASKS,
    };
    Some(masks)
}

/// Barrier masks for moving an image from `old` to `new`.
///
/// A half the table does not cover is logged and replaced with
/// [`CONSERVATIVE_MASKS`]; the result is flagged as a fallback.
pub fn transition_masks(old: ImageLayout, new: ImageLayout) -> TransitionMasks {
    let mut fallback = false;

    let (src_stage, src_access) = source_masks(old).unwrap_or_else(|| {
        log::error!("No source barrier masks for layout {old:?}, using conservative masks");
        fallback = true;
        CONSERVATIVE_MASKS
    });
    let (dst_stage, dst_access) = destination_masks(new).unwrap_or_else(|| {
        log::error!(
            "No destination barrier masks for transition {old:?} -> {new:?}, using conservative masks"
        );
        fallback = true;
        CONSERVATIVE_MASKS
    });

    TransitionMasks {
        src_stage,
        src_access,
        dst_stage,
        dst_access,
        fallback,
    }
}

/// Which layout transitions an image with a given usage can make.
///
/// A layout is reachable only if the usage supports it: transfer layouts
/// need the matching copy flag, attachment layouts need the attachment flag,
/// `Present` needs color attachment usage. `General` is open to every image.
/// No image may be moved back to `Undefined`.
#[derive(Debug, Clone)]
pub struct LayoutTransitionTable {
    usage: ImageUsage,
    transitions: [[bool; IMAGE_LAYOUT_COUNT]; IMAGE_LAYOUT_COUNT],
}

impl LayoutTransitionTable {
    /// Build the transition table for the given usage flags.
    pub fn from_usage(usage: ImageUsage) -> Self {
        let supports = |layout: ImageLayout| match layout {
            ImageLayout::Undefined | ImageLayout::General => true,
            ImageLayout::TransferSrc => usage.contains(ImageUsage::COPY_SRC),
            ImageLayout::TransferDst => usage.contains(ImageUsage::COPY_DST),
            ImageLayout::ShaderReadOnly => usage.contains(ImageUsage::SAMPLED),
            ImageLayout::ColorAttachment | ImageLayout::Present => {
                usage.contains(ImageUsage::COLOR_ATTACHMENT)
            }
            ImageLayout::DepthStencilAttachment => {
                usage.contains(ImageUsage::DEPTH_STENCIL_ATTACHMENT)
            }
        };

        let mut transitions = [[false; IMAGE_LAYOUT_COUNT]; IMAGE_LAYOUT_COUNT];
        for from in ImageLayout::ALL {
            for to in ImageLayout::ALL {
                transitions[from as usize][to as usize] =
                    to != ImageLayout::Undefined && supports(from) && supports(to);
            }
        }

        Self { usage, transitions }
    }

    /// Usage flags this table was built for.
    pub fn usage(&self) -> ImageUsage {
        self.usage
    }

    /// Check if a transition is valid.
    pub fn is_valid_transition(&self, from: ImageLayout, to: ImageLayout) -> bool {
        self.transitions[from as usize][to as usize]
    }

    /// Valid destination layouts from a given state.
    pub fn valid_destinations(&self, from: ImageLayout) -> Vec<ImageLayout> {
        ImageLayout::ALL
            .into_iter()
            .filter(|to| self.is_valid_transition(from, *to))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_transition_masks() {
        let masks = transition_masks(ImageLayout::Undefined, ImageLayout::TransferDst);
        assert_eq!(masks.src_stage, PipelineStages::TOP_OF_PIPE);
        assert!(masks.src_access.is_empty());
        assert_eq!(masks.dst_stage, PipelineStages::TRANSFER);
        assert_eq!(masks.dst_access, AccessFlags::TRANSFER_WRITE);
        assert!(!masks.fallback);
    }

    #[test]
    fn test_sample_after_upload_masks() {
        let masks = transition_masks(ImageLayout::TransferDst, ImageLayout::ShaderReadOnly);
        assert_eq!(masks.src_access, AccessFlags::TRANSFER_WRITE);
        assert_eq!(masks.dst_stage, PipelineStages::FRAGMENT_SHADER);
        assert_eq!(masks.dst_access, AccessFlags::SHADER_READ);
    }

    #[test]
    fn test_undefined_destination_falls_back() {
        let masks = transition_masks(ImageLayout::ShaderReadOnly, ImageLayout::Undefined);
        assert!(masks.fallback);
        assert_eq!(masks.dst_stage, PipelineStages::ALL_COMMANDS);
        assert_eq!(
            masks.dst_access,
            AccessFlags::MEMORY_READ | AccessFlags::MEMORY_WRITE
        );
    }

    #[test]
    fn test_texture_table() {
        let table = LayoutTransitionTable::from_usage(
            ImageUsage::SAMPLED | ImageUsage::COPY_SRC | ImageUsage::COPY_DST,
        );
        assert!(table.is_valid_transition(ImageLayout::Undefined, ImageLayout::ShaderReadOnly));
        assert!(table.is_valid_transition(ImageLayout::ShaderReadOnly, ImageLayout::TransferDst));
        assert!(!table.is_valid_transition(ImageLayout::ShaderReadOnly, ImageLayout::ColorAttachment));
        assert!(!table.is_valid_transition(ImageLayout::ShaderReadOnly, ImageLayout::Present));
        assert!(!table.is_valid_transition(ImageLayout::ShaderReadOnly, ImageLayout::Undefined));
    }

    #[test]
    fn test_render_target_can_present() {
        let table = LayoutTransitionTable::from_usage(
            ImageUsage::COLOR_ATTACHMENT | ImageUsage::SAMPLED,
        );
        let destinations = table.valid_destinations(ImageLayout::ColorAttachment);
        assert!(destinations.contains(&ImageLayout::Present));
        assert!(destinations.contains(&ImageLayout::ShaderReadOnly));
        assert!(!destinations.contains(&ImageLayout::DepthStencilAttachment));
    }
}
