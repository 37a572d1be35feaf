//! Resource descriptors.

use bitflags::bitflags;

use super::Format;

/// Shape of a GPU resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ResourceDimension {
    Buffer,
    Texture1d,
    #[default]
    Texture2d,
    Texture3d,
}

impl ResourceDimension {
    pub fn is_texture(&self) -> bool {
        !matches!(self, Self::Buffer)
    }
}

bitflags! {
    /// How a resource may be bound.
    ///
    /// An empty set means the resource is only ever read by shaders
    /// (see [`ResourceUsage::SHADER_ONLY`]).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ResourceUsage: u32 {
        /// Can be bound as a color attachment.
        const RENDER_TARGET = 1 << 0;
        /// Can be bound as a depth/stencil attachment.
        const DEPTH_STENCIL = 1 << 1;
        /// Can be bound for unordered (read-write) shader access.
        const UNORDERED_ACCESS = 1 << 2;
    }
}

impl ResourceUsage {
    /// No binding beyond shader reads.
    pub const SHADER_ONLY: Self = Self::empty();

    pub fn is_shader_only(&self) -> bool {
        self.is_empty()
    }
}

/// 3D extent. For 1D and 2D textures `depth` holds the array size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Extent3d {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
}

impl Extent3d {
    /// Create a new 2D extent.
    pub fn new_2d(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            depth: 1,
        }
    }

    /// Create a new 3D extent.
    pub fn new_3d(width: u32, height: u32, depth: u32) -> Self {
        Self {
            width,
            height,
            depth,
        }
    }
}

/// Value written into a resource when it is cleared.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum ClearValue {
    /// No clear operation.
    #[default]
    None,
    /// Clear color (or unordered-access) contents with RGBA values.
    Color { r: f32, g: f32, b: f32, a: f32 },
    /// Clear depth.
    Depth(f32),
    /// Clear stencil.
    Stencil(u32),
    /// Clear depth and stencil.
    DepthStencil { depth: f32, stencil: u32 },
}

impl ClearValue {
    /// Create a color clear value.
    pub fn color(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self::Color { r, g, b, a }
    }

    /// Create a depth clear value.
    pub fn depth(value: f32) -> Self {
        Self::Depth(value)
    }

    /// Create a depth-stencil clear value.
    pub fn depth_stencil(depth: f32, stencil: u32) -> Self {
        Self::DepthStencil { depth, stencil }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

/// The part of a descriptor that decides whether two physical resources are
/// interchangeable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DescriptorKey {
    pub dimension: ResourceDimension,
    pub size: Extent3d,
    pub mip_levels: u32,
    pub format: Format,
}

/// Describes a GPU resource requested from the frame graph.
///
/// Two descriptors are equivalent when their [`DescriptorKey`]s match; usage,
/// stride, clear settings and label do not take part.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceDescriptor {
    /// Debug label.
    pub label: Option<String>,
    pub dimension: ResourceDimension,
    /// Width, height and depth (or array size).
    pub size: Extent3d,
    pub mip_levels: u32,
    pub format: Format,
    pub usage: ResourceUsage,
    /// Element size in bytes for structured buffers; 0 for raw data.
    pub stride: u32,
    pub clear_value: ClearValue,
    /// Clear the resource before its creating pass runs.
    pub clear_on_first_use: bool,
}

impl ResourceDescriptor {
    /// A buffer of `elements` items of `stride` bytes each.
    ///
    /// With a stride of 0 the buffer is raw and `elements` is its byte size.
    pub fn buffer(elements: u32, stride: u32, usage: ResourceUsage) -> Self {
        Self {
            label: None,
            dimension: ResourceDimension::Buffer,
            size: Extent3d::new_3d(elements, 1, 1),
            mip_levels: 1,
            format: Format::Unknown,
            usage,
            stride,
            clear_value: ClearValue::None,
            clear_on_first_use: false,
        }
    }

    pub fn texture_1d(width: u32, format: Format, usage: ResourceUsage) -> Self {
        Self {
            dimension: ResourceDimension::Texture1d,
            size: Extent3d::new_3d(width, 1, 1),
            ..Self::texture_2d(width, 1, format, usage)
        }
    }

    pub fn texture_2d(width: u32, height: u32, format: Format, usage: ResourceUsage) -> Self {
        Self {
            label: None,
            dimension: ResourceDimension::Texture2d,
            size: Extent3d::new_2d(width, height),
            mip_levels: 1,
            format,
            usage,
            stride: 0,
            clear_value: ClearValue::None,
            clear_on_first_use: false,
        }
    }

    pub fn texture_2d_array(
        width: u32,
        height: u32,
        layers: u32,
        format: Format,
        usage: ResourceUsage,
    ) -> Self {
        Self {
            size: Extent3d::new_3d(width, height, layers),
            ..Self::texture_2d(width, height, format, usage)
        }
    }

    pub fn texture_3d(
        width: u32,
        height: u32,
        depth: u32,
        format: Format,
        usage: ResourceUsage,
    ) -> Self {
        Self {
            dimension: ResourceDimension::Texture3d,
            size: Extent3d::new_3d(width, height, depth),
            ..Self::texture_2d(width, height, format, usage)
        }
    }

    /// Set the debug label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_mip_levels(mut self, mip_levels: u32) -> Self {
        self.mip_levels = mip_levels;
        self
    }

    pub fn with_usage(mut self, usage: ResourceUsage) -> Self {
        self.usage = usage;
        self
    }

    /// Request a clear to `value` before the creating pass runs.
    pub fn with_clear(mut self, value: ClearValue) -> Self {
        self.clear_value = value;
        self.clear_on_first_use = !value.is_none();
        self
    }

    /// Equivalence key used by the resource pool.
    pub fn key(&self) -> DescriptorKey {
        DescriptorKey {
            dimension: self.dimension,
            size: self.size,
            mip_levels: self.mip_levels,
            format: self.format,
        }
    }

    pub fn is_equivalent(&self, other: &Self) -> bool {
        self.key() == other.key()
    }

    /// Number of separately addressable array slices.
    pub fn array_layers(&self) -> u32 {
        match self.dimension {
            ResourceDimension::Texture1d | ResourceDimension::Texture2d => self.size.depth.max(1),
            ResourceDimension::Buffer | ResourceDimension::Texture3d => 1,
        }
    }

    /// Approximate size of the top mip level in bytes.
    pub fn size_in_bytes(&self) -> u64 {
        match self.dimension {
            ResourceDimension::Buffer => u64::from(self.size.width) * u64::from(self.stride.max(1)),
            _ => {
                u64::from(self.size.width)
                    * u64::from(self.size.height)
                    * u64::from(self.size.depth.max(1))
                    * u64::from(self.format.block_size())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn color_target(width: u32, height: u32) -> ResourceDescriptor {
        ResourceDescriptor::texture_2d(width, height, Format::Rgba8Unorm, ResourceUsage::RENDER_TARGET)
    }

    #[test]
    fn test_equivalence_ignores_usage_and_clear() {
        let a = color_target(256, 256);
        let b = color_target(256, 256)
            .with_usage(ResourceUsage::UNORDERED_ACCESS)
            .with_clear(ClearValue::color(0.0, 0.0, 0.0, 1.0))
            .with_label("other");
        assert!(a.is_equivalent(&b));
        assert_eq!(a.key(), b.key());
    }

    #[test]
    fn test_equivalence_checks_shape_and_format() {
        let a = color_target(256, 256);
        assert!(!a.is_equivalent(&color_target(256, 128)));
        assert!(!a.is_equivalent(&a.clone().with_mip_levels(4)));
        assert!(!a.is_equivalent(&ResourceDescriptor::texture_2d(
            256,
            256,
            Format::Rgba16Float,
            ResourceUsage::RENDER_TARGET
        )));
        assert!(!a.is_equivalent(&ResourceDescriptor::texture_2d_array(
            256,
            256,
            2,
            Format::Rgba8Unorm,
            ResourceUsage::RENDER_TARGET
        )));
    }

    #[test]
    fn test_with_clear_sets_request() {
        let desc = color_target(4, 4).with_clear(ClearValue::color(1.0, 0.0, 0.0, 1.0));
        assert!(desc.clear_on_first_use);

        let desc = desc.with_clear(ClearValue::None);
        assert!(!desc.clear_on_first_use);
    }

    #[test]
    fn test_array_layers() {
        let array = ResourceDescriptor::texture_2d_array(8, 8, 6, Format::R32Float, ResourceUsage::RENDER_TARGET);
        assert_eq!(array.array_layers(), 6);

        let volume = ResourceDescriptor::texture_3d(8, 8, 8, Format::R32Float, ResourceUsage::UNORDERED_ACCESS);
        assert_eq!(volume.array_layers(), 1);
        assert_eq!(volume.dimension, ResourceDimension::Texture3d);
    }

    #[test]
    fn test_size_in_bytes() {
        assert_eq!(color_target(256, 256).size_in_bytes(), 256 * 256 * 4);
        let buffer = ResourceDescriptor::buffer(1024, 16, ResourceUsage::UNORDERED_ACCESS);
        assert_eq!(buffer.size_in_bytes(), 16 * 1024);
        assert_eq!(buffer.format, Format::Unknown);
    }

    #[test]
    fn test_shader_only_usage() {
        assert!(ResourceUsage::SHADER_ONLY.is_shader_only());
        assert!(!ResourceUsage::RENDER_TARGET.is_shader_only());
    }

    #[test]
    fn test_texture_1d() {
        let desc = ResourceDescriptor::texture_1d(64, Format::R8Unorm, ResourceUsage::SHADER_ONLY);
        assert_eq!(desc.dimension, ResourceDimension::Texture1d);
        assert_eq!(desc.size, Extent3d::new_3d(64, 1, 1));
    }
}
