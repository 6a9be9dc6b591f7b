//! # Core Types
//!
//! Geometry, surface descriptions and typed handles.

use core::fmt;
use core::marker::PhantomData;

// =============================================================================
// GEOMETRY
// =============================================================================

/// Width and height in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Dimensions {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl Dimensions {
    /// Create new dimensions
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Total pixel count (64-bit, never overflows)
    pub const fn pixels(self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Crop rectangle, exclusive right/bottom edges
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rect {
    /// Left edge
    pub left: u32,
    /// Top edge
    pub top: u32,
    /// Right edge (exclusive)
    pub right: u32,
    /// Bottom edge (exclusive)
    pub bottom: u32,
}

impl Rect {
    /// Create a rectangle
    pub const fn new(left: u32, top: u32, right: u32, bottom: u32) -> Self {
        Self { left, top, right, bottom }
    }

    /// Rectangle covering a full surface
    pub const fn full(dims: Dimensions) -> Self {
        Self::new(0, 0, dims.width, dims.height)
    }
}

// =============================================================================
// SURFACES
// =============================================================================

/// Chroma packing of a surface format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ColorPack {
    /// Luma only
    Yuv400,
    /// 4:1:1
    Yuv411,
    /// 4:2:0 (NV12, P010, ...)
    #[default]
    Yuv420,
    /// 4:2:2 (YUY2, Y210, ...)
    Yuv422,
    /// 4:4:4 (AYUV, Y410, ...)
    Yuv444,
    /// Packed RGB
    Rgb,
}

/// What the pipeline needs to know about a source or target surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SurfaceDesc {
    /// Allocated width
    pub width: u32,
    /// Allocated height
    pub height: u32,
    /// Region of interest
    pub crop: Rect,
    /// Chroma packing
    pub color_pack: ColorPack,
}

impl SurfaceDesc {
    /// Surface whose crop covers the whole allocation
    pub const fn new(width: u32, height: u32, color_pack: ColorPack) -> Self {
        Self {
            width,
            height,
            crop: Rect::full(Dimensions::new(width, height)),
            color_pack,
        }
    }

    /// Replace the crop rectangle
    pub const fn with_crop(mut self, crop: Rect) -> Self {
        self.crop = crop;
        self
    }

    /// Allocated dimensions
    pub const fn dimensions(&self) -> Dimensions {
        Dimensions::new(self.width, self.height)
    }

    /// Width actually processed: `min(width, crop.right)`
    pub fn effective_width(&self) -> u32 {
        self.width.min(self.crop.right)
    }

    /// Height actually processed: `min(height, crop.bottom)`
    pub fn effective_height(&self) -> u32 {
        self.height.min(self.crop.bottom)
    }
}

// =============================================================================
// HANDLE TYPES
// =============================================================================

/// Opaque handle to a device resource
///
/// Handles are type-safe wrappers that prevent mixing semaphore memory with
/// command buffers. The id space belongs to the allocator that issued them.
#[repr(transparent)]
pub struct Handle<T> {
    id: u64,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    /// Create a new handle
    #[inline]
    pub const fn new(id: u64) -> Self {
        Self {
            id,
            _marker: PhantomData,
        }
    }

    /// Create a null handle
    #[inline]
    pub const fn null() -> Self {
        Self::new(0)
    }

    /// Get the raw ID
    #[inline]
    pub const fn id(self) -> u64 {
        self.id
    }

    /// Check if null
    #[inline]
    pub const fn is_null(self) -> bool {
        self.id == 0
    }
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for Handle<T> {}

impl<T> core::hash::Hash for Handle<T> {
    fn hash<H: core::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl<T> PartialOrd for Handle<T> {
    fn partial_cmp(&self, other: &Self) -> Option<core::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Handle<T> {
    fn cmp(&self, other: &Self) -> core::cmp::Ordering {
        self.id.cmp(&other.id)
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = core::any::type_name::<T>();
        let short = name.rsplit("::").next().unwrap_or(name);
        write!(f, "Handle<{}>(0x{:x})", short, self.id)
    }
}

// Marker types for handles
/// Marker for command buffer handle
#[derive(Debug)]
pub enum CommandBufferMarker {}
/// Marker for semaphore memory handle
#[derive(Debug)]
pub enum SemaphoreMarker {}

/// Handle to a per-engine command buffer
pub type CommandBufferHandle = Handle<CommandBufferMarker>;
/// Handle to one dword of semaphore memory
pub type SemaphoreHandle = Handle<SemaphoreMarker>;
