use crate::api::frame::*;
use crate::region::*;

use std::fmt::{Debug, Display, Formatter};
use std::ops::{Index, IndexMut, Range};

/// Plane-specific configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaneConfig {
    /// Data stride.
    pub stride: usize,
    /// Allocated height in pixels.
    pub alloc_height: usize,
    /// Width in pixels.
    pub width: usize,
    /// Height in pixels.
    pub height: usize,
    /// Decimator along the X axis.
    ///
    /// For example, for chroma planes in a 4:2:0 configuration this would be 1.
    pub xdec: usize,
    /// Decimator along the Y axis.
    pub ydec: usize,
    /// Number of padding pixels on the right.
    pub xpad: usize,
    /// Number of padding pixels on the bottom.
    pub ypad: usize,
    /// X where the data starts.
    pub xorigin: usize,
    /// Y where the data starts.
    pub yorigin: usize,
}

impl PlaneConfig {
    /// Stride alignment in bytes.
    const STRIDE_ALIGNMENT_LOG2: usize = 5;

    #[inline]
    pub fn new(
        width: usize,
        height: usize,
        xdec: usize,
        ydec: usize,
        xpad: usize,
        ypad: usize,
        type_size: usize,
    ) -> Self {
        let xorigin = xpad;
        let yorigin = ypad;
        let align = (1 << Self::STRIDE_ALIGNMENT_LOG2) / type_size;
        let stride = (xorigin + width + xpad + align - 1) & !(align - 1);
        let alloc_height = yorigin + height + ypad;

        PlaneConfig {
            stride,
            alloc_height,
            width,
            height,
            xdec,
            ydec,
            xpad,
            ypad,
            xorigin,
            yorigin,
        }
    }
}

/// Absolute offset in pixels inside a plane
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PlaneOffset {
    pub x: isize,
    pub y: isize,
}

/// Backing buffer for the Plane data
///
/// The buffer is padded and aligned according to the architecture-specific
/// SIMD constraints.
pub type PlaneData<T> = AlignedBoxedSlice<T>;

/// One data plane of a frame.
///
/// For example, a plane can be a Y luma plane or a U or V chroma plane.
#[derive(Clone, PartialEq, Eq)]
pub struct Plane<T: Pixel> {
    pub data: PlaneData<T>,
    /// Plane configuration.
    pub cfg: PlaneConfig,
}

impl<T: Pixel> PartialEq for PlaneData<T> {
    fn eq(&self, other: &Self) -> bool {
        self[..] == other[..]
    }
}

impl<T: Pixel> Eq for PlaneData<T> {}

impl<T: Pixel> Debug for Plane<T>
where
    T: Display,
{
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Plane {{ data: [{}, ...], cfg: {:?} }}",
            self.data[0], self.cfg
        )
    }
}

impl<T: Pixel> Plane<T> {
    pub fn new(
        width: usize,
        height: usize,
        xdec: usize,
        ydec: usize,
        xpad: usize,
        ypad: usize,
    ) -> Self {
        let cfg = PlaneConfig::new(width, height, xdec, ydec, xpad, ypad, std::mem::size_of::<T>());
        let data = PlaneData::new(cfg.stride * cfg.alloc_height, T::default());

        Plane { data, cfg }
    }

    #[inline]
    fn index(&self, x: usize, y: usize) -> usize {
        (y + self.cfg.yorigin) * self.cfg.stride + (x + self.cfg.xorigin)
    }

    /// Range of one allocated row, starting at the signed column `x` of row `y`
    /// and running to the end of the row padding.
    #[inline]
    pub fn row_range(&self, x: isize, y: isize) -> Range<usize> {
        debug_assert!(self.cfg.yorigin as isize + y >= 0);
        debug_assert!(self.cfg.xorigin as isize + x >= 0);
        let base_y = (self.cfg.yorigin as isize + y) as usize;
        let base_x = (self.cfg.xorigin as isize + x) as usize;
        let base = base_y * self.cfg.stride + base_x;
        let width = self.cfg.stride - base_x;
        base..base + width
    }

    #[inline]
    pub fn p(&self, x: usize, y: usize) -> T {
        self.data[self.index(x, y)]
    }

    pub fn data_origin(&self) -> &[T] {
        &self.data[self.index(0, 0)..]
    }

    pub fn data_origin_mut(&mut self) -> &mut [T] {
        let i = self.index(0, 0);
        &mut self.data[i..]
    }

    pub fn slice(&self, po: PlaneOffset) -> PlaneSlice<'_, T> {
        PlaneSlice {
            plane: self,
            x: po.x,
            y: po.y,
        }
    }

    #[inline]
    pub fn as_region(&self) -> PlaneRegion<'_, T> {
        PlaneRegion::new_from_plane(self)
    }

    #[inline]
    pub fn as_region_mut(&mut self) -> PlaneRegionMut<'_, T> {
        PlaneRegionMut::new_from_plane(self)
    }

    /// Copies the rows of `src` (stride `src_stride`) into the visible area
    /// starting at sample (`x`, `y`).
    pub fn copy_from_slice(&mut self, src: &[T], src_stride: usize, x: usize, y: usize, w: usize, h: usize) {
        debug_assert!(x + w <= self.cfg.width && y + h <= self.cfg.height);
        for (j, row) in src.chunks(src_stride).take(h).enumerate() {
            let dst = self.index(x, y + j);
            self.data[dst..dst + w].copy_from_slice(&row[..w]);
        }
    }

    /// Fills the padding around the visible area by replicating edge samples.
    pub fn pad(&mut self) {
        let PlaneConfig {
            stride,
            alloc_height,
            width,
            height,
            xorigin,
            yorigin,
            ..
        } = self.cfg;

        if xorigin > 0 {
            for y in 0..height {
                let base = (yorigin + y) * stride;
                let fill_val = self.data[base + xorigin];
                for val in &mut self.data[base..base + xorigin] {
                    *val = fill_val;
                }
            }
        }

        if xorigin + width < stride {
            for y in 0..height {
                let base = (yorigin + y) * stride + xorigin + width;
                let fill_val = self.data[base - 1];
                for val in &mut self.data[base..base + stride - (xorigin + width)] {
                    *val = fill_val;
                }
            }
        }

        if yorigin > 0 {
            let (top, bottom) = self.data.split_at_mut(yorigin * stride);
            let src = &bottom[..stride];
            for y in 0..yorigin {
                let dst = &mut top[y * stride..(y + 1) * stride];
                dst.copy_from_slice(src);
            }
        }

        if yorigin + height < alloc_height {
            let (top, bottom) = self.data.split_at_mut((yorigin + height) * stride);
            let src = &top[(yorigin + height - 1) * stride..];
            for y in 0..alloc_height - (yorigin + height) {
                let dst = &mut bottom[y * stride..(y + 1) * stride];
                dst.copy_from_slice(src);
            }
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct PlaneSlice<'a, T: Pixel> {
    pub plane: &'a Plane<T>,
    pub x: isize,
    pub y: isize,
}

impl<'a, T: Pixel> PlaneSlice<'a, T> {
    pub fn subslice(&self, xo: usize, yo: usize) -> PlaneSlice<'a, T> {
        PlaneSlice {
            plane: self.plane,
            x: self.x + xo as isize,
            y: self.y + yo as isize,
        }
    }

    /// Sample at a signed position relative to the slice origin; the caller
    /// guarantees the position falls inside the padded plane.
    #[inline]
    pub fn sample_at(&self, row: isize, col: isize) -> T {
        let range = self.plane.row_range(self.x + col, self.y + row);
        self.plane.data[range.start]
    }
}

impl<'a, T: Pixel> Index<usize> for PlaneSlice<'a, T> {
    type Output = [T];
    fn index(&self, index: usize) -> &Self::Output {
        let range = self.plane.row_range(self.x, self.y + index as isize);
        &self.plane.data[range]
    }
}
