use super::*;
use crate::def::*;
use crate::plane::*;

use num_traits::*;

use std::fmt;

use std::alloc::{alloc, dealloc, Layout};
use std::fmt::{Debug, Display};
use std::{mem, ptr};

/// An analog to a Box<[T]> where the underlying slice is aligned.
/// Alignment is according to the architecture-specific SIMD constraints.
pub struct AlignedBoxedSlice<T> {
    ptr: std::ptr::NonNull<T>,
    len: usize,
}

impl<T> AlignedBoxedSlice<T> {
    // Data alignment in bytes.
    cfg_if::cfg_if! {
      if #[cfg(target_arch = "wasm32")] {
        // FIXME: wasm32 allocator fails for alignment larger than 3
        const DATA_ALIGNMENT_LOG2: usize = 3;
      } else {
        const DATA_ALIGNMENT_LOG2: usize = 5;
      }
    }

    unsafe fn layout(len: usize) -> Layout {
        Layout::from_size_align_unchecked(len * mem::size_of::<T>(), 1 << Self::DATA_ALIGNMENT_LOG2)
    }

    unsafe fn alloc(len: usize) -> std::ptr::NonNull<T> {
        let p = alloc(Self::layout(len)) as *mut T;
        match ptr::NonNull::new(p) {
            Some(p) => p,
            None => std::alloc::handle_alloc_error(Self::layout(len)),
        }
    }

    /// Creates a ['AlignedBoxedSlice'] with a slice of length ['len'] filled with
    /// ['val'].
    pub fn new(len: usize, val: T) -> Self
    where
        T: Clone,
    {
        debug_assert!(len > 0);
        let p = unsafe { Self::alloc(len) };
        for i in 0..len {
            unsafe { ptr::write(p.as_ptr().add(i), val.clone()) };
        }

        AlignedBoxedSlice { ptr: p, len }
    }
}

impl<T: Clone> Clone for AlignedBoxedSlice<T> {
    fn clone(&self) -> Self {
        let p = unsafe { Self::alloc(self.len) };
        for (i, v) in self.iter().enumerate() {
            unsafe { ptr::write(p.as_ptr().add(i), v.clone()) };
        }
        AlignedBoxedSlice { ptr: p, len: self.len }
    }
}

impl<T: fmt::Debug> fmt::Debug for AlignedBoxedSlice<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AlignedBoxedSlice {{ len: {} }}", self.len)
    }
}

impl<T> std::ops::Deref for AlignedBoxedSlice<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        unsafe {
            let p = self.ptr.as_ptr();

            std::slice::from_raw_parts(p, self.len)
        }
    }
}

impl<T> std::ops::DerefMut for AlignedBoxedSlice<T> {
    fn deref_mut(&mut self) -> &mut [T] {
        unsafe {
            let p = self.ptr.as_ptr();

            std::slice::from_raw_parts_mut(p, self.len)
        }
    }
}

impl<T> std::ops::Drop for AlignedBoxedSlice<T> {
    fn drop(&mut self) {
        unsafe {
            for a in self.iter_mut() {
                ptr::drop_in_place(a)
            }

            dealloc(self.ptr.as_ptr() as *mut u8, Self::layout(self.len));
        }
    }
}

unsafe impl<T> Send for AlignedBoxedSlice<T> where T: Send {}
unsafe impl<T> Sync for AlignedBoxedSlice<T> where T: Sync {}

pub trait CastFromPrimitive<T>: Copy + 'static {
    fn cast_from(v: T) -> Self;
}

macro_rules! impl_cast_from_primitive {
  ( $T:ty => $U:ty ) => {
    impl CastFromPrimitive<$U> for $T {
      #[inline(always)]
      fn cast_from(v: $U) -> Self { v as Self }
    }
  };
  ( $T:ty => { $( $U:ty ),* } ) => {
    $( impl_cast_from_primitive!($T => $U); )*
  };
}

// casts to { u8, u16 } are implemented separately using Pixel, so that the
// compiler understands that CastFromPrimitive<T: Pixel> is always implemented
impl_cast_from_primitive!(u8 => { u32, u64, usize });
impl_cast_from_primitive!(u8 => { i8, i16, i32, i64, isize });
impl_cast_from_primitive!(u16 => { u32, u64, usize });
impl_cast_from_primitive!(u16 => { i8, i16, i32, i64, isize });

pub trait Pixel:
    PrimInt
    + Default
    + Into<u32>
    + Into<i32>
    + AsPrimitive<u8>
    + AsPrimitive<i16>
    + AsPrimitive<u16>
    + AsPrimitive<i32>
    + AsPrimitive<i64>
    + AsPrimitive<u32>
    + CastFromPrimitive<u8>
    + CastFromPrimitive<i16>
    + CastFromPrimitive<u16>
    + CastFromPrimitive<i32>
    + CastFromPrimitive<u32>
    + CastFromPrimitive<usize>
    + Debug
    + Display
    + Send
    + Sync
    + 'static
{
}

impl Pixel for u8 {}
impl Pixel for u16 {}

macro_rules! impl_cast_from_pixel_to_primitive {
    ( $T:ty ) => {
        impl<T: Pixel> CastFromPrimitive<T> for $T {
            #[inline(always)]
            fn cast_from(v: T) -> Self {
                v.as_()
            }
        }
    };
}

impl_cast_from_pixel_to_primitive!(u8);
impl_cast_from_pixel_to_primitive!(i16);
impl_cast_from_pixel_to_primitive!(u16);
impl_cast_from_pixel_to_primitive!(i32);
impl_cast_from_pixel_to_primitive!(u32);

#[derive(Debug, Clone)]
pub struct Frame<T: Pixel> {
    pub planes: [Plane<T>; N_C],
    pub chroma_sampling: ChromaSampling,
    pub bit_depth: u8,
}

impl<T: Pixel> Frame<T> {
    pub fn new(width: usize, height: usize, chroma_sampling: ChromaSampling, bit_depth: u8) -> Self {
        let (ss_x, ss_y) = chroma_sampling.sampling_period();
        let (xdec, ydec) = (ss_x >> 1, ss_y >> 1);
        let (cw, ch) = ((width + ss_x - 1) >> xdec, (height + ss_y - 1) >> ydec);
        Frame {
            planes: [
                Plane::new(width, height, 0, 0, PIC_PAD_SIZE_L, PIC_PAD_SIZE_L),
                Plane::new(cw, ch, xdec, ydec, PIC_PAD_SIZE_C, PIC_PAD_SIZE_C),
                Plane::new(cw, ch, xdec, ydec, PIC_PAD_SIZE_C, PIC_PAD_SIZE_C),
            ],
            chroma_sampling,
            bit_depth,
        }
    }

    pub fn width(&self) -> usize {
        self.planes[Y_C].cfg.width
    }

    pub fn height(&self) -> usize {
        self.planes[Y_C].cfg.height
    }

    /// Replicates the picture border into the padding of every plane so that
    /// motion compensation may read outside the visible area.
    pub fn pad(&mut self) {
        for p in self.planes.iter_mut() {
            p.pad();
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn is_aligned<T>(ptr: *const T, n: usize) -> bool {
        ((ptr as usize) & ((1 << n) - 1)) == 0
    }

    #[test]
    fn sanity_heap() {
        let a: AlignedBoxedSlice<_> = AlignedBoxedSlice::new(3, 0u8);
        assert!(is_aligned(a.as_ptr(), 4));
        let b = a.clone();
        assert_eq!(&a[..], &b[..]);
    }

    #[test]
    fn frame_420_geometry() {
        let f = Frame::<u16>::new(66, 34, ChromaSampling::Cs420, 10);
        assert_eq!(f.width(), 66);
        assert_eq!(f.height(), 34);
        assert_eq!(f.planes[U_C].cfg.width, 33);
        assert_eq!(f.planes[V_C].cfg.height, 17);
        assert_eq!(f.planes[U_C].cfg.xpad, PIC_PAD_SIZE_C);
    }
}
