use crate::api::frame::*;
use crate::plane::*;

use std::marker::PhantomData;
use std::ops::{Index, IndexMut};
use std::slice;

/// Rectangle of a plane region, in pixels
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rect {
    // coordinates relative to the plane origin (xorigin, yorigin)
    pub x: isize,
    pub y: isize,
    pub width: usize,
    pub height: usize,
}

/// Bounded region of a plane
///
/// This allows to give access to a rectangular area of a plane without
/// giving access to the whole plane.
#[derive(Debug)]
pub struct PlaneRegion<'a, T: Pixel> {
    data: *const T, // points to (plane_cfg.x, plane_cfg.y)
    pub plane_cfg: &'a PlaneConfig,
    rect: Rect,
    phantom: PhantomData<&'a T>,
}

/// Mutable bounded region of a plane
///
/// This allows to give mutable access to a rectangular area of the plane
/// without giving access to the whole plane.
#[derive(Debug)]
pub struct PlaneRegionMut<'a, T: Pixel> {
    data: *mut T, // points to (plane_cfg.x, plane_cfg.y)
    pub plane_cfg: &'a PlaneConfig,
    rect: Rect,
    phantom: PhantomData<&'a mut T>,
}

impl<'a, T: Pixel> PlaneRegion<'a, T> {
    #[inline(always)]
    pub fn new(plane: &'a Plane<T>, rect: Rect) -> Self {
        assert!(rect.x >= -(plane.cfg.xorigin as isize));
        assert!(rect.y >= -(plane.cfg.yorigin as isize));
        assert!(plane.cfg.xorigin as isize + rect.x + rect.width as isize <= plane.cfg.stride as isize);
        assert!(plane.cfg.yorigin as isize + rect.y + rect.height as isize <= plane.cfg.alloc_height as isize);
        let origin = (plane.cfg.yorigin as isize + rect.y) * plane.cfg.stride as isize
            + plane.cfg.xorigin as isize
            + rect.x;
        Self {
            data: unsafe { plane.data.as_ptr().offset(origin) },
            plane_cfg: &plane.cfg,
            rect,
            phantom: PhantomData,
        }
    }

    #[inline(always)]
    pub fn new_from_plane(plane: &'a Plane<T>) -> Self {
        let rect = Rect {
            x: 0,
            y: 0,
            width: plane.cfg.width,
            height: plane.cfg.height,
        };
        Self::new(plane, rect)
    }

    #[inline(always)]
    pub fn rect(&self) -> &Rect {
        &self.rect
    }

}

impl<'a, T: Pixel> PlaneRegionMut<'a, T> {
    #[inline(always)]
    pub fn new(plane: &'a mut Plane<T>, rect: Rect) -> Self {
        assert!(rect.x >= -(plane.cfg.xorigin as isize));
        assert!(rect.y >= -(plane.cfg.yorigin as isize));
        assert!(plane.cfg.xorigin as isize + rect.x + rect.width as isize <= plane.cfg.stride as isize);
        assert!(plane.cfg.yorigin as isize + rect.y + rect.height as isize <= plane.cfg.alloc_height as isize);
        let origin = (plane.cfg.yorigin as isize + rect.y) * plane.cfg.stride as isize
            + plane.cfg.xorigin as isize
            + rect.x;
        Self {
            data: unsafe { plane.data.as_mut_ptr().offset(origin) },
            plane_cfg: &plane.cfg,
            rect,
            phantom: PhantomData,
        }
    }

    #[inline(always)]
    pub fn new_from_plane(plane: &'a mut Plane<T>) -> Self {
        let rect = Rect {
            x: 0,
            y: 0,
            width: plane.cfg.width,
            height: plane.cfg.height,
        };
        Self::new(plane, rect)
    }

    #[inline(always)]
    pub fn rect(&self) -> &Rect {
        &self.rect
    }

}

impl<T: Pixel> Index<usize> for PlaneRegion<'_, T> {
    type Output = [T];

    #[inline(always)]
    fn index(&self, index: usize) -> &Self::Output {
        assert!(index < self.rect.height);
        unsafe {
            let ptr = self.data.add(index * self.plane_cfg.stride);
            slice::from_raw_parts(ptr, self.rect.width)
        }
    }
}

impl<T: Pixel> Index<usize> for PlaneRegionMut<'_, T> {
    type Output = [T];

    #[inline(always)]
    fn index(&self, index: usize) -> &Self::Output {
        assert!(index < self.rect.height);
        unsafe {
            let ptr = self.data.add(index * self.plane_cfg.stride);
            slice::from_raw_parts(ptr, self.rect.width)
        }
    }
}

impl<T: Pixel> IndexMut<usize> for PlaneRegionMut<'_, T> {
    #[inline(always)]
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        assert!(index < self.rect.height);
        unsafe {
            let ptr = self.data.add(index * self.plane_cfg.stride);
            slice::from_raw_parts_mut(ptr, self.rect.width)
        }
    }
}
