use super::def::*;
use super::dmvr::*;
use super::picman::*;
use super::plane::*;
use super::tbl::*;
use super::util::*;
use crate::api::EvcError;

use log::*;

use std::cell::RefCell;
use std::rc::Rc;

const MAC_SFT_N0: i32 = 6;
const MAC_ADD_N0: i32 = 1 << 5;
const MAC_SFT_0N: i32 = MAC_SFT_N0;
const MAC_ADD_0N: i32 = MAC_ADD_N0;

#[inline(always)]
pub const fn round_shift(value: i32, add: i32, shift: i32) -> i32 {
    (value + add) >> shift
}

#[inline(always)]
fn mac<T: Copy + Into<i32>>(src: &[T], coef: &[i32]) -> i32 {
    coef.iter().zip(src).map(|(c, &s)| c * s.into()).sum()
}

/* 8 wide, then 4 wide, then one sample at a time */
#[inline(always)]
fn for_each_chunk<F: FnMut(usize, usize)>(w: usize, mut f: F) {
    let mut x = 0;
    for &n in [8, 4, 1].iter() {
        while x + n <= w {
            f(x, n);
            x += n;
        }
    }
}

/// Interpolation filter family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum McFilter {
    /// 8-tap luma filter, 1/16 sample
    Luma,
    /// 4-tap chroma filter, 1/32 sample
    Chroma,
    /// 2-tap bilinear luma filter used by the DMVR search, 1/16 sample
    Bilinear,
}

impl McFilter {
    #[inline]
    fn coef(self, frac: usize) -> &'static [i32] {
        match self {
            McFilter::Luma => &tbl_mc_l_coeff[frac],
            McFilter::Chroma => &tbl_mc_c_coeff[frac],
            McFilter::Bilinear => &tbl_bl_mc_l_coeff[frac],
        }
    }

    /* samples before the integer position covered by the taps */
    #[inline]
    fn origin(self) -> isize {
        match self {
            McFilter::Luma => 3,
            McFilter::Chroma => 1,
            McFilter::Bilinear => 0,
        }
    }

    #[inline]
    fn frac_bits(self) -> usize {
        match self {
            McFilter::Chroma => MV_FRAC_BITS_C,
            _ => MV_FRAC_BITS_L,
        }
    }
}

/// Which passes an interpolation needs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum McPhase {
    Copy,
    HorizontalOnly,
    VerticalOnly,
    Full,
}

impl McPhase {
    /// Classifies a motion vector for the filter family whose precision is
    /// `frac_bits` fractional bits.
    #[inline]
    pub fn from_mv(mv_x: i16, mv_y: i16, frac_bits: usize) -> Self {
        let mask = (1 << frac_bits) - 1;
        match (mv_x as i32 & mask != 0, mv_y as i32 & mask != 0) {
            (false, false) => McPhase::Copy,
            (true, false) => McPhase::HorizontalOnly,
            (false, true) => McPhase::VerticalOnly,
            (true, true) => McPhase::Full,
        }
    }
}

fn mc_copy(r: &PlaneSlice<'_, pel>, pred: &mut [pel], s_pred: usize, w: usize, h: usize) {
    for (y, dst) in pred.chunks_mut(s_pred).take(h).enumerate() {
        dst[..w].copy_from_slice(&r[y][..w]);
    }
}

fn mc_hor(
    r: &PlaneSlice<'_, pel>,
    coef: &[i32],
    pred: &mut [pel],
    s_pred: usize,
    w: usize,
    h: usize,
    bit_depth: u8,
) {
    for (y, dst) in pred.chunks_mut(s_pred).take(h).enumerate() {
        let src = &r[y];
        for_each_chunk(w, |x0, n| {
            for x in x0..x0 + n {
                dst[x] = EVC_CLIP_PEL(
                    round_shift(mac(&src[x..], coef), MAC_ADD_N0, MAC_SFT_N0),
                    bit_depth,
                );
            }
        });
    }
}

fn mc_ver(
    r: &PlaneSlice<'_, pel>,
    coef: &[i32],
    pred: &mut [pel],
    s_pred: usize,
    w: usize,
    h: usize,
    bit_depth: u8,
) {
    let taps = coef.len();
    for (y, dst) in pred.chunks_mut(s_pred).take(h).enumerate() {
        let rows: Vec<&[pel]> = (0..taps).map(|k| &r[y + k][..w]).collect();
        for_each_chunk(w, |x0, n| {
            for x in x0..x0 + n {
                let sum: i32 = coef
                    .iter()
                    .zip(rows.iter())
                    .map(|(c, row)| c * row[x] as i32)
                    .sum();
                dst[x] = EVC_CLIP_PEL(round_shift(sum, MAC_ADD_0N, MAC_SFT_0N), bit_depth);
            }
        });
    }
}

fn mc_full(
    r: &PlaneSlice<'_, pel>,
    coef_x: &[i32],
    coef_y: &[i32],
    pred: &mut [pel],
    s_pred: usize,
    w: usize,
    h: usize,
    bit_depth: u8,
) {
    let taps = coef_y.len();
    let shift1 = std::cmp::min(4, bit_depth as i32 - 8);
    let shift2 = std::cmp::max(8, 20 - bit_depth as i32);
    let add2 = 1 << (shift2 - 1);

    /* horizontal pass into the wider intermediate buffer, no clipping */
    let mut buf = vec![0i32; w * (h + taps - 1)];
    for (y, row) in buf.chunks_mut(w).enumerate() {
        let src = &r[y];
        for_each_chunk(w, |x0, n| {
            for x in x0..x0 + n {
                row[x] = mac(&src[x..], coef_x) >> shift1;
            }
        });
    }

    for (y, dst) in pred.chunks_mut(s_pred).take(h).enumerate() {
        let rows = &buf[y * w..];
        for_each_chunk(w, |x0, n| {
            for x in x0..x0 + n {
                let sum: i32 = coef_y
                    .iter()
                    .enumerate()
                    .map(|(k, c)| c * rows[k * w + x])
                    .sum();
                dst[x] = EVC_CLIP_PEL(round_shift(sum, add2, shift2), bit_depth);
            }
        });
    }
}

/// Interpolates a `w`x`h` block of plane `r` at position (`gmv_x`, `gmv_y`),
/// given in fractional units of `filter`, into `pred` (stride `s_pred`).
pub fn evc_mc_plane(
    filter: McFilter,
    phase: McPhase,
    r: &Plane<pel>,
    gmv_x: i32,
    gmv_y: i32,
    pred: &mut [pel],
    s_pred: usize,
    w: usize,
    h: usize,
    bit_depth: u8,
) {
    let bits = filter.frac_bits();
    let mask = (1 << bits) - 1;
    let (xi, yi) = ((gmv_x >> bits) as isize, (gmv_y >> bits) as isize);
    let (dx, dy) = ((gmv_x & mask) as usize, (gmv_y & mask) as usize);
    let org = filter.origin();

    match phase {
        McPhase::Copy => {
            let po = PlaneOffset { x: xi, y: yi };
            mc_copy(&r.slice(po), pred, s_pred, w, h);
        }
        McPhase::HorizontalOnly => {
            let po = PlaneOffset { x: xi - org, y: yi };
            mc_hor(&r.slice(po), filter.coef(dx), pred, s_pred, w, h, bit_depth);
        }
        McPhase::VerticalOnly => {
            let po = PlaneOffset { x: xi, y: yi - org };
            mc_ver(&r.slice(po), filter.coef(dy), pred, s_pred, w, h, bit_depth);
        }
        McPhase::Full => {
            let po = PlaneOffset {
                x: xi - org,
                y: yi - org,
            };
            mc_full(
                &r.slice(po),
                filter.coef(dx),
                filter.coef(dy),
                pred,
                s_pred,
                w,
                h,
                bit_depth,
            );
        }
    }
}

/* public only so that the bench feature can re-export the kernels */
pub fn evc_mc_l(
    ori_mv_x: i16,
    ori_mv_y: i16,
    r: &Plane<pel>,
    gmv_x: i32,
    gmv_y: i32,
    pred: &mut [pel],
    cuw: usize,
    cuh: usize,
    bit_depth: u8,
) {
    let phase = McPhase::from_mv(ori_mv_x, ori_mv_y, MV_FRAC_BITS_L);
    evc_mc_plane(McFilter::Luma, phase, r, gmv_x, gmv_y, pred, cuw, cuw, cuh, bit_depth)
}

/* gmv is in 1/16 luma units, which is 1/32 of a 4:2:0 chroma sample */
pub fn evc_mc_c(
    ori_mv_x: i16,
    ori_mv_y: i16,
    r: &Plane<pel>,
    gmv_x: i32,
    gmv_y: i32,
    pred: &mut [pel],
    cuw: usize,
    cuh: usize,
    bit_depth: u8,
) {
    let phase = McPhase::from_mv(ori_mv_x, ori_mv_y, MV_FRAC_BITS_C);
    evc_mc_plane(McFilter::Chroma, phase, r, gmv_x, gmv_y, pred, cuw, cuw, cuh, bit_depth)
}

pub fn evc_bl_mc_l(
    ori_mv_x: i16,
    ori_mv_y: i16,
    r: &Plane<pel>,
    gmv_x: i32,
    gmv_y: i32,
    pred: &mut [pel],
    cuw: usize,
    cuh: usize,
    bit_depth: u8,
) {
    let phase = McPhase::from_mv(ori_mv_x, ori_mv_y, MV_FRAC_BITS_L);
    evc_mc_plane(McFilter::Bilinear, phase, r, gmv_x, gmv_y, pred, cuw, cuw, cuh, bit_depth)
}

/* keep the referenced block within MAX_CU_SIZE samples of the picture */
pub(crate) fn mv_clip(
    x: usize,
    y: usize,
    pic_w: usize,
    pic_h: usize,
    cuw: usize,
    cuh: usize,
    refi: &[i8; REFP_NUM],
    mv: &[[i16; MV_D]; REFP_NUM],
) -> [[i16; MV_D]; REFP_NUM] {
    let mut mv_t = *mv;

    let pos = [(x as i32) << 4, (y as i32) << 4];
    let size = [(cuw as i32) << 4, (cuh as i32) << 4];
    let min_clip = -((MAX_CU_SIZE as i32) << 4);
    let max_clip = [
        (pic_w as i32 - 1 + MAX_CU_SIZE as i32) << 4,
        (pic_h as i32 - 1 + MAX_CU_SIZE as i32) << 4,
    ];

    for lidx in 0..REFP_NUM {
        if !REFI_IS_VALID(refi[lidx]) {
            continue;
        }
        for d in 0..MV_D {
            let v = mv[lidx][d] as i32;
            if pos[d] + v < min_clip {
                mv_t[lidx][d] = (min_clip - pos[d]) as i16;
            }
            if pos[d] + v + size[d] - 16 > max_clip[d] {
                mv_t[lidx][d] = (max_clip[d] - pos[d] - size[d] + 16) as i16;
            }
        }
    }
    mv_t
}

/* both references on opposite sides of the current picture at equal distance */
fn dmvr_poc_condition(poc: i32, poc0: i32, poc1: i32) -> bool {
    let d0 = poc - poc0;
    let d1 = poc1 - poc;
    d0 != 0 && d0 == d1
}

fn mc_one_ref(
    x: usize,
    y: usize,
    cuw: usize,
    cuh: usize,
    ori_mv: &[i16; MV_D],
    mv_t: &[i16; MV_D],
    ref_pic: &Rc<RefCell<EvcPic>>,
    pred: &mut CUBuffer<pel>,
    bit_depth: u8,
) {
    let gmv_x = ((x as i32) << 4) + mv_t[MV_X] as i32;
    let gmv_y = ((y as i32) << 4) + mv_t[MV_Y] as i32;
    let pic = ref_pic.borrow();
    let frame = pic.frame.borrow();
    let planes = &frame.planes;

    evc_mc_l(
        ori_mv[MV_X],
        ori_mv[MV_Y],
        &planes[Y_C],
        gmv_x,
        gmv_y,
        &mut pred.data[Y_C],
        cuw,
        cuh,
        bit_depth,
    );
    for ch in [U_C, V_C].iter() {
        evc_mc_c(
            ori_mv[MV_X],
            ori_mv[MV_Y],
            &planes[*ch],
            gmv_x,
            gmv_y,
            &mut pred.data[*ch],
            cuw >> 1,
            cuh >> 1,
            bit_depth,
        );
    }
}

/// Inter prediction of one CU into `pred[0]`. Returns the motion vectors
/// actually used, which differ from `mv` when DMVR refined them.
pub(crate) fn evc_mc(
    x: usize,
    y: usize,
    pic_w: usize,
    pic_h: usize,
    cuw: usize,
    cuh: usize,
    refi: &[i8; REFP_NUM],
    mv: &[[i16; MV_D]; REFP_NUM],
    refp: &[Vec<EvcRefP>],
    pred: &mut [CUBuffer<pel>; 2],
    poc: i32,
    apply_dmvr: bool,
    dmvr_iter_count: usize,
    bit_depth: u8,
) -> Result<[[i16; MV_D]; REFP_NUM], EvcError> {
    let mut refs: [Option<Rc<RefCell<EvcPic>>>; REFP_NUM] = [None, None];
    for lidx in 0..REFP_NUM {
        if REFI_IS_VALID(refi[lidx]) {
            refs[lidx] = refp.get(refi[lidx] as usize).and_then(|r| r[lidx].pic());
            if refs[lidx].is_none() {
                warn!(
                    "mc: list {} index {} has no reference picture",
                    lidx, refi[lidx]
                );
                return Err(EvcError::EVC_ERR_INVALID_ARGUMENT);
            }
        }
    }

    let mut mv_r = *mv;
    if let (Some(pic0), Some(pic1)) = (&refs[REFP_0], &refs[REFP_1]) {
        if apply_dmvr
            && cuw >= DMVR_MIN_CU_SIZE
            && cuh >= DMVR_MIN_CU_SIZE
            && dmvr_poc_condition(poc, pic0.borrow().poc, pic1.borrow().poc)
        {
            let mv_t = mv_clip(x, y, pic_w, pic_h, cuw, cuh, refi, mv);
            let p0 = pic0.borrow();
            let p1 = pic1.borrow();
            let f0 = p0.frame.borrow();
            let f1 = p1.frame.borrow();
            mv_r = evc_dmvr(
                x,
                y,
                cuw,
                cuh,
                mv,
                &mv_t,
                [&f0.planes[Y_C], &f1.planes[Y_C]],
                dmvr_iter_count,
                bit_depth,
            );
            trace!(
                "mc: dmvr at ({}, {}) {:?} -> {:?}",
                x,
                y,
                mv,
                mv_r
            );
        }
    }

    //store it to pass it to interpolation function for deriving correct interpolation filter
    let mv_before_clipping = mv_r;
    let mv_t = mv_clip(x, y, pic_w, pic_h, cuw, cuh, refi, &mv_r);

    let mut bidx = 0;
    if let Some(pic0) = &refs[REFP_0] {
        /* forward */
        mc_one_ref(
            x,
            y,
            cuw,
            cuh,
            &mv_before_clipping[REFP_0],
            &mv_t[REFP_0],
            pic0,
            &mut pred[0],
            bit_depth,
        );
        bidx += 1;
    }

    /* check identical motion */
    if let (Some(pic0), Some(pic1)) = (&refs[REFP_0], &refs[REFP_1]) {
        if pic0.borrow().poc == pic1.borrow().poc && mv_t[REFP_0] == mv_t[REFP_1] {
            return Ok(mv_r);
        }
    }

    if let Some(pic1) = &refs[REFP_1] {
        /* backward */
        mc_one_ref(
            x,
            y,
            cuw,
            cuh,
            &mv_before_clipping[REFP_1],
            &mv_t[REFP_1],
            pic1,
            &mut pred[bidx],
            bit_depth,
        );
        bidx += 1;
    }

    if bidx == 2 {
        let (pred0, pred1) = pred.split_at_mut(1);
        let dims = [(cuw, cuh), (cuw >> 1, cuh >> 1), (cuw >> 1, cuh >> 1)];
        for (ch, &(w, h)) in dims.iter().enumerate() {
            let p0 = &mut pred0[0].data[ch][..w * h];
            let p1 = &pred1[0].data[ch][..w * h];
            for (a, &b) in p0.iter_mut().zip(p1.iter()) {
                *a = (*a + b + 1) >> 1;
            }
        }
    }

    Ok(mv_r)
}
