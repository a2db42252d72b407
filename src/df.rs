use super::api::frame::Frame;
use super::def::*;
use super::region::PlaneRegionMut;
use super::tbl::*;
use super::tracer::*;
use super::util::*;

use std::cmp::*;

/// Per-SCU side information the deblocking filter reads.
pub(crate) struct DfMaps<'a> {
    pub(crate) w_scu: usize,
    pub(crate) h_scu: usize,
    pub(crate) map_scu: &'a [MCU],
    pub(crate) map_cu_id: &'a [u32],
    pub(crate) map_refi: &'a [[i8; REFP_NUM]],
    pub(crate) map_mv: &'a [[[i16; MV_D]; REFP_NUM]],
    pub(crate) map_qp_c: &'a [[u8; 2]],
}

/* vertical and horizontal edges on CU boundaries and on the transform grid */
pub(crate) fn evc_deblock(
    tracer: &mut Option<Tracer>,
    frame: &mut Frame<pel>,
    maps: &DfMaps<'_>,
    bit_depth: u8,
) {
    let w_scu = maps.w_scu;
    let scu_per_tr = MAX_TR_SIZE >> MIN_CU_LOG2;
    let mut bufs: Vec<PlaneRegionMut<'_, pel>> =
        frame.planes.iter_mut().map(|p| p.as_region_mut()).collect();

    /* horizontal filtering of vertical edges */
    for j in 0..maps.h_scu {
        for i in 1..w_scu {
            let q = j * w_scu + i;
            let p = q - 1;
            if maps.map_cu_id[p] == maps.map_cu_id[q] && i % scu_per_tr != 0 {
                continue;
            }
            deblock_scu_edge(
                tracer,
                &mut bufs,
                maps,
                q,
                p,
                i << MIN_CU_LOG2,
                j << MIN_CU_LOG2,
                false,
                bit_depth,
            );
        }
    }

    /* vertical filtering of horizontal edges */
    for j in 1..maps.h_scu {
        for i in 0..w_scu {
            let q = j * w_scu + i;
            let p = q - w_scu;
            if maps.map_cu_id[p] == maps.map_cu_id[q] && j % scu_per_tr != 0 {
                continue;
            }
            deblock_scu_edge(
                tracer,
                &mut bufs,
                maps,
                q,
                p,
                i << MIN_CU_LOG2,
                j << MIN_CU_LOG2,
                true,
                bit_depth,
            );
        }
    }
}

fn deblock_scu_edge(
    tracer: &mut Option<Tracer>,
    bufs: &mut [PlaneRegionMut<'_, pel>],
    maps: &DfMaps<'_>,
    q: usize,
    p: usize,
    x_pel: usize,
    y_pel: usize,
    is_hor_edge: bool,
    bit_depth: u8,
) {
    let tbl_qp_to_st = evc_get_tbl_qp_to_st(
        maps.map_scu[q],
        maps.map_scu[p],
        &maps.map_refi[q],
        &maps.map_refi[p],
        &maps.map_mv[q],
        &maps.map_mv[p],
    );
    let qp = maps.map_scu[q].GET_QP() as usize;
    let qp_c = maps.map_qp_c[q];

    if is_hor_edge {
        deblock_scu_hor(tracer, &mut bufs[Y_C], qp, Y_C, tbl_qp_to_st, x_pel, y_pel, bit_depth);
        for ch in [U_C, V_C].iter() {
            deblock_scu_hor_chroma(
                tracer,
                &mut bufs[*ch],
                qp_c[*ch - 1] as usize,
                *ch,
                tbl_qp_to_st,
                x_pel >> 1,
                y_pel >> 1,
                bit_depth,
            );
        }
    } else {
        deblock_scu_ver(tracer, &mut bufs[Y_C], qp, Y_C, tbl_qp_to_st, x_pel, y_pel, bit_depth);
        for ch in [U_C, V_C].iter() {
            deblock_scu_ver_chroma(
                tracer,
                &mut bufs[*ch],
                qp_c[*ch - 1] as usize,
                *ch,
                tbl_qp_to_st,
                x_pel >> 1,
                y_pel >> 1,
                bit_depth,
            );
        }
    }
}

/// Selects the strength row for the edge between the units `0` (q side) and
/// `1` (p side).
pub(crate) fn evc_get_tbl_qp_to_st(
    mcu0: MCU,
    mcu1: MCU,
    refi0: &[i8; REFP_NUM],
    refi1: &[i8; REFP_NUM],
    mv0: &[[i16; MV_D]; REFP_NUM],
    mv1: &[[i16; MV_D]; REFP_NUM],
) -> &'static [u8] {
    /* one whole luma sample in 1/16 units */
    const MV_DIFF_TH: i32 = 16;

    let idx = if mcu0.GET_IF() != 0 || mcu1.GET_IF() != 0 {
        0
    } else if mcu0.GET_CBFL() == 1 || mcu1.GET_CBFL() == 1 {
        1
    } else {
        let mv_of = |refi: &[i8; REFP_NUM], mv: &[[i16; MV_D]; REFP_NUM], lidx: usize| {
            if REFI_IS_VALID(refi[lidx]) {
                [mv[lidx][MV_X] as i32, mv[lidx][MV_Y] as i32]
            } else {
                [0, 0]
            }
        };
        let far = |a: [i32; MV_D], b: [i32; MV_D]| {
            (a[MV_X] - b[MV_X]).abs() >= MV_DIFF_TH || (a[MV_Y] - b[MV_Y]).abs() >= MV_DIFF_TH
        };

        let mv0_l0 = mv_of(refi0, mv0, REFP_0);
        let mv0_l1 = mv_of(refi0, mv0, REFP_1);
        let mv1_l0 = mv_of(refi1, mv1, REFP_0);
        let mv1_l1 = mv_of(refi1, mv1, REFP_1);

        if refi0[REFP_0] == refi1[REFP_0] && refi0[REFP_1] == refi1[REFP_1] {
            if far(mv0_l0, mv1_l0) || far(mv0_l1, mv1_l1) {
                2
            } else {
                3
            }
        } else if refi0[REFP_0] == refi1[REFP_1] && refi0[REFP_1] == refi1[REFP_0] {
            if far(mv0_l0, mv1_l1) || far(mv0_l1, mv1_l0) {
                2
            } else {
                3
            }
        } else {
            2
        }
    };

    &evc_tbl_df_st[idx]
}

/* filters the line A B | C D across the edge, returns the new A B C D */
#[inline]
pub(crate) fn deblock_line_luma(line: [i32; 4], st: i32, bit_depth: u8) -> [i32; 4] {
    let [a, b, c, d] = line;
    let max_val = MAX_SAMPLE_VAL(bit_depth);

    let delta = a - (b << 2) + (c << 2) - d;
    let abs = delta.abs() >> 3;
    let t16 = max(0, (abs - st) << 1);
    let clip = max(0, abs - t16);
    let d1 = delta.signum() * clip;

    let ad = a - d;
    let d2 = ad.signum() * min(ad.abs() >> 2, clip >> 1);

    [
        EVC_CLIP3(0, max_val, a - d2),
        EVC_CLIP3(0, max_val, b + d1),
        EVC_CLIP3(0, max_val, c - d1),
        EVC_CLIP3(0, max_val, d + d2),
    ]
}

#[inline]
pub(crate) fn deblock_line_chroma(line: [i32; 4], st: i32, bit_depth: u8) -> [i32; 4] {
    let [a, b, c, d] = line;
    let max_val = MAX_SAMPLE_VAL(bit_depth);

    let delta = a - (b << 2) + (c << 2) - d;
    let abs = delta.abs() >> 3;
    let t16 = max(0, (abs - st) << 1);
    let clip = max(0, abs - t16);
    let d1 = delta.signum() * clip;

    [a, EVC_CLIP3(0, max_val, b + d1), EVC_CLIP3(0, max_val, c - d1), d]
}

#[inline]
fn strength(tbl_qp_to_st: &[u8], qp: usize, bit_depth: u8) -> i32 {
    (tbl_qp_to_st[min(qp, tbl_qp_to_st.len() - 1)] as i32) << (bit_depth as i32 - 8)
}

/* public only so that the bench feature can re-export the kernels */
pub fn deblock_scu_hor(
    tracer: &mut Option<Tracer>,
    buf: &mut PlaneRegionMut<'_, pel>,
    qp: usize,
    ch_type: usize,
    tbl_qp_to_st: &[u8],
    x: usize,
    y: usize,
    bit_depth: u8,
) {
    let st = strength(tbl_qp_to_st, qp, bit_depth);
    let size = MIN_CU_SIZE;

    if st != 0 {
        for i in 0..size {
            let line = [
                buf[y - 2][x + i] as i32,
                buf[y - 1][x + i] as i32,
                buf[y][x + i] as i32,
                buf[y + 1][x + i] as i32,
            ];
            let [a, b, c, d] = deblock_line_luma(line, st, bit_depth);
            buf[y - 2][x + i] = a as pel;
            buf[y - 1][x + i] = b as pel;
            buf[y][x + i] = c as pel;
            buf[y + 1][x + i] = d as pel;
        }
        TRACE_DBF(tracer, ch_type, x, y, size, true, buf);
    }
}

pub fn deblock_scu_hor_chroma(
    tracer: &mut Option<Tracer>,
    buf: &mut PlaneRegionMut<'_, pel>,
    qp: usize,
    ch_type: usize,
    tbl_qp_to_st: &[u8],
    x: usize,
    y: usize,
    bit_depth: u8,
) {
    let st = strength(tbl_qp_to_st, qp, bit_depth);
    let size = MIN_CU_SIZE >> 1;

    if st != 0 {
        for i in 0..size {
            let line = [
                buf[y - 2][x + i] as i32,
                buf[y - 1][x + i] as i32,
                buf[y][x + i] as i32,
                buf[y + 1][x + i] as i32,
            ];
            let [_, b, c, _] = deblock_line_chroma(line, st, bit_depth);
            buf[y - 1][x + i] = b as pel;
            buf[y][x + i] = c as pel;
        }
        TRACE_DBF(tracer, ch_type, x, y, size, true, buf);
    }
}

pub fn deblock_scu_ver(
    tracer: &mut Option<Tracer>,
    buf: &mut PlaneRegionMut<'_, pel>,
    qp: usize,
    ch_type: usize,
    tbl_qp_to_st: &[u8],
    x: usize,
    y: usize,
    bit_depth: u8,
) {
    let st = strength(tbl_qp_to_st, qp, bit_depth);
    let size = MIN_CU_SIZE;

    if st != 0 {
        for j in 0..size {
            let row = &mut buf[y + j][x - 2..x + 2];
            let line = [row[0] as i32, row[1] as i32, row[2] as i32, row[3] as i32];
            for (s, v) in row.iter_mut().zip(deblock_line_luma(line, st, bit_depth).iter()) {
                *s = *v as pel;
            }
        }
        TRACE_DBF(tracer, ch_type, x, y, size, false, buf);
    }
}

pub fn deblock_scu_ver_chroma(
    tracer: &mut Option<Tracer>,
    buf: &mut PlaneRegionMut<'_, pel>,
    qp: usize,
    ch_type: usize,
    tbl_qp_to_st: &[u8],
    x: usize,
    y: usize,
    bit_depth: u8,
) {
    let st = strength(tbl_qp_to_st, qp, bit_depth);
    let size = MIN_CU_SIZE >> 1;

    if st != 0 {
        for j in 0..size {
            let row = &mut buf[y + j][x - 2..x + 2];
            let line = [row[0] as i32, row[1] as i32, row[2] as i32, row[3] as i32];
            let [_, b, c, _] = deblock_line_chroma(line, st, bit_depth);
            row[1] = b as pel;
            row[2] = c as pel;
        }
        TRACE_DBF(tracer, ch_type, x, y, size, false, buf);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::api::ChromaSampling;
    use interpolate_name::interpolate_test;
    use pretty_assertions::assert_eq;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaChaRng;

    #[test]
    fn flat_lines_are_unchanged() {
        for &v in [0, 1, 200, 1023].iter() {
            for st in 0..64 {
                assert_eq!(deblock_line_luma([v; 4], st, 10), [v; 4]);
                assert_eq!(deblock_line_chroma([v; 4], st, 10), [v; 4]);
            }
        }
    }

    #[interpolate_test(bd8, 8)]
    #[interpolate_test(bd10, 10)]
    #[interpolate_test(bd12, 12)]
    #[interpolate_test(bd14, 14)]
    fn filtered_lines_are_bounded(bit_depth: u8) {
        let mut ra = ChaChaRng::from_seed([bit_depth; 32]);
        let max_val = MAX_SAMPLE_VAL(bit_depth);
        for _ in 0..2000 {
            let line = [
                ra.gen_range(0, max_val + 1),
                ra.gen_range(0, max_val + 1),
                ra.gen_range(0, max_val + 1),
                ra.gen_range(0, max_val + 1),
            ];
            let st = ra.gen_range(0, 64 << (bit_depth - 8));
            for out in [
                deblock_line_luma(line, st, bit_depth),
                deblock_line_chroma(line, st, bit_depth),
            ]
            .iter()
            {
                assert!(out.iter().all(|&v| v >= 0 && v <= max_val));
            }
        }
    }

    #[test]
    fn step_edge_is_smoothed() {
        assert_eq!(deblock_line_luma([100, 100, 120, 120], 7, 8), [103, 107, 113, 117]);
        assert_eq!(deblock_line_chroma([100, 100, 120, 120], 7, 8), [100, 107, 113, 120]);
        /* st = 0 lets nothing through */
        assert_eq!(deblock_line_luma([100, 100, 120, 120], 0, 8), [100, 100, 120, 120]);
    }

    #[test]
    fn boundary_strength_classes() {
        let mut intra = MCU::default();
        intra.SET_IF_COD_QP(1, 30);
        let mut inter = MCU::default();
        inter.SET_IF_COD_QP(0, 30);
        let mut coded = inter;
        coded.SET_CBFL();
        let r = [0, REFI_INVALID];
        let mv = [[0, 0], [0, 0]];

        let row = |t: &'static [u8]| t.as_ptr();
        assert_eq!(row(evc_get_tbl_qp_to_st(intra, inter, &r, &r, &mv, &mv)), evc_tbl_df_st[0].as_ptr());
        assert_eq!(row(evc_get_tbl_qp_to_st(inter, coded, &r, &r, &mv, &mv)), evc_tbl_df_st[1].as_ptr());
        assert_eq!(row(evc_get_tbl_qp_to_st(inter, inter, &r, &[1, REFI_INVALID], &mv, &mv)), evc_tbl_df_st[2].as_ptr());
        assert_eq!(row(evc_get_tbl_qp_to_st(inter, inter, &r, &r, &mv, &[[16, 0], [0, 0]])), evc_tbl_df_st[2].as_ptr());
        assert_eq!(row(evc_get_tbl_qp_to_st(inter, inter, &r, &r, &mv, &[[15, -15], [99, 99]])), evc_tbl_df_st[3].as_ptr());
    }

    fn deblocked(
        w: usize,
        h: usize,
        luma: impl Fn(usize, usize) -> pel,
        cu_id: impl Fn(usize, usize) -> u32,
    ) -> Frame<pel> {
        let mut frame = Frame::<pel>::new(w, h, ChromaSampling::Cs420, 10);
        for y in 0..h {
            let row: Vec<pel> = (0..w).map(|x| luma(x, y)).collect();
            frame.planes[Y_C].copy_from_slice(&row, w, 0, y, w, 1);
        }
        for ch in [U_C, V_C].iter() {
            let flat = vec![512 as pel; (w / 2) * (h / 2)];
            frame.planes[*ch].copy_from_slice(&flat, w / 2, 0, 0, w / 2, h / 2);
        }

        let (w_scu, h_scu) = (w >> MIN_CU_LOG2, h >> MIN_CU_LOG2);
        let mut mcu = MCU::default();
        mcu.SET_IF_COD_QP(1, 40);
        let map_scu = vec![mcu; w_scu * h_scu];
        let map_cu_id: Vec<u32> = (0..w_scu * h_scu)
            .map(|i| cu_id(i % w_scu, i / w_scu))
            .collect();
        let map_refi = vec![[REFI_INVALID; REFP_NUM]; w_scu * h_scu];
        let map_mv = vec![[[0; MV_D]; REFP_NUM]; w_scu * h_scu];
        let map_qp_c = vec![[40, 40]; w_scu * h_scu];
        let maps = DfMaps {
            w_scu,
            h_scu,
            map_scu: &map_scu,
            map_cu_id: &map_cu_id,
            map_refi: &map_refi,
            map_mv: &map_mv,
            map_qp_c: &map_qp_c,
        };

        evc_deblock(&mut None, &mut frame, &maps, 10);
        frame
    }

    fn chroma_is_flat(frame: &Frame<pel>, w: usize, h: usize) -> bool {
        [U_C, V_C].iter().all(|&ch| {
            (0..h / 2).all(|y| (0..w / 2).all(|x| frame.planes[ch].p(x, y) == 512))
        })
    }

    const SMOOTHED_STEP: [pel; 16] =
        [400, 400, 400, 400, 400, 400, 409, 418, 462, 471, 480, 480, 480, 480, 480, 480];

    #[test]
    fn cu_boundary_is_filtered() {
        let frame = deblocked(
            16,
            16,
            |x, _| if x < 8 { 400 } else { 480 },
            |i, _| (i >= 2) as u32,
        );
        for y in 0..16 {
            let row: Vec<pel> = (0..16).map(|x| frame.planes[Y_C].p(x, y)).collect();
            assert_eq!(row, SMOOTHED_STEP.to_vec());
        }
        assert!(chroma_is_flat(&frame, 16, 16));
    }

    #[test]
    fn horizontal_cu_boundary_is_filtered() {
        let frame = deblocked(
            16,
            16,
            |_, y| if y < 8 { 400 } else { 480 },
            |_, j| (j >= 2) as u32,
        );
        for x in 0..16 {
            let col: Vec<pel> = (0..16).map(|y| frame.planes[Y_C].p(x, y)).collect();
            assert_eq!(col, SMOOTHED_STEP.to_vec());
        }
        assert!(chroma_is_flat(&frame, 16, 16));
    }

    #[test]
    fn transform_grid_is_filtered_inside_a_cu() {
        /* one CU: only the 64-sample grid line is an edge */
        let frame = deblocked(
            128,
            8,
            |x, _| match x {
                0..=31 => 300,
                32..=63 => 400,
                _ => 480,
            },
            |_, _| 0,
        );
        let mut expected = vec![300 as pel; 32];
        expected.extend(vec![400 as pel; 30]);
        expected.extend(vec![409, 418, 462, 471]);
        expected.extend(vec![480 as pel; 62]);
        for y in 0..8 {
            let row: Vec<pel> = (0..128).map(|x| frame.planes[Y_C].p(x, y)).collect();
            assert_eq!(row, expected);
        }
        assert!(chroma_is_flat(&frame, 128, 8));
    }
}
