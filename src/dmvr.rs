use super::def::*;
use super::mc::*;
use super::plane::*;

/* search order of the cross pattern: top, left, right, bottom */
const DMVR_SEARCH_DIRS: [[isize; MV_D]; 4] = [[0, -1], [-1, 0], [1, 0], [0, 1]];

/// Mean-removed SAD: `Σ|tpl - 2 * pred - delta|` over a `w`x`h` block, where
/// `delta` is the integer mean difference of the two blocks.
pub(crate) fn evc_dmvr_sad(
    tpl: &[i32],
    s_tpl: usize,
    pred: &[pel],
    s_pred: usize,
    w: usize,
    h: usize,
) -> i64 {
    let rows = || tpl.chunks(s_tpl).zip(pred.chunks(s_pred)).take(h);

    let diff: i64 = rows()
        .map(|(t, p)| {
            t[..w]
                .iter()
                .zip(&p[..w])
                .map(|(&t, &p)| t as i64 - 2 * p as i64)
                .sum::<i64>()
        })
        .sum();
    let delta = diff / (w * h) as i64;

    rows()
        .map(|(t, p)| {
            t[..w]
                .iter()
                .zip(&p[..w])
                .map(|(&t, &p)| (t as i64 - 2 * p as i64 - delta).abs())
                .sum::<i64>()
        })
        .sum()
}

/// Refines the motion vectors of a bi-predicted CU in whole luma samples.
///
/// Both lists are predicted with the bilinear filter over a window extended by
/// the search range; the sum of the two centre predictions is the template each
/// list is matched against. Every iteration evaluates the cross around the best
/// position so far and stops when no candidate is strictly cheaper. `mv_t` is
/// the clipped version of `mv`; the returned vectors are not clipped.
pub(crate) fn evc_dmvr(
    x: usize,
    y: usize,
    cuw: usize,
    cuh: usize,
    mv: &[[i16; MV_D]; REFP_NUM],
    mv_t: &[[i16; MV_D]; REFP_NUM],
    refs: [&Plane<pel>; REFP_NUM],
    iter_count: usize,
    bit_depth: u8,
) -> [[i16; MV_D]; REFP_NUM] {
    let ext = iter_count * REF_PRED_EXTENTION_PEL_COUNT;
    let (ew, eh) = (cuw + 2 * ext, cuh + 2 * ext);

    let mut win = [vec![0 as pel; ew * eh], vec![0 as pel; ew * eh]];
    for lidx in 0..REFP_NUM {
        let gmv_x = ((x as i32 - ext as i32) << 4) + mv_t[lidx][MV_X] as i32;
        let gmv_y = ((y as i32 - ext as i32) << 4) + mv_t[lidx][MV_Y] as i32;
        evc_bl_mc_l(
            mv[lidx][MV_X],
            mv[lidx][MV_Y],
            refs[lidx],
            gmv_x,
            gmv_y,
            &mut win[lidx],
            ew,
            eh,
            bit_depth,
        );
    }

    let mut tpl = vec![0i32; cuw * cuh];
    for (j, row) in tpl.chunks_mut(cuw).enumerate() {
        let off = (j + ext) * ew + ext;
        let p0 = &win[REFP_0][off..off + cuw];
        let p1 = &win[REFP_1][off..off + cuw];
        for (t, (&a, &b)) in row.iter_mut().zip(p0.iter().zip(p1.iter())) {
            *t = a as i32 + b as i32;
        }
    }

    let mut mv_r = *mv;
    for lidx in 0..REFP_NUM {
        let cost_at = |d: [isize; MV_D]| {
            let off = (ext as isize + d[MV_Y]) as usize * ew + (ext as isize + d[MV_X]) as usize;
            evc_dmvr_sad(&tpl, cuw, &win[lidx][off..], ew, cuw, cuh)
        };

        let mut best = [0isize; MV_D];
        let mut best_cost = cost_at(best);
        for _ in 0..iter_count {
            let center = best;
            for dir in DMVR_SEARCH_DIRS.iter() {
                let cand = [center[MV_X] + dir[MV_X], center[MV_Y] + dir[MV_Y]];
                if cand[MV_X].abs() as usize > ext || cand[MV_Y].abs() as usize > ext {
                    continue;
                }
                let cost = cost_at(cand);
                if cost < best_cost {
                    best_cost = cost;
                    best = cand;
                }
            }
            if best == center {
                break;
            }
        }

        for d in 0..MV_D {
            mv_r[lidx][d] = mv[lidx][d].saturating_add((best[d] << 4) as i16);
        }
    }

    mv_r
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaChaRng;

    /* second differences are constant, first differences are not */
    fn parabolic_plane() -> Plane<pel> {
        let (w, h) = (48, 32);
        let mut plane = Plane::new(w, h, 0, 0, 16, 16);
        let src: Vec<pel> = (0..w * h)
            .map(|i| {
                let (x, y) = ((i % w) as i32, (i / w) as i32);
                (2 * (x - 20) * (x - 20) + 3 * (y - 12) * (y - 12)) as pel
            })
            .collect();
        plane.copy_from_slice(&src, w, 0, 0, w, h);
        plane.pad();
        plane
    }

    #[test]
    fn sad_removes_mean() {
        let tpl = vec![10, 12, 14, 16];
        let pred: Vec<pel> = vec![1, 2, 3, 4];
        /* tpl - 2 * pred = 8 everywhere */
        assert_eq!(evc_dmvr_sad(&tpl, 2, &pred, 2, 2, 2), 0);
        let pred: Vec<pel> = vec![1, 2, 3, 9];
        /* differences 8, 8, 8, -2, delta = 5 */
        assert_eq!(evc_dmvr_sad(&tpl, 2, &pred, 2, 2, 2), 3 + 3 + 3 + 7);
    }

    #[test]
    fn symmetric_offsets_are_pulled_back() {
        let plane = parabolic_plane();
        let mv = [[16, 0], [-16, 0]];
        let refined = evc_dmvr(16, 8, 8, 8, &mv, &mv, [&plane, &plane], DMVR_ITER_COUNT, 10);
        assert_eq!(refined, [[0, 0], [0, 0]]);
    }

    #[test]
    fn matching_predictions_stay() {
        let mut ra = ChaChaRng::from_seed([9; 32]);
        let mut plane = Plane::new(32, 32, 0, 0, 16, 16);
        let src: Vec<pel> = (0..32 * 32).map(|_| ra.gen_range(0, 1024)).collect();
        plane.copy_from_slice(&src, 32, 0, 0, 32, 32);
        plane.pad();

        let mv = [[35, -12], [35, -12]];
        let refined = evc_dmvr(8, 8, 16, 8, &mv, &mv, [&plane, &plane], DMVR_ITER_COUNT, 10);
        assert_eq!(refined, mv);
    }

    #[test]
    fn refinement_stays_in_search_range() {
        let mut ra = ChaChaRng::from_seed([4; 32]);
        let mut plane = Plane::new(64, 64, 0, 0, 24, 24);
        let src: Vec<pel> = (0..64 * 64).map(|_| ra.gen_range(0, 256)).collect();
        plane.copy_from_slice(&src, 64, 0, 0, 64, 64);
        plane.pad();

        for iter_count in 1..=4 {
            for _ in 0..8 {
                let mv = [
                    [ra.gen_range(-64, 64), ra.gen_range(-64, 64)],
                    [ra.gen_range(-64, 64), ra.gen_range(-64, 64)],
                ];
                let refined = evc_dmvr(16, 16, 8, 8, &mv, &mv, [&plane, &plane], iter_count, 8);
                for lidx in 0..REFP_NUM {
                    for d in 0..MV_D {
                        let delta = (refined[lidx][d] - mv[lidx][d]) as i32;
                        assert_eq!(delta % 16, 0);
                        assert!(delta.abs() <= 16 * iter_count as i32);
                    }
                }
            }
        }
    }
}
