use super::def::*;
use super::plane::*;
use super::region::*;
use super::tracer::*;
use super::util::*;

/* an empty residual means the CU has no coefficients for this component */
fn evc_recon_plane_region(
    tracer: &mut Option<Tracer>,
    coef: &[i16],
    pred: &[pel],
    x: usize,
    y: usize,
    cuw: usize,
    cuh: usize,
    rec: &mut PlaneRegionMut<'_, pel>,
    ch_type: usize,
    bit_depth: u8,
) {
    if coef.is_empty() {
        /* just copy pred to rec */
        for (j, src) in pred.chunks(cuw).take(cuh).enumerate() {
            rec[y + j][x..x + cuw].copy_from_slice(src);
        }
    } else {
        /* add b/w pred and coef and copy it into rec */
        for (j, (src1, src2)) in coef.chunks(cuw).zip(pred.chunks(cuw)).take(cuh).enumerate() {
            let dst = &mut rec[y + j][x..x + cuw];
            for ((d, &c), &p) in dst.iter_mut().zip(src1).zip(src2) {
                *d = EVC_CLIP_PEL(c as i32 + p as i32, bit_depth);
            }
        }
    }

    TRACE_RECO_PLANE_REGION(tracer, ch_type, x, y, cuw, cuh, rec);
}

pub(crate) fn evc_recon_yuv(
    tracer: &mut Option<Tracer>,
    mut x: usize,
    mut y: usize,
    mut cuw: usize,
    mut cuh: usize,
    coef: &[Vec<i16>; N_C],
    pred: &[Vec<pel>; N_C],
    planes: &mut [Plane<pel>; N_C],
    bit_depth: u8,
) {
    /* Y */
    let rec = &mut planes[Y_C].as_region_mut();
    evc_recon_plane_region(
        tracer, &coef[Y_C], &pred[Y_C], x, y, cuw, cuh, rec, Y_C, bit_depth,
    );

    /* chroma */
    x >>= 1;
    y >>= 1;
    cuw >>= 1;
    cuh >>= 1;

    for &ch in [U_C, V_C].iter() {
        let rec = &mut planes[ch].as_region_mut();
        evc_recon_plane_region(
            tracer, &coef[ch], &pred[ch], x, y, cuw, cuh, rec, ch, bit_depth,
        );
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::api::frame::Frame;
    use crate::api::ChromaSampling;
    use pretty_assertions::assert_eq;

    #[test]
    fn recon_adds_and_clips() {
        let mut frame = Frame::<pel>::new(16, 16, ChromaSampling::Cs420, 8);
        let pred = [vec![250 as pel; 16], vec![10 as pel; 4], vec![7 as pel; 4]];
        let coef = [
            (0..16).map(|i| if i % 2 == 0 { 10 } else { -300 }).collect(),
            vec![],
            vec![-20, 0, 3, 1],
        ];

        evc_recon_yuv(&mut None, 4, 8, 4, 4, &coef, &pred, &mut frame.planes, 8);

        assert_eq!(frame.planes[Y_C].p(4, 8), 255);
        assert_eq!(frame.planes[Y_C].p(5, 8), 0);
        assert_eq!(frame.planes[Y_C].p(3, 8), 0);
        /* no residual copies the prediction */
        assert_eq!(frame.planes[U_C].p(2, 4), 10);
        assert_eq!(frame.planes[U_C].p(3, 5), 10);
        let v: Vec<pel> = (0..4).map(|i| frame.planes[V_C].p(2 + i % 2, 4 + i / 2)).collect();
        assert_eq!(v, vec![0, 7, 10, 8]);
    }
}
