use criterion::*;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaChaRng;

use revc_dec::bench::df::*;
use revc_dec::bench::frame::*;
use revc_dec::bench::plane::*;

criterion_group!(
    df,
    bench_deblock_scu_hor_luma,
    bench_deblock_scu_hor_chroma,
    bench_deblock_scu_ver_luma,
    bench_deblock_scu_ver_chroma,
);

const BIT_DEPTH: u8 = 10;

/* intra row of the boundary strength table */
#[rustfmt::skip]
const TBL_QP_TO_ST: [u8; 52] = [
    0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1, 1, 1, 1, 1, 1, 1, 1, 1, 2, 2, 2,
    2, 2, 3, 3, 3, 4, 4, 4, 5, 5, 6, 6, 7, 8, 9, 10, 11, 12, 12, 12, 12, 12,
];

fn fill_plane<T: Pixel>(ra: &mut ChaChaRng, plane: &mut Plane<T>) {
    let stride = plane.cfg.stride;
    for row in plane.data_origin_mut().chunks_mut(stride) {
        for pixel in row {
            let v: u16 = ra.gen_range(0, 1 << BIT_DEPTH);
            *pixel = T::cast_from(v);
        }
    }
}

fn new_plane<T: Pixel>(ra: &mut ChaChaRng, width: usize, height: usize) -> Plane<T> {
    let mut p = Plane::new(width, height, 0, 0, 64 + 16, 64 + 16);

    fill_plane(ra, &mut p);

    p
}

type DfFn = fn(
    &mut Option<(Box<dyn std::io::Write>, isize)>,
    &mut PlaneRegionMut<'_, u16>,
    usize,
    usize,
    &[u8],
    usize,
    usize,
    u8,
);

fn bench_df(c: &mut Criterion, name: &str, df: DfFn, ch_type: usize) {
    let mut ra = ChaChaRng::from_seed([0; 32]);
    let mut plane = new_plane::<u16>(&mut ra, 640, 480);
    let qp = 37;

    c.bench_function(name, |b| {
        b.iter(|| {
            df(
                &mut None,
                &mut plane.as_region_mut(),
                qp,
                ch_type,
                &TBL_QP_TO_ST,
                64,
                64,
                BIT_DEPTH,
            );
        })
    });
}

fn bench_deblock_scu_hor_luma(c: &mut Criterion) {
    bench_df(c, "deblock_scu_hor_luma", deblock_scu_hor, 0);
}

fn bench_deblock_scu_hor_chroma(c: &mut Criterion) {
    bench_df(c, "deblock_scu_hor_chroma", deblock_scu_hor_chroma, 1);
}

fn bench_deblock_scu_ver_luma(c: &mut Criterion) {
    bench_df(c, "deblock_scu_ver_luma", deblock_scu_ver, 0);
}

fn bench_deblock_scu_ver_chroma(c: &mut Criterion) {
    bench_df(c, "deblock_scu_ver_chroma", deblock_scu_ver_chroma, 1);
}
