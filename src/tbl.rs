use super::def::*;

lazy_static! {
    /* floor(log2(v)) for every block dimension up to MAX_CU_SIZE */
    pub(crate) static ref evc_tbl_log2: Box<[u8]> = {
        let mut tbl = vec![0u8; MAX_CU_SIZE + 1].into_boxed_slice();
        for v in 2..=MAX_CU_SIZE {
            tbl[v] = tbl[v >> 1] + 1;
        }
        tbl
    };
}

/* 8-tap luma interpolation filter, 1/16 sample phases */
#[rustfmt::skip]
pub(crate) static tbl_mc_l_coeff: [[i32; 8]; 16] = [
    [  0, 0,   0, 64,  0,   0, 0,  0 ],
    [  0, 1,  -3, 63,  4,  -2, 1,  0 ],
    [ -1, 2,  -5, 62,  8,  -3, 1,  0 ],
    [ -1, 3,  -8, 60, 13,  -4, 1,  0 ],
    [ -1, 4, -10, 58, 17,  -5, 1,  0 ],
    [ -1, 4, -11, 52, 26,  -8, 3, -1 ],
    [ -1, 3,  -9, 47, 31, -10, 4, -1 ],
    [ -1, 4, -11, 45, 34, -10, 4, -1 ],
    [ -1, 4, -11, 40, 40, -11, 4, -1 ],
    [ -1, 4, -10, 34, 45, -11, 4, -1 ],
    [ -1, 4, -10, 31, 47,  -9, 3, -1 ],
    [ -1, 3,  -8, 26, 52, -11, 4, -1 ],
    [  0, 1,  -5, 17, 58, -10, 4, -1 ],
    [  0, 1,  -4, 13, 60,  -8, 3, -1 ],
    [  0, 1,  -3,  8, 62,  -5, 2, -1 ],
    [  0, 1,  -2,  4, 63,  -3, 1,  0 ],
];

/* 4-tap chroma interpolation filter, 1/32 sample phases */
#[rustfmt::skip]
pub(crate) static tbl_mc_c_coeff: [[i32; 4]; 32] = [
    [  0, 64,  0,  0 ],
    [ -1, 63,  2,  0 ],
    [ -2, 62,  4,  0 ],
    [ -2, 60,  7, -1 ],
    [ -2, 58, 10, -2 ],
    [ -3, 57, 12, -2 ],
    [ -4, 56, 14, -2 ],
    [ -4, 55, 15, -2 ],
    [ -4, 54, 16, -2 ],
    [ -5, 53, 18, -2 ],
    [ -6, 52, 20, -2 ],
    [ -6, 49, 24, -3 ],
    [ -6, 46, 28, -4 ],
    [ -5, 44, 29, -4 ],
    [ -4, 42, 30, -4 ],
    [ -4, 39, 33, -4 ],
    [ -4, 36, 36, -4 ],
    [ -4, 33, 39, -4 ],
    [ -4, 30, 42, -4 ],
    [ -4, 29, 44, -5 ],
    [ -4, 28, 46, -6 ],
    [ -3, 24, 49, -6 ],
    [ -2, 20, 52, -6 ],
    [ -2, 18, 53, -5 ],
    [ -2, 16, 54, -4 ],
    [ -2, 15, 55, -4 ],
    [ -2, 14, 56, -4 ],
    [ -2, 12, 57, -3 ],
    [ -2, 10, 58, -2 ],
    [ -1,  7, 60, -2 ],
    [  0,  4, 62, -2 ],
    [  0,  2, 63, -1 ],
];

/* 2-tap bilinear filter used by the DMVR search, 1/16 sample phases */
#[rustfmt::skip]
pub(crate) static tbl_bl_mc_l_coeff: [[i32; 2]; 16] = [
    [ 64,  0 ],
    [ 60,  4 ],
    [ 56,  8 ],
    [ 52, 12 ],
    [ 48, 16 ],
    [ 44, 20 ],
    [ 40, 24 ],
    [ 36, 28 ],
    [ 32, 32 ],
    [ 28, 36 ],
    [ 24, 40 ],
    [ 20, 44 ],
    [ 16, 48 ],
    [ 12, 52 ],
    [  8, 56 ],
    [  4, 60 ],
];

/* deblocking strength per boundary class (row) and QP (column) */
#[rustfmt::skip]
pub(crate) static evc_tbl_df_st: [[u8; 52]; 4] = [
    [
        0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1, 1, 1, 1, 1, 1, 1, 1,
        1, 2, 2, 2, 2, 2, 3, 3, 3, 4, 4, 4, 5, 5, 6, 6, 7, 8, 9, 10, 11, 12, 12, 12, 12, 12,
    ],
    [
        0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1, 1, 1, 1,
        1, 1, 1, 1, 1, 2, 2, 2, 2, 3, 3, 3, 4, 4, 5, 5, 6, 7, 8, 9, 10, 10, 10, 10, 10, 10,
    ],
    [
        0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
        0, 1, 1, 1, 1, 1, 1, 1, 1, 1, 2, 2, 2, 2, 3, 3, 4, 4, 5, 6, 7, 7, 7, 7, 7, 7,
    ],
    [
        0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
        0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
    ],
];
