use super::def::*;
use super::tbl::*;

/* clipping within min and max */
#[inline]
pub(crate) fn EVC_CLIP3<T: PartialOrd>(min_x: T, max_x: T, value: T) -> T {
    if value < min_x {
        min_x
    } else if value > max_x {
        max_x
    } else {
        value
    }
}

/* largest sample value at the given bit depth */
#[inline]
pub(crate) fn MAX_SAMPLE_VAL(bit_depth: u8) -> i32 {
    (1 << bit_depth as i32) - 1
}

#[inline]
pub(crate) fn EVC_CLIP_PEL(v: i32, bit_depth: u8) -> pel {
    EVC_CLIP3(0, MAX_SAMPLE_VAL(bit_depth), v) as pel
}

#[inline]
pub(crate) fn CONV_LOG2(v: usize) -> u8 {
    evc_tbl_log2[v]
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn clip_is_idempotent() {
        for bd in 8..=14u8 {
            for &v in [-70000, -1, 0, 1, 255, 256, 1023, 1024, 16383, 16384, 70000].iter() {
                let once = EVC_CLIP_PEL(v, bd);
                assert_eq!(EVC_CLIP_PEL(once as i32, bd), once);
                assert!(once as i32 <= MAX_SAMPLE_VAL(bd));
            }
        }
    }
}
