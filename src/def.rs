use crate::api::*;

/*****************************************************************************
 * types
 *****************************************************************************/

#[inline]
pub(crate) fn evc_assert_rv(x: bool, r: EvcError) -> Result<(), EvcError> {
    if !x {
        return Err(r);
    }
    Ok(())
}

pub type pel = u16;

pub(crate) const Y_C: usize = 0; /* Y luma */
pub(crate) const U_C: usize = 1; /* Cb Chroma */
pub(crate) const V_C: usize = 2; /* Cr Chroma */
pub(crate) const N_C: usize = 3; /* number of color component */

pub(crate) const REFP_0: usize = 0;
pub(crate) const REFP_1: usize = 1;
pub(crate) const REFP_NUM: usize = 2;

/*****************************************************************************
 * reference index
 *****************************************************************************/
pub(crate) const REFI_INVALID: i8 = (-1);

#[inline]
pub(crate) fn REFI_IS_VALID(refi: i8) -> bool {
    refi >= 0
}

/* X direction motion vector indicator */
pub(crate) const MV_X: usize = 0;
/* Y direction motion vector indicator */
pub(crate) const MV_Y: usize = 1;
/* Maximum count (dimension) of motion */
pub(crate) const MV_D: usize = 2;

/* fractional bits of a luma motion vector (1/16 sample) */
pub(crate) const MV_FRAC_BITS_L: usize = 4;
/* fractional bits of a 4:2:0 chroma motion vector (1/32 sample) */
pub(crate) const MV_FRAC_BITS_C: usize = 5;

pub(crate) const MAX_CU_LOG2: usize = 7;
pub(crate) const MIN_CU_LOG2: usize = 2;
pub(crate) const MAX_CU_SIZE: usize = (1 << MAX_CU_LOG2);
pub(crate) const MIN_CU_SIZE: usize = (1 << MIN_CU_LOG2);
pub(crate) const MAX_CU_DIM: usize = (MAX_CU_SIZE * MAX_CU_SIZE);

pub(crate) const MAX_TR_LOG2: usize = 6; /* 64x64 */
pub(crate) const MAX_TR_SIZE: usize = (1 << MAX_TR_LOG2);

/* pixel position to SCU position */
#[inline]
pub(crate) fn PEL2SCU(p: usize) -> usize {
    p >> MIN_CU_LOG2
}

pub(crate) const PIC_PAD_SIZE_L: usize = (MAX_CU_SIZE + 16);
pub(crate) const PIC_PAD_SIZE_C: usize = (PIC_PAD_SIZE_L >> 1);

/* DPB Extra size */
pub(crate) const EXTRA_FRAME: usize = MAX_NUM_ACTIVE_REF_FRAME;
/* maximum picture buffer size, one more for the picture under decoding */
pub(crate) const MAX_PB_SIZE: usize = MAX_NUM_REF_PICS + EXTRA_FRAME + 1;

/*****************************************************************************
 * decoder-side motion vector refinement
 *****************************************************************************/
pub(crate) const DMVR_ITER_COUNT: usize = 2;
pub(crate) const DMVR_NEW_VERSION_ITER_COUNT: usize = 8;
pub(crate) const REF_PRED_EXTENTION_PEL_COUNT: usize = 1;
/* smallest luma block width and height refined by DMVR */
pub(crate) const DMVR_MIN_CU_SIZE: usize = 8;

/*****************************************************************************
 * mode map bit layout
 - [0:14]  : reserved
 - [15:15] : 1 -> intra CU, 0 -> inter CU
 - [16:22] : QP
 - [23:23] : reserved
 - [24:24] : luma cbf
 - [25:30] : reserved
 - [31:31] : COD: 0 -> no decoded CU, 1 -> decoded CU
*****************************************************************************/
#[derive(Default, Clone, Copy, Debug, PartialEq)]
pub(crate) struct MCU(u32);

impl From<u32> for MCU {
    fn from(val: u32) -> Self {
        MCU(val)
    }
}

impl MCU {
    /* get intra CU flag from map */
    #[inline]
    pub(crate) fn GET_IF(&self) -> u32 {
        (self.0 >> 15) & 1
    }

    /* get QP from map */
    #[inline]
    pub(crate) fn GET_QP(&self) -> u32 {
        (self.0 >> 16) & 0x7F
    }

    /* set luma cbf flag */
    #[inline]
    pub(crate) fn SET_CBFL(&mut self) {
        self.0 = self.0 | (1 << 24);
    }
    /* get luma cbf flag */
    #[inline]
    pub(crate) fn GET_CBFL(&self) -> u32 {
        (self.0 >> 24) & 1
    }

    /* get decoded CU flag from map */
    #[inline]
    pub(crate) fn GET_COD(&self) -> u32 {
        (self.0 >> 31) & 1
    }

    /* multi bit setting: intra flag, decoded flag, qp */
    #[inline]
    pub(crate) fn SET_IF_COD_QP(&mut self, i: u32, qp: u8) {
        self.0 = (self.0 & 0x7F80_7FFF) | (((qp as u32) & 0x7F) << 16) | (i << 15) | (1 << 31);
    }
}

/* per-CU scratch prediction storage, one vector per color component */
pub(crate) struct CUBuffer<T: Default + Copy> {
    pub(crate) data: [Vec<T>; N_C],
}

impl<T: Default + Copy> Default for CUBuffer<T> {
    fn default() -> Self {
        CUBuffer {
            data: [
                vec![T::default(); MAX_CU_DIM],
                vec![T::default(); MAX_CU_DIM >> 2],
                vec![T::default(); MAX_CU_DIM >> 2],
            ],
        }
    }
}
