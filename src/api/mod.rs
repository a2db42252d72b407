use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use num_traits::ToPrimitive;
use thiserror::Error;

pub mod frame;

use crate::dec::*;
pub use crate::def::pel;
pub use crate::picman::{DefaultPicBufAllocator, PicBufAllocator};
use crate::def::*;
use frame::*;

/*****************************************************************************
 * return values and error code
 *****************************************************************************/
pub const EVC_OK: usize = 0;

#[derive(Debug, Error, FromPrimitive, ToPrimitive, PartialOrd, Ord, PartialEq, Eq, Clone, Copy)]
pub enum EvcError {
    /* no more frames, but it is OK */
    #[error("no more frames")]
    EVC_OK_NO_MORE_FRM = 205,
    /* decoding success, but output frame has been delayed */
    #[error("output frame has been delayed")]
    EVC_OK_FRM_DELAYED = 202,

    #[error("generic error")]
    EVC_ERR = (-1), /* generic error */
    #[error("invalid argument")]
    EVC_ERR_INVALID_ARGUMENT = (-101),
    #[error("out of memory")]
    EVC_ERR_OUT_OF_MEMORY = (-102),
    /* picture pool or reference capacity exhausted */
    #[error("picture buffer capacity reached")]
    EVC_ERR_REACHED_MAX = (-103),
    #[error("unsupported")]
    EVC_ERR_UNSUPPORTED = (-104),
    #[error("unexpected decoder state")]
    EVC_ERR_UNEXPECTED = (-105),
    /* signaled reference picture is not present in the DPB */
    #[error("reference picture is missing in the decoded picture buffer")]
    EVC_ERR_MISSING_REF = (-106),
    #[error("unsupported color space")]
    EVC_ERR_UNSUPPORTED_COLORSPACE = (-201),
    #[error("malformed bitstream")]
    EVC_ERR_MALFORMED_BITSTREAM = (-202),

    #[error("unknown error")]
    EVC_ERR_UNKNOWN = (-32767), /* unknown error */
}

impl Default for EvcError {
    fn default() -> Self {
        EvcError::EVC_ERR
    }
}

impl EvcError {
    pub fn code(&self) -> i32 {
        self.to_i32().unwrap_or(EvcError::EVC_ERR_UNKNOWN as i32)
    }

    /// Errors caused by a stream that does not conform to the DPB model,
    /// as opposed to bad arguments or internal failures. The decoder may
    /// skip the access unit and resume at the next IDR.
    pub fn is_conformance(&self) -> bool {
        matches!(
            self,
            EvcError::EVC_ERR_MISSING_REF | EvcError::EVC_ERR_REACHED_MAX
        )
    }
}

#[allow(dead_code, non_camel_case_types)]
#[derive(Debug, FromPrimitive, ToPrimitive, PartialEq, PartialOrd, Clone, Copy)]
pub enum NaluType {
    EVC_NONIDR_NUT = 0,
    EVC_IDR_NUT = 1,
    EVC_SPS_NUT = 24,
    EVC_PPS_NUT = 25,
    EVC_APS_NUT = 26,
    EVC_FD_NUT = 27,
    EVC_SEI_NUT = 28,
    EVC_UNKNOWN_NUT,
}

impl fmt::Display for NaluType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use self::NaluType::*;
        match self {
            EVC_NONIDR_NUT => write!(f, "Non-IDR"),
            EVC_IDR_NUT => write!(f, "Instantaneous Decoder Refresh"),
            EVC_SPS_NUT => write!(f, "Sequence Parameter Set"),
            EVC_PPS_NUT => write!(f, "Picture Parameter Set"),
            EVC_APS_NUT => write!(f, "Adaptation Parameter Set"),
            EVC_FD_NUT => write!(f, "Filler Data"),
            EVC_SEI_NUT => write!(f, "Supplemental Enhancement Information"),
            EVC_UNKNOWN_NUT => write!(f, "Unknown"),
        }
    }
}

impl From<u8> for NaluType {
    fn from(val: u8) -> Self {
        use self::NaluType::*;
        match val {
            0 => EVC_NONIDR_NUT,
            1 => EVC_IDR_NUT,
            24 => EVC_SPS_NUT,
            25 => EVC_PPS_NUT,
            26 => EVC_APS_NUT,
            27 => EVC_FD_NUT,
            28 => EVC_SEI_NUT,
            _ => EVC_UNKNOWN_NUT,
        }
    }
}

impl Default for NaluType {
    fn default() -> Self {
        NaluType::EVC_NONIDR_NUT
    }
}

#[allow(dead_code, non_camel_case_types)]
#[derive(Debug, FromPrimitive, ToPrimitive, PartialEq, PartialOrd, Clone, Copy)]
#[repr(C)]
pub enum SliceType {
    EVC_ST_UNKNOWN = 0,
    EVC_ST_I = 1,
    EVC_ST_P = 2,
    EVC_ST_B = 3,
}

impl fmt::Display for SliceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use self::SliceType::*;
        match self {
            EVC_ST_UNKNOWN => write!(f, "Unknown"),
            EVC_ST_I => write!(f, "I"),
            EVC_ST_P => write!(f, "P"),
            EVC_ST_B => write!(f, "B"),
        }
    }
}

impl From<u8> for SliceType {
    fn from(val: u8) -> Self {
        use self::SliceType::*;
        match val {
            1 => EVC_ST_I,
            2 => EVC_ST_P,
            3 => EVC_ST_B,
            _ => EVC_ST_UNKNOWN,
        }
    }
}

impl Default for SliceType {
    fn default() -> Self {
        SliceType::EVC_ST_UNKNOWN
    }
}

/*****************************************************************************
 * status after decoder operation
 *****************************************************************************/
#[derive(Debug, Default)]
pub struct EvcdStat {
    /* nalu type */
    pub nalu_type: NaluType,
    /* slice type */
    pub stype: SliceType,
    /* frame number monotonically increased whenever decoding a frame */
    pub fnum: isize,
    /* picture order count */
    pub poc: i32,
    /* layer id */
    pub tid: u8,

    /* number of reference pictures */
    pub refpic_num: [u8; 2],
    /* list of reference pictures */
    pub refpic: [[i32; MAX_NUM_REF_PICS]; 2],
}

pub const MAX_NUM_REF_PICS: usize = 21;
pub const MAX_NUM_ACTIVE_REF_FRAME: usize = 5;

/* rpl structure */
#[derive(Debug, Default, Clone)]
pub struct EvcRpl {
    pub ref_pic_num: u8,
    pub ref_pic_active_num: u8,
    /* delta POC of each entry: reference POC = current POC - ref_pics[i] */
    pub ref_pics: [i32; MAX_NUM_REF_PICS],
}

impl EvcRpl {
    pub fn new(deltas: &[i32], active: u8) -> Self {
        let mut rpl = EvcRpl {
            ref_pic_num: deltas.len().min(MAX_NUM_REF_PICS) as u8,
            ref_pic_active_num: active,
            ..Default::default()
        };
        for (dst, src) in rpl.ref_pics.iter_mut().zip(deltas.iter()) {
            *dst = *src;
        }
        rpl.ref_pic_active_num = rpl.ref_pic_active_num.min(rpl.ref_pic_num);
        rpl
    }
}

/*****************************************************************************
 * slice header fields consumed by the decoder core
 *****************************************************************************/
#[derive(Debug, Default, Clone)]
pub struct EvcSh {
    pub nalu_type: NaluType,
    pub slice_type: SliceType,
    /* picture order count, already derived by the parser */
    pub poc: i32,
    pub temporal_id: u8,
    /* false for pictures that are never used for reference */
    pub ref_pic_flag: bool,
    pub rpl_l0: EvcRpl,
    pub rpl_l1: EvcRpl,
    pub deblocking_filter_on: bool,
}

impl EvcSh {
    pub fn is_idr(&self) -> bool {
        self.nalu_type == NaluType::EVC_IDR_NUT
    }
}

/*****************************************************************************
 * coding unit as delivered by the parsing / ITDQ / intra collaborators
 *****************************************************************************/
#[derive(Debug, Clone)]
pub enum CuPred {
    /* prediction samples of Y, U, V produced by intra prediction */
    Intra { pred: [Vec<pel>; 3] },
    /* motion vectors are in 1/16 luma sample units */
    Inter {
        refi: [i8; 2],
        mv: [[i16; 2]; 2],
        dmvr: bool,
    },
}

#[derive(Debug, Clone)]
pub struct EvcCu {
    pub x: u16,
    pub y: u16,
    pub cuw: u16,
    pub cuh: u16,
    pub qp_y: u8,
    pub qp_u: u8,
    pub qp_v: u8,
    pub pred: CuPred,
    /* dequantized residual per component; empty means no coded coefficients */
    pub coef: [Vec<i16>; 3],
}

#[derive(Debug, Default, Clone)]
pub struct EvcSlice {
    pub sh: EvcSh,
    pub cu: Vec<EvcCu>,
}

#[derive(Copy, Clone, Debug, PartialEq, FromPrimitive)]
#[repr(C)]
pub enum ChromaSampling {
    Cs400,
    Cs420,
    Cs422,
    Cs444,
}

impl Default for ChromaSampling {
    fn default() -> Self {
        ChromaSampling::Cs420
    }
}

impl From<u8> for ChromaSampling {
    fn from(val: u8) -> Self {
        use self::ChromaSampling::*;
        match val {
            0 => Cs400,
            1 => Cs420,
            2 => Cs422,
            _ => Cs444,
        }
    }
}

impl ChromaSampling {
    // Provides the sampling period in the horizontal and vertical axes.
    pub fn sampling_period(self) -> (usize, usize) {
        use self::ChromaSampling::*;
        match self {
            Cs420 => (2, 2),
            Cs422 => (2, 1),
            Cs444 => (1, 1),
            Cs400 => (2, 2),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Config {
    pub width: usize,
    pub height: usize,
    pub bit_depth: u8,
    pub chroma_sampling: ChromaSampling,
    /* maximum number of picture buffers */
    pub max_pb_size: u8,
    /* maximum number of pictures marked as reference */
    pub max_num_ref_pics: u8,
    /* explicit reference picture lists; false selects the legacy marking */
    pub tool_rpl: bool,
    pub tool_dmvr: bool,
    pub dmvr_iter_count: usize,
    pub ref_pic_gap_length: u32,
    pub deblocking: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            width: 0,
            height: 0,
            bit_depth: 10,
            chroma_sampling: ChromaSampling::Cs420,
            max_pb_size: MAX_PB_SIZE as u8,
            max_num_ref_pics: MAX_NUM_ACTIVE_REF_FRAME as u8,
            tool_rpl: true,
            tool_dmvr: true,
            dmvr_iter_count: DMVR_ITER_COUNT,
            ref_pic_gap_length: 0,
            deblocking: true,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), EvcError> {
        if self.width == 0
            || self.height == 0
            || self.width % MIN_CU_SIZE != 0
            || self.height % MIN_CU_SIZE != 0
        {
            return Err(EvcError::EVC_ERR_INVALID_ARGUMENT);
        }
        if self.bit_depth < 8 || self.bit_depth > 14 {
            return Err(EvcError::EVC_ERR_UNSUPPORTED);
        }
        if self.chroma_sampling != ChromaSampling::Cs420 {
            return Err(EvcError::EVC_ERR_UNSUPPORTED_COLORSPACE);
        }
        if self.max_pb_size == 0
            || self.max_pb_size as usize > MAX_PB_SIZE
            || self.max_num_ref_pics == 0
            || self.max_num_ref_pics as usize > MAX_NUM_REF_PICS
            || self.max_num_ref_pics >= self.max_pb_size
        {
            return Err(EvcError::EVC_ERR_UNSUPPORTED);
        }
        if self.dmvr_iter_count == 0 || self.dmvr_iter_count > DMVR_NEW_VERSION_ITER_COUNT {
            return Err(EvcError::EVC_ERR_INVALID_ARGUMENT);
        }
        Ok(())
    }
}

pub struct Context {
    evcd_ctx: EvcdCtx,
}

impl Context {
    pub fn new(cfg: &Config) -> Result<Self, EvcError> {
        Ok(Context {
            evcd_ctx: EvcdCtx::new(cfg, Box::new(DefaultPicBufAllocator))?,
        })
    }

    /// Like [`Context::new`], with picture buffers coming from `pa`.
    pub fn with_allocator(cfg: &Config, pa: Box<dyn PicBufAllocator>) -> Result<Self, EvcError> {
        Ok(Context {
            evcd_ctx: EvcdCtx::new(cfg, pa)?,
        })
    }

    pub fn decode(&mut self, slice: &EvcSlice) -> Result<EvcdStat, EvcError> {
        self.evcd_ctx.decode_slice(slice)
    }

    pub fn pull(&mut self) -> Result<Rc<RefCell<Frame<pel>>>, EvcError> {
        self.evcd_ctx.pull_frm()
    }

    /// Signals end of input: subsequent pulls drain every pending picture
    /// in output order without waiting for the next expected POC.
    pub fn flush(&mut self) {
        self.evcd_ctx.flush();
    }
}
