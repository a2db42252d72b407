use super::api::frame::*;
use super::api::*;
use super::def::*;
use super::df::*;
use super::mc::*;
use super::picman::*;
use super::recon::*;
use super::tracer::*;
use super::util::*;

use log::*;
use std::cell::RefCell;
use std::rc::Rc;

/******************************************************************************
 * CONTEXT used for decoding process.
 *
 * All have to be stored are in this structure.
 *****************************************************************************/
pub(crate) struct EvcdCtx {
    cfg: Config,
    /* decoded picture buffer management */
    pub(crate) dpm: EvcPm,
    /* reference picture (0: foward, 1: backward) */
    refp: Vec<Vec<EvcRefP>>,
    /* prediction buffers of the current CU, [1] is used for bi-pred */
    pred: [CUBuffer<pel>; 2],

    /* picture width in SCU unit */
    w_scu: usize,
    /* picture height in SCU unit */
    h_scu: usize,
    /* MAPS *******************************************************************/
    /* SCU map for CU information */
    map_scu: Vec<MCU>,
    /* index of the CU covering each SCU */
    map_cu_id: Vec<u32>,
    /* reference frame indices */
    map_refi: Vec<[i8; REFP_NUM]>,
    /* decoded motion vector for every blocks, before DMVR refinement */
    map_mv: Vec<[[i16; MV_D]; REFP_NUM]>,
    /* chroma QP (Cb, Cr) for every blocks */
    map_qp_c: Vec<[u8; 2]>,
    /**************************************************************************/
    /* last coded intra picture's picture order count */
    last_intra_poc: i32,
    /* the number of currently decoded pictures */
    pic_cnt: isize,
    /* end of stream: release every pending picture */
    bumping: bool,

    tracer: Option<Tracer>,
}

impl EvcdCtx {
    pub(crate) fn new(cfg: &Config, pa: Box<dyn PicBufAllocator>) -> Result<Self, EvcError> {
        cfg.validate()?;

        let mut dpm = EvcPm::new(cfg.width, cfg.height, cfg.chroma_sampling, cfg.bit_depth);
        dpm.evc_picman_init(cfg.max_pb_size, cfg.max_num_ref_pics, pa)?;

        let w_scu = PEL2SCU(cfg.width);
        let h_scu = PEL2SCU(cfg.height);
        let f_scu = w_scu * h_scu;

        info!(
            "decoder: {}x{} {}-bit, dpb {} ({} refs), rpl {}, dmvr {}, deblocking {}",
            cfg.width,
            cfg.height,
            cfg.bit_depth,
            cfg.max_pb_size,
            cfg.max_num_ref_pics,
            cfg.tool_rpl,
            cfg.tool_dmvr,
            cfg.deblocking
        );

        Ok(EvcdCtx {
            cfg: *cfg,
            dpm,
            refp: EvcRefP::new_lists(),
            pred: [CUBuffer::default(), CUBuffer::default()],
            w_scu,
            h_scu,
            map_scu: vec![MCU::default(); f_scu],
            map_cu_id: vec![0; f_scu],
            map_refi: vec![[REFI_INVALID; REFP_NUM]; f_scu],
            map_mv: vec![[[0; MV_D]; REFP_NUM]; f_scu],
            map_qp_c: vec![[0; 2]; f_scu],
            last_intra_poc: i32::MAX,
            pic_cnt: 0,
            bumping: false,
            tracer: OPEN_TRACE(),
        })
    }

    fn evcd_check_cu(&self, cu: &EvcCu, slice_type: SliceType) -> Result<(), EvcError> {
        let (x, y) = (cu.x as usize, cu.y as usize);
        let (cuw, cuh) = (cu.cuw as usize, cu.cuh as usize);
        let valid_size =
            |s: usize| s >= MIN_CU_SIZE && s <= MAX_CU_SIZE && (1 << CONV_LOG2(s)) == s;

        if !valid_size(cuw)
            || !valid_size(cuh)
            || x % MIN_CU_SIZE != 0
            || y % MIN_CU_SIZE != 0
            || x + cuw > self.cfg.width
            || y + cuh > self.cfg.height
        {
            warn!("decoder: CU {}x{} at ({}, {}) is out of the picture", cuw, cuh, x, y);
            return Err(EvcError::EVC_ERR_INVALID_ARGUMENT);
        }

        let dims = [cuw * cuh, (cuw * cuh) >> 2, (cuw * cuh) >> 2];
        for ch in 0..N_C {
            evc_assert_rv(
                cu.coef[ch].is_empty() || cu.coef[ch].len() >= dims[ch],
                EvcError::EVC_ERR_INVALID_ARGUMENT,
            )?;
        }

        match &cu.pred {
            CuPred::Intra { pred } => {
                for ch in 0..N_C {
                    evc_assert_rv(pred[ch].len() >= dims[ch], EvcError::EVC_ERR_INVALID_ARGUMENT)?;
                }
            }
            CuPred::Inter { refi, .. } => {
                if slice_type == SliceType::EVC_ST_I {
                    warn!("decoder: inter CU at ({}, {}) in an I slice", x, y);
                    return Err(EvcError::EVC_ERR_MALFORMED_BITSTREAM);
                }
                if slice_type == SliceType::EVC_ST_P && REFI_IS_VALID(refi[REFP_1]) {
                    return Err(EvcError::EVC_ERR_MALFORMED_BITSTREAM);
                }
                evc_assert_rv(
                    REFI_IS_VALID(refi[REFP_0]) || REFI_IS_VALID(refi[REFP_1]),
                    EvcError::EVC_ERR_MALFORMED_BITSTREAM,
                )?;
                for lidx in 0..REFP_NUM {
                    if REFI_IS_VALID(refi[lidx]) && refi[lidx] as u8 >= self.dpm.num_refp[lidx] {
                        warn!(
                            "decoder: CU at ({}, {}) uses list {} index {} of {}",
                            x, y, lidx, refi[lidx], self.dpm.num_refp[lidx]
                        );
                        return Err(EvcError::EVC_ERR_MALFORMED_BITSTREAM);
                    }
                }
            }
        }

        Ok(())
    }

    fn evcd_update_map(&mut self, cu_id: usize, cu: &EvcCu, is_intra: bool) {
        let x_scu = PEL2SCU(cu.x as usize);
        let y_scu = PEL2SCU(cu.y as usize);
        let w_cu = PEL2SCU(cu.cuw as usize);
        let h_cu = PEL2SCU(cu.cuh as usize);
        let cbfl = cu.coef[Y_C].iter().any(|&c| c != 0);

        let (refi, mv) = match &cu.pred {
            CuPred::Inter { refi, mv, .. } => (*refi, *mv),
            CuPred::Intra { .. } => ([REFI_INVALID; REFP_NUM], [[0; MV_D]; REFP_NUM]),
        };

        for j in y_scu..y_scu + h_cu {
            for i in x_scu..x_scu + w_cu {
                let idx = j * self.w_scu + i;
                let mut mcu = MCU::default();
                mcu.SET_IF_COD_QP(is_intra as u32, cu.qp_y);
                if cbfl {
                    mcu.SET_CBFL();
                }
                self.map_scu[idx] = mcu;
                self.map_cu_id[idx] = cu_id as u32;
                self.map_refi[idx] = refi;
                self.map_mv[idx] = mv;
                self.map_qp_c[idx] = [cu.qp_u, cu.qp_v];
            }
        }
    }

    fn evcd_set_refp(&mut self, sh: &EvcSh) -> Result<(), EvcError> {
        if self.cfg.tool_rpl {
            self.dpm
                .evc_picman_refp_rpl_based_init(sh, sh.poc, &mut self.refp)
        } else {
            self.dpm.evc_picman_refp_init(
                self.cfg.max_num_ref_pics,
                sh.slice_type,
                sh.poc,
                sh.temporal_id,
                self.last_intra_poc,
                &mut self.refp,
            )
        }
    }

    /// Reconstructs one picture from its CUs and hands it to the DPB.
    pub(crate) fn decode_slice(&mut self, slice: &EvcSlice) -> Result<EvcdStat, EvcError> {
        let sh = &slice.sh;
        if sh.slice_type == SliceType::EVC_ST_UNKNOWN {
            return Err(EvcError::EVC_ERR_MALFORMED_BITSTREAM);
        }
        if sh.is_idr() && sh.slice_type != SliceType::EVC_ST_I {
            warn!("decoder: IDR POC {} is a {} slice", sh.poc, sh.slice_type);
            return Err(EvcError::EVC_ERR_MALFORMED_BITSTREAM);
        }

        /* a new picture resumes reordering after a flush */
        self.bumping = false;

        /* reference lists first: nothing is marked if a reference is missing */
        self.evcd_set_refp(sh)?;
        for cu in slice.cu.iter() {
            self.evcd_check_cu(cu, sh.slice_type)?;
        }

        let snap = self.dpm.evc_picman_snapshot();
        if self.cfg.tool_rpl && !sh.is_idr() {
            self.dpm.evc_picman_refpic_marking(sh, sh.poc);
        }

        match self.evcd_rec_pic(slice) {
            Ok(stat) => Ok(stat),
            Err(err) => {
                warn!("decoder: POC {} failed with {}, DPB restored", sh.poc, err);
                self.dpm.evc_picman_restore(snap);
                Err(err)
            }
        }
    }

    fn evcd_rec_pic(&mut self, slice: &EvcSlice) -> Result<EvcdStat, EvcError> {
        let sh = &slice.sh;
        let pic = self.dpm.evc_picman_get_empty_pic()?;

        for m in self.map_scu.iter_mut() {
            *m = MCU::default();
        }
        for r in self.map_refi.iter_mut() {
            *r = [REFI_INVALID; REFP_NUM];
        }

        let bit_depth = self.cfg.bit_depth;
        let (pic_w, pic_h) = (self.cfg.width, self.cfg.height);
        let frame_rc = Rc::clone(&pic.borrow().frame);
        {
            let mut frame = frame_rc.borrow_mut();

            for (cu_id, cu) in slice.cu.iter().enumerate() {
                let (x, y) = (cu.x as usize, cu.y as usize);
                let (cuw, cuh) = (cu.cuw as usize, cu.cuh as usize);

                let is_intra = match &cu.pred {
                    CuPred::Intra { pred } => {
                        TRACE_PRED(&mut self.tracer, Y_C, cuw, cuh, &pred[Y_C]);
                        evc_recon_yuv(
                            &mut self.tracer,
                            x,
                            y,
                            cuw,
                            cuh,
                            &cu.coef,
                            pred,
                            &mut frame.planes,
                            bit_depth,
                        );
                        true
                    }
                    CuPred::Inter { refi, mv, dmvr } => {
                        let mv_used = evc_mc(
                            x,
                            y,
                            pic_w,
                            pic_h,
                            cuw,
                            cuh,
                            refi,
                            mv,
                            &self.refp,
                            &mut self.pred,
                            sh.poc,
                            self.cfg.tool_dmvr && *dmvr,
                            self.cfg.dmvr_iter_count,
                            bit_depth,
                        )?;
                        TRACE_MV(&mut self.tracer, refi, &mv_used);
                        TRACE_PRED(&mut self.tracer, Y_C, cuw, cuh, &self.pred[0].data[Y_C]);
                        evc_recon_yuv(
                            &mut self.tracer,
                            x,
                            y,
                            cuw,
                            cuh,
                            &cu.coef,
                            &self.pred[0].data,
                            &mut frame.planes,
                            bit_depth,
                        );
                        false
                    }
                };

                self.evcd_update_map(cu_id, cu, is_intra);
            }

            /* deblocking filter */
            if self.cfg.deblocking && sh.deblocking_filter_on {
                let maps = DfMaps {
                    w_scu: self.w_scu,
                    h_scu: self.h_scu,
                    map_scu: &self.map_scu,
                    map_cu_id: &self.map_cu_id,
                    map_refi: &self.map_refi,
                    map_mv: &self.map_mv,
                    map_qp_c: &self.map_qp_c,
                };
                evc_deblock(&mut self.tracer, &mut frame, &maps, bit_depth);
            }

            /* expand pixels to padding area */
            frame.pad();
        }

        /* put decoded picture to DPB */
        self.dpm.evc_picman_put_pic(
            &pic,
            sh.is_idr(),
            sh.poc,
            sh.temporal_id,
            true,
            &self.refp,
            sh.ref_pic_flag,
            self.cfg.tool_rpl,
            self.cfg.ref_pic_gap_length,
        )?;

        if sh.slice_type == SliceType::EVC_ST_I {
            self.last_intra_poc = sh.poc;
        }

        let mut stat = EvcdStat {
            nalu_type: sh.nalu_type,
            stype: sh.slice_type,
            fnum: self.pic_cnt,
            poc: sh.poc,
            tid: sh.temporal_id,
            refpic_num: self.dpm.num_refp,
            ..Default::default()
        };
        for lidx in 0..REFP_NUM {
            for i in 0..self.dpm.num_refp[lidx] as usize {
                stat.refpic[lidx][i] = self.refp[i][lidx].poc;
            }
        }

        debug!(
            "decoder: picture {} POC {} ({} slice, {} CUs), refs L0 {:?} L1 {:?}",
            self.pic_cnt,
            sh.poc,
            sh.slice_type,
            slice.cu.len(),
            &stat.refpic[REFP_0][..stat.refpic_num[REFP_0] as usize],
            &stat.refpic[REFP_1][..stat.refpic_num[REFP_1] as usize]
        );
        self.pic_cnt += 1;

        Ok(stat)
    }

    pub(crate) fn pull_frm(&mut self) -> Result<Rc<RefCell<Frame<pel>>>, EvcError> {
        match self.dpm.evc_picman_out_pic(self.bumping) {
            Ok(Some(pic)) => Ok(Rc::clone(&pic.borrow().frame)),
            Ok(None) => Err(EvcError::EVC_OK_FRM_DELAYED),
            Err(EvcError::EVC_ERR_UNEXPECTED) => Err(EvcError::EVC_OK_NO_MORE_FRM),
            Err(err) => Err(err),
        }
    }

    pub(crate) fn flush(&mut self) {
        self.bumping = true;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    const W: usize = 32;
    const H: usize = 32;

    fn config(tool_rpl: bool) -> Config {
        Config {
            width: W,
            height: H,
            bit_depth: 10,
            max_pb_size: 3,
            max_num_ref_pics: 1,
            tool_rpl,
            ..Default::default()
        }
    }

    fn luma_at(x: usize, y: usize) -> pel {
        (64 + 8 * x + 3 * y) as pel
    }

    fn intra_slice(poc: i32) -> EvcSlice {
        let pred = [
            (0..W * H).map(|i| luma_at(i % W, i / W)).collect(),
            vec![512; W * H / 4],
            vec![300; W * H / 4],
        ];
        EvcSlice {
            sh: EvcSh {
                nalu_type: NaluType::EVC_IDR_NUT,
                slice_type: SliceType::EVC_ST_I,
                poc,
                ref_pic_flag: true,
                deblocking_filter_on: true,
                ..Default::default()
            },
            cu: vec![EvcCu {
                x: 0,
                y: 0,
                cuw: W as u16,
                cuh: H as u16,
                qp_y: 30,
                qp_u: 30,
                qp_v: 30,
                pred: CuPred::Intra { pred },
                coef: [vec![], vec![], vec![]],
            }],
        }
    }

    /* one luma sample to the right of the co-located block of POC `poc - 1` */
    fn inter_slice(poc: i32) -> EvcSlice {
        EvcSlice {
            sh: EvcSh {
                nalu_type: NaluType::EVC_NONIDR_NUT,
                slice_type: SliceType::EVC_ST_P,
                poc,
                ref_pic_flag: true,
                rpl_l0: EvcRpl::new(&[1], 1),
                rpl_l1: EvcRpl::new(&[], 0),
                deblocking_filter_on: true,
                ..Default::default()
            },
            cu: vec![EvcCu {
                x: 0,
                y: 0,
                cuw: W as u16,
                cuh: H as u16,
                qp_y: 30,
                qp_u: 30,
                qp_v: 30,
                pred: CuPred::Inter {
                    refi: [0, REFI_INVALID],
                    mv: [[16, 0], [0, 0]],
                    dmvr: false,
                },
                coef: [vec![2; W * H], vec![], vec![]],
            }],
        }
    }

    fn ref_pocs(ctx: &EvcdCtx) -> Vec<i32> {
        let mut pocs: Vec<i32> = ctx
            .dpm
            .pic
            .iter()
            .flatten()
            .filter(|p| p.borrow().is_ref)
            .map(|p| p.borrow().poc)
            .collect();
        pocs.sort();
        pocs
    }

    #[test]
    fn intra_then_inter_without_rpl() {
        let mut ctx = EvcdCtx::new(&config(false), Box::new(DefaultPicBufAllocator)).unwrap();

        let stat = ctx.decode_slice(&intra_slice(0)).unwrap();
        assert_eq!(stat.poc, 0);
        assert_eq!(stat.fnum, 0);
        assert_eq!(stat.refpic_num, [0, 0]);

        let stat = ctx.decode_slice(&inter_slice(1)).unwrap();
        assert_eq!(stat.fnum, 1);
        assert_eq!(stat.refpic_num, [1, 0]);
        assert_eq!(stat.refpic[REFP_0][0], 0);

        let f0 = ctx.pull_frm().unwrap();
        {
            let f0 = f0.borrow();
            for y in 0..H {
                for x in 0..W {
                    assert_eq!(f0.planes[Y_C].p(x, y), luma_at(x, y));
                }
            }
            assert_eq!(f0.planes[V_C].p(3, 5), 300);
        }

        let f1 = ctx.pull_frm().unwrap();
        {
            let f1 = f1.borrow();
            for y in 0..H {
                for x in 0..W {
                    /* the reference is padded by edge replication */
                    assert_eq!(f1.planes[Y_C].p(x, y), luma_at((x + 1).min(W - 1), y) + 2);
                }
            }
            assert_eq!(f1.planes[U_C].p(0, 0), 512);
        }

        assert_eq!(ctx.pull_frm().unwrap_err(), EvcError::EVC_OK_NO_MORE_FRM);

        /* POC 0 is no longer a reference and its frame goes back to the pool */
        assert_eq!(ref_pocs(&ctx), vec![1]);
        drop(f0);
        drop(f1);
        let reused = ctx.dpm.evc_picman_get_empty_pic().unwrap();
        assert_eq!(reused.borrow().poc, 0);
    }

    #[test]
    fn missing_reference_leaves_dpb_intact() {
        let mut ctx = EvcdCtx::new(&config(true), Box::new(DefaultPicBufAllocator)).unwrap();
        ctx.decode_slice(&intra_slice(0)).unwrap();

        let mut slice = inter_slice(2);
        slice.sh.rpl_l0 = EvcRpl::new(&[1], 1);
        assert_eq!(
            ctx.decode_slice(&slice).unwrap_err(),
            EvcError::EVC_ERR_MISSING_REF
        );
        assert_eq!(ref_pocs(&ctx), vec![0]);
        assert!(ctx.dpm.pic_lease.is_none());

        slice.sh.rpl_l0 = EvcRpl::new(&[2], 1);
        slice.sh.ref_pic_flag = false;
        let stat = ctx.decode_slice(&slice).unwrap();
        assert_eq!(stat.refpic[REFP_0][0], 0);
    }

    #[test]
    fn reference_index_out_of_list_is_rejected() {
        let mut ctx = EvcdCtx::new(&config(true), Box::new(DefaultPicBufAllocator)).unwrap();
        ctx.decode_slice(&intra_slice(0)).unwrap();

        let mut slice = inter_slice(1);
        slice.cu[0].pred = CuPred::Inter {
            refi: [1, REFI_INVALID],
            mv: [[0, 0], [0, 0]],
            dmvr: false,
        };
        assert_eq!(
            ctx.decode_slice(&slice).unwrap_err(),
            EvcError::EVC_ERR_MALFORMED_BITSTREAM
        );
        assert_eq!(ref_pocs(&ctx), vec![0]);
    }

    #[test]
    fn pictures_are_delayed_until_flush() {
        let mut ctx = EvcdCtx::new(&config(true), Box::new(DefaultPicBufAllocator)).unwrap();
        ctx.decode_slice(&intra_slice(0)).unwrap();
        ctx.pull_frm().unwrap();

        /* POC 2 arrives before POC 1 */
        let mut slice = inter_slice(2);
        slice.sh.rpl_l0 = EvcRpl::new(&[2], 1);
        slice.sh.ref_pic_flag = false;
        ctx.decode_slice(&slice).unwrap();
        assert_eq!(ctx.pull_frm().unwrap_err(), EvcError::EVC_OK_FRM_DELAYED);

        ctx.flush();
        assert!(ctx.pull_frm().is_ok());
        assert_eq!(ctx.pull_frm().unwrap_err(), EvcError::EVC_OK_NO_MORE_FRM);

        /* decoding again after a flush reorders again */
        let mut slice = inter_slice(4);
        slice.sh.rpl_l0 = EvcRpl::new(&[4], 1);
        slice.sh.ref_pic_flag = false;
        ctx.decode_slice(&slice).unwrap();
        assert_eq!(ctx.pull_frm().unwrap_err(), EvcError::EVC_OK_FRM_DELAYED);
    }

    #[test]
    fn more_active_than_signaled_entries_is_an_error() {
        let mut ctx = EvcdCtx::new(&config(true), Box::new(DefaultPicBufAllocator)).unwrap();
        ctx.decode_slice(&intra_slice(0)).unwrap();
        ctx.pull_frm().unwrap();

        let mut slice = inter_slice(1);
        slice.sh.rpl_l0.ref_pic_num = 0;
        slice.sh.rpl_l0.ref_pic_active_num = 1;
        slice.sh.rpl_l0.ref_pics[0] = 1;
        assert_eq!(
            ctx.decode_slice(&slice).unwrap_err(),
            EvcError::EVC_ERR_MALFORMED_BITSTREAM
        );
        assert_eq!(ref_pocs(&ctx), vec![0]);

        /* the well-formed list still decodes against POC 0 */
        slice.sh.rpl_l0 = EvcRpl::new(&[1], 1);
        let stat = ctx.decode_slice(&slice).unwrap();
        assert_eq!(stat.refpic[REFP_0][0], 0);
    }

    #[test]
    fn exhausted_pool_keeps_reference_marking() {
        let mut cfg = config(true);
        cfg.max_pb_size = 2;
        let mut ctx = EvcdCtx::new(&cfg, Box::new(DefaultPicBufAllocator)).unwrap();
        ctx.decode_slice(&intra_slice(0)).unwrap();
        let mut slice = inter_slice(1);
        slice.sh.ref_pic_flag = false;
        ctx.decode_slice(&slice).unwrap();

        /* empty list unmarks POC 0, but no buffer is free for POC 2 */
        let mut slice = intra_slice(2);
        slice.sh.nalu_type = NaluType::EVC_NONIDR_NUT;
        slice.sh.slice_type = SliceType::EVC_ST_P;
        assert_eq!(
            ctx.decode_slice(&slice).unwrap_err(),
            EvcError::EVC_ERR_REACHED_MAX
        );
        assert_eq!(ref_pocs(&ctx), vec![0]);
        assert_eq!(ctx.dpm.cur_num_ref_pics, 1);
        assert!(ctx.dpm.pic_lease.is_none());

        /* once both pictures are output, POC 1's buffer is reused */
        ctx.pull_frm().unwrap();
        ctx.pull_frm().unwrap();
        let mut slice = inter_slice(2);
        slice.sh.rpl_l0 = EvcRpl::new(&[2], 1);
        slice.sh.ref_pic_flag = false;
        let stat = ctx.decode_slice(&slice).unwrap();
        assert_eq!(stat.refpic[REFP_0][0], 0);
        assert_eq!(ref_pocs(&ctx), vec![0]);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut cfg = config(true);
        cfg.width = 30;
        assert!(EvcdCtx::new(&cfg, Box::new(DefaultPicBufAllocator)).is_err());
        let mut cfg = config(true);
        cfg.max_num_ref_pics = cfg.max_pb_size;
        assert!(EvcdCtx::new(&cfg, Box::new(DefaultPicBufAllocator)).is_err());
    }
}
