use super::api::frame::*;
use super::def::*;
use crate::api::*;

use log::*;

use std::cell::RefCell;
use std::rc::{Rc, Weak};

/// Pixel buffer allocation hooks used by the picture manager.
///
/// `alloc` is called whenever the DPB needs a new picture buffer and must
/// return a frame padded for motion compensation. `free` receives every frame
/// still owned by the DPB at teardown.
pub trait PicBufAllocator {
    fn alloc(
        &mut self,
        width: usize,
        height: usize,
        chroma_sampling: ChromaSampling,
        bit_depth: u8,
    ) -> Result<Frame<pel>, EvcError>;

    fn free(&mut self, _frame: Rc<RefCell<Frame<pel>>>) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultPicBufAllocator;

impl PicBufAllocator for DefaultPicBufAllocator {
    fn alloc(
        &mut self,
        width: usize,
        height: usize,
        chroma_sampling: ChromaSampling,
        bit_depth: u8,
    ) -> Result<Frame<pel>, EvcError> {
        if width == 0 || height == 0 {
            return Err(EvcError::EVC_ERR_INVALID_ARGUMENT);
        }
        Ok(Frame::new(width, height, chroma_sampling, bit_depth))
    }
}

/* picture store structure */
pub(crate) struct EvcPic {
    pub(crate) frame: Rc<RefCell<Frame<pel>>>,

    /* presentation temporal reference of this picture */
    pub(crate) poc: i32,
    /* false: not used for reference */
    pub(crate) is_ref: bool,
    /* needed for output? */
    pub(crate) need_for_out: bool,
    /* scalable layer id */
    pub(crate) temporal_id: u8,

    /* POCs of list 0 used when this picture was decoded */
    pub(crate) list_poc: [i32; MAX_NUM_REF_PICS],
}

impl EvcPic {
    pub(crate) fn new(frame: Frame<pel>) -> Self {
        EvcPic {
            frame: Rc::new(RefCell::new(frame)),
            poc: 0,
            is_ref: false,
            need_for_out: false,
            temporal_id: 0,
            list_poc: [0; MAX_NUM_REF_PICS],
        }
    }
}

/* reference picture structure */
#[derive(Clone, Default)]
pub(crate) struct EvcRefP {
    /* address of reference picture, owned by the picture manager */
    pub(crate) pic: Weak<RefCell<EvcPic>>,
    /* POC of reference picture */
    pub(crate) poc: i32,
}

impl EvcRefP {
    pub(crate) fn new() -> Self {
        EvcRefP {
            pic: Weak::new(),
            poc: 0,
        }
    }

    /* [MAX_NUM_REF_PICS][REFP_NUM] reference lists, all entries empty */
    pub(crate) fn new_lists() -> Vec<Vec<EvcRefP>> {
        vec![vec![EvcRefP::new(); REFP_NUM]; MAX_NUM_REF_PICS]
    }

    fn set_refp(&mut self, pic_ref: &Rc<RefCell<EvcPic>>) {
        self.poc = pic_ref.borrow().poc;
        self.pic = Rc::downgrade(pic_ref);
    }

    pub(crate) fn pic(&self) -> Option<Rc<RefCell<EvcPic>>> {
        self.pic.upgrade()
    }
}

/*****************************************************************************
 * picture manager for DPB in decoder
 *****************************************************************************/
pub(crate) struct EvcPm {
    pub(crate) width: usize,
    pub(crate) height: usize,
    pub(crate) chroma_sampling: ChromaSampling,
    pub(crate) bit_depth: u8,

    /* picture store (including reference and non-reference), coding order */
    pub(crate) pic: Vec<Option<Rc<RefCell<EvcPic>>>>,
    /* reference pictures sorted by descending POC */
    pub(crate) pic_ref: Vec<Rc<RefCell<EvcPic>>>,
    /* maximum reference picture count */
    pub(crate) max_num_ref_pics: u8,
    /* current count of available reference pictures in PB */
    pub(crate) cur_num_ref_pics: u8,
    /* number of reference pictures */
    pub(crate) num_refp: [u8; REFP_NUM],
    /* next output POC */
    pub(crate) poc_next_output: i32,
    /* POC increment */
    pub(crate) poc_increase: i32,
    /* max number of picture buffer */
    pub(crate) max_pb_size: u8,
    /* current picture buffer size */
    pub(crate) cur_pb_size: u8,
    /* address of leased picture for current decoding buffer */
    pub(crate) pic_lease: Option<Rc<RefCell<EvcPic>>>,
    /* picture buffer allocator */
    pa: Box<dyn PicBufAllocator>,
}

impl EvcPm {
    pub(crate) fn new(
        width: usize,
        height: usize,
        chroma_sampling: ChromaSampling,
        bit_depth: u8,
    ) -> Self {
        EvcPm {
            width,
            height,
            chroma_sampling,
            bit_depth,
            pic: vec![],
            pic_ref: vec![],
            max_num_ref_pics: 0,
            cur_num_ref_pics: 0,
            num_refp: [0; REFP_NUM],
            poc_next_output: 0,
            poc_increase: 1,
            max_pb_size: 0,
            cur_pb_size: 0,
            pic_lease: None,
            pa: Box::new(DefaultPicBufAllocator),
        }
    }

    pub(crate) fn evc_picman_init(
        &mut self,
        max_pb_size: u8,
        max_num_ref_pics: u8,
        pa: Box<dyn PicBufAllocator>,
    ) -> Result<(), EvcError> {
        if max_num_ref_pics as usize > MAX_NUM_REF_PICS
            || max_pb_size as usize > MAX_PB_SIZE
            || max_num_ref_pics == 0
            || max_num_ref_pics >= max_pb_size
        {
            return Err(EvcError::EVC_ERR_UNSUPPORTED);
        }
        self.max_num_ref_pics = max_num_ref_pics;
        self.max_pb_size = max_pb_size;
        self.pic = vec![None; max_pb_size as usize];
        self.pic_ref = Vec::with_capacity(max_num_ref_pics as usize);
        self.cur_num_ref_pics = 0;
        self.cur_pb_size = 0;
        self.num_refp = [0; REFP_NUM];
        self.poc_next_output = 0;
        self.poc_increase = 1;
        self.pic_lease = None;
        self.pa = pa;

        Ok(())
    }

    pub(crate) fn evc_picman_deinit(&mut self) {
        let mut freed = 0;
        for slot in self.pic.iter_mut() {
            if let Some(pic) = slot.take() {
                self.pa.free(Rc::clone(&pic.borrow().frame));
                freed += 1;
            }
        }
        if let Some(pic) = self.pic_lease.take() {
            self.pa.free(Rc::clone(&pic.borrow().frame));
            freed += 1;
        }
        self.pic_ref.clear();
        self.cur_num_ref_pics = 0;
        self.cur_pb_size = 0;
        if freed > 0 {
            debug!("picman: released {} picture buffers", freed);
        }
    }

    fn picman_get_num_allocated_pics(&self) -> u8 {
        /* this is coding order */
        self.pic.iter().filter(|p| p.is_some()).count() as u8
    }

    fn picman_count_ref_pics(&self) -> u8 {
        self.pic
            .iter()
            .flatten()
            .filter(|p| p.borrow().is_ref)
            .count() as u8
    }

    /* shift the pictures in (from, to] one slot down and put the one at `from` to `to` */
    fn picman_move_pic(&mut self, from: usize, to: usize) {
        if from < to {
            self.pic[from..=to].rotate_left(1);
        }
    }

    /* move every victim to the end of the buffer; the rest keeps its relative order */
    fn picman_move_to_end(&mut self, victims: &[Rc<RefCell<EvcPic>>]) {
        let last = self.pic.len() - 1;
        for v in victims {
            let pos = self
                .pic
                .iter()
                .position(|p| p.as_ref().map_or(false, |p| Rc::ptr_eq(p, v)));
            if let Some(pos) = pos {
                self.picman_move_pic(pos, last);
            }
        }
    }

    /* unmark the oldest reference pictures in coding order until one more fits */
    fn picman_evict_oldest_refs(&mut self) {
        let mut cur_num_ref_pics = self.picman_count_ref_pics();
        let mut victims = vec![];
        for pic in self.pic.iter().flatten() {
            if cur_num_ref_pics < self.max_num_ref_pics {
                break;
            }
            let mut p = pic.borrow_mut();
            if p.is_ref {
                p.is_ref = false;
                cur_num_ref_pics -= 1;
                victims.push(Rc::clone(pic));
            }
        }
        self.picman_move_to_end(&victims);
        self.cur_num_ref_pics = cur_num_ref_pics;
    }

    fn pic_marking_no_rpl(&mut self, ref_pic_gap_length: u32) {
        // mark all pics with layer id > 0, or off the gap grid, as unused for reference
        let gap = ref_pic_gap_length as i32;
        let mut victims = vec![];
        for (i, pic) in self.pic.iter().enumerate() {
            if let Some(pic) = pic {
                let mut p = pic.borrow_mut();
                if p.is_ref && (p.temporal_id > 0 || (i > 0 && gap > 0 && p.poc % gap != 0)) {
                    p.is_ref = false;
                    victims.push(Rc::clone(pic));
                }
            }
        }
        self.picman_move_to_end(&victims);

        self.picman_evict_oldest_refs();
    }

    fn picman_flush_pb(&mut self, poc: i32) {
        /* mark all frames unused */
        let mut max_pending = None;
        for pic in self.pic.iter().flatten() {
            let mut p = pic.borrow_mut();
            p.is_ref = false;
            if p.need_for_out {
                max_pending = Some(max_pending.map_or(p.poc, |m: i32| m.max(p.poc)));
            }
        }

        /* pending pictures are output before the new POC origin */
        match max_pending {
            Some(max_poc) => {
                let shift = max_poc - poc + 1;
                for pic in self.pic.iter().flatten() {
                    let mut p = pic.borrow_mut();
                    if p.need_for_out {
                        p.poc -= shift;
                    }
                }
                self.poc_next_output -= shift;
            }
            None => self.poc_next_output = poc,
        }

        /* [empty][non-refs] */
        let occupied: Vec<_> = self.pic.iter_mut().filter_map(|p| p.take()).collect();
        let start = self.pic.len() - occupied.len();
        for (slot, pic) in self.pic[start..].iter_mut().zip(occupied) {
            *slot = Some(pic);
        }

        self.cur_num_ref_pics = 0;
        self.pic_ref.clear();
    }

    fn picman_update_pic_ref(&mut self) {
        self.pic_ref.clear();
        for pic in self.pic.iter().flatten() {
            if pic.borrow().is_ref {
                self.pic_ref.push(Rc::clone(pic));
            }
        }

        /* descending order sort based on POC */
        self.pic_ref.sort_by(|a, b| b.borrow().poc.cmp(&a.borrow().poc));
    }

    fn picman_remove_pic_from_pb(&mut self, pos: usize) -> Option<Rc<RefCell<EvcPic>>> {
        let pic_rem = self.pic[pos].take();

        /* fill empty pic buffer */
        let last = self.pic.len() - 1;
        self.picman_move_pic(pos, last);

        if pic_rem.is_some() {
            self.cur_pb_size -= 1;
        }
        pic_rem
    }

    fn picman_set_pic_to_pb(&mut self, pic: Rc<RefCell<EvcPic>>, refp: &[Vec<EvcRefP>]) {
        let is_ref = {
            let mut p = pic.borrow_mut();
            for i in 0..self.num_refp[REFP_0] as usize {
                p.list_poc[i] = refp[i][REFP_0].poc;
            }
            p.is_ref
        };

        let pos = if is_ref {
            let pos = self.cur_num_ref_pics as usize;
            if pos < self.pic.len() && self.pic[pos].is_none() {
                Some(pos)
            } else {
                self.pic.iter().position(|p| p.is_none())
            }
        } else {
            /* search empty pic buffer position from the end */
            self.pic.iter().rposition(|p| p.is_none())
        };

        match pos {
            Some(pos) => {
                assert!(self.pic[pos].is_none());
                self.pic[pos] = Some(pic);
            }
            None => panic!("picture buffer has no empty slot"),
        }
        self.cur_pb_size += 1;
    }

    fn picman_get_empty_pic_from_list(&self) -> Option<usize> {
        self.pic.iter().position(|pic| {
            pic.as_ref().map_or(false, |pic| {
                let p = pic.borrow();
                /* check reference count: only the DPB may hold the frame */
                !p.is_ref && !p.need_for_out && Rc::strong_count(&p.frame) == 1
            })
        })
    }

    pub(crate) fn evc_picman_get_empty_pic(&mut self) -> Result<Rc<RefCell<EvcPic>>, EvcError> {
        /* a picture leased by a failed decode is handed out again */
        if let Some(pic) = &self.pic_lease {
            return Ok(Rc::clone(pic));
        }

        /* try to find empty picture buffer in list */
        if let Some(pos) = self.picman_get_empty_pic_from_list() {
            if let Some(pic) = self.picman_remove_pic_from_pb(pos) {
                debug!("picman: reuse buffer of POC {}", pic.borrow().poc);
                self.pic_lease = Some(Rc::clone(&pic));
                return Ok(pic);
            }
        }

        /* else if available, allocate picture buffer */
        self.cur_pb_size = self.picman_get_num_allocated_pics();

        if self.cur_pb_size < self.max_pb_size {
            /* create picture buffer */
            let frame = self
                .pa
                .alloc(self.width, self.height, self.chroma_sampling, self.bit_depth)?;
            let pic = Rc::new(RefCell::new(EvcPic::new(frame)));
            debug!(
                "picman: allocate picture buffer {}/{}",
                self.cur_pb_size + 1,
                self.max_pb_size
            );
            self.pic_lease = Some(Rc::clone(&pic));
            return Ok(pic);
        }

        error!(
            "picman: no reusable picture buffer, {} of {} in use",
            self.cur_pb_size, self.max_pb_size
        );
        Err(EvcError::EVC_ERR_REACHED_MAX)
    }

    pub(crate) fn evc_picman_refp_rpl_based_init(
        &mut self,
        sh: &EvcSh,
        poc: i32,
        refp: &mut Vec<Vec<EvcRefP>>,
    ) -> Result<(), EvcError> {
        for (lidx, rpl) in [&sh.rpl_l0, &sh.rpl_l1].iter().enumerate() {
            if rpl.ref_pic_num as usize > MAX_NUM_REF_PICS
                || rpl.ref_pic_active_num > rpl.ref_pic_num
            {
                warn!(
                    "picman: list {} of POC {} has {} active of {} entries",
                    lidx, poc, rpl.ref_pic_active_num, rpl.ref_pic_num
                );
                return Err(EvcError::EVC_ERR_MALFORMED_BITSTREAM);
            }
        }

        if sh.slice_type == SliceType::EVC_ST_I {
            self.num_refp = [0; REFP_NUM];
            return Ok(());
        }

        self.picman_update_pic_ref();

        /* lists are built aside so a missing reference leaves refp untouched */
        let mut lists: [Vec<Rc<RefCell<EvcPic>>>; REFP_NUM] = [vec![], vec![]];
        for (lidx, rpl) in [&sh.rpl_l0, &sh.rpl_l1].iter().enumerate() {
            if lidx == REFP_1 && sh.slice_type == SliceType::EVC_ST_P {
                break;
            }
            for i in 0..rpl.ref_pic_active_num as usize {
                let ref_poc = poc
                    .checked_sub(rpl.ref_pics[i])
                    .ok_or(EvcError::EVC_ERR_MALFORMED_BITSTREAM)?;
                match self.pic_ref.iter().find(|p| p.borrow().poc == ref_poc) {
                    Some(pic) => lists[lidx].push(Rc::clone(pic)),
                    None => {
                        warn!(
                            "picman: list {} entry {} references POC {} which is not in the DPB (current POC {})",
                            lidx, i, ref_poc, poc
                        );
                        return Err(EvcError::EVC_ERR_MISSING_REF);
                    }
                }
            }
        }

        for entry in refp.iter_mut() {
            entry[REFP_0] = EvcRefP::new();
            entry[REFP_1] = EvcRefP::new();
        }
        for (lidx, list) in lists.iter().enumerate() {
            for (i, pic) in list.iter().enumerate() {
                refp[i][lidx].set_refp(pic);
            }
            self.num_refp[lidx] = list.len() as u8;
        }

        Ok(())
    }

    /*This is the implementation of reference picture marking based on RPL*/
    pub(crate) fn evc_picman_refpic_marking(&mut self, sh: &EvcSh, poc: i32) {
        let keeps = |ref_poc: i32| {
            [&sh.rpl_l0, &sh.rpl_l1].iter().any(|rpl| {
                let num = (rpl.ref_pic_num as usize).min(MAX_NUM_REF_PICS);
                rpl.ref_pics[..num]
                    .iter()
                    .any(|&delta| poc.checked_sub(delta) == Some(ref_poc))
            })
        };

        let mut victims = vec![];
        for pic in self.pic.iter().flatten() {
            let mut p = pic.borrow_mut();
            if p.is_ref && !keeps(p.poc) {
                p.is_ref = false;
                victims.push(Rc::clone(pic));
            }
        }
        if !victims.is_empty() {
            debug!(
                "picman: POC {} unmarks {} reference picture(s)",
                poc,
                victims.len()
            );
        }
        self.picman_move_to_end(&victims);

        self.cur_num_ref_pics = self.picman_count_ref_pics();
        self.picman_update_pic_ref();
    }

    pub(crate) fn evc_picman_refp_init(
        &mut self,
        max_num_ref_pics: u8,
        slice_type: SliceType,
        poc: i32,
        layer_id: u8,
        last_intra: i32,
        refp: &mut Vec<Vec<EvcRefP>>,
    ) -> Result<(), EvcError> {
        if slice_type == SliceType::EVC_ST_I {
            self.num_refp = [0; REFP_NUM];
            return Ok(());
        }

        self.picman_update_pic_ref();
        evc_assert_rv(self.cur_num_ref_pics > 0, EvcError::EVC_ERR_UNEXPECTED)?;

        let max_num = max_num_ref_pics as usize;
        let pic_ref = &self.pic_ref;
        /* pictures before the last intra picture are not referenced across it */
        let skipped = |p: &EvcPic| poc >= last_intra && p.poc < last_intra;
        let mut l0: Vec<Rc<RefCell<EvcPic>>> = vec![];
        let mut l1: Vec<Rc<RefCell<EvcPic>>> = vec![];

        /* forward */
        if slice_type == SliceType::EVC_ST_P {
            if layer_id > 0 {
                for pic in pic_ref.iter() {
                    if l0.len() >= max_num {
                        break;
                    }
                    let p = pic.borrow();
                    let take = if layer_id == 1 {
                        p.poc < poc && p.temporal_id <= layer_id
                    } else if l0.is_empty() {
                        p.poc < poc
                    } else {
                        p.poc < poc && p.temporal_id <= 1
                    };
                    if take {
                        l0.push(Rc::clone(pic));
                    }
                }
            } else {
                /* layer_id == 0, non-scalable  */
                for pic in pic_ref.iter() {
                    if l0.len() >= max_num {
                        break;
                    }
                    let p = pic.borrow();
                    if !skipped(&p) && p.poc < poc {
                        l0.push(Rc::clone(pic));
                    }
                }
            }
        } else {
            /* SLICE_B */
            let mut next_layer_id = std::cmp::max(layer_id, 1) - 1;
            for pic in pic_ref.iter() {
                if l0.len() >= max_num {
                    break;
                }
                let p = pic.borrow();
                if !skipped(&p) && p.poc < poc && p.temporal_id <= next_layer_id {
                    l0.push(Rc::clone(pic));
                    next_layer_id = std::cmp::max(p.temporal_id, 1) - 1;
                }
            }

            let mut next_layer_id = std::cmp::max(layer_id, 1) - 1;
            for pic in pic_ref.iter().rev() {
                if l0.len() >= max_num {
                    break;
                }
                let p = pic.borrow();
                if !skipped(&p) && p.poc > poc && p.temporal_id <= next_layer_id {
                    l0.push(Rc::clone(pic));
                    next_layer_id = std::cmp::max(p.temporal_id, 1) - 1;
                }
            }
        }

        evc_assert_rv(!l0.is_empty(), EvcError::EVC_ERR_UNEXPECTED)?;

        /* backward */
        if slice_type == SliceType::EVC_ST_B {
            let mut next_layer_id = std::cmp::max(layer_id, 1) - 1;
            for pic in pic_ref.iter().rev() {
                if l1.len() >= max_num {
                    break;
                }
                let p = pic.borrow();
                if !skipped(&p) && p.poc > poc && p.temporal_id <= next_layer_id {
                    l1.push(Rc::clone(pic));
                    next_layer_id = std::cmp::max(p.temporal_id, 1) - 1;
                }
            }

            next_layer_id = std::cmp::max(layer_id, 1) - 1;
            for pic in pic_ref.iter() {
                if l1.len() >= max_num {
                    break;
                }
                let p = pic.borrow();
                if !skipped(&p) && p.poc < poc && p.temporal_id <= next_layer_id {
                    l1.push(Rc::clone(pic));
                    next_layer_id = std::cmp::max(p.temporal_id, 1) - 1;
                }
            }

            evc_assert_rv(!l1.is_empty(), EvcError::EVC_ERR_UNEXPECTED)?;
        }

        for entry in refp.iter_mut() {
            entry[REFP_0] = EvcRefP::new();
            entry[REFP_1] = EvcRefP::new();
        }
        for (i, pic) in l0.iter().enumerate() {
            refp[i][REFP_0].set_refp(pic);
        }
        for (i, pic) in l1.iter().enumerate() {
            refp[i][REFP_1].set_refp(pic);
        }
        self.num_refp[REFP_0] = l0.len() as u8;
        self.num_refp[REFP_1] = l1.len() as u8;

        Ok(())
    }

    pub(crate) fn evc_picman_put_pic(
        &mut self,
        pic: &Rc<RefCell<EvcPic>>,
        is_idr: bool,
        poc: i32,
        temporal_id: u8,
        need_for_output: bool,
        refp: &[Vec<EvcRefP>],
        ref_pic: bool,
        tool_rpl: bool,
        ref_pic_gap_length: u32,
    ) -> Result<(), EvcError> {
        if !self.pic.iter().any(|p| p.is_none()) {
            error!("picman: no empty slot for POC {}", poc);
            return Err(EvcError::EVC_ERR_REACHED_MAX);
        }
        if ref_pic && !is_idr && tool_rpl && self.cur_num_ref_pics >= self.max_num_ref_pics {
            warn!(
                "picman: POC {} would exceed {} reference pictures",
                poc, self.max_num_ref_pics
            );
            return Err(EvcError::EVC_ERR_REACHED_MAX);
        }

        /* manage RPB */
        if is_idr {
            self.picman_flush_pb(poc);
        } else if !tool_rpl {
            //Perform picture marking if RPL approach is not used
            if temporal_id == 0 {
                self.pic_marking_no_rpl(ref_pic_gap_length);
            } else if ref_pic && self.cur_num_ref_pics >= self.max_num_ref_pics {
                self.picman_evict_oldest_refs();
            }
        }

        {
            let mut p = pic.borrow_mut();
            p.is_ref = ref_pic;
            p.temporal_id = temporal_id;
            p.poc = poc;
            p.need_for_out = need_for_output;
        }

        /* put picture into listed RPB */
        self.picman_set_pic_to_pb(Rc::clone(pic), refp);
        if ref_pic {
            self.cur_num_ref_pics += 1;
        }

        if self
            .pic_lease
            .as_ref()
            .map_or(false, |lease| Rc::ptr_eq(lease, pic))
        {
            self.pic_lease = None;
        }

        debug!(
            "picman: put POC {} (ref {}, idr {}), num_ref = {}, dpb_size = {}",
            poc,
            ref_pic,
            is_idr,
            self.cur_num_ref_pics,
            self.picman_get_num_allocated_pics()
        );

        Ok(())
    }

    /// Releases the pending picture with the smallest POC that is ready for
    /// output. `Ok(None)` means pictures are pending but none is ready yet.
    pub(crate) fn evc_picman_out_pic(
        &mut self,
        bumping: bool,
    ) -> Result<Option<Rc<RefCell<EvcPic>>>, EvcError> {
        let mut any_need_for_out = false;
        let mut best: Option<(usize, i32)> = None;
        for (i, pic) in self.pic.iter().enumerate() {
            if let Some(pic) = pic {
                let p = pic.borrow();
                if p.need_for_out {
                    any_need_for_out = true;

                    if (bumping || p.poc <= self.poc_next_output)
                        && best.map_or(true, |(_, poc)| p.poc < poc)
                    {
                        best = Some((i, p.poc));
                    }
                }
            }
        }

        match best {
            Some((i, poc)) => {
                let pic = self.pic[i].as_ref().map(Rc::clone);
                if let Some(pic) = &pic {
                    pic.borrow_mut().need_for_out = false;
                }
                self.poc_next_output = poc + self.poc_increase;
                debug!("picman: output POC {}", poc);
                Ok(pic)
            }
            None if any_need_for_out => Ok(None),
            None => Err(EvcError::EVC_ERR_UNEXPECTED),
        }
    }
}

/// Buffer layout and reference flags of the DPB, taken before a picture
/// starts changing them.
pub(crate) struct EvcPmSnapshot {
    pic: Vec<Option<Rc<RefCell<EvcPic>>>>,
    is_ref: Vec<bool>,
    cur_num_ref_pics: u8,
    cur_pb_size: u8,
}

impl EvcPm {
    pub(crate) fn evc_picman_snapshot(&self) -> EvcPmSnapshot {
        EvcPmSnapshot {
            pic: self.pic.clone(),
            is_ref: self
                .pic
                .iter()
                .map(|p| p.as_ref().map_or(false, |p| p.borrow().is_ref))
                .collect(),
            cur_num_ref_pics: self.cur_num_ref_pics,
            cur_pb_size: self.cur_pb_size,
        }
    }

    /// Rolls the DPB back after a failed decode. A leased buffer goes back to
    /// the slot it was taken from, or is freed when it was newly allocated.
    pub(crate) fn evc_picman_restore(&mut self, snap: EvcPmSnapshot) {
        if let Some(lease) = self.pic_lease.take() {
            let pooled = snap
                .pic
                .iter()
                .flatten()
                .any(|p| Rc::ptr_eq(p, &lease));
            if !pooled {
                self.pa.free(Rc::clone(&lease.borrow().frame));
            }
        }

        for (pic, is_ref) in snap.pic.iter().zip(snap.is_ref.iter()) {
            if let Some(pic) = pic {
                pic.borrow_mut().is_ref = *is_ref;
            }
        }
        self.pic = snap.pic;
        self.cur_num_ref_pics = snap.cur_num_ref_pics;
        self.cur_pb_size = snap.cur_pb_size;
        self.picman_update_pic_ref();

        debug!(
            "picman: restored {} reference picture(s) after a failed decode",
            self.cur_num_ref_pics
        );
    }
}

impl Drop for EvcPm {
    fn drop(&mut self) {
        self.evc_picman_deinit();
    }
}
