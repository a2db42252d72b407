use std::fmt::Display;
use std::fs::OpenOptions;
use std::io::Write;

use log::*;

use super::def::*;
use super::region::*;

pub(crate) type Tracer = (Box<dyn Write>, isize);

////////////////////////////////////////////////////////////////////////////////////////////////////
#[cfg(feature = "trace")]
pub(crate) fn OPEN_TRACE() -> Option<Tracer> {
    let fp_trace = OpenOptions::new()
        .append(true)
        .create(true)
        .open("dec_trace.txt");
    match fp_trace {
        Ok(fp) => Some((Box::new(fp), 0)),
        Err(err) => {
            warn!("cannot open dec_trace.txt: {}", err);
            None
        }
    }
}

#[cfg(feature = "trace")]
pub(crate) fn EVC_TRACE_COUNTER(tracer: &mut Option<Tracer>) {
    if let Some((writer, counter)) = tracer {
        let _ = writer.write_fmt(format_args!("{} \t", *counter));
        *counter += 1;
    }
}

#[cfg(feature = "trace")]
pub(crate) fn EVC_TRACE<T: Display>(tracer: &mut Option<Tracer>, name: T) {
    if let Some((writer, _)) = tracer {
        let _ = writer.write_fmt(format_args!("{}", name));
    }
}

#[cfg(feature = "trace_pred")]
pub(crate) fn TRACE_PRED(
    tracer: &mut Option<Tracer>,
    ch_type: usize,
    cuw: usize,
    cuh: usize,
    pred: &[pel],
) {
    EVC_TRACE_COUNTER(tracer);
    EVC_TRACE(tracer, "Pred for ");
    EVC_TRACE(tracer, ch_type);
    EVC_TRACE(tracer, " : ");
    for i in 0..cuw * cuh {
        if i != 0 {
            EVC_TRACE(tracer, " , ");
        }
        EVC_TRACE(tracer, pred[i]);
    }
    EVC_TRACE(tracer, " \n");
}

#[cfg(feature = "trace_pred")]
pub(crate) fn TRACE_MV(tracer: &mut Option<Tracer>, refi: &[i8; REFP_NUM], mv: &[[i16; MV_D]; REFP_NUM]) {
    EVC_TRACE_COUNTER(tracer);
    EVC_TRACE(tracer, "MV refi0 ");
    EVC_TRACE(tracer, refi[REFP_0]);
    EVC_TRACE(tracer, " mv0 ");
    EVC_TRACE(tracer, mv[REFP_0][MV_X]);
    EVC_TRACE(tracer, " ");
    EVC_TRACE(tracer, mv[REFP_0][MV_Y]);
    EVC_TRACE(tracer, " refi1 ");
    EVC_TRACE(tracer, refi[REFP_1]);
    EVC_TRACE(tracer, " mv1 ");
    EVC_TRACE(tracer, mv[REFP_1][MV_X]);
    EVC_TRACE(tracer, " ");
    EVC_TRACE(tracer, mv[REFP_1][MV_Y]);
    EVC_TRACE(tracer, " \n");
}

#[cfg(feature = "trace_reco")]
pub(crate) fn TRACE_RECO_PLANE_REGION(
    tracer: &mut Option<Tracer>,
    ch_type: usize,
    x: usize,
    y: usize,
    cuw: usize,
    cuh: usize,
    reco: &PlaneRegionMut<'_, pel>,
) {
    EVC_TRACE_COUNTER(tracer);
    EVC_TRACE(tracer, "Reco for ");
    EVC_TRACE(tracer, ch_type);
    EVC_TRACE(tracer, " : ");
    for j in 0..cuh {
        for i in 0..cuw {
            if !(i == 0 && j == 0) {
                EVC_TRACE(tracer, " , ");
            }
            EVC_TRACE(tracer, reco[y + j][x + i]);
        }
    }
    EVC_TRACE(tracer, " \n");
}

#[cfg(feature = "trace_dbf")]
pub(crate) fn TRACE_DBF(
    tracer: &mut Option<Tracer>,
    ch_type: usize,
    x: usize,
    y: usize,
    size: usize,
    hor: bool,
    dbf: &PlaneRegionMut<'_, pel>,
) {
    EVC_TRACE_COUNTER(tracer);
    EVC_TRACE(tracer, "Dbf for ");
    EVC_TRACE(tracer, ch_type);
    EVC_TRACE(tracer, " x ");
    EVC_TRACE(tracer, x);
    EVC_TRACE(tracer, " y ");
    EVC_TRACE(tracer, y);
    EVC_TRACE(tracer, " size ");
    EVC_TRACE(tracer, size);
    EVC_TRACE(tracer, " hor ");
    EVC_TRACE(tracer, hor as u8);
    EVC_TRACE(tracer, " : ");
    for k in 0..size {
        let line: [pel; 4] = if hor {
            [dbf[y - 2][x + k], dbf[y - 1][x + k], dbf[y][x + k], dbf[y + 1][x + k]]
        } else {
            [dbf[y + k][x - 2], dbf[y + k][x - 1], dbf[y + k][x], dbf[y + k][x + 1]]
        };
        for v in line.iter() {
            EVC_TRACE(tracer, v);
            EVC_TRACE(tracer, " , ");
        }
    }
    EVC_TRACE(tracer, "\n");
}

////////////////////////////////////////////////////////////////////////////////////////////////////

#[cfg(not(feature = "trace"))]
pub(crate) fn OPEN_TRACE() -> Option<Tracer> {
    None
}

#[cfg(not(feature = "trace"))]
pub(crate) fn EVC_TRACE_COUNTER(tracer: &mut Option<Tracer>) {}

#[cfg(not(feature = "trace"))]
pub(crate) fn EVC_TRACE<T: Display>(writer: &mut Option<Tracer>, name: T) {}

#[cfg(not(feature = "trace_pred"))]
pub(crate) fn TRACE_PRED(
    tracer: &mut Option<Tracer>,
    ch_type: usize,
    cuw: usize,
    cuh: usize,
    pred: &[pel],
) {
}

#[cfg(not(feature = "trace_pred"))]
pub(crate) fn TRACE_MV(tracer: &mut Option<Tracer>, refi: &[i8; REFP_NUM], mv: &[[i16; MV_D]; REFP_NUM]) {}

#[cfg(not(feature = "trace_reco"))]
pub(crate) fn TRACE_RECO_PLANE_REGION(
    tracer: &mut Option<Tracer>,
    ch_type: usize,
    x: usize,
    y: usize,
    cuw: usize,
    cuh: usize,
    reco: &PlaneRegionMut<'_, pel>,
) {
}

#[cfg(not(feature = "trace_dbf"))]
pub(crate) fn TRACE_DBF(
    tracer: &mut Option<Tracer>,
    ch_type: usize,
    x: usize,
    y: usize,
    size: usize,
    hor: bool,
    dbf: &PlaneRegionMut<'_, pel>,
) {
}
