#![allow(warnings)]
#![allow(dead_code)]

#[macro_use]
extern crate num_derive;

#[macro_use]
extern crate lazy_static;

pub mod api;
pub mod plane;
pub mod region;

mod dec;
mod def;
mod df;
mod dmvr;
mod mc;
mod picman;
mod recon;
mod tbl;
mod tracer;
mod util;

#[cfg(feature = "bench")]
pub mod bench {
    pub mod frame {
        pub use crate::api::frame::*;
    }
    pub mod plane {
        pub use crate::plane::*;
        pub use crate::region::*;
    }
    pub mod mc {
        pub use crate::mc::{evc_bl_mc_l, evc_mc_c, evc_mc_l};
    }
    pub mod df {
        pub use crate::df::{
            deblock_scu_hor, deblock_scu_hor_chroma, deblock_scu_ver, deblock_scu_ver_chroma,
        };
    }
}
