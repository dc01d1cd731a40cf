#![forbid(unsafe_code)]
#![cfg_attr(not(test), deny(clippy::expect_used, clippy::unwrap_used))]

pub mod align;
pub mod dataset;
pub mod decode;
pub mod spatial;
pub mod window;
