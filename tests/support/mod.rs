#![allow(dead_code)]
#![allow(clippy::unwrap_used)]

pub mod fixtures;
pub mod socket_guard;
