#![doc = include_str!("../README.md")]
#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod address;
pub mod codec;
pub mod discovery;
pub mod frame;
pub mod protocol;

mod wire;
