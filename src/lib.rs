extern crate clap;
extern crate derivative;
extern crate more_asserts;
extern crate parking_lot;
extern crate rand;
extern crate rand_xoshiro;
#[cfg(feature = "parallel")]
extern crate rayon;
extern crate serde;

pub mod clayg;
#[cfg(feature = "cli")]
pub mod cli;
pub mod cluster;
pub mod decoder;
pub mod decoding_graph;
pub mod logger;
pub mod logical_computer;
pub mod peeling;
pub mod pointers;
pub mod union_find;
pub mod util;
