extern crate indexmap;
extern crate structopt;
extern crate thiserror;

pub mod driver;
pub mod memory;
