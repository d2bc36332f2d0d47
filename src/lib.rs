#[cfg(test)]
mod test;

pub mod assemble;
pub mod plan;
pub mod validate;
pub mod workflow;

pub mod broadcast;
pub mod geometry;
pub mod projection;

pub mod defaults;
pub mod namelist;
pub mod parameters;
pub mod value;

pub mod error;
