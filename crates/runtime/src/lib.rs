// runtime crate

pub mod container;
pub mod emulation;

#[cfg(test)]
mod emulation_test;
