//! Operator-facing frontend for the coefficient tuner: the EPD corpus
//! reader and the child-process oracle adapter used by the `tune` binary.

pub mod engine;
pub mod epd;
