pub mod clp;
pub mod views;
