pub mod bundle;
pub mod engine;
pub mod generate;
pub mod matrix;
pub mod select;
pub mod stay;
