pub mod assets;
pub mod commands;
