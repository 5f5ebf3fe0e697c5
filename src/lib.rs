// Library exports for vente-editor

pub mod autosave;
pub mod config;
pub mod content;
pub mod richtext;
