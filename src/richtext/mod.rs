pub mod html_converter;
pub mod html_parser;

pub mod geometry;
pub mod insert_menu;
pub mod invariants;
pub mod keyboard;
pub mod selection;
pub mod session;
pub mod structured_document;
pub mod structured_editor;
pub mod toolbar;
