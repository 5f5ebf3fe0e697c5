// Common content access traits so autosave, file loading and tools can work
// with any editor surface through its serialized HTML.

use crate::richtext::html_converter::{document_to_html, html_to_document};
use crate::richtext::structured_editor::StructuredEditor;

/// Provides read access to the current content as HTML.
///
/// Implementations should return the serialized form suitable for saving.
pub trait ContentProvider {
    fn get_content(&self) -> String;
}

/// Loads HTML content into an editor surface, parsing it as appropriate.
pub trait ContentLoader {
    fn set_content_from_html(&mut self, html: &str);
}

impl ContentProvider for StructuredEditor {
    fn get_content(&self) -> String {
        document_to_html(self.document())
    }
}

impl ContentLoader for StructuredEditor {
    fn set_content_from_html(&mut self, html: &str) {
        self.set_document(html_to_document(html));
    }
}

impl ContentProvider for String {
    fn get_content(&self) -> String {
        self.clone()
    }
}

impl ContentLoader for String {
    fn set_content_from_html(&mut self, html: &str) {
        html.clone_into(self);
    }
}
