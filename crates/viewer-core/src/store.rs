//! Committed annotations for the active document.
//!
//! The store is filled only from the listing call. It never holds optimistic
//! entries; the stroke being drawn lives in the tool machine instead.

use doc_model::{Annotation, AnnotationId, AnnotationRecord};

#[derive(Debug, Clone)]
struct StoredAnnotation {
    id: AnnotationId,
    annotation: Annotation,
}

#[derive(Debug, Default, Clone)]
pub struct AnnotationStore {
    annotations: Vec<StoredAnnotation>,
    dropped: usize,
}

/// Summary of a reload from the listing call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReloadSummary {
    pub loaded: usize,
    pub dropped: usize,
}

impl AnnotationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the collection with freshly listed records.
    ///
    /// A record whose payload does not decode, or whose page or kind disagrees
    /// with the decoded payload, is skipped on its own; the rest still loads.
    pub fn replace_from_records(&mut self, records: &[AnnotationRecord]) -> ReloadSummary {
        self.annotations.clear();
        self.dropped = 0;

        for record in records {
            match record.decode() {
                Ok(annotation)
                    if annotation.page_number() == record.page_number
                        && annotation.kind() == record.kind =>
                {
                    self.annotations.push(StoredAnnotation { id: record.id, annotation });
                }
                Ok(annotation) if annotation.kind() != record.kind => {
                    tracing::warn!(
                        id = record.id.0,
                        record_kind = %record.kind,
                        payload_kind = %annotation.kind(),
                        "dropping annotation whose payload type disagrees with its record"
                    );
                    self.dropped += 1;
                }
                Ok(annotation) => {
                    tracing::warn!(
                        id = record.id.0,
                        record_page = record.page_number,
                        payload_page = annotation.page_number(),
                        "dropping annotation whose payload page disagrees with its record"
                    );
                    self.dropped += 1;
                }
                Err(error) => {
                    tracing::warn!(id = record.id.0, %error, "dropping malformed annotation");
                    self.dropped += 1;
                }
            }
        }

        ReloadSummary { loaded: self.annotations.len(), dropped: self.dropped }
    }

    /// Annotations on one page, in listing order.
    pub fn page_annotations(&self, page_number: u32) -> Vec<&Annotation> {
        self.annotations
            .iter()
            .filter(|stored| stored.annotation.page_number() == page_number)
            .map(|stored| &stored.annotation)
            .collect()
    }

    pub fn get(&self, id: AnnotationId) -> Option<&Annotation> {
        self.annotations.iter().find(|stored| stored.id == id).map(|stored| &stored.annotation)
    }

    pub fn len(&self) -> usize {
        self.annotations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.annotations.is_empty()
    }

    pub fn dropped(&self) -> usize {
        self.dropped
    }
}
