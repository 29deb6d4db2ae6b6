use directories::ProjectDirs;
use doc_model::{
    AnnotationId, AnnotationRecord, CanvasPreferences, DocumentId, NewAnnotation, PreferencesError,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

const PREFS_SCHEMA_VERSION: u32 = 1;
const ANNOTATIONS_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("unable to resolve local data directory")]
    NoDataDirectory,
    #[error("page numbers are 1-based, got {0}")]
    InvalidPageNumber(u32),
    #[error("invalid preferences: {0}")]
    InvalidPreferences(#[from] PreferencesError),
    #[error("unsupported {file} schema version {version}")]
    UnsupportedVersion { file: &'static str, version: u32 },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Persistence collaborator for the annotation canvas.
///
/// Payloads are stored and returned verbatim; the service never looks inside them.
pub trait AnnotationService {
    fn create(&self, request: &NewAnnotation) -> Result<AnnotationId, StorageError>;

    /// Records for one document, ordered by page number.
    fn list(&self, document_id: DocumentId) -> Result<Vec<AnnotationRecord>, StorageError>;

    /// Returns false when no record had that id.
    fn delete(&self, document_id: DocumentId, id: AnnotationId) -> Result<bool, StorageError>;
}

#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PreferencesEnvelope {
    version: u32,
    preferences: CanvasPreferences,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct AnnotationsEnvelope {
    version: u32,
    next_id: u64,
    records: Vec<AnnotationRecord>,
}

impl Default for AnnotationsEnvelope {
    fn default() -> Self {
        Self { version: ANNOTATIONS_SCHEMA_VERSION, next_id: 1, records: Vec::new() }
    }
}

impl Storage {
    pub fn from_default_project() -> Result<Self, StorageError> {
        let dirs = ProjectDirs::from("dev", "Lecturemark", "Lecturemark")
            .ok_or(StorageError::NoDataDirectory)?;

        Ok(Self { root: dirs.data_local_dir().to_path_buf() })
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn load_preferences(&self) -> Result<CanvasPreferences, StorageError> {
        let path = self.preferences_path();
        if !path.exists() {
            return Ok(CanvasPreferences::default());
        }

        let bytes = fs::read(path)?;
        let envelope: PreferencesEnvelope = serde_json::from_slice(&bytes)?;
        if envelope.version > PREFS_SCHEMA_VERSION {
            return Err(StorageError::UnsupportedVersion {
                file: "preferences",
                version: envelope.version,
            });
        }

        envelope.preferences.validate()?;
        Ok(envelope.preferences)
    }

    pub fn save_preferences(&self, preferences: &CanvasPreferences) -> Result<(), StorageError> {
        preferences.validate()?;
        let envelope =
            PreferencesEnvelope { version: PREFS_SCHEMA_VERSION, preferences: *preferences };

        write_atomic(&self.preferences_path(), &serde_json::to_vec_pretty(&envelope)?)
    }

    fn preferences_path(&self) -> PathBuf {
        self.root.join("preferences.json")
    }

    fn annotations_path(&self, document_id: DocumentId) -> PathBuf {
        self.root.join("annotations").join(format!("document-{document_id}.json"))
    }

    fn load_annotations(&self, document_id: DocumentId) -> Result<AnnotationsEnvelope, StorageError> {
        let path = self.annotations_path(document_id);
        if !path.exists() {
            return Ok(AnnotationsEnvelope::default());
        }

        let bytes = fs::read(path)?;
        let envelope: AnnotationsEnvelope = serde_json::from_slice(&bytes)?;
        if envelope.version > ANNOTATIONS_SCHEMA_VERSION {
            return Err(StorageError::UnsupportedVersion {
                file: "annotations",
                version: envelope.version,
            });
        }

        Ok(envelope)
    }

    fn save_annotations(
        &self,
        document_id: DocumentId,
        envelope: &AnnotationsEnvelope,
    ) -> Result<(), StorageError> {
        write_atomic(&self.annotations_path(document_id), &serde_json::to_vec_pretty(envelope)?)
    }
}

impl AnnotationService for Storage {
    fn create(&self, request: &NewAnnotation) -> Result<AnnotationId, StorageError> {
        if request.page_number == 0 {
            return Err(StorageError::InvalidPageNumber(request.page_number));
        }

        let mut envelope = self.load_annotations(request.document_id)?;
        let id = AnnotationId(envelope.next_id);
        envelope.next_id += 1;
        envelope.records.push(AnnotationRecord {
            id,
            document_id: request.document_id,
            kind: request.kind,
            page_number: request.page_number,
            payload: request.payload.clone(),
            created_at: unix_now(),
        });

        self.save_annotations(request.document_id, &envelope)?;
        tracing::debug!(document = %request.document_id, id = id.0, "annotation stored");

        Ok(id)
    }

    fn list(&self, document_id: DocumentId) -> Result<Vec<AnnotationRecord>, StorageError> {
        let mut records = self.load_annotations(document_id)?.records;
        records.sort_by_key(|record| record.page_number);
        Ok(records)
    }

    fn delete(&self, document_id: DocumentId, id: AnnotationId) -> Result<bool, StorageError> {
        let mut envelope = self.load_annotations(document_id)?;
        let before = envelope.records.len();
        envelope.records.retain(|record| record.id != id);

        if envelope.records.len() == before {
            return Ok(false);
        }

        self.save_annotations(document_id, &envelope)?;
        Ok(true)
    }
}

// Write to a sibling temp file first so readers never see a half-written file.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let temp_path = path.with_extension("tmp");
    fs::write(&temp_path, bytes)?;
    fs::rename(&temp_path, path)?;
    Ok(())
}

fn unix_now() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use doc_model::{AnnotationKind, Color};

    fn request(document: u64, page_number: u32) -> NewAnnotation {
        NewAnnotation {
            document_id: DocumentId(document),
            kind: AnnotationKind::Pen,
            page_number,
            payload: format!("{{\"page\":{page_number}}}"),
        }
    }

    #[test]
    fn preferences_round_trip() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let store = Storage::with_root(temp.path());

        let prefs = CanvasPreferences {
            pen_color: Color::RED,
            min_highlight_size: 8.0,
            ..CanvasPreferences::default()
        };

        store.save_preferences(&prefs).expect("save should succeed");
        let loaded = store.load_preferences().expect("load should succeed");

        assert_eq!(loaded, prefs);
    }

    #[test]
    fn load_defaults_when_file_absent() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let store = Storage::with_root(temp.path());

        let loaded = store.load_preferences().expect("load should succeed");
        assert_eq!(loaded, CanvasPreferences::default());
    }

    #[test]
    fn newer_preferences_schema_is_refused() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        fs::write(temp.path().join("preferences.json"), r#"{"version":9,"preferences":{}}"#)
            .expect("write should succeed");

        let err = Storage::with_root(temp.path()).load_preferences().expect_err("version 9");
        assert!(matches!(err, StorageError::UnsupportedVersion { version: 9, .. }));
    }

    #[test]
    fn stored_preferences_out_of_range_are_refused() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        fs::write(
            temp.path().join("preferences.json"),
            r#"{"version":1,"preferences":{"min_highlight_size":-1}}"#,
        )
        .expect("write should succeed");

        let err = Storage::with_root(temp.path()).load_preferences().expect_err("negative size");
        assert!(matches!(
            err,
            StorageError::InvalidPreferences(PreferencesError::MinHighlightSize(size)) if size == -1.0
        ));
    }

    #[test]
    fn invalid_preferences_are_not_saved() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let store = Storage::with_root(temp.path());

        let prefs = CanvasPreferences { pen_width: -2.0, ..CanvasPreferences::default() };
        assert!(matches!(
            store.save_preferences(&prefs),
            Err(StorageError::InvalidPreferences(PreferencesError::PenWidth(_)))
        ));
        assert!(!temp.path().join("preferences.json").exists());
    }

    #[test]
    fn created_annotations_are_listed_by_page() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let store = Storage::with_root(temp.path());

        let first = store.create(&request(1, 3)).expect("create should succeed");
        let second = store.create(&request(1, 1)).expect("create should succeed");
        store.create(&request(2, 1)).expect("create should succeed");

        assert_ne!(first, second);

        let listed = store.list(DocumentId(1)).expect("list should succeed");
        let pages: Vec<u32> = listed.iter().map(|record| record.page_number).collect();
        assert_eq!(pages, vec![1, 3]);
        assert_eq!(listed[1].payload, "{\"page\":3}");
        assert!(listed.iter().all(|record| record.document_id == DocumentId(1)));
    }

    #[test]
    fn listing_an_unknown_document_is_empty() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let store = Storage::with_root(temp.path());

        assert!(store.list(DocumentId(77)).expect("list should succeed").is_empty());
    }

    #[test]
    fn page_zero_is_refused() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let store = Storage::with_root(temp.path());

        let err = store.create(&request(1, 0)).expect_err("page 0 should fail");
        assert!(matches!(err, StorageError::InvalidPageNumber(0)));
    }

    #[test]
    fn delete_removes_only_the_matching_record() {
        let temp = tempfile::tempdir().expect("temp dir should be created");
        let store = Storage::with_root(temp.path());

        let keep = store.create(&request(1, 1)).expect("create should succeed");
        let drop = store.create(&request(1, 2)).expect("create should succeed");

        assert!(store.delete(DocumentId(1), drop).expect("delete should succeed"));
        assert!(!store.delete(DocumentId(1), drop).expect("second delete is a no-op"));

        let listed = store.list(DocumentId(1)).expect("list should succeed");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, keep);

        let next = store.create(&request(1, 4)).expect("create should succeed");
        assert_ne!(next, drop);
    }
}
