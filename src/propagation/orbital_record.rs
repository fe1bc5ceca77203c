use strum_macros::Display;

/// A raw entity could not be turned into an [`OrbitalRecord`]. The entity is dropped
/// from its group; group initialisation continues.
#[derive(Debug, Display, Clone, PartialEq)]
pub enum RecordConstructionError {
    /// One of the element lines does not have the expected shape.
    MalformedLine { id: String, line: u8 },
    /// The propagator rejected the element set.
    InvalidElements { id: String, reason: String },
}

impl RecordConstructionError {
    pub fn id(&self) -> &str {
        match self {
            RecordConstructionError::MalformedLine { id, .. }
            | RecordConstructionError::InvalidElements { id, .. } => id,
        }
    }
}

impl std::error::Error for RecordConstructionError {}

/// One trackable object: identifier, propagator elements and optional display color.
///
/// Immutable after creation and owned by exactly one record store.
pub struct OrbitalRecord<E> {
    id: String,
    color: Option<String>,
    elements: E,
}

impl<E> OrbitalRecord<E> {
    pub fn new(id: String, color: Option<String>, elements: E) -> Self { Self { id, color, elements } }

    pub fn id(&self) -> &str { &self.id }
    pub fn color(&self) -> Option<&str> { self.color.as_deref() }
    pub fn elements(&self) -> &E { &self.elements }
}
