use crate::error::FirebaseError;

fn parse_segments(path: &str) -> Result<Vec<String>, FirebaseError> {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        return Err(FirebaseError::InvalidPath(path.to_string()));
    }
    let segments: Vec<String> = trimmed.split('/').map(str::to_string).collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(FirebaseError::InvalidPath(path.to_string()));
    }
    Ok(segments)
}

/// Slash-separated path naming a document: an even number of segments.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentReference {
    segments: Vec<String>,
}

/// Slash-separated path naming a collection: an odd number of segments.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionReference {
    segments: Vec<String>,
}

impl DocumentReference {
    pub fn new(path: &str) -> Result<Self, FirebaseError> {
        let segments = parse_segments(path)?;
        if segments.len() % 2 != 0 {
            return Err(FirebaseError::InvalidPath(path.to_string()));
        }
        Ok(Self { segments })
    }

    pub fn id(&self) -> &str {
        self.segments.last().map(String::as_str).unwrap_or_default()
    }

    pub fn path(&self) -> String {
        self.segments.join("/")
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn parent(&self) -> CollectionReference {
        CollectionReference {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        }
    }

    /// Subcollection below this document.
    pub fn collection(&self, path: &str) -> Result<CollectionReference, FirebaseError> {
        CollectionReference::new(&format!("{}/{}", self.path(), path.trim_matches('/')))
    }
}

impl CollectionReference {
    pub fn new(path: &str) -> Result<Self, FirebaseError> {
        let segments = parse_segments(path)?;
        if segments.len() % 2 != 1 {
            return Err(FirebaseError::InvalidPath(path.to_string()));
        }
        Ok(Self { segments })
    }

    pub fn id(&self) -> &str {
        self.segments.last().map(String::as_str).unwrap_or_default()
    }

    pub fn path(&self) -> String {
        self.segments.join("/")
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// The owning document, `None` for root collections.
    pub fn parent(&self) -> Option<DocumentReference> {
        (self.segments.len() > 1).then(|| DocumentReference {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    pub fn doc(&self, id: &str) -> Result<DocumentReference, FirebaseError> {
        DocumentReference::new(&format!("{}/{}", self.path(), id.trim_matches('/')))
    }
}
