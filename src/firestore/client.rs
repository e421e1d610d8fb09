use super::path::{CollectionReference, DocumentReference};
use super::value::{from_fields, quote_field_path, to_fields};
use crate::api::rest::{endpoint_url, read_empty, read_json, send_with_retry};
use crate::app::FirebaseApp;
use crate::auth::Auth;
use crate::error::FirebaseError;
use chrono::{DateTime, Utc};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::debug;
use url::Url;

const DEFAULT_DATABASE: &str = "(default)";

/// Document database client bound to one app.
///
/// Requests carry the signed-in user's ID token when there is one, otherwise
/// only the API key.
#[derive(Clone)]
pub struct Firestore {
    inner: Arc<FirestoreInner>,
}

struct FirestoreInner {
    project_id: String,
    database_id: String,
    api_key: String,
    base: Url,
    http: reqwest::Client,
    auth: Auth,
}

/// A read document.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentSnapshot {
    pub reference: DocumentReference,
    pub data: Map<String, Value>,
    pub create_time: Option<DateTime<Utc>>,
    pub update_time: Option<DateTime<Utc>>,
}

impl DocumentSnapshot {
    pub fn id(&self) -> &str {
        self.reference.id()
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.data.get(field)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentPage {
    pub documents: Vec<DocumentSnapshot>,
    pub next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RestDocument {
    name: String,
    #[serde(default)]
    fields: Map<String, Value>,
    #[serde(default)]
    create_time: Option<DateTime<Utc>>,
    #[serde(default)]
    update_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListDocumentsResponse {
    #[serde(default)]
    documents: Vec<RestDocument>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Serialize)]
struct WriteBody {
    fields: Map<String, Value>,
}

#[derive(Debug, Serialize)]
struct CommitRequest {
    writes: Vec<DocumentWrite>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DocumentWrite {
    update: WriteDocument,
    update_mask: DocumentMask,
    #[serde(skip_serializing_if = "Option::is_none")]
    current_document: Option<Precondition>,
}

#[derive(Debug, Serialize)]
struct WriteDocument {
    name: String,
    fields: Map<String, Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DocumentMask {
    field_paths: Vec<String>,
}

#[derive(Debug, Serialize)]
struct Precondition {
    exists: bool,
}

enum WriteMode {
    Replace,
    Merge,
    Update,
}

impl Firestore {
    pub(crate) fn new(app: &FirebaseApp, auth: Auth) -> Self {
        Self {
            inner: Arc::new(FirestoreInner {
                project_id: app.config().project_id.clone(),
                database_id: DEFAULT_DATABASE.to_string(),
                api_key: app.config().api_key.clone(),
                base: app.endpoints().firestore.clone(),
                http: app.http_client(),
                auth,
            }),
        }
    }

    pub fn project_id(&self) -> &str {
        &self.inner.project_id
    }

    pub fn ptr_eq(&self, other: &Firestore) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn collection(&self, path: &str) -> Result<CollectionReference, FirebaseError> {
        CollectionReference::new(path)
    }

    pub fn doc(&self, path: &str) -> Result<DocumentReference, FirebaseError> {
        DocumentReference::new(path)
    }

    /// `None` when the document does not exist.
    pub async fn get_doc(
        &self,
        doc: &DocumentReference,
    ) -> Result<Option<DocumentSnapshot>, FirebaseError> {
        let url = self.document_url(doc.segments())?;
        let bearer = self.bearer().await?;
        let found: Option<RestDocument> = send_with_retry("firestore get", || async {
            let resp = self
                .request(Method::GET, url.clone(), bearer.as_deref())
                .send()
                .await?;
            if resp.status() == StatusCode::NOT_FOUND {
                return Ok(None);
            }
            read_json(resp).await.map(Some)
        })
        .await?;
        let Some(document) = found else {
            debug!(path = %doc.path(), "document not found");
            return Ok(None);
        };
        Ok(Some(self.snapshot(document)?))
    }

    /// Overwrite the document with `data`.
    pub async fn set_doc(&self, doc: &DocumentReference, data: Value) -> Result<(), FirebaseError> {
        self.write(doc, data, WriteMode::Replace).await
    }

    /// Write only the top-level fields present in `data`, creating the document if needed.
    pub async fn set_doc_merge(
        &self,
        doc: &DocumentReference,
        data: Value,
    ) -> Result<(), FirebaseError> {
        self.write(doc, data, WriteMode::Merge).await
    }

    /// Like `set_doc_merge`, but fails if the document does not exist.
    pub async fn update_doc(
        &self,
        doc: &DocumentReference,
        data: Value,
    ) -> Result<(), FirebaseError> {
        self.write(doc, data, WriteMode::Update).await
    }

    pub async fn delete_doc(&self, doc: &DocumentReference) -> Result<(), FirebaseError> {
        let url = self.document_url(doc.segments())?;
        let bearer = self.bearer().await?;
        send_with_retry("firestore delete", || async {
            let resp = self
                .request(Method::DELETE, url.clone(), bearer.as_deref())
                .send()
                .await?;
            read_empty(resp).await
        })
        .await?;
        debug!(path = %doc.path(), "document deleted");
        Ok(())
    }

    /// Create a document with a server-assigned id.
    pub async fn add_doc(
        &self,
        collection: &CollectionReference,
        data: Value,
    ) -> Result<DocumentReference, FirebaseError> {
        let body = WriteBody {
            fields: to_fields(as_object(&data)?),
        };
        let url = self.document_url(collection.segments())?;
        let bearer = self.bearer().await?;
        let document: RestDocument = send_with_retry("firestore add", || async {
            let resp = self
                .request(Method::POST, url.clone(), bearer.as_deref())
                .json(&body)
                .send()
                .await?;
            read_json(resp).await
        })
        .await?;
        let reference = self.reference_from_name(&document.name)?;
        debug!(path = %reference.path(), "document added");
        Ok(reference)
    }

    pub async fn list_docs(
        &self,
        collection: &CollectionReference,
        page_size: Option<u32>,
        page_token: Option<&str>,
    ) -> Result<DocumentPage, FirebaseError> {
        let mut url = self.document_url(collection.segments())?;
        {
            let mut query = url.query_pairs_mut();
            if let Some(size) = page_size {
                query.append_pair("pageSize", &size.to_string());
            }
            if let Some(token) = page_token {
                query.append_pair("pageToken", token);
            }
        }
        let bearer = self.bearer().await?;
        let resp: ListDocumentsResponse = send_with_retry("firestore list", || async {
            let resp = self
                .request(Method::GET, url.clone(), bearer.as_deref())
                .send()
                .await?;
            read_json(resp).await
        })
        .await?;
        let documents = resp
            .documents
            .into_iter()
            .map(|d| self.snapshot(d))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(DocumentPage {
            documents,
            next_page_token: resp.next_page_token.filter(|t| !t.is_empty()),
        })
    }

    async fn write(
        &self,
        doc: &DocumentReference,
        data: Value,
        mode: WriteMode,
    ) -> Result<(), FirebaseError> {
        let object = as_object(&data)?;
        if object.is_empty() && !matches!(mode, WriteMode::Replace) {
            return self.commit_empty_mask(doc, mode).await;
        }
        let body = WriteBody {
            fields: to_fields(object),
        };
        let mut url = self.document_url(doc.segments())?;
        {
            let mut query = url.query_pairs_mut();
            if matches!(mode, WriteMode::Merge | WriteMode::Update) {
                for field in object.keys() {
                    query.append_pair("updateMask.fieldPaths", &quote_field_path(field));
                }
            }
            if matches!(mode, WriteMode::Update) {
                query.append_pair("currentDocument.exists", "true");
            }
        }
        let bearer = self.bearer().await?;
        let _: RestDocument = send_with_retry("firestore write", || async {
            let resp = self
                .request(Method::PATCH, url.clone(), bearer.as_deref())
                .json(&body)
                .send()
                .await?;
            read_json(resp).await
        })
        .await?;
        debug!(path = %doc.path(), "document written");
        Ok(())
    }

    /// Merge or update that names no fields: an empty mask leaves every field
    /// alone. The PATCH endpoint cannot express that, so it goes through `commit`.
    async fn commit_empty_mask(
        &self,
        doc: &DocumentReference,
        mode: WriteMode,
    ) -> Result<(), FirebaseError> {
        let body = CommitRequest {
            writes: vec![DocumentWrite {
                update: WriteDocument {
                    name: self.resource_name(doc),
                    fields: Map::new(),
                },
                update_mask: DocumentMask {
                    field_paths: Vec::new(),
                },
                current_document: matches!(mode, WriteMode::Update)
                    .then_some(Precondition { exists: true }),
            }],
        };
        let url = self.database_url("commit")?;
        let bearer = self.bearer().await?;
        let _: Value = send_with_retry("firestore commit", || async {
            let resp = self
                .request(Method::POST, url.clone(), bearer.as_deref())
                .json(&body)
                .send()
                .await?;
            read_json(resp).await
        })
        .await?;
        debug!(path = %doc.path(), "empty-mask write committed");
        Ok(())
    }

    /// ID token of the signed-in user, if any.
    async fn bearer(&self) -> Result<Option<String>, FirebaseError> {
        if self.inner.auth.current_user().is_none() {
            return Ok(None);
        }
        match self.inner.auth.id_token(false).await {
            Ok(token) => Ok(Some(token)),
            Err(FirebaseError::NoCurrentUser) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn request(&self, method: Method, url: Url, bearer: Option<&str>) -> RequestBuilder {
        let builder = self.inner.http.request(method, url);
        match bearer {
            Some(token) => builder.bearer_auth(token),
            None => builder.query(&[("key", self.inner.api_key.as_str())]),
        }
    }

    fn documents_root(&self) -> [&str; 5] {
        [
            "projects",
            self.inner.project_id.as_str(),
            "databases",
            self.inner.database_id.as_str(),
            "documents",
        ]
    }

    fn document_url(&self, segments: &[String]) -> Result<Url, FirebaseError> {
        endpoint_url(
            &self.inner.base,
            self.documents_root()
                .into_iter()
                .chain(segments.iter().map(String::as_str)),
        )
    }

    /// `projects/{p}/databases/{d}/documents:{method}`
    fn database_url(&self, method: &str) -> Result<Url, FirebaseError> {
        let [projects, project, databases, database, _] = self.documents_root();
        let last = format!("documents:{method}");
        endpoint_url(
            &self.inner.base,
            [projects, project, databases, database, last.as_str()],
        )
    }

    fn resource_name(&self, doc: &DocumentReference) -> String {
        format!("{}/{}", self.documents_root().join("/"), doc.path())
    }

    /// Strip `projects/{p}/databases/{d}/documents/` from a resource name.
    fn reference_from_name(&self, name: &str) -> Result<DocumentReference, FirebaseError> {
        let prefix = format!("{}/", self.documents_root().join("/"));
        let relative = name
            .strip_prefix(&prefix)
            .ok_or_else(|| FirebaseError::InvalidPath(name.to_string()))?;
        DocumentReference::new(relative)
    }

    fn snapshot(&self, document: RestDocument) -> Result<DocumentSnapshot, FirebaseError> {
        Ok(DocumentSnapshot {
            reference: self.reference_from_name(&document.name)?,
            data: from_fields(&document.fields),
            create_time: document.create_time,
            update_time: document.update_time,
        })
    }
}

fn as_object(data: &Value) -> Result<&Map<String, Value>, FirebaseError> {
    data.as_object().ok_or(FirebaseError::InvalidDocumentData)
}
