use std::sync::Arc;

use futures::future::BoxFuture;
use reqwest::{Client, Method, StatusCode, Url};
use serde::{Deserialize, Serialize};

use super::{
    config::CouchConfig,
    error::{CouchDaoError, CouchResult},
};
use crate::{
    dao::{
        room_store::{RoomStore, room_key},
        storage::StorageResult,
    },
    state::room::RoomSnapshot,
};

/// Room snapshot wrapped with CouchDB document metadata.
#[derive(Debug, Serialize, Deserialize)]
struct RoomDocument {
    #[serde(rename = "_id")]
    id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    rev: Option<String>,
    #[serde(flatten)]
    snapshot: RoomSnapshot,
}

/// Only the revision of a document, used before updates and deletions.
#[derive(Debug, Deserialize)]
struct RevisionOnly {
    #[serde(rename = "_rev")]
    rev: String,
}

/// Room store persisting snapshots as CouchDB documents keyed `<prefix>#<roomId>`.
#[derive(Clone)]
pub struct CouchRoomStore {
    client: Client,
    database_url: Url,
    database: Arc<str>,
    prefix: Arc<str>,
    auth: Option<(Arc<str>, Arc<str>)>,
}

impl CouchRoomStore {
    /// Build a store for `config`; nothing is sent until the first request.
    pub fn new(config: CouchConfig) -> CouchResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|source| CouchDaoError::ClientBuilder { source })?;

        let database_url = database_url(&config.base_url, &config.database)?;
        let database = Arc::<str>::from(config.database);
        let prefix = Arc::<str>::from(config.prefix);
        let auth = config
            .username
            .zip(config.password)
            .map(|(u, p)| (Arc::<str>::from(u), Arc::<str>::from(p)));

        Ok(Self {
            client,
            database_url,
            database,
            prefix,
            auth,
        })
    }

    /// Document URL of `room_id`; the id is encoded as a single path segment.
    fn doc_url(&self, room_id: &str) -> Url {
        let mut url = self.database_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.push(&room_key(&self.prefix, room_id));
        }
        url
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some((ref user, ref pass)) = self.auth {
            builder.basic_auth(user.as_ref(), Some(pass.as_ref()))
        } else {
            builder
        }
    }

    fn request(&self, method: Method, url: &Url) -> reqwest::RequestBuilder {
        self.authorize(self.client.request(method, url.clone()))
    }

    async fn ensure_database(&self) -> CouchResult<()> {
        let database = self.database.to_string();
        let url = self.database_url.clone();

        let response = self
            .authorize(self.client.get(url.clone()))
            .send()
            .await
            .map_err(|source| CouchDaoError::DatabaseQuery {
                database: database.clone(),
                source,
            })?;

        match response.status() {
            StatusCode::OK => Ok(()),
            StatusCode::NOT_FOUND => {
                let create = self
                    .authorize(self.client.put(url))
                    .send()
                    .await
                    .map_err(|source| CouchDaoError::DatabaseCreate {
                        database: database.clone(),
                        source,
                    })?;
                if create.status().is_success() {
                    Ok(())
                } else {
                    Err(CouchDaoError::DatabaseStatus {
                        database,
                        status: create.status(),
                    })
                }
            }
            other => Err(CouchDaoError::DatabaseStatus {
                database,
                status: other,
            }),
        }
    }

    async fn get_document<T>(&self, url: &Url) -> CouchResult<Option<T>>
    where
        T: for<'de> Deserialize<'de>,
    {
        let path = url.path();
        let response = self
            .request(Method::GET, url)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: path.to_string(),
                source,
            })?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                response.json::<T>().await.map(Some).map_err(|source| {
                    CouchDaoError::DecodeResponse {
                        path: path.to_string(),
                        source,
                    }
                })
            }
            other => Err(CouchDaoError::RequestStatus {
                path: path.to_string(),
                status: other,
            }),
        }
    }

    async fn put_room(&self, room_id: &str, snapshot: RoomSnapshot) -> CouchResult<()> {
        let url = self.doc_url(room_id);
        let path = url.path().to_string();
        let rev = self
            .get_document::<RevisionOnly>(&url)
            .await?
            .map(|existing| existing.rev);
        let document = RoomDocument {
            id: room_key(&self.prefix, room_id),
            rev,
            snapshot,
        };

        let response = self
            .request(Method::PUT, &url)
            .json(&document)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: path.clone(),
                source,
            })?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(CouchDaoError::RequestStatus {
                path,
                status: response.status(),
            })
        }
    }

    async fn delete_room(&self, room_id: &str) -> CouchResult<()> {
        let url = self.doc_url(room_id);
        let path = url.path().to_string();
        let Some(existing) = self.get_document::<RevisionOnly>(&url).await? else {
            return Ok(());
        };

        let response = self
            .request(Method::DELETE, &url)
            .query(&[("rev", existing.rev)])
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: path.clone(),
                source,
            })?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(()),
            status if status.is_success() => Ok(()),
            other => Err(CouchDaoError::RequestStatus {
                path,
                status: other,
            }),
        }
    }
}

impl RoomStore for CouchRoomStore {
    fn get_room(&self, room_id: &str) -> BoxFuture<'static, StorageResult<Option<RoomSnapshot>>> {
        let store = self.clone();
        let url = self.doc_url(room_id);
        Box::pin(async move {
            let document = store.get_document::<RoomDocument>(&url).await?;
            Ok(document.map(|doc| doc.snapshot))
        })
    }

    fn set_room(
        &self,
        room_id: &str,
        snapshot: RoomSnapshot,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        let room_id = room_id.to_string();
        Box::pin(async move { store.put_room(&room_id, snapshot).await.map_err(Into::into) })
    }

    fn del_room(&self, room_id: &str) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        let room_id = room_id.to_string();
        Box::pin(async move { store.delete_room(&room_id).await.map_err(Into::into) })
    }

    fn ping(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ensure_database().await.map_err(Into::into) })
    }
}

/// URL of `database` on the server at `base_url`.
fn database_url(base_url: &str, database: &str) -> CouchResult<Url> {
    let invalid = |reason: String| CouchDaoError::InvalidBaseUrl {
        url: base_url.to_string(),
        reason,
    };
    let mut url = Url::parse(base_url).map_err(|err| invalid(err.to_string()))?;
    url.path_segments_mut()
        .map_err(|()| invalid("not a base URL".into()))?
        .pop_if_empty()
        .push(database);
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(base_url: &str) -> CouchRoomStore {
        CouchRoomStore::new(CouchConfig::new(base_url, "rooms")).unwrap()
    }

    #[test]
    fn doc_ids_are_single_encoded_segments() {
        let store = store("http://couch:5984/");
        assert_eq!(
            store.doc_url("lobby-1").as_str(),
            "http://couch:5984/rooms/room%23lobby-1"
        );
        assert_eq!(
            store.doc_url("a/b c").as_str(),
            "http://couch:5984/rooms/room%23a%2Fb%20c"
        );
    }

    #[test]
    fn base_urls_keep_their_path_prefix() {
        let store = store("https://db.example/couch");
        assert_eq!(
            store.doc_url("r1").as_str(),
            "https://db.example/couch/rooms/room%23r1"
        );
    }

    #[test]
    fn unusable_base_urls_are_rejected() {
        assert!(matches!(
            CouchRoomStore::new(CouchConfig::new("not a url", "rooms")),
            Err(CouchDaoError::InvalidBaseUrl { .. })
        ));
        assert!(matches!(
            CouchRoomStore::new(CouchConfig::new("mailto:admin@example.com", "rooms")),
            Err(CouchDaoError::InvalidBaseUrl { .. })
        ));
    }

    #[test]
    fn documents_flatten_the_snapshot() {
        let document = RoomDocument {
            id: "room#r1".into(),
            rev: None,
            snapshot: RoomSnapshot {
                round: 2,
                ..RoomSnapshot::default()
            },
        };
        let value = serde_json::to_value(&document).unwrap();
        assert_eq!(value["_id"], "room#r1");
        assert_eq!(value["round"], 2);
        assert!(value.get("_rev").is_none());
    }
}
