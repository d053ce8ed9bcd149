//! Azure Blob Storage block blob over the REST API.
//!
//! Access is granted by a pre-signed SAS query string, appended to every
//! request as-is.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::StatusCode;
use reqwest::header::CONTENT_TYPE;
use tracing::{debug, info};

use chunklift_transfer::BlockId;

use crate::error::StoreError;
use crate::store::{BlockStore, StoreFuture};

/// REST API version sent with every request.
const API_VERSION: &str = "2021-08-06";

/// Characters escaped in container and blob path segments.
const PATH: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'/');

/// A block blob in one container of a storage account.
pub struct AzureBlockBlob {
    http: reqwest::Client,
    account_url: String,
    container: String,
    blob: String,
    sas: String,
}

impl AzureBlockBlob {
    /// Creates a handle for `container/blob` under `account_url`
    /// (e.g. `https://myaccount.blob.core.windows.net`).
    pub fn new(
        account_url: &str,
        container: &str,
        blob: &str,
        sas_token: &str,
    ) -> Result<Self, StoreError> {
        let http = reqwest::Client::builder().build()?;
        Self::with_client(http, account_url, container, blob, sas_token)
    }

    /// Like [`new`](Self::new), reusing an existing HTTP client.
    pub fn with_client(
        http: reqwest::Client,
        account_url: &str,
        container: &str,
        blob: &str,
        sas_token: &str,
    ) -> Result<Self, StoreError> {
        let parsed = reqwest::Url::parse(account_url)
            .map_err(|e| StoreError::InvalidUrl(format!("{account_url}: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(StoreError::InvalidUrl(format!(
                "{account_url}: unsupported scheme"
            )));
        }
        if container.is_empty() || blob.is_empty() {
            return Err(StoreError::InvalidUrl(
                "container and blob name must not be empty".into(),
            ));
        }

        Ok(Self {
            http,
            account_url: account_url.trim_end_matches('/').to_string(),
            container: container.to_string(),
            blob: blob.trim_start_matches('/').to_string(),
            sas: sas_token.trim_start_matches('?').to_string(),
        })
    }

    fn container_url(&self, query: &str) -> String {
        let base = format!(
            "{}/{}",
            self.account_url,
            utf8_percent_encode(&self.container, PATH)
        );
        self.with_query(base, query)
    }

    fn blob_url(&self, query: &str) -> String {
        let base = format!(
            "{}/{}/{}",
            self.account_url,
            utf8_percent_encode(&self.container, PATH),
            utf8_percent_encode(&self.blob, PATH)
        );
        self.with_query(base, query)
    }

    fn with_query(&self, base: String, query: &str) -> String {
        if self.sas.is_empty() {
            format!("{base}?{query}")
        } else {
            format!("{base}?{query}&{}", self.sas)
        }
    }

    /// Issues a PUT and returns the status if it is a success.
    async fn put(
        &self,
        url: &str,
        body: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<StatusCode, StoreError> {
        let mut req = self
            .http
            .put(url)
            .header("x-ms-version", API_VERSION)
            .body(body);
        if let Some(ct) = content_type {
            req = req.header(CONTENT_TYPE, ct);
        }

        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(StoreError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(status)
    }
}

/// XML body of a Put Block List request.
pub fn block_list_xml(ids: &[BlockId]) -> String {
    let mut xml = String::from(r#"<?xml version="1.0" encoding="utf-8"?><BlockList>"#);
    for id in ids {
        // Base64 identifiers contain no XML metacharacters.
        xml.push_str("<Latest>");
        xml.push_str(id.as_str());
        xml.push_str("</Latest>");
    }
    xml.push_str("</BlockList>");
    xml
}

impl BlockStore for AzureBlockBlob {
    fn ensure_container(&self) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            let url = self.container_url("restype=container");
            match self.put(&url, Vec::new(), None).await {
                Ok(_) => {
                    info!(container = %self.container, "container created");
                    Ok(())
                }
                Err(StoreError::Api { status: 409, .. }) => {
                    debug!(container = %self.container, "container already exists");
                    Ok(())
                }
                Err(e) => Err(e),
            }
        })
    }

    fn put_block<'a>(&'a self, id: &'a BlockId, data: Vec<u8>) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let query = format!(
                "comp=block&blockid={}",
                utf8_percent_encode(id.as_str(), NON_ALPHANUMERIC)
            );
            let url = self.blob_url(&query);
            let len = data.len();
            self.put(&url, data, None).await?;
            debug!(block = %id, bytes = len, "block staged");
            Ok(())
        })
    }

    fn commit_block_list<'a>(&'a self, ids: &'a [BlockId]) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            let url = self.blob_url("comp=blocklist");
            let body = block_list_xml(ids).into_bytes();
            self.put(&url, body, Some("application/xml")).await?;
            info!(blob = %self.blob, blocks = ids.len(), "block list committed");
            Ok(())
        })
    }

    fn describe(&self) -> String {
        format!("{}/{}/{}", self.account_url, self.container, self.blob)
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::*;

    /// Accepts one connection, captures the request, replies with `status_line`.
    async fn serve_once(status_line: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut raw = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                raw.extend_from_slice(&buf[..n]);
                if n == 0 || request_complete(&raw) {
                    break;
                }
            }
            let reply = format!("{status_line}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n");
            socket.write_all(reply.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
            String::from_utf8_lossy(&raw).into_owned()
        });
        (format!("http://{addr}"), handle)
    }

    fn request_complete(raw: &[u8]) -> bool {
        let text = String::from_utf8_lossy(raw);
        let Some(end) = text.find("\r\n\r\n") else {
            return false;
        };
        let content_length = text[..end]
            .lines()
            .find_map(|l| {
                let (name, value) = l.split_once(':')?;
                name.eq_ignore_ascii_case("content-length")
                    .then(|| value.trim().parse::<usize>().ok())
                    .flatten()
            })
            .unwrap_or(0);
        raw.len() >= end + 4 + content_length
    }

    #[test]
    fn builds_urls_with_sas() {
        let blob = AzureBlockBlob::new(
            "https://acct.blob.core.windows.net/",
            "media",
            "big file.iso",
            "?sv=2021&sig=abc",
        )
        .unwrap();
        assert_eq!(
            blob.container_url("restype=container"),
            "https://acct.blob.core.windows.net/media?restype=container&sv=2021&sig=abc"
        );
        assert_eq!(
            blob.blob_url("comp=blocklist"),
            "https://acct.blob.core.windows.net/media/big%20file.iso?comp=blocklist&sv=2021&sig=abc"
        );
        assert_eq!(
            blob.describe(),
            "https://acct.blob.core.windows.net/media/big file.iso"
        );
    }

    #[test]
    fn builds_urls_without_sas() {
        let blob = AzureBlockBlob::new("http://127.0.0.1:10000/devstore", "c", "dir/o.bin", "")
            .unwrap();
        assert_eq!(
            blob.blob_url("comp=block&blockid=x"),
            "http://127.0.0.1:10000/devstore/c/dir/o.bin?comp=block&blockid=x"
        );
    }

    #[test]
    fn rejects_bad_locations() {
        assert!(matches!(
            AzureBlockBlob::new("not a url", "c", "b", ""),
            Err(StoreError::InvalidUrl(_))
        ));
        assert!(matches!(
            AzureBlockBlob::new("ftp://host", "c", "b", ""),
            Err(StoreError::InvalidUrl(_))
        ));
        assert!(matches!(
            AzureBlockBlob::new("https://host", "", "b", ""),
            Err(StoreError::InvalidUrl(_))
        ));
    }

    #[test]
    fn block_list_preserves_order() {
        let ids: Vec<BlockId> = [1u64, 2, 3]
            .iter()
            .map(|&s| BlockId::for_sequence("p", s).unwrap())
            .collect();
        let xml = block_list_xml(&ids);
        assert_eq!(
            xml,
            "<?xml version=\"1.0\" encoding=\"utf-8\"?><BlockList>\
             <Latest>cDAwMDAwMDE=</Latest><Latest>cDAwMDAwMDI=</Latest>\
             <Latest>cDAwMDAwMDM=</Latest></BlockList>"
        );
    }

    #[test]
    fn empty_block_list() {
        assert_eq!(
            block_list_xml(&[]),
            "<?xml version=\"1.0\" encoding=\"utf-8\"?><BlockList></BlockList>"
        );
    }

    #[tokio::test]
    async fn put_block_sends_encoded_id_and_payload() {
        let (url, server) = serve_once("HTTP/1.1 201 Created").await;
        let blob = AzureBlockBlob::new(&url, "c", "o.bin", "sig=s").unwrap();
        let id = BlockId::for_sequence("p", 1).unwrap();

        blob.put_block(&id, b"payload".to_vec()).await.unwrap();

        let request = server.await.unwrap();
        assert!(request.starts_with("PUT /c/o.bin?comp=block&blockid=cDAwMDAwMDE%3D&sig=s "));
        assert!(request.to_ascii_lowercase().contains("x-ms-version: 2021-08-06"));
        assert!(request.ends_with("payload"));
    }

    #[tokio::test]
    async fn existing_container_is_not_an_error() {
        let (url, server) = serve_once("HTTP/1.1 409 Conflict").await;
        let blob = AzureBlockBlob::new(&url, "c", "o.bin", "").unwrap();
        blob.ensure_container().await.unwrap();
        let request = server.await.unwrap();
        assert!(request.starts_with("PUT /c?restype=container "));
    }

    #[tokio::test]
    async fn rejected_block_surfaces_status() {
        let (url, server) = serve_once("HTTP/1.1 403 Forbidden").await;
        let blob = AzureBlockBlob::new(&url, "c", "o.bin", "").unwrap();
        let id = BlockId::for_sequence("p", 1).unwrap();
        let result = blob.put_block(&id, vec![1, 2, 3]).await;
        assert!(matches!(result, Err(StoreError::Api { status: 403, .. })));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn commit_sends_block_list() {
        let (url, server) = serve_once("HTTP/1.1 201 Created").await;
        let blob = AzureBlockBlob::new(&url, "c", "o.bin", "").unwrap();
        let ids = vec![
            BlockId::for_sequence("p", 1).unwrap(),
            BlockId::for_sequence("p", 2).unwrap(),
        ];
        blob.commit_block_list(&ids).await.unwrap();

        let request = server.await.unwrap();
        assert!(request.starts_with("PUT /c/o.bin?comp=blocklist "));
        assert!(request.to_ascii_lowercase().contains("content-type: application/xml"));
        assert!(request.ends_with(&block_list_xml(&ids)));
    }
}
