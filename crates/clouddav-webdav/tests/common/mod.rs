//! Shared test harness: a WebDAV server over an in-memory fake remote
//! plus a reqwest client for driving real HTTP requests against it.

#![allow(dead_code)]

use clouddav_core::testing::FakeRemote;
use clouddav_core::{GatewayConfig, Login};
use clouddav_webdav::{CloudDav, ServerConfig, WebDavServer};
use reqwest::{Method, Response, StatusCode};
use std::sync::Arc;

/// A running test server bound to an ephemeral localhost port.
pub struct TestServer {
    server: WebDavServer,
    client: reqwest::Client,
    pub remote: Arc<FakeRemote>,
}

impl TestServer {
    /// Start a server over the given fake remote.
    pub async fn start(remote: Arc<FakeRemote>) -> Self {
        let fs = CloudDav::connect(
            remote.clone(),
            Login {
                username: "user".to_string(),
                password: "hunter2".to_string(),
                credential_file: None,
            },
            None,
            GatewayConfig::default(),
        )
        .await
        .expect("connect to fake remote");

        let server = WebDavServer::start(fs, ServerConfig::default())
            .await
            .expect("start server");

        Self {
            server,
            client: reqwest::Client::new(),
            remote,
        }
    }

    /// Start a server over an empty fake remote.
    pub async fn empty() -> Self {
        Self::start(Arc::new(FakeRemote::new())).await
    }

    pub fn url_for(&self, path: &str) -> String {
        format!("{}{}", self.server.url(), path)
    }

    pub async fn get(&self, path: &str) -> Response {
        self.client
            .get(self.url_for(path))
            .send()
            .await
            .expect("GET request")
    }

    /// GET a path and return its body, or `None` on a non-2xx status.
    pub async fn get_bytes(&self, path: &str) -> Option<Vec<u8>> {
        let resp = self.get(path).await;
        if resp.status().is_success() {
            Some(resp.bytes().await.expect("response body").to_vec())
        } else {
            None
        }
    }

    pub async fn put(&self, path: &str, body: Vec<u8>) -> Response {
        self.client
            .put(self.url_for(path))
            .body(body)
            .send()
            .await
            .expect("PUT request")
    }

    pub async fn delete(&self, path: &str) -> Response {
        self.client
            .delete(self.url_for(path))
            .send()
            .await
            .expect("DELETE request")
    }

    pub async fn mkcol(&self, path: &str) -> Response {
        self.request(Method::from_bytes(b"MKCOL").unwrap(), path)
            .send()
            .await
            .expect("MKCOL request")
    }

    pub async fn mv(&self, from: &str, to: &str) -> Response {
        self.request(Method::from_bytes(b"MOVE").unwrap(), from)
            .header("Destination", self.url_for(to))
            .send()
            .await
            .expect("MOVE request")
    }

    pub async fn propfind(&self, path: &str, depth: &str) -> Response {
        self.request(Method::from_bytes(b"PROPFIND").unwrap(), path)
            .header("Depth", depth)
            .send()
            .await
            .expect("PROPFIND request")
    }

    /// PROPFIND and return (status, body).
    pub async fn propfind_body(&self, path: &str, depth: &str) -> (StatusCode, String) {
        let resp = self.propfind(path, depth).await;
        let status = resp.status();
        let body = resp.text().await.expect("response body");
        (status, body)
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        self.client.request(method, self.url_for(path))
    }
}

/// Assert a GET of `path` returns exactly `expected`.
pub async fn assert_file_content(server: &TestServer, path: &str, expected: &[u8]) {
    let body = server
        .get_bytes(path)
        .await
        .unwrap_or_else(|| panic!("GET {path} should succeed"));
    assert_eq!(body, expected, "content mismatch for {path}");
}

/// Assert a GET of `path` returns 404.
pub async fn assert_not_found(server: &TestServer, path: &str) {
    let resp = server.get(path).await;
    assert_eq!(
        resp.status(),
        StatusCode::NOT_FOUND,
        "GET {path} should be 404"
    );
}
