// src/crawl/fetcher.rs
// =============================================================================
// This module performs one paginated search request.
//
// GET <endpoint>?query=<Q>&offset=<O>&limit=<P>
//
// The fetcher does not judge the response. It returns what happened on the
// wire (status, headers, body bytes) or the transport failure, together with
// a summary of the request so that diagnostics can say what was asked.
// Judging is the classifier's job.
//
// The PageSource trait is the seam between the crawl engine and the network.
// Production uses HttpFetcher; tests plug in scripted sources.
//
// Admission is NOT taken here. The worker holds a token around the call to
// `fetch`, which keeps the cap in one place no matter which source is used.
// =============================================================================

use async_trait::async_trait;
use reqwest::{header, Client};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;
use url::Url;

use crate::config::CrawlConfig;
use crate::error::Result;

// What the request looked like, for diagnostics
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RequestSummary {
    pub method: String,
    pub path: String,
    pub args: BTreeMap<String, Vec<String>>,
    pub headers: BTreeMap<String, String>,
}

impl RequestSummary {
    pub fn from_url(method: &str, url: &Url) -> Self {
        let mut args: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (key, value) in url.query_pairs() {
            args.entry(key.into_owned())
                .or_default()
                .push(value.into_owned());
        }
        Self {
            method: method.to_string(),
            path: url.path().to_string(),
            args,
            headers: BTreeMap::new(),
        }
    }
}

// A response that made it back over the wire, body fully read
#[derive(Debug, Clone, PartialEq)]
pub struct RawReply {
    pub status: u16,
    /// Header name -> values joined with '\n'
    pub headers: BTreeMap<String, String>,
    pub body: Vec<u8>,
}

impl RawReply {
    pub fn content_type(&self) -> Option<&str> {
        self.headers.get("content-type").map(String::as_str)
    }
}

// The result of one fetch attempt
//
// `reply` is Err with a human-readable cause when the transport failed.
// No response metadata exists in that case.
#[derive(Debug, Clone)]
pub struct Exchange {
    pub request: RequestSummary,
    pub reply: std::result::Result<RawReply, String>,
}

#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch(&self, query: &str, offset: u64) -> Exchange;
}

// reqwest-backed PageSource for the real search endpoint
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    endpoint: Url,
    page_size: u32,
}

impl HttpFetcher {
    pub fn new(config: &CrawlConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()?;
        let endpoint = Url::parse(&config.endpoint)?;
        Ok(Self::with_client(client, endpoint, config.page_size))
    }

    pub fn with_client(client: Client, endpoint: Url, page_size: u32) -> Self {
        Self {
            client,
            endpoint,
            page_size,
        }
    }

    // The URL for one page, used when the request never got built
    fn page_url(&self, query: &str, offset: u64) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("query", query)
            .append_pair("offset", &offset.to_string())
            .append_pair("limit", &self.page_size.to_string());
        url
    }
}

#[async_trait]
impl PageSource for HttpFetcher {
    async fn fetch(&self, query: &str, offset: u64) -> Exchange {
        let request = match self
            .client
            .get(self.page_url(query, offset))
            .header(header::ACCEPT, "application/json")
            .build()
        {
            Ok(request) => request,
            Err(e) => {
                return Exchange {
                    request: RequestSummary::from_url("GET", &self.page_url(query, offset)),
                    reply: Err(e.to_string()),
                }
            }
        };

        let mut summary = RequestSummary::from_url(request.method().as_str(), request.url());
        summary.headers = join_headers(request.headers());

        let response = match self.client.execute(request).await {
            Ok(response) => response,
            Err(e) => {
                return Exchange {
                    request: summary,
                    reply: Err(describe_transport_error(&e)),
                }
            }
        };

        let status = response.status().as_u16();
        let headers = join_headers(response.headers());

        // Body read failures count as transport failures too
        let reply = match response.bytes().await {
            Ok(body) => Ok(RawReply {
                status,
                headers,
                body: body.to_vec(),
            }),
            Err(e) => Err(format!("failed to read response body: {}", describe_transport_error(&e))),
        };

        Exchange {
            request: summary,
            reply,
        }
    }
}

// Flattens a HeaderMap, lowercase names, repeated values joined by newline
fn join_headers(map: &header::HeaderMap) -> BTreeMap<String, String> {
    let mut joined: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in map {
        let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
        joined
            .entry(name.as_str().to_string())
            .and_modify(|existing| {
                existing.push('\n');
                existing.push_str(&value);
            })
            .or_insert(value);
    }
    joined
}

fn describe_transport_error(error: &reqwest::Error) -> String {
    if error.is_timeout() {
        format!("request timed out: {}", error)
    } else if error.is_connect() {
        format!("connection failed: {}", error)
    } else {
        error.to_string()
    }
}
