//! Inkbunny strategy
//!
//! Inkbunny has a JSON API. A session id (`sid`) from `api_login.php` is sent
//! as a query parameter on every call. Favorites come from `api_search.php`,
//! which hands out a result id (`rid`) on the first page that later pages
//! refer to. Numeric fields arrive as strings as often as not.

use crate::config::{HttpConfig, InkbunnyConfig};
use crate::crawler::{ListingPage, ListingSource};
use crate::extractor::{Extraction, ItemExtractor};
use crate::model::{
    normalize_tags, parse_remote_datetime, ItemId, MediaRecord, PoolRecord, Provider, Submission,
};
use crate::providers::endpoint;
use crate::transport::{RequestSpec, RetryTransport, TransportError, TransportResult};
use crate::SyncError;
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;
use url::Url;

const SUBMISSIONS_PER_PAGE: u32 = 100;

/// Credentials carried on every API call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InkbunnySession {
    pub sid: String,
    pub user_id: i64,
}

/// Position in a favorites search
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchCursor {
    /// The initial search, which creates the result set
    Start,

    /// A later page of an existing result set
    Page { rid: String, page: u32 },
}

/// Listing and extraction for Inkbunny favorites
#[derive(Debug, Clone)]
pub struct Inkbunny {
    base_url: Url,
    session: InkbunnySession,
    timeout: Duration,
    listing: RetryTransport,
    detail: RetryTransport,
}

impl Inkbunny {
    /// Builds the provider, logging in unless the config carries a session
    pub async fn connect(
        config: &InkbunnyConfig,
        http: &HttpConfig,
        client: Client,
    ) -> Result<Self, SyncError> {
        let base_url = Url::parse(&config.base_url)?;
        let session = match (&config.sid, config.user_id) {
            (Some(sid), Some(user_id)) => {
                tracing::debug!("Using configured Inkbunny session for user {}", user_id);
                InkbunnySession {
                    sid: sid.clone(),
                    user_id,
                }
            }
            _ => {
                let (Some(username), Some(password)) = (&config.username, &config.password) else {
                    return Err(SyncError::Login(
                        "inkbunny needs username and password, or sid and user-id".to_string(),
                    ));
                };
                let transport = RetryTransport::new(client.clone(), config.listing_retry.policy());
                login(&transport, &base_url, username, password, http.timeout()).await?
            }
        };

        Self::with_session(config, http, client, session)
    }

    /// Builds the provider around an existing session
    pub fn with_session(
        config: &InkbunnyConfig,
        http: &HttpConfig,
        client: Client,
        session: InkbunnySession,
    ) -> Result<Self, SyncError> {
        let base_url = Url::parse(&config.base_url)?;
        let listing = RetryTransport::new(client, config.listing_retry.policy());
        let detail = listing.with_policy(config.detail_retry.policy());

        Ok(Self {
            base_url,
            session,
            timeout: http.timeout(),
            listing,
            detail,
        })
    }

    pub fn session(&self) -> &InkbunnySession {
        &self.session
    }

    fn api_request(&self, path: &str) -> TransportResult<RequestSpec> {
        let url = endpoint(&self.base_url, path)?;
        Ok(RequestSpec::get(url.as_str())
            .query("sid", self.session.sid.as_str())
            .query("output_mode", "json")
            .timeout(self.timeout))
    }
}

/// Exchanges a username and password for a session
pub async fn login(
    transport: &RetryTransport,
    base_url: &Url,
    username: &str,
    password: &str,
    timeout: Duration,
) -> Result<InkbunnySession, SyncError> {
    let url = endpoint(base_url, "api_login.php")?;
    let spec = RequestSpec::post(url.as_str())
        .query("username", username)
        .query("password", password)
        .query("output_mode", "json")
        .timeout(timeout);

    let response: LoginResponse = call_api(transport, &spec)
        .await
        .map_err(|e| SyncError::Login(e.to_string()))?;

    let user_id = response
        .user_id
        .as_i64()
        .ok_or_else(|| SyncError::Login(format!("unexpected user id {}", response.user_id)))?;

    tracing::info!("Logged in to Inkbunny as {} (user {})", username, user_id);
    Ok(InkbunnySession {
        sid: response.sid,
        user_id,
    })
}

#[async_trait]
impl ListingSource for Inkbunny {
    type Cursor = SearchCursor;

    fn first_cursor(&self) -> SearchCursor {
        SearchCursor::Start
    }

    async fn fetch_page(&self, cursor: &SearchCursor) -> TransportResult<ListingPage<SearchCursor>> {
        let mut spec = self
            .api_request("api_search.php")?
            .query("submission_ids_only", "yes")
            .query("submissions_per_page", SUBMISSIONS_PER_PAGE);

        spec = match cursor {
            SearchCursor::Start => spec
                .query("favs_user_id", self.session.user_id)
                .query("orderby", "fav_datetime")
                .query("get_rid", "yes"),
            SearchCursor::Page { rid, page } => spec.query("rid", rid.as_str()).query("page", page),
        };

        let response: SearchResponse = call_api(&self.listing, &spec).await?;
        Ok(search_page(response, cursor))
    }
}

#[async_trait]
impl ItemExtractor for Inkbunny {
    fn provider(&self) -> Provider {
        Provider::Inkbunny
    }

    async fn extract(&self, id: &ItemId) -> Result<Extraction, SyncError> {
        let spec = self
            .api_request("api_submissions.php")?
            .query("submission_ids", id.as_str())
            .query("sort_keywords_by", "alphabetical")
            .query("show_description", "yes")
            .query("show_description_bbcode_parsed", "no")
            .query("show_writing", "yes")
            .query("show_writing_bbcode_parsed", "no")
            .query("show_pools", "yes");

        let response: SubmissionsResponse = call_api(&self.detail, &spec).await?;
        let Some(submission) = response.submissions.into_iter().next() else {
            return Ok(Extraction::NotFound);
        };

        let submission = convert_submission(submission, &self.base_url).map_err(|message| {
            SyncError::Extraction {
                id: id.to_string(),
                message,
            }
        })?;
        Ok(Extraction::Found(submission))
    }
}

/// Sends an API call and decodes the body
///
/// A body with an `error_code` becomes `TransportError::Remote`.
async fn call_api<T: DeserializeOwned>(
    transport: &RetryTransport,
    spec: &RequestSpec,
) -> TransportResult<T> {
    let value: Value = transport.send_json(spec).await?;
    decode_api_response(&spec.url, value)
}

fn decode_api_response<T: DeserializeOwned>(url: &str, value: Value) -> TransportResult<T> {
    if let Some(code) = value.get("error_code").filter(|code| !code.is_null()) {
        let message = value
            .get("error_message")
            .and_then(Value::as_str)
            .unwrap_or("unknown error");
        return Err(TransportError::Remote {
            url: url.to_string(),
            message: format!("{} (code {})", message, code),
        });
    }

    serde_json::from_value(value).map_err(|e| TransportError::Decode {
        url: url.to_string(),
        message: e.to_string(),
    })
}

/// Turns a search response into a listing page
///
/// Later pages reuse the result id of the cursor when the response omits it.
fn search_page(response: SearchResponse, cursor: &SearchCursor) -> ListingPage<SearchCursor> {
    let ids = response
        .submissions
        .iter()
        .map(|hit| ItemId::new(hit.submission_id.to_string()))
        .collect();

    let rid = response.rid.map(|rid| rid.to_string()).or_else(|| match cursor {
        SearchCursor::Page { rid, .. } => Some(rid.clone()),
        SearchCursor::Start => None,
    });
    let page = response.page.as_i64().unwrap_or(1);
    let pages_count = response.pages_count.as_i64().unwrap_or(0);

    let next = match rid {
        Some(rid) if page < pages_count => u32::try_from(page + 1)
            .ok()
            .map(|page| SearchCursor::Page { rid, page }),
        _ => None,
    };

    ListingPage { ids, next }
}

/// Builds records for every file of a submission
///
/// Each file carries the ids of all pools the submission is in, and each pool
/// lists every file of the submission.
fn convert_submission(api: ApiSubmission, base_url: &Url) -> Result<Submission, String> {
    let submission_id = api
        .submission_id
        .as_i64()
        .ok_or_else(|| format!("non-numeric submission id {}", api.submission_id))?;
    let user_id = api.user_id.as_ref().and_then(NumberOrString::as_i64);
    let description = api.description.unwrap_or_default();
    let tags = normalize_tags(
        api.keywords.iter().map(|k| k.keyword_name.as_str()),
        &api.username,
    );

    let mut pools = Vec::with_capacity(api.pools.len());
    for pool in api.pools {
        let pool_id = pool
            .pool_id
            .as_i64()
            .ok_or_else(|| format!("non-numeric pool id {}", pool.pool_id))?;
        pools.push(PoolRecord {
            provider: Provider::Inkbunny,
            pool_id,
            name: pool.name,
            description: pool.description.unwrap_or_default(),
            files: BTreeSet::new(),
        });
    }
    let pool_ids: BTreeSet<i64> = pools.iter().map(|p| p.pool_id).collect();

    let mut files = Vec::with_capacity(api.files.len());
    for file in api.files {
        let file_id = file
            .file_id
            .as_i64()
            .ok_or_else(|| format!("non-numeric file id {}", file.file_id))?;

        let mut record =
            MediaRecord::new(Provider::Inkbunny, submission_id, file_id, &file.file_name);
        record.mime_type = file.mimetype.filter(|m| !m.is_empty());
        record.width = dimension(file.full_size_x.as_ref());
        record.height = dimension(file.full_size_y.as_ref());
        record.title = api.title.clone();
        record.description = description.clone();
        record.username = api.username.clone();
        record.user_id = user_id;
        record.tags = tags.clone();
        record.content_hash = file.full_file_md5.filter(|h| !h.is_empty());
        record.create_timestamp = file.create_datetime.as_deref().and_then(parse_remote_datetime);
        record.create_datetime = file.create_datetime;
        record.pools = pool_ids.clone();
        record.source_url = file
            .file_url_full
            .as_deref()
            .and_then(|u| base_url.join(u).ok())
            .map(|u| u.to_string());

        files.push(record);
    }

    for pool in &mut pools {
        pool.files = files.iter().map(|f| f.file_id).collect();
    }

    Ok(Submission {
        submission_id,
        files,
        pools,
    })
}

fn dimension(value: Option<&NumberOrString>) -> u32 {
    value
        .and_then(NumberOrString::as_i64)
        .and_then(|v| u32::try_from(v).ok())
        .unwrap_or(0)
}

/// A JSON value the API sends either as a number or as a string
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(i64),
    Text(String),
}

impl NumberOrString {
    fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Number(n) => Some(*n),
            Self::Text(s) => s.trim().parse().ok(),
        }
    }
}

impl fmt::Display for NumberOrString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{}", n),
            Self::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    sid: String,
    user_id: NumberOrString,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    rid: Option<NumberOrString>,
    page: NumberOrString,
    pages_count: NumberOrString,
    #[serde(default)]
    submissions: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    submission_id: NumberOrString,
}

#[derive(Debug, Deserialize)]
struct SubmissionsResponse {
    #[serde(default)]
    submissions: Vec<ApiSubmission>,
}

#[derive(Debug, Deserialize)]
struct ApiSubmission {
    submission_id: NumberOrString,
    user_id: Option<NumberOrString>,
    username: String,
    title: String,
    description: Option<String>,
    #[serde(default)]
    keywords: Vec<ApiKeyword>,
    #[serde(default)]
    pools: Vec<ApiPool>,
    #[serde(default)]
    files: Vec<ApiFile>,
}

#[derive(Debug, Deserialize)]
struct ApiKeyword {
    keyword_name: String,
}

#[derive(Debug, Deserialize)]
struct ApiPool {
    pool_id: NumberOrString,
    name: String,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiFile {
    file_id: NumberOrString,
    file_name: String,
    mimetype: Option<String>,
    full_size_x: Option<NumberOrString>,
    full_size_y: Option<NumberOrString>,
    full_file_md5: Option<String>,
    create_datetime: Option<String>,
    file_url_full: Option<String>,
}
