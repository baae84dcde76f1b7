//! Directory HTTP client.
//!
//! Blocking reqwest client (no Tokio runtime required). A successful login
//! leaves a session cookie in the client's cookie store; every later call
//! rides on it.

use std::collections::BTreeSet;
use std::thread;
use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::json;

use groupsync_recon::model::{EntityRecord, GroupRecord, MemberRecord};
use groupsync_recon::{Directory, DirectoryError};

use crate::auth::Login;

pub const MAX_RETRIES: u32 = 3;
const PAGE_SIZE: usize = 500;
const CUSTOM_GROUPS_PATH: &str = "/groups/GROUP-MyGroups/members";
const USER_AGENT: &str = concat!("groupsync/", env!("CARGO_PKG_VERSION"));

/// Directory API client (blocking).
#[derive(Clone)]
pub struct DirectoryClient {
    http: Client,
    api_base: String,
    backoff: Duration,
}

// ── Wire types ──────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiGroup {
    uuid: String,
    display_name: String,
    #[serde(default)]
    group_type: Option<String>,
    #[serde(default)]
    is_static: bool,
}

impl From<ApiGroup> for GroupRecord {
    fn from(g: ApiGroup) -> Self {
        GroupRecord {
            identifier: g.uuid,
            name: g.display_name,
            entity_type: g.group_type.unwrap_or_default(),
            is_static: g.is_static,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiEntity {
    uuid: String,
    display_name: String,
    #[serde(default)]
    class_name: Option<String>,
    #[serde(default)]
    state: Option<String>,
}

impl From<ApiEntity> for EntityRecord {
    fn from(e: ApiEntity) -> Self {
        EntityRecord {
            identifier: e.uuid,
            name: e.display_name,
            entity_type: e.class_name.unwrap_or_default(),
            state: e.state,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiMember {
    uuid: String,
    #[serde(default)]
    display_name: String,
}

/// `https://host/api/v3` for a bare host, or the given URL + `/api/v3`.
pub fn api_base_url(target: &str) -> String {
    let target = target.trim().trim_end_matches('/');
    if target.starts_with("http://") || target.starts_with("https://") {
        format!("{target}/api/v3")
    } else {
        format!("https://{target}/api/v3")
    }
}

impl DirectoryClient {
    /// Build a client for `target` and log in.
    pub fn connect(target: &str, login: &Login, insecure: bool) -> Result<Self, DirectoryError> {
        let client = Self::with_base_url(&api_base_url(target), insecure)?;
        client.login(login)?;
        Ok(client)
    }

    /// Build a client against an explicit API base (no login).
    pub fn with_base_url(api_base: &str, insecure: bool) -> Result<Self, DirectoryError> {
        if insecure {
            log::warn!("TLS certificate verification disabled for {api_base}");
        }
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(60))
            .cookie_store(true)
            .danger_accept_invalid_certs(insecure)
            .build()
            .map_err(|e| DirectoryError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            backoff: Duration::from_secs(1),
        })
    }

    /// Initial retry delay; doubles on each attempt.
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Form login. The session cookie is kept for later calls.
    pub fn login(&self, login: &Login) -> Result<(), DirectoryError> {
        let url = self.url("/login");
        log::debug!("POST {url} as {}", login.username);
        let response = self
            .http
            .post(&url)
            .form(&[("username", login.username.as_str()), ("password", login.password.as_str())])
            .send()
            .map_err(|e| DirectoryError::Network(e.to_string()))?;

        match check_status(response) {
            Ok(_) => Ok(()),
            Err(DirectoryError::Validation(msg)) | Err(DirectoryError::NotAuthenticated(msg)) => {
                Err(DirectoryError::NotAuthenticated(format!("login rejected for {}: {msg}", login.username)))
            }
            Err(e) => Err(e),
        }
    }

    // ── Internal helpers ────────────────────────────────────────────

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    /// Send with retry + exponential backoff on 429, 5xx and transport
    /// errors. `build` is called once per attempt.
    fn send_with_retry(&self, build: impl Fn(&Client) -> RequestBuilder) -> Result<Response, DirectoryError> {
        let mut wait = self.backoff;
        let mut attempt = 0;
        loop {
            let error = match build(&self.http).send() {
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    if status != 429 && status < 500 {
                        return check_status(resp);
                    }
                    if status == 429 {
                        if let Some(secs) = retry_after(&resp) {
                            wait = Duration::from_secs(secs);
                        }
                    }
                    let body = resp.text().unwrap_or_default();
                    DirectoryError::Http(status, body)
                }
                Err(e) => DirectoryError::Network(e.to_string()),
            };

            if attempt == MAX_RETRIES {
                return Err(error);
            }
            attempt += 1;
            log::warn!("retry {attempt}/{MAX_RETRIES} in {}ms ({error})", wait.as_millis());
            thread::sleep(wait);
            wait *= 2;
        }
    }

    fn get_json<T: for<'de> Deserialize<'de>>(&self, path: &str) -> Result<T, DirectoryError> {
        let url = self.url(path);
        log::debug!("GET {url}");
        let resp = self.send_with_retry(|http| http.get(&url))?;
        parse_json(resp)
    }

    fn send_once(&self, request: RequestBuilder) -> Result<Response, DirectoryError> {
        let response = request
            .send()
            .map_err(|e| DirectoryError::Network(e.to_string()))?;
        check_status(response)
    }

    fn search(&self, class_name: &str, name: &str, case_sensitive: bool) -> Result<Response, DirectoryError> {
        let url = self.url("/search");
        let body = json!({
            "className": class_name,
            "logicalOperator": "AND",
            "criteriaList": [{
                "filterType": "displayName",
                "expType": "RXEQ",
                "expVal": format!("^{}$", regex::escape(name)),
                "caseSensitive": case_sensitive,
            }],
        });
        log::debug!("POST {url} ({class_name} named '{name}')");
        // searches are reads, so they share the GET retry policy
        self.send_with_retry(|http| http.post(&url).query(&[("types", class_name)]).json(&body))
    }
}

fn check_status(response: Response) -> Result<Response, DirectoryError> {
    let status = response.status().as_u16();
    if response.status().is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    Err(match status {
        401 | 403 => DirectoryError::NotAuthenticated(format!("HTTP {status}: {body}")),
        400 | 422 => DirectoryError::Validation(body),
        404 => DirectoryError::NotFound(body),
        _ => DirectoryError::Http(status, body),
    })
}

fn retry_after(response: &Response) -> Option<u64> {
    response
        .headers()
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
}

fn parse_json<T: for<'de> Deserialize<'de>>(response: Response) -> Result<T, DirectoryError> {
    let text = response.text().map_err(|e| DirectoryError::Network(e.to_string()))?;
    serde_json::from_str(&text).map_err(|e| {
        DirectoryError::Parse(format!("{e} (body: {})", body_excerpt(&text)))
    })
}

/// First 200 characters of a response body, cut on a char boundary.
fn body_excerpt(text: &str) -> &str {
    match text.char_indices().nth(200) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

fn same_name(a: &str, b: &str, case_sensitive: bool) -> bool {
    if case_sensitive {
        a == b
    } else {
        a.to_lowercase() == b.to_lowercase()
    }
}

fn group_body(name: &str, entity_type: &str, members: &[String]) -> serde_json::Value {
    json!({
        "displayName": name,
        "groupType": entity_type,
        "isStatic": true,
        "memberUuidList": members,
    })
}

impl Directory for DirectoryClient {
    fn list_groups(&self) -> Result<Vec<GroupRecord>, DirectoryError> {
        let groups: Vec<ApiGroup> = self.get_json("/groups")?;
        Ok(groups.into_iter().map(GroupRecord::from).collect())
    }

    fn list_custom_groups(&self) -> Result<Vec<GroupRecord>, DirectoryError> {
        let groups: Vec<ApiGroup> = self.get_json(CUSTOM_GROUPS_PATH)?;
        Ok(groups.into_iter().map(GroupRecord::from).collect())
    }

    /// Cursor-paginated `GET /search`. The next cursor arrives in the
    /// `x-next-cursor` header; absent or empty means last page.
    fn list_entities(&self, entity_types: &BTreeSet<String>) -> Result<Vec<EntityRecord>, DirectoryError> {
        let url = self.url("/search");
        let types = entity_types.iter().cloned().collect::<Vec<_>>().join(",");
        let limit = PAGE_SIZE.to_string();
        let mut cursor: Option<String> = None;
        let mut entities = Vec::new();

        loop {
            log::debug!("GET {url} types={types} cursor={}", cursor.as_deref().unwrap_or("-"));
            let resp = self.send_with_retry(|http| {
                let mut req = http
                    .get(&url)
                    .query(&[("types", types.as_str()), ("limit", limit.as_str())]);
                if let Some(c) = &cursor {
                    req = req.query(&[("cursor", c.as_str())]);
                }
                req
            })?;

            let next = resp
                .headers()
                .get("x-next-cursor")
                .and_then(|v| v.to_str().ok())
                .filter(|v| !v.is_empty())
                .map(String::from);
            let page: Vec<ApiEntity> = parse_json(resp)?;
            entities.extend(page.into_iter().map(EntityRecord::from));

            match next {
                Some(c) => cursor = Some(c),
                None => break,
            }
        }
        Ok(entities)
    }

    fn get_group_members(&self, identifier: &str) -> Result<Vec<MemberRecord>, DirectoryError> {
        let members: Vec<ApiMember> = self.get_json(&format!("/groups/{identifier}/members"))?;
        Ok(members
            .into_iter()
            .map(|m| MemberRecord { identifier: m.uuid, name: m.display_name })
            .collect())
    }

    fn create_static_group(
        &self,
        name: &str,
        entity_type: &str,
        member_identifiers: &[String],
    ) -> Result<String, DirectoryError> {
        let url = self.url("/groups");
        log::debug!("POST {url} ({name}, {} members)", member_identifiers.len());
        let resp = self.send_once(self.http.post(&url).json(&group_body(name, entity_type, member_identifiers)))?;
        let created: ApiGroup = parse_json(resp)?;
        Ok(created.uuid)
    }

    fn replace_static_group_members(
        &self,
        identifier: &str,
        name: &str,
        entity_type: &str,
        member_identifiers: &[String],
    ) -> Result<(), DirectoryError> {
        let url = self.url(&format!("/groups/{identifier}"));
        log::debug!("PUT {url} ({name}, {} members)", member_identifiers.len());
        self.send_once(self.http.put(&url).json(&group_body(name, entity_type, member_identifiers)))?;
        Ok(())
    }

    fn delete_group(&self, identifier: &str) -> Result<(), DirectoryError> {
        let url = self.url(&format!("/groups/{identifier}"));
        log::debug!("DELETE {url}");
        self.send_once(self.http.delete(&url))?;
        Ok(())
    }

    fn find_entities_by_name(
        &self,
        name: &str,
        entity_type: &str,
        case_sensitive: bool,
    ) -> Result<Vec<EntityRecord>, DirectoryError> {
        let found: Vec<ApiEntity> = parse_json(self.search(entity_type, name, case_sensitive)?)?;
        Ok(found
            .into_iter()
            .map(EntityRecord::from)
            .filter(|e| e.entity_type == entity_type && same_name(&e.name, name, case_sensitive))
            .collect())
    }

    fn find_groups_by_name(&self, name: &str) -> Result<Vec<GroupRecord>, DirectoryError> {
        let found: Vec<ApiGroup> = parse_json(self.search("Group", name, true)?)?;
        Ok(found
            .into_iter()
            .map(GroupRecord::from)
            .filter(|g| g.name == name)
            .collect())
    }
}
