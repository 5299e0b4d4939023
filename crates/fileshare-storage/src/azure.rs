//! Azure Files provider speaking the file service REST API.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::Utc;
use fileshare_core::chunk::ByteRange;
use fileshare_core::connection_string::{ConnectionString, ShareCredential};
use fileshare_core::error::FileShareError;
use fileshare_core::path::{SharePath, normalize_share_name};
use hmac::{Hmac, Mac};
use reqwest::header::{AUTHORIZATION, CONTENT_LENGTH, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, Response, StatusCode, Url};
use serde::Deserialize;
use sha2::Sha256;
use std::collections::BTreeMap;

use crate::provider::{DirEntry, ShareProvider};

const API_VERSION: &str = "2023-11-03";

const X_MS_VERSION: HeaderName = HeaderName::from_static("x-ms-version");
const X_MS_DATE: HeaderName = HeaderName::from_static("x-ms-date");
const X_MS_TYPE: HeaderName = HeaderName::from_static("x-ms-type");
const X_MS_CONTENT_LENGTH: HeaderName = HeaderName::from_static("x-ms-content-length");
const X_MS_RANGE: HeaderName = HeaderName::from_static("x-ms-range");
const X_MS_WRITE: HeaderName = HeaderName::from_static("x-ms-write");
const X_MS_ERROR_CODE: &str = "x-ms-error-code";

/// Azure Files share accessed over HTTPS.
pub struct AzureShareProvider {
    client: Client,
    endpoint: Url,
    auth: Auth,
    share_name: String,
}

enum Auth {
    SharedKey(SharedKeySigner),
    Sas(String),
}

#[derive(Clone, Copy)]
enum Resource<'a> {
    Share,
    Directory(&'a SharePath),
    File(&'a SharePath, &'a str),
}

impl AzureShareProvider {
    /// Create from a storage account connection string and a share name.
    pub fn new(connection_string: &str, share_name: &str) -> anyhow::Result<Self> {
        let cs = ConnectionString::parse(connection_string)?;
        Self::from_connection_string(&cs, share_name)
    }

    pub fn from_connection_string(cs: &ConnectionString, share_name: &str) -> anyhow::Result<Self> {
        let share_name = normalize_share_name(share_name)?;
        let endpoint = Url::parse(&cs.file_endpoint).map_err(|e| {
            FileShareError::ConnectionString(format!("invalid file endpoint: {e}"))
        })?;
        let auth = match &cs.credential {
            ShareCredential::AccountKey(key) => {
                Auth::SharedKey(SharedKeySigner::new(&cs.account_name, key)?)
            }
            ShareCredential::Sas(sas) => Auth::Sas(sas.clone()),
        };
        let client = Client::builder()
            .user_agent(concat!("fileshare/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            endpoint,
            auth,
            share_name,
        })
    }

    fn url(&self, resource: Resource<'_>, query: Option<&str>) -> anyhow::Result<Url> {
        let mut url = self.endpoint.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                anyhow::anyhow!("File endpoint {} cannot carry a path", self.endpoint)
            })?;
            segments.pop_if_empty().push(&self.share_name);
            match resource {
                Resource::Share => {}
                Resource::Directory(dir) => {
                    segments.extend(dir.segments());
                }
                Resource::File(dir, name) => {
                    segments.extend(dir.segments());
                    segments.push(name);
                }
            }
        }

        let mut params: Vec<&str> = query.into_iter().collect();
        if let Auth::Sas(sas) = &self.auth {
            params.push(sas);
        }
        if !params.is_empty() {
            url.set_query(Some(&params.join("&")));
        }
        Ok(url)
    }

    async fn send(
        &self,
        method: Method,
        url: Url,
        mut headers: HeaderMap,
        body: Vec<u8>,
    ) -> anyhow::Result<Response> {
        headers.insert(X_MS_VERSION, HeaderValue::from_static(API_VERSION));
        headers.insert(X_MS_DATE, HeaderValue::from_str(&http_date())?);
        headers.insert(CONTENT_LENGTH, HeaderValue::from(body.len()));

        let mut request = self
            .client
            .request(method, url)
            .headers(headers)
            .body(body)
            .build()?;

        if let Auth::SharedKey(signer) = &self.auth {
            let authorization =
                signer.authorization(request.method(), request.url(), request.headers())?;
            request
                .headers_mut()
                .insert(AUTHORIZATION, HeaderValue::from_str(&authorization)?);
        }

        Ok(self.client.execute(request).await?)
    }

    /// Bodiless request whose outcome is one of two expected statuses.
    async fn conditional(
        &self,
        operation: &str,
        method: Method,
        url: Url,
        headers: HeaderMap,
        changed: StatusCode,
        unchanged: StatusCode,
    ) -> anyhow::Result<bool> {
        let response = self.send(method, url, headers, Vec::new()).await?;
        match response.status() {
            s if s == changed => Ok(true),
            s if s == unchanged => Ok(false),
            _ => Err(service_error(operation, &response).into()),
        }
    }
}

/// Headers every directory/file create carries: inherit ACLs, stamp times now.
fn smb_properties(attributes: &'static str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        HeaderName::from_static("x-ms-file-permission"),
        HeaderValue::from_static("inherit"),
    );
    headers.insert(
        HeaderName::from_static("x-ms-file-attributes"),
        HeaderValue::from_static(attributes),
    );
    headers.insert(
        HeaderName::from_static("x-ms-file-creation-time"),
        HeaderValue::from_static("now"),
    );
    headers.insert(
        HeaderName::from_static("x-ms-file-last-write-time"),
        HeaderValue::from_static("now"),
    );
    headers
}

fn error_code(response: &Response) -> Option<&str> {
    response
        .headers()
        .get(X_MS_ERROR_CODE)
        .and_then(|v| v.to_str().ok())
}

fn service_error(operation: &str, response: &Response) -> FileShareError {
    let status = response.status();
    let code = error_code(response)
        .or(status.canonical_reason())
        .unwrap_or("Unknown")
        .to_string();
    FileShareError::Service {
        operation: operation.to_string(),
        status: status.as_u16(),
        code,
    }
}

/// Body of a List Directories and Files response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct EnumerationResults {
    #[serde(default)]
    entries: ListEntries,
    #[serde(default)]
    next_marker: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ListEntries {
    #[serde(rename = "$value", default)]
    items: Vec<ListEntry>,
}

#[derive(Debug, Deserialize)]
enum ListEntry {
    File(EntryName),
    Directory(EntryName),
}

#[derive(Debug, Deserialize)]
struct EntryName {
    #[serde(rename = "Name")]
    name: String,
}

struct ListingPage {
    entries: Vec<DirEntry>,
    next_marker: Option<String>,
}

fn parse_listing(body: &str) -> anyhow::Result<ListingPage> {
    let results: EnumerationResults =
        quick_xml::de::from_str(body.trim_start_matches('\u{feff}')).map_err(|e| {
            FileShareError::Service {
                operation: "ListDirectoriesAndFiles".to_string(),
                status: 200,
                code: format!("unreadable listing: {e}"),
            }
        })?;

    let entries = results
        .entries
        .items
        .into_iter()
        .map(|item| match item {
            ListEntry::File(entry) => DirEntry::file(entry.name),
            ListEntry::Directory(entry) => DirEntry::directory(entry.name),
        })
        .collect();
    Ok(ListingPage {
        entries,
        next_marker: results.next_marker.filter(|m| !m.is_empty()),
    })
}

fn http_date() -> String {
    Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

#[async_trait]
impl ShareProvider for AzureShareProvider {
    async fn create_share_if_not_exists(&self) -> anyhow::Result<bool> {
        let url = self.url(Resource::Share, Some("restype=share"))?;
        let response = self.send(Method::PUT, url, HeaderMap::new(), Vec::new()).await?;
        match response.status() {
            StatusCode::CREATED => {
                tracing::info!(share = %self.share_name, "Created file share");
                Ok(true)
            }
            StatusCode::CONFLICT if error_code(&response) == Some("ShareAlreadyExists") => {
                Ok(false)
            }
            _ => Err(service_error("CreateShare", &response).into()),
        }
    }

    async fn directory_exists(&self, dir: &SharePath) -> anyhow::Result<bool> {
        let (operation, url) = if dir.is_root() {
            ("GetShareProperties", self.url(Resource::Share, Some("restype=share"))?)
        } else {
            (
                "GetDirectoryProperties",
                self.url(Resource::Directory(dir), Some("restype=directory"))?,
            )
        };
        self.conditional(
            operation,
            Method::HEAD,
            url,
            HeaderMap::new(),
            StatusCode::OK,
            StatusCode::NOT_FOUND,
        )
        .await
    }

    async fn create_directory_if_not_exists(&self, dir: &SharePath) -> anyhow::Result<bool> {
        if dir.is_root() {
            return Ok(false);
        }
        let url = self.url(Resource::Directory(dir), Some("restype=directory"))?;
        let response = self
            .send(Method::PUT, url, smb_properties("Directory"), Vec::new())
            .await?;
        match response.status() {
            StatusCode::CREATED => Ok(true),
            StatusCode::CONFLICT if error_code(&response) == Some("ResourceAlreadyExists") => {
                Ok(false)
            }
            _ => Err(service_error("CreateDirectory", &response).into()),
        }
    }

    async fn delete_directory_if_exists(&self, dir: &SharePath) -> anyhow::Result<bool> {
        if dir.is_root() {
            return Ok(false);
        }
        let url = self.url(Resource::Directory(dir), Some("restype=directory"))?;
        self.conditional(
            "DeleteDirectory",
            Method::DELETE,
            url,
            HeaderMap::new(),
            StatusCode::ACCEPTED,
            StatusCode::NOT_FOUND,
        )
        .await
    }

    async fn list_directory(&self, dir: &SharePath) -> anyhow::Result<Vec<DirEntry>> {
        let resource = if dir.is_root() {
            Resource::Share
        } else {
            Resource::Directory(dir)
        };

        let mut entries = Vec::new();
        let mut marker: Option<String> = None;
        loop {
            let mut url = self.url(resource, Some("restype=directory&comp=list"))?;
            if let Some(marker) = &marker {
                url.query_pairs_mut().append_pair("marker", marker);
            }
            let response = self.send(Method::GET, url, HeaderMap::new(), Vec::new()).await?;
            match response.status() {
                StatusCode::OK => {}
                StatusCode::NOT_FOUND => return Ok(Vec::new()),
                _ => return Err(service_error("ListDirectoriesAndFiles", &response).into()),
            }

            let page = parse_listing(&response.text().await?)?;
            entries.extend(page.entries);
            match page.next_marker {
                Some(next) => marker = Some(next),
                None => break,
            }
        }
        tracing::debug!(dir = %dir, count = entries.len(), "Listed directory");
        Ok(entries)
    }

    async fn file_exists(&self, dir: &SharePath, name: &str) -> anyhow::Result<bool> {
        let url = self.url(Resource::File(dir, name), None)?;
        self.conditional(
            "GetFileProperties",
            Method::HEAD,
            url,
            HeaderMap::new(),
            StatusCode::OK,
            StatusCode::NOT_FOUND,
        )
        .await
    }

    async fn create_file(&self, dir: &SharePath, name: &str, length: u64) -> anyhow::Result<()> {
        let url = self.url(Resource::File(dir, name), None)?;
        let mut headers = smb_properties("None");
        headers.insert(X_MS_TYPE, HeaderValue::from_static("file"));
        headers.insert(X_MS_CONTENT_LENGTH, HeaderValue::from(length));

        let response = self.send(Method::PUT, url, headers, Vec::new()).await?;
        if response.status() != StatusCode::CREATED {
            return Err(service_error("CreateFile", &response).into());
        }
        Ok(())
    }

    async fn upload_range(
        &self,
        dir: &SharePath,
        name: &str,
        offset: u64,
        data: &[u8],
    ) -> anyhow::Result<()> {
        if data.is_empty() {
            return Ok(());
        }
        let url = self.url(Resource::File(dir, name), Some("comp=range"))?;
        let range = ByteRange::new(offset, data.len() as u64);
        let mut headers = HeaderMap::new();
        headers.insert(X_MS_RANGE, HeaderValue::from_str(&range.header_value())?);
        headers.insert(X_MS_WRITE, HeaderValue::from_static("update"));

        let response = self.send(Method::PUT, url, headers, data.to_vec()).await?;
        if response.status() != StatusCode::CREATED {
            return Err(service_error("PutRange", &response).into());
        }
        Ok(())
    }

    async fn delete_file_if_exists(&self, dir: &SharePath, name: &str) -> anyhow::Result<bool> {
        let url = self.url(Resource::File(dir, name), None)?;
        self.conditional(
            "DeleteFile",
            Method::DELETE,
            url,
            HeaderMap::new(),
            StatusCode::ACCEPTED,
            StatusCode::NOT_FOUND,
        )
        .await
    }

    async fn download_file(&self, dir: &SharePath, name: &str) -> anyhow::Result<Vec<u8>> {
        let url = self.url(Resource::File(dir, name), None)?;
        let response = self.send(Method::GET, url, HeaderMap::new(), Vec::new()).await?;
        if response.status() != StatusCode::OK {
            return Err(service_error("GetFile", &response).into());
        }
        Ok(response.bytes().await?.to_vec())
    }

    fn share_name(&self) -> &str {
        &self.share_name
    }
}

/// SharedKey request signing for the file service.
struct SharedKeySigner {
    account: String,
    key: Vec<u8>,
}

impl SharedKeySigner {
    fn new(account: &str, key: &str) -> anyhow::Result<Self> {
        let key = STANDARD.decode(key).map_err(|e| {
            FileShareError::ConnectionString(format!("AccountKey is not valid base64: {e}"))
        })?;
        Ok(Self {
            account: account.to_string(),
            key,
        })
    }

    fn authorization(&self, method: &Method, url: &Url, headers: &HeaderMap) -> anyhow::Result<String> {
        let mut mac = Hmac::<Sha256>::new_from_slice(&self.key)
            .map_err(|_| anyhow::anyhow!("Invalid account key length"))?;
        mac.update(string_to_sign(&self.account, method, url, headers).as_bytes());
        let signature = STANDARD.encode(mac.finalize().into_bytes());
        Ok(format!("SharedKey {}:{signature}", self.account))
    }
}

fn string_to_sign(account: &str, method: &Method, url: &Url, headers: &HeaderMap) -> String {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
    };
    // A zero length is signed as an empty string.
    let content_length = match header("content-length") {
        "0" => "",
        len => len,
    };

    let mut out = format!("{}\n", method.as_str());
    for value in [
        header("content-encoding"),
        header("content-language"),
        content_length,
        header("content-md5"),
        header("content-type"),
        header("date"),
        header("if-modified-since"),
        header("if-match"),
        header("if-none-match"),
        header("if-unmodified-since"),
        header("range"),
    ] {
        out.push_str(value);
        out.push('\n');
    }
    out.push_str(&canonicalized_headers(headers));
    out.push_str(&canonicalized_resource(account, url));
    out
}

fn canonicalized_headers(headers: &HeaderMap) -> String {
    let mut ms_headers: Vec<(&str, &str)> = headers
        .iter()
        .filter(|(name, _)| name.as_str().starts_with("x-ms-"))
        .map(|(name, value)| (name.as_str(), value.to_str().unwrap_or("").trim()))
        .collect();
    ms_headers.sort_by(|a, b| a.0.cmp(b.0));
    ms_headers
        .iter()
        .map(|(name, value)| format!("{name}:{value}\n"))
        .collect()
}

fn canonicalized_resource(account: &str, url: &Url) -> String {
    let mut out = format!("/{account}{}", url.path());
    let mut params: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in url.query_pairs() {
        params
            .entry(name.to_lowercase())
            .or_default()
            .push(value.into_owned());
    }
    for (name, mut values) in params {
        values.sort();
        out.push_str(&format!("\n{name}:{}", values.join(",")));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "bXktc2VjcmV0LWtleQ==";

    fn provider(connection_string: &str) -> AzureShareProvider {
        AzureShareProvider::new(connection_string, "ShareTest").unwrap()
    }

    fn key_provider() -> AzureShareProvider {
        provider(&format!("AccountName=acct;AccountKey={KEY}"))
    }

    fn signed_headers(extra: &[(&'static str, &str)]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            X_MS_DATE,
            HeaderValue::from_static("Mon, 01 Jan 2024 12:00:00 GMT"),
        );
        headers.insert(X_MS_VERSION, HeaderValue::from_static(API_VERSION));
        for (name, value) in extra {
            headers.insert(
                HeaderName::from_static(*name),
                HeaderValue::from_str(value).unwrap(),
            );
        }
        headers
    }

    #[test]
    fn urls_are_built_from_segments() {
        let p = key_provider();
        let dir = SharePath::parse(r"\a b\c").unwrap();

        let url = p.url(Resource::Directory(&dir), Some("restype=directory")).unwrap();
        assert_eq!(
            url.as_str(),
            "https://acct.file.core.windows.net/sharetest/a%20b/c?restype=directory"
        );

        let url = p.url(Resource::File(&dir, "x#1.txt"), None).unwrap();
        assert_eq!(
            url.as_str(),
            "https://acct.file.core.windows.net/sharetest/a%20b/c/x%231.txt"
        );

        let url = p.url(Resource::Share, Some("restype=share")).unwrap();
        assert_eq!(url.as_str(), "https://acct.file.core.windows.net/sharetest?restype=share");
    }

    #[test]
    fn sas_is_appended_to_every_url() {
        let p = provider(
            "FileEndpoint=https://acct.file.core.windows.net/;SharedAccessSignature=sv=2022-11-02&sig=abc",
        );
        let url = p
            .url(Resource::File(&SharePath::root(), "f.txt"), Some("comp=range"))
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://acct.file.core.windows.net/sharetest/f.txt?comp=range&sv=2022-11-02&sig=abc"
        );

        let url = p.url(Resource::File(&SharePath::root(), "f.txt"), None).unwrap();
        assert_eq!(url.query(), Some("sv=2022-11-02&sig=abc"));
    }

    #[test]
    fn string_to_sign_layout() {
        let url =
            Url::parse("https://acct.file.core.windows.net/sharetest/a%20b/c?restype=directory")
                .unwrap();
        let headers = signed_headers(&[("content-length", "0")]);

        let expected = format!(
            "PUT\n{}x-ms-date:Mon, 01 Jan 2024 12:00:00 GMT\nx-ms-version:{API_VERSION}\n/acct/sharetest/a%20b/c\nrestype:directory",
            "\n".repeat(11)
        );
        assert_eq!(string_to_sign("acct", &Method::PUT, &url, &headers), expected);
    }

    #[test]
    fn shared_key_signature_matches_reference() {
        let signer = SharedKeySigner::new("acct", KEY).unwrap();

        let url =
            Url::parse("https://acct.file.core.windows.net/sharetest/a%20b/c?restype=directory")
                .unwrap();
        let headers = signed_headers(&[("content-length", "0")]);
        assert_eq!(
            signer.authorization(&Method::PUT, &url, &headers).unwrap(),
            "SharedKey acct:KQzv8KpZqQNkNf8HGXx2wlYNDVgrU6aUvWZdeNyOjII="
        );

        let url = Url::parse("https://acct.file.core.windows.net/sharetest/f.txt?comp=range")
            .unwrap();
        let headers = signed_headers(&[
            ("content-length", "5"),
            ("x-ms-range", "bytes=0-4"),
            ("x-ms-write", "update"),
        ]);
        assert_eq!(
            signer.authorization(&Method::PUT, &url, &headers).unwrap(),
            "SharedKey acct:kGQUhRuVH0zvhUdtCg0EbtbDo2KEphWdN2sS0DeYUB4="
        );
    }

    #[test]
    fn query_parameters_are_sorted_and_lowercased() {
        let url = Url::parse("https://acct.file.core.windows.net/s/f?comp=range&A=2&a=1").unwrap();
        assert_eq!(
            canonicalized_resource("acct", &url),
            "/acct/s/f\na:1,2\ncomp:range"
        );
    }

    #[test]
    fn listing_separates_files_and_directories() {
        let body = "\u{feff}<?xml version=\"1.0\" encoding=\"utf-8\"?>\
<EnumerationResults ServiceEndpoint=\"https://acct.file.core.windows.net/\" ShareName=\"sharetest\" DirectoryPath=\"a\">\
<Marker /><Entries>\
<File><Name>f.txt</Name><Properties><Content-Length>27</Content-Length></Properties></File>\
<Directory><Name>sub dir</Name><Properties /></Directory>\
</Entries><NextMarker>page2</NextMarker></EnumerationResults>";

        let page = parse_listing(body).unwrap();
        assert_eq!(
            page.entries,
            vec![DirEntry::file("f.txt"), DirEntry::directory("sub dir")]
        );
        assert_eq!(page.next_marker.as_deref(), Some("page2"));
    }

    #[test]
    fn empty_listing_has_no_marker() {
        let body = "<?xml version=\"1.0\" encoding=\"utf-8\"?>\
<EnumerationResults ShareName=\"sharetest\" DirectoryPath=\"\"><Entries /><NextMarker /></EnumerationResults>";

        let page = parse_listing(body).unwrap();
        assert!(page.entries.is_empty());
        assert!(page.next_marker.is_none());
    }

    #[test]
    fn invalid_account_key_is_rejected() {
        let result = AzureShareProvider::new("AccountName=acct;AccountKey=not base64!", "sharetest");
        assert!(result.is_err());
    }
}
