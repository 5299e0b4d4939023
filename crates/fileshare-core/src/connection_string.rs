//! Parsing of storage account connection strings.
//!
//! Format: `Key=Value` pairs separated by `;`, e.g.
//! `DefaultEndpointsProtocol=https;AccountName=acct;AccountKey=...;EndpointSuffix=core.windows.net`.

use std::fmt;

use crate::error::{FileShareError, Result};

const DEFAULT_ENDPOINT_SUFFIX: &str = "core.windows.net";

/// How requests to the file endpoint are authorized.
#[derive(Clone, PartialEq, Eq)]
pub enum ShareCredential {
    /// Base64-encoded storage account key, used for SharedKey signing.
    AccountKey(String),
    /// Shared access signature query string, without the leading `?`.
    Sas(String),
}

impl fmt::Debug for ShareCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShareCredential::AccountKey(_) => write!(f, "AccountKey(<redacted>)"),
            ShareCredential::Sas(_) => write!(f, "Sas(<redacted>)"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionString {
    pub account_name: String,
    pub credential: ShareCredential,
    /// Base URL of the file service, without a trailing slash.
    pub file_endpoint: String,
}

impl ConnectionString {
    pub fn parse(raw: &str) -> Result<Self> {
        let mut protocol = None;
        let mut account_name = None;
        let mut account_key = None;
        let mut sas = None;
        let mut endpoint_suffix = None;
        let mut file_endpoint = None;

        for pair in raw.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            // The segment itself may be a secret, so it is not echoed back.
            let (key, value) = pair.split_once('=').ok_or_else(|| {
                FileShareError::ConnectionString("segment without '='".to_string())
            })?;
            let value = value.trim().to_string();

            match key.trim().to_ascii_lowercase().as_str() {
                "defaultendpointsprotocol" => protocol = Some(value),
                "accountname" => account_name = Some(value),
                "accountkey" => account_key = Some(value),
                "sharedaccesssignature" => sas = Some(value.trim_start_matches('?').to_string()),
                "endpointsuffix" => endpoint_suffix = Some(value),
                "fileendpoint" => file_endpoint = Some(value.trim_end_matches('/').to_string()),
                "usedevelopmentstorage" if value.eq_ignore_ascii_case("true") => {
                    return Err(FileShareError::ConnectionString(
                        "the storage emulator has no file service".to_string(),
                    ));
                }
                // Blob/queue/table endpoints and unknown keys are irrelevant here.
                _ => {}
            }
        }

        let credential = match (account_key, sas) {
            (Some(key), _) => ShareCredential::AccountKey(key),
            (None, Some(sas)) => ShareCredential::Sas(sas),
            (None, None) => {
                return Err(FileShareError::ConnectionString(
                    "missing AccountKey or SharedAccessSignature".to_string(),
                ));
            }
        };

        let file_endpoint = match (file_endpoint, &account_name) {
            (Some(endpoint), _) => endpoint,
            (None, Some(account)) => {
                let protocol = protocol.as_deref().unwrap_or("https");
                if protocol != "https" && protocol != "http" {
                    return Err(FileShareError::ConnectionString(format!(
                        "unsupported DefaultEndpointsProtocol {protocol:?}"
                    )));
                }
                let suffix = endpoint_suffix.as_deref().unwrap_or(DEFAULT_ENDPOINT_SUFFIX);
                format!("{protocol}://{account}.file.{suffix}")
            }
            (None, None) => {
                return Err(FileShareError::ConnectionString(
                    "missing AccountName".to_string(),
                ));
            }
        };

        let account_name = match account_name {
            Some(name) => name,
            // SAS-only strings may omit the account; take it from the endpoint host.
            None => account_from_endpoint(&file_endpoint).ok_or_else(|| {
                FileShareError::ConnectionString("missing AccountName".to_string())
            })?,
        };

        if matches!(credential, ShareCredential::AccountKey(_)) && account_name.is_empty() {
            return Err(FileShareError::ConnectionString(
                "AccountName is empty".to_string(),
            ));
        }

        Ok(Self {
            account_name,
            credential,
            file_endpoint,
        })
    }
}

impl std::str::FromStr for ConnectionString {
    type Err = FileShareError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

fn account_from_endpoint(endpoint: &str) -> Option<String> {
    let host = endpoint.split_once("://").map_or(endpoint, |(_, rest)| rest);
    let account = host.split(['.', '/', ':']).next()?;
    (!account.is_empty()).then(|| account.to_string())
}
