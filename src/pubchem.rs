use std::time::Duration;

use reqwest::Url;
use reqwest::blocking::{Client, Response};
use serde::Deserialize;

use crate::domain::{ResultRow, SearchHandle};
use crate::error::HarvestError;
use crate::http;

pub const DEFAULT_BASE_URL: &str = "https://pubchem.ncbi.nlm.nih.gov/rest/pug";

/// Title and CID reported by a PubChem description lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompoundInfo {
    pub cid: Option<String>,
    pub title: Option<String>,
}

/// Classification of a ListKey redemption attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Ready(Vec<ResultRow>),
    Pending,
    Failed(String),
}

/// PUG REST operations. Lookups return empty results when PubChem has no record.
pub trait PubchemClient: Send + Sync {
    fn cids_by_name(&self, name: &str) -> Result<Vec<String>, HarvestError>;
    fn describe_cid(&self, cid: &str) -> Result<Vec<CompoundInfo>, HarvestError>;
    fn describe_smiles(&self, smiles: &str) -> Result<Vec<CompoundInfo>, HarvestError>;
    fn isomeric_smiles(&self, cid: &str) -> Result<Option<String>, HarvestError>;
    fn submit_substructure(&self, smiles: &str) -> Result<SearchHandle, HarvestError>;
    fn redeem_list_key(&self, handle: &SearchHandle) -> Result<PollOutcome, HarvestError>;
}

#[derive(Clone)]
pub struct PubchemHttpClient {
    client: Client,
    base_url: String,
}

impl PubchemHttpClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, HarvestError> {
        let client = http::build_client(timeout, HarvestError::PubchemHttp)?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, HarvestError> {
        let mut url =
            Url::parse(&self.base_url).map_err(|err| HarvestError::PubchemHttp(err.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| HarvestError::PubchemHttp(format!("invalid base url {}", self.base_url)))?
            .extend(segments);
        Ok(url)
    }

    fn get_json(&self, url: Url, query: &[(&str, &str)]) -> Result<Option<PugReply>, HarvestError> {
        tracing::debug!(%url, "pubchem.request");
        let response = http::send(self.client.get(url).query(query), HarvestError::PubchemHttp)?;
        let Some(response) = Self::handle_status(response)? else {
            return Ok(None);
        };
        let body = response
            .text()
            .map_err(|err| HarvestError::PubchemHttp(err.to_string()))?;
        parse_reply(&body).map(Some)
    }

    fn handle_status(response: Response) -> Result<Option<Response>, HarvestError> {
        if response.status().is_success() {
            return Ok(Some(response));
        }
        let status = response.status().as_u16();
        // PUG REST answers lookups without a record with 404 and a PUGREST.NotFound fault.
        if status == 404 {
            return Ok(None);
        }
        let message = response
            .text()
            .ok()
            .and_then(|body| parse_reply(&body).ok())
            .and_then(|reply| reply.fault)
            .map(|fault| fault.describe())
            .unwrap_or_else(|| "PubChem request failed".to_string());
        Err(HarvestError::PubchemStatus { status, message })
    }
}

impl PubchemClient for PubchemHttpClient {
    fn cids_by_name(&self, name: &str) -> Result<Vec<String>, HarvestError> {
        let url = self.endpoint(&["compound", "name", name, "cids", "JSON"])?;
        Ok(self
            .get_json(url, &[])?
            .and_then(|reply| reply.identifier_list)
            .map(|list| list.cid.iter().map(u64::to_string).collect())
            .unwrap_or_default())
    }

    fn describe_cid(&self, cid: &str) -> Result<Vec<CompoundInfo>, HarvestError> {
        let url = self.endpoint(&["compound", "cid", cid, "description", "JSON"])?;
        Ok(self
            .get_json(url, &[])?
            .map(PugReply::into_information)
            .unwrap_or_default())
    }

    fn describe_smiles(&self, smiles: &str) -> Result<Vec<CompoundInfo>, HarvestError> {
        let url = self.endpoint(&["compound", "smiles", "description", "JSON"])?;
        Ok(self
            .get_json(url, &[("smiles", smiles)])?
            .map(PugReply::into_information)
            .unwrap_or_default())
    }

    fn isomeric_smiles(&self, cid: &str) -> Result<Option<String>, HarvestError> {
        let url = self.endpoint(&["compound", "cid", cid, "property", "IsomericSMILES", "JSON"])?;
        Ok(self
            .get_json(url, &[])?
            .and_then(|reply| reply.property_table)
            .and_then(|table| table.properties.into_iter().find_map(|row| row.smiles)))
    }

    fn submit_substructure(&self, smiles: &str) -> Result<SearchHandle, HarvestError> {
        let url = self.endpoint(&["compound", "substructure", "smiles", "JSON"])?;
        let reply = self
            .get_json(url, &[("smiles", smiles)])?
            .ok_or_else(|| HarvestError::SearchUnavailable(format!("no search job for {smiles}")))?;
        reply.into_handle()
    }

    fn redeem_list_key(&self, handle: &SearchHandle) -> Result<PollOutcome, HarvestError> {
        let url = self.endpoint(&[
            "compound",
            "listkey",
            handle.as_str(),
            "property",
            "IsomericSMILES",
            "JSON",
        ])?;
        tracing::debug!(%url, "pubchem.poll");
        let response = http::send(self.client.get(url), HarvestError::PubchemHttp)?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .map_err(|err| HarvestError::PubchemHttp(err.to_string()))?;
        Ok(classify_list_key_response(status, &body))
    }
}

/// Maps a ListKey redemption response to ready rows, a still-running job or a hard failure.
pub fn classify_list_key_response(status: u16, body: &str) -> PollOutcome {
    let reply = parse_reply(body).ok();
    if status == 202 {
        return PollOutcome::Pending;
    }
    if !(200..300).contains(&status) {
        if http::is_busy_status(status) {
            return PollOutcome::Pending;
        }
        let message = reply
            .and_then(|reply| reply.fault)
            .map(|fault| fault.describe())
            .unwrap_or_else(|| format!("status {status}"));
        return PollOutcome::Failed(message);
    }
    match reply {
        Some(PugReply {
            property_table: Some(table),
            ..
        }) => PollOutcome::Ready(table.into_rows()),
        Some(PugReply {
            waiting: Some(_), ..
        }) => PollOutcome::Pending,
        Some(PugReply {
            fault: Some(fault), ..
        }) => PollOutcome::Failed(fault.describe()),
        _ => PollOutcome::Failed("unrecognised list key response".to_string()),
    }
}

fn parse_reply(body: &str) -> Result<PugReply, HarvestError> {
    serde_json::from_str(body).map_err(|err| HarvestError::PubchemHttp(err.to_string()))
}

#[derive(Debug, Default, Deserialize)]
struct PugReply {
    #[serde(rename = "IdentifierList")]
    identifier_list: Option<IdentifierList>,
    #[serde(rename = "InformationList")]
    information_list: Option<InformationList>,
    #[serde(rename = "PropertyTable")]
    property_table: Option<PropertyTable>,
    #[serde(rename = "Waiting")]
    waiting: Option<Waiting>,
    #[serde(rename = "Fault")]
    fault: Option<Fault>,
}

impl PugReply {
    fn into_information(self) -> Vec<CompoundInfo> {
        self.information_list
            .map(|list| {
                list.information
                    .into_iter()
                    .map(|entry| CompoundInfo {
                        cid: entry.cid.map(|cid| cid.to_string()),
                        title: entry.title.filter(|title| !title.trim().is_empty()),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn into_handle(self) -> Result<SearchHandle, HarvestError> {
        if let Some(waiting) = self.waiting {
            return Ok(SearchHandle::new(waiting.list_key.into_string()));
        }
        let reason = self
            .fault
            .map(|fault| fault.describe())
            .unwrap_or_else(|| "response carried no ListKey".to_string());
        Err(HarvestError::SearchUnavailable(reason))
    }
}

#[derive(Debug, Deserialize)]
struct IdentifierList {
    #[serde(rename = "CID", default)]
    cid: Vec<u64>,
}

#[derive(Debug, Deserialize)]
struct InformationList {
    #[serde(rename = "Information", default)]
    information: Vec<InformationEntry>,
}

#[derive(Debug, Deserialize)]
struct InformationEntry {
    #[serde(rename = "CID")]
    cid: Option<u64>,
    #[serde(rename = "Title")]
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PropertyTable {
    #[serde(rename = "Properties", default)]
    properties: Vec<PropertyRow>,
}

impl PropertyTable {
    fn into_rows(self) -> Vec<ResultRow> {
        self.properties
            .into_iter()
            .filter_map(|row| match row.smiles {
                Some(smiles) => Some(ResultRow::new(row.cid.to_string(), smiles)),
                None => {
                    tracing::warn!(cid = row.cid, "property row without SMILES skipped");
                    None
                }
            })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct PropertyRow {
    #[serde(rename = "CID")]
    cid: u64,
    // PubChem now reports the isomeric form under "SMILES".
    #[serde(rename = "IsomericSMILES", alias = "SMILES")]
    smiles: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Waiting {
    #[serde(rename = "ListKey")]
    list_key: Scalar,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Scalar {
    Text(String),
    Number(u64),
}

impl Scalar {
    fn into_string(self) -> String {
        match self {
            Scalar::Text(value) => value,
            Scalar::Number(value) => value.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Fault {
    #[serde(rename = "Code")]
    code: Option<String>,
    #[serde(rename = "Message")]
    message: Option<String>,
}

impl Fault {
    fn describe(&self) -> String {
        match (&self.code, &self.message) {
            (Some(code), Some(message)) => format!("{code}: {message}"),
            (Some(code), None) => code.clone(),
            (None, Some(message)) => message.clone(),
            (None, None) => "unknown fault".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    use super::*;

    #[test]
    fn ready_property_table() {
        let body = r#"{"PropertyTable":{"Properties":[
            {"CID":702,"IsomericSMILES":"CCO"},
            {"CID":8028,"SMILES":"CCOC"}
        ]}}"#;
        let outcome = classify_list_key_response(200, body);
        assert_eq!(
            outcome,
            PollOutcome::Ready(vec![
                ResultRow::new("702", "CCO"),
                ResultRow::new("8028", "CCOC"),
            ])
        );
    }

    #[test]
    fn accepted_status_is_pending() {
        let body = r#"{"Waiting":{"ListKey":"3369787441959434498","Message":"Your request is running"}}"#;
        assert_eq!(classify_list_key_response(202, body), PollOutcome::Pending);
        assert_eq!(classify_list_key_response(200, body), PollOutcome::Pending);
    }

    #[test]
    fn fault_is_failure() {
        let body = r#"{"Fault":{"Code":"PUGREST.BadRequest","Message":"Invalid list key"}}"#;
        assert_eq!(
            classify_list_key_response(400, body),
            PollOutcome::Failed("PUGREST.BadRequest: Invalid list key".to_string())
        );
    }

    #[test]
    fn garbage_body_is_failure() {
        assert!(matches!(
            classify_list_key_response(200, "<html>"),
            PollOutcome::Failed(_)
        ));
    }

    #[test]
    fn waiting_reply_yields_handle() {
        let reply = parse_reply(r#"{"Waiting":{"ListKey":"42"}}"#).unwrap();
        assert_eq!(reply.into_handle().unwrap(), SearchHandle::new("42"));

        let reply = parse_reply(r#"{"Waiting":{"ListKey":42}}"#).unwrap();
        assert_eq!(reply.into_handle().unwrap().as_str(), "42");
    }

    #[test]
    fn description_entries() {
        let reply = parse_reply(
            r#"{"InformationList":{"Information":[
                {"CID":702,"Title":"Ethanol"},
                {"CID":702,"Description":"Ethanol is a primary alcohol."}
            ]}}"#,
        )
        .unwrap();
        let info = reply.into_information();
        assert_eq!(info.len(), 2);
        assert_eq!(info[0].cid.as_deref(), Some("702"));
        assert_eq!(info[0].title.as_deref(), Some("Ethanol"));
        assert_eq!(info[1].title, None);
    }

    #[test]
    fn endpoint_encodes_segments() {
        let client = PubchemHttpClient::new(DEFAULT_BASE_URL, Duration::from_secs(5)).unwrap();
        let url = client
            .endpoint(&["compound", "name", "acetic acid", "cids", "JSON"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://pubchem.ncbi.nlm.nih.gov/rest/pug/compound/name/acetic%20acid/cids/JSON"
        );
    }

    /// Answers every request with `status_line` and counts the requests it saw.
    fn serve_status(status_line: &'static str) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(mut stream) = stream else { break };
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|window| window == b"\r\n\r\n") {
                    match stream.read(&mut buf) {
                        Ok(0) | Err(_) => break,
                        Ok(read) => request.extend_from_slice(&buf[..read]),
                    }
                }
                counter.fetch_add(1, Ordering::SeqCst);
                let _ = write!(
                    stream,
                    "HTTP/1.1 {status_line}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
                );
            }
        });
        (format!("http://{addr}/rest/pug"), hits)
    }

    #[test]
    fn failed_lookup_is_sent_once() {
        let (base_url, hits) = serve_status("503 Service Unavailable");
        let client = PubchemHttpClient::new(&base_url, Duration::from_secs(5)).unwrap();

        let err = client.cids_by_name("ethanol").unwrap_err();

        assert!(matches!(err, HarvestError::PubchemStatus { status: 503, .. }));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn busy_redemption_is_sent_once() {
        let (base_url, hits) = serve_status("503 Service Unavailable");
        let client = PubchemHttpClient::new(&base_url, Duration::from_secs(5)).unwrap();

        let outcome = client.redeem_list_key(&SearchHandle::new("42")).unwrap();

        assert_eq!(outcome, PollOutcome::Pending);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
