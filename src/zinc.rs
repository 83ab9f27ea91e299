use std::collections::HashSet;
use std::time::Duration;

use reqwest::blocking::Client;

use crate::domain::ResultRow;
use crate::error::HarvestError;
use crate::http;

pub const DEFAULT_BASE_URL: &str = "https://zinc15.docking.org";
pub const DEFAULT_TANIMOTO: u8 = 30;

pub trait ZincClient: Send + Sync {
    /// Substances similar to `smiles`, in the order ZINC reports them.
    fn similar(&self, smiles: &str) -> Result<Vec<ResultRow>, HarvestError>;
}

#[derive(Clone)]
pub struct ZincHttpClient {
    client: Client,
    base_url: String,
    tanimoto: u8,
}

impl ZincHttpClient {
    pub fn new(base_url: &str, tanimoto: u8, timeout: Duration) -> Result<Self, HarvestError> {
        let client = http::build_client(timeout, HarvestError::ZincHttp)?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            tanimoto,
        })
    }

    fn substances_url(&self) -> String {
        format!("{}/substances.smi", self.base_url)
    }
}

impl ZincClient for ZincHttpClient {
    fn similar(&self, smiles: &str) -> Result<Vec<ResultRow>, HarvestError> {
        let url = self.substances_url();
        let similarity_key = format!("ecfp4_fp-tanimoto-{}", self.tanimoto);
        tracing::debug!(%url, %smiles, "zinc.request");
        let request = self
            .client
            .get(&url)
            .query(&[("count", "all"), (similarity_key.as_str(), smiles)]);
        let response = http::send(request, HarvestError::ZincHttp)?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response
                .text()
                .unwrap_or_else(|_| "ZINC request failed".to_string());
            return Err(HarvestError::ZincStatus { status, message });
        }
        let body = response
            .text()
            .map_err(|err| HarvestError::ZincHttp(err.to_string()))?;
        parse_substances(&body)
    }
}

/// Parses the headerless `SMILES ZINC-ID` listing, dropping repeated identifiers.
pub fn parse_substances(body: &str) -> Result<Vec<ResultRow>, HarvestError> {
    let mut seen = HashSet::new();
    let mut rows = Vec::new();
    for (index, line) in body.lines().enumerate() {
        let mut columns = line.split_whitespace();
        let Some(structure) = columns.next() else {
            continue;
        };
        let identifier = columns.next().ok_or_else(|| {
            HarvestError::SearchUnavailable(format!(
                "malformed ZINC line {}: {}",
                index + 1,
                line.trim()
            ))
        })?;
        if seen.insert(identifier.to_string()) {
            rows.push(ResultRow::new(identifier, structure));
        }
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn parses_two_columns() {
        let body = "CCO ZINC000000895915\n\nCCOC ZINC000001532545 \n";
        let rows = parse_substances(body).unwrap();
        assert_eq!(
            rows,
            vec![
                ResultRow::new("ZINC000000895915", "CCO"),
                ResultRow::new("ZINC000001532545", "CCOC"),
            ]
        );
    }

    #[test]
    fn drops_repeated_identifiers() {
        let body = "CCO ZINC1\nCCO ZINC1\nCCN ZINC2";
        let rows = parse_substances(body).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].identifier, "ZINC2");
    }

    #[test]
    fn rejects_single_column_line() {
        let err = parse_substances("CCO ZINC1\nCCN\n").unwrap_err();
        assert_matches!(err, HarvestError::SearchUnavailable(message) if message.contains("line 2"));
    }

    #[test]
    fn substances_url_trims_slash() {
        let client =
            ZincHttpClient::new("https://zinc15.docking.org/", 30, Duration::from_secs(5)).unwrap();
        assert_eq!(
            client.substances_url(),
            "https://zinc15.docking.org/substances.smi"
        );
    }
}
