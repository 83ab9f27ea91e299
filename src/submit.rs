use crate::domain::SearchHandle;
use crate::error::HarvestError;
use crate::pubchem::PubchemClient;

pub struct SearchSubmitter<'a, P: PubchemClient> {
    pubchem: &'a P,
}

impl<'a, P: PubchemClient> SearchSubmitter<'a, P> {
    pub fn new(pubchem: &'a P) -> Self {
        Self { pubchem }
    }

    /// Starts an asynchronous substructure search on `structure`.
    pub fn submit(&self, structure: &str) -> Result<SearchHandle, HarvestError> {
        let handle = self
            .pubchem
            .submit_substructure(structure)
            .map_err(|err| match err {
                HarvestError::SearchUnavailable(_) => err,
                other => HarvestError::SearchUnavailable(other.to_string()),
            })?;
        if handle.as_str().trim().is_empty() {
            return Err(HarvestError::SearchUnavailable(
                "PubChem returned an empty ListKey".to_string(),
            ));
        }
        tracing::info!(%structure, list_key = %handle, "substructure search submitted");
        Ok(handle)
    }
}
