use crate::domain::{Compound, Descriptor, DescriptorMode};
use crate::error::HarvestError;
use crate::pubchem::PubchemClient;

/// Turns a descriptor into the compound it names on PubChem.
pub struct Resolver<'a, P: PubchemClient> {
    pubchem: &'a P,
}

impl<'a, P: PubchemClient> Resolver<'a, P> {
    pub fn new(pubchem: &'a P) -> Self {
        Self { pubchem }
    }

    /// Any lookup that comes back empty or errors is reported as `NotFound`.
    pub fn resolve(&self, descriptor: &Descriptor) -> Result<Compound, HarvestError> {
        let not_found = || HarvestError::NotFound(descriptor.as_str().to_string());

        let (identifier, display_name) = match descriptor.mode() {
            DescriptorMode::Name => {
                let cids = self
                    .pubchem
                    .cids_by_name(descriptor.as_str())
                    .map_err(|err| log_lookup_failure(descriptor, err))
                    .unwrap_or_default();
                let cid = cids.into_iter().next().ok_or_else(not_found)?;
                (cid, descriptor.as_str().to_string())
            }
            DescriptorMode::Cid => {
                let cid = descriptor.as_str().to_string();
                let title = self
                    .pubchem
                    .describe_cid(&cid)
                    .map_err(|err| log_lookup_failure(descriptor, err))
                    .unwrap_or_default()
                    .into_iter()
                    .find_map(|info| info.title);
                let display_name = title.unwrap_or_else(|| cid.clone());
                (cid, display_name)
            }
            DescriptorMode::Smiles => {
                let info = self
                    .pubchem
                    .describe_smiles(descriptor.as_str())
                    .map_err(|err| log_lookup_failure(descriptor, err))
                    .unwrap_or_default()
                    .into_iter()
                    .find(|info| info.cid.is_some())
                    .ok_or_else(not_found)?;
                let cid = info.cid.ok_or_else(not_found)?;
                let display_name = info.title.unwrap_or_else(|| cid.clone());
                (cid, display_name)
            }
        };

        let structure = self
            .pubchem
            .isomeric_smiles(&identifier)
            .map_err(|err| log_lookup_failure(descriptor, err))
            .ok()
            .flatten()
            .filter(|smiles| !smiles.trim().is_empty())
            .ok_or_else(not_found)?;

        tracing::info!(%descriptor, cid = %identifier, name = %display_name, "resolved");
        Ok(Compound {
            identifier,
            structure,
            display_name,
        })
    }
}

fn log_lookup_failure(descriptor: &Descriptor, err: HarvestError) -> HarvestError {
    tracing::warn!(%descriptor, error = %err, "lookup failed");
    err
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::domain::SearchHandle;
    use crate::pubchem::{CompoundInfo, PollOutcome};

    struct Fixture {
        describe_fails: bool,
    }

    impl PubchemClient for Fixture {
        fn cids_by_name(&self, name: &str) -> Result<Vec<String>, HarvestError> {
            Ok(match name {
                "ethanol" => vec!["702".to_string(), "1234".to_string()],
                _ => Vec::new(),
            })
        }

        fn describe_cid(&self, cid: &str) -> Result<Vec<CompoundInfo>, HarvestError> {
            if self.describe_fails {
                return Err(HarvestError::PubchemHttp("connection reset".to_string()));
            }
            Ok(vec![CompoundInfo {
                cid: Some(cid.to_string()),
                title: Some("Ethanol".to_string()),
            }])
        }

        fn describe_smiles(&self, smiles: &str) -> Result<Vec<CompoundInfo>, HarvestError> {
            Ok(match smiles {
                "OCC" => vec![CompoundInfo {
                    cid: Some("702".to_string()),
                    title: None,
                }],
                _ => Vec::new(),
            })
        }

        fn isomeric_smiles(&self, cid: &str) -> Result<Option<String>, HarvestError> {
            Ok((cid == "702").then(|| "CCO".to_string()))
        }

        fn submit_substructure(&self, _smiles: &str) -> Result<SearchHandle, HarvestError> {
            unreachable!()
        }

        fn redeem_list_key(&self, _handle: &SearchHandle) -> Result<PollOutcome, HarvestError> {
            unreachable!()
        }
    }

    fn resolve(
        value: &str,
        mode: DescriptorMode,
        describe_fails: bool,
    ) -> Result<Compound, HarvestError> {
        let fixture = Fixture { describe_fails };
        let descriptor = Descriptor::new(value, mode).unwrap();
        Resolver::new(&fixture).resolve(&descriptor)
    }

    #[test]
    fn by_name_keeps_typed_name() {
        let compound = resolve("ethanol", DescriptorMode::Name, false).unwrap();
        assert_eq!(compound.identifier, "702");
        assert_eq!(compound.structure, "CCO");
        assert_eq!(compound.display_name, "ethanol");
    }

    #[test]
    fn by_name_unknown_is_not_found() {
        let err = resolve("xyznotadrug", DescriptorMode::Name, false).unwrap_err();
        assert_matches!(err, HarvestError::NotFound(name) if name == "xyznotadrug");
    }

    #[test]
    fn by_cid_uses_title() {
        let compound = resolve("702", DescriptorMode::Cid, false).unwrap();
        assert_eq!(compound.display_name, "Ethanol");
    }

    #[test]
    fn by_cid_falls_back_to_identifier() {
        let compound = resolve("702", DescriptorMode::Cid, true).unwrap();
        assert_eq!(compound.display_name, "702");
        assert_eq!(compound.identifier, "702");
    }

    #[test]
    fn by_cid_without_structure_is_not_found() {
        let err = resolve("999999999", DescriptorMode::Cid, false).unwrap_err();
        assert_matches!(err, HarvestError::NotFound(_));
    }

    #[test]
    fn by_smiles_without_title_uses_cid() {
        let compound = resolve("OCC", DescriptorMode::Smiles, false).unwrap();
        assert_eq!(compound.identifier, "702");
        assert_eq!(compound.display_name, "702");
        assert_eq!(compound.structure, "CCO");
    }
}
