use std::collections::BTreeMap;

use crate::adapters::getreference::GetReference;
use crate::adapters::speciesfinder::SpeciesFinder;
use crate::adapters::{plasmidfinder, virulencefinder};
use crate::domain::ServiceId;
use crate::error::BapError;
use crate::scheduler::Scheduler;
use crate::service::{Outcome, Service, Unimplemented, execute};
use crate::store::Store;

pub struct ServiceRegistry {
    services: BTreeMap<ServiceId, Box<dyn Service>>,
}

impl ServiceRegistry {
    pub fn new(entries: Vec<(ServiceId, Box<dyn Service>)>) -> Result<Self, BapError> {
        let mut services = BTreeMap::new();
        for (id, service) in entries {
            if services.insert(id, service).is_some() {
                return Err(BapError::Configuration(format!(
                    "service {id} is registered more than once"
                )));
            }
        }

        let missing: Vec<&str> = ServiceId::ALL
            .iter()
            .filter(|id| !services.contains_key(*id))
            .map(ServiceId::as_str)
            .collect();
        if !missing.is_empty() {
            return Err(BapError::Configuration(format!(
                "no adapter registered for service(s): {}",
                missing.join(", ")
            )));
        }

        Ok(Self { services })
    }

    pub fn standard() -> Result<Self, BapError> {
        let entries: Vec<(ServiceId, Box<dyn Service>)> = vec![
            (ServiceId::SpeciesFinder, Box::new(SpeciesFinder)),
            (ServiceId::GetReference, Box::new(GetReference)),
            (ServiceId::PlasmidFinder, Box::new(plasmidfinder::service())),
            (ServiceId::VirulenceFinder, Box::new(virulencefinder::service())),
            (ServiceId::ResFinder, Box::new(Unimplemented)),
            (ServiceId::MLSTFinder, Box::new(Unimplemented)),
        ];
        Self::new(entries)
    }

    pub fn get(&self, id: ServiceId) -> Option<&dyn Service> {
        self.services.get(&id).map(|service| &**service)
    }

    pub fn ids(&self) -> impl Iterator<Item = ServiceId> + '_ {
        self.services.keys().copied()
    }

    pub fn execute(&self, id: ServiceId, store: &Store, scheduler: &dyn Scheduler) -> Outcome {
        match self.get(id) {
            Some(service) => execute(service, id.as_str(), None, store, scheduler),
            None => Outcome::Skipped(format!("no adapter registered for {id}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn standard_registry_covers_every_service() {
        let registry = ServiceRegistry::standard().unwrap();
        assert_eq!(registry.ids().count(), ServiceId::ALL.len());
        assert_eq!(registry.get(ServiceId::PlasmidFinder).unwrap().shim(), "PlasmidFinder");
    }

    #[test]
    fn missing_adapter_is_rejected() {
        let err = ServiceRegistry::new(vec![(
            ServiceId::SpeciesFinder,
            Box::new(SpeciesFinder) as Box<dyn Service>,
        )])
        .err()
        .unwrap();
        assert_matches!(err, BapError::Configuration(msg) if msg.contains("GetReference"));
    }

    #[test]
    fn duplicate_adapter_is_rejected() {
        let err = ServiceRegistry::new(vec![
            (ServiceId::SpeciesFinder, Box::new(SpeciesFinder) as Box<dyn Service>),
            (ServiceId::SpeciesFinder, Box::new(Unimplemented)),
        ])
        .err()
        .unwrap();
        assert_matches!(err, BapError::Configuration(msg) if msg.contains("more than once"));
    }
}
