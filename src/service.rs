use crate::{entry_map::DIDEntry, Error, DID, DIDURL};

/// A service endpoint entry of a DID document.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Service {
    id: DIDURL,
    service_type: String,
    endpoint: String,
}

impl Service {
    pub fn new(id: DIDURL, service_type: String, endpoint: String) -> Result<Self, Error> {
        if service_type.is_empty() {
            return Err(Error::MalformedDocument("invalid service type".into()));
        }
        if endpoint.is_empty() {
            return Err(Error::MalformedDocument("missing service endpoint".into()));
        }
        Ok(Self {
            id,
            service_type,
            endpoint,
        })
    }
    pub fn id(&self) -> &DIDURL {
        &self.id
    }
    pub fn service_type(&self) -> &str {
        &self.service_type
    }
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl DIDEntry for Service {
    fn id(&self) -> &DIDURL {
        &self.id
    }
    fn entry_type(&self) -> Option<&str> {
        Some(&self.service_type)
    }
}

/// Canonical serialization view: id, type, serviceEndpoint.
#[derive(serde::Serialize)]
pub(crate) struct ServiceView {
    pub id: String,
    pub r#type: String,
    #[serde(rename = "serviceEndpoint")]
    pub service_endpoint: String,
}

impl Service {
    pub(crate) fn to_view(&self, subject: &DID, normalized: bool) -> ServiceView {
        ServiceView {
            id: if normalized {
                self.id.to_string()
            } else {
                self.id.to_compact_string(subject)
            },
            r#type: self.service_type.clone(),
            service_endpoint: self.endpoint.clone(),
        }
    }
}

#[derive(serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct ServiceRaw {
    pub id: DIDURL,
    pub r#type: String,
    #[serde(rename = "serviceEndpoint")]
    pub service_endpoint: String,
}

impl ServiceRaw {
    pub fn into_service(self, subject: &DID) -> Result<Service, Error> {
        Service::new(
            self.id.qualified_with(subject),
            self.r#type,
            self.service_endpoint,
        )
    }
}
