//! GATT profile snapshot used for diagnostics.

use uuid::Uuid;

/// One service and the characteristics it exposes.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ServiceProfile {
    /// Service UUID.
    pub service_uuid: Uuid,
    /// Characteristic UUIDs in discovery order. May be empty.
    pub characteristic_uuids: Vec<Uuid>,
}

impl ServiceProfile {
    /// Create a new service profile.
    pub fn new(service_uuid: Uuid, characteristic_uuids: Vec<Uuid>) -> Self {
        Self {
            service_uuid,
            characteristic_uuids,
        }
    }
}

/// Every service and characteristic a connected device exposes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeviceProfile {
    /// Services in discovery order.
    pub services: Vec<ServiceProfile>,
}

impl DeviceProfile {
    /// Number of services in the profile.
    pub fn len(&self) -> usize {
        self.services.len()
    }

    /// Check if the profile has no services.
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Iterate over the services.
    pub fn iter(&self) -> std::slice::Iter<'_, ServiceProfile> {
        self.services.iter()
    }

    /// Look up a service by UUID.
    pub fn service(&self, uuid: &Uuid) -> Option<&ServiceProfile> {
        self.services.iter().find(|s| s.service_uuid == *uuid)
    }
}

impl FromIterator<ServiceProfile> for DeviceProfile {
    fn from_iter<I: IntoIterator<Item = ServiceProfile>>(iter: I) -> Self {
        Self {
            services: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a DeviceProfile {
    type Item = &'a ServiceProfile;
    type IntoIter = std::slice::Iter<'a, ServiceProfile>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl std::fmt::Display for DeviceProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for service in &self.services {
            writeln!(f, "svc UUID: {}", service.service_uuid)?;
            for characteristic in &service.characteristic_uuids {
                writeln!(f, "  char UUID: {}", characteristic)?;
            }
        }
        Ok(())
    }
}
