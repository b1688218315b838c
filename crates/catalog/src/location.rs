use serde::{Deserialize, Serialize};

use plantflow_core::{Entity, LocationId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationKind {
    Store,
    ProductionFloor,
    Other,
}

/// Physical location stock is held at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub id: LocationId,
    pub code: String,
    pub name: String,
    pub kind: LocationKind,
}

impl Location {
    pub fn new(code: impl Into<String>, kind: LocationKind) -> Self {
        let code = code.into();
        Self {
            id: LocationId::new(),
            name: code.clone(),
            code,
            kind,
        }
    }
}

impl Entity for Location {
    type Id = LocationId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
