//! The external action catalogue.
//!
//! One JSON object per probe per tick, tagged by `"action"`, with lower-snake
//! variant names matching the wire protocol.

use serde::{Deserialize, Serialize};

use crate::types::{Resource, SectorCoord, TechDomain, Uid};
use crate::society::StructureType;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    NavigateToBody {
        body: Uid,
    },
    EnterOrbit {
        body: Uid,
    },
    Land {
        #[serde(default)]
        body: Option<Uid>,
    },
    Launch,
    Survey {
        #[serde(default)]
        body: Option<Uid>,
        level: u8,
    },
    Mine {
        resource: Resource,
    },
    Wait,
    Repair,
    TravelToSystem {
        system: Uid,
        sector: SectorCoord,
    },
    Replicate,
    SendMessage {
        target: Uid,
        content: String,
    },
    Broadcast {
        content: String,
    },
    PlaceBeacon {
        message: String,
    },
    BuildRelay,
    BuildStructure {
        structure: StructureType,
    },
    Trade {
        target: Uid,
        resource: Resource,
        amount: f64,
    },
    ClaimSystem,
    RevokeClaim,
    Propose {
        text: String,
        deadline: u64,
    },
    Vote {
        proposal: usize,
        in_favor: bool,
    },
    Research {
        domain: TechDomain,
    },
    ShareTech {
        target: Uid,
        domain: TechDomain,
    },
}

impl Default for Action {
    fn default() -> Self {
        Action::Wait
    }
}
