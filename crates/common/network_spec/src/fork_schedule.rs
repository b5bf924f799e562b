use std::{fmt, slice::Iter, str::FromStr};

use alloy_primitives::aliases::B32;
use serde::{Deserialize, Serialize};

pub const FAR_FUTURE_EPOCH: u64 = u64::MAX;

/// The forks this workspace implements, in activation order.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ForkName {
    #[default]
    Phase0,
    Altair,
    Bellatrix,
}

impl ForkName {
    pub const ALL: [ForkName; 3] = [ForkName::Phase0, ForkName::Altair, ForkName::Bellatrix];

    pub fn previous(self) -> Option<Self> {
        match self {
            ForkName::Phase0 => None,
            ForkName::Altair => Some(ForkName::Phase0),
            ForkName::Bellatrix => Some(ForkName::Altair),
        }
    }

    pub fn next(self) -> Option<Self> {
        match self {
            ForkName::Phase0 => Some(ForkName::Altair),
            ForkName::Altair => Some(ForkName::Bellatrix),
            ForkName::Bellatrix => None,
        }
    }
}

impl fmt::Display for ForkName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ForkName::Phase0 => "phase0",
            ForkName::Altair => "altair",
            ForkName::Bellatrix => "bellatrix",
        };
        f.write_str(name)
    }
}

impl FromStr for ForkName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "phase0" | "base" => Ok(ForkName::Phase0),
            "altair" => Ok(ForkName::Altair),
            "bellatrix" | "merge" => Ok(ForkName::Bellatrix),
            other => Err(format!("Unknown fork name: {other}")),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledFork {
    pub name: ForkName,
    pub previous_version: B32,
    pub current_version: B32,
    pub epoch: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForkSchedule(pub [ScheduledFork; ForkSchedule::TOTAL]);

impl ForkSchedule {
    pub const TOTAL: usize = ForkName::ALL.len();

    pub fn iter(&self) -> Iter<'_, ScheduledFork> {
        self.0.iter()
    }

    pub fn scheduled(&self) -> impl Iterator<Item = &ScheduledFork> {
        self.iter().filter(|fork| fork.epoch != FAR_FUTURE_EPOCH)
    }

    /// The latest fork active at `epoch`.
    pub fn at_epoch(&self, epoch: u64) -> &ScheduledFork {
        self.scheduled()
            .filter(|fork| fork.epoch <= epoch)
            .max_by_key(|fork| fork.epoch)
            .unwrap_or(&self.0[0])
    }

    pub fn get(&self, name: ForkName) -> &ScheduledFork {
        &self.0[name as usize]
    }
}
