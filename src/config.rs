use serde::{Deserialize, Serialize};
use std::{fs::File, io::BufReader, path::Path, time::Duration};

use crate::{BridgeError, BridgeResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Capacity of the completion broadcast channel.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    #[serde(default)]
    pub delay: DelayPolicy,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            channel_capacity: default_channel_capacity(),
            delay: DelayPolicy::default(),
        }
    }
}

/// How long the sample client waits before completing a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DelayPolicy {
    /// `request_id * unit`, so later requests finish later.
    Proportional {
        #[serde(default = "default_delay_unit", with = "duration_ms")]
        unit: Duration,
    },
    /// Every request waits the same amount of time.
    Fixed {
        #[serde(default = "default_delay_unit", with = "duration_ms")]
        delay: Duration,
    },
}

impl DelayPolicy {
    pub fn delay_for(&self, request_id: u64) -> Duration {
        match self {
            DelayPolicy::Proportional { unit } => {
                let factor = u32::try_from(request_id).unwrap_or(u32::MAX);
                unit.saturating_mul(factor)
            }
            DelayPolicy::Fixed { delay } => *delay,
        }
    }
}

impl Default for DelayPolicy {
    fn default() -> Self {
        DelayPolicy::Proportional {
            unit: default_delay_unit(),
        }
    }
}

pub fn from_file<T: for<'de> Deserialize<'de>, P: AsRef<Path>>(path: P) -> BridgeResult<T> {
    let file = File::open(path)
        .map_err(|e| BridgeError::Config(format!("Failed to open config file: {}", e)))?;
    let reader = BufReader::new(file);
    let config = serde_json::from_reader(reader)
        .map_err(|e| BridgeError::Config(format!("Failed to parse config file: {}", e)))?;
    Ok(config)
}

pub fn from_str<T: for<'de> Deserialize<'de>>(s: &str) -> BridgeResult<T> {
    let config = serde_json::from_str(s)
        .map_err(|e| BridgeError::Config(format!("Failed to parse config: {}", e)))?;
    Ok(config)
}

fn default_channel_capacity() -> usize {
    1024
}

fn default_delay_unit() -> Duration {
    Duration::from_secs(1)
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
