use tilestream_cloud::ReconstructionConfig;
use tilestream_tiles::TilesConfig;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub tiles: TilesConfig,
    pub reconstruction: ReconstructionConfig,
}

impl Config {
    pub fn read_file(path: &str) -> Result<Self, ron::Error> {
        let reader = std::fs::File::open(path)?;
        log::debug!("Reading config from {}", path);

        ron::de::from_reader(reader)
    }

    pub fn from_ron_str(s: &str) -> Result<Self, ron::Error> {
        ron::de::from_str(s)
    }
}
