//! Camera capabilities reported by the vendor `GetInformation` action.

use serde::Serialize;

use super::DlnaError;
use super::xml::leaf_values;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraCapabilities {
    pub resolutions: Vec<String>,
    pub flash_modes: Vec<String>,
    pub zoom_min: Option<u32>,
    pub zoom_max: Option<u32>,
    /// Live-view / streaming URLs as announced; not consumed here.
    pub stream_urls: Vec<String>,
    /// Every leaf value of the response, for diagnostics.
    pub raw: Vec<(String, String)>,
}

fn split_list(value: &str) -> impl Iterator<Item = String> + '_ {
    value
        .split([',', ';'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

impl CameraCapabilities {
    /// Picks known fields out of a `GetInformation` response. Element names vary
    /// between firmware versions, so matching is by case-insensitive fragment.
    pub fn parse(response: &str) -> Result<Self, DlnaError> {
        let raw = leaf_values(response)?;
        let mut capabilities = Self::default();

        for (name, value) in &raw {
            let key = name.to_ascii_lowercase();
            if value.starts_with("http://") || value.starts_with("https://") {
                if key.contains("stream") || key.contains("url") || key.contains("live") {
                    capabilities.stream_urls.push(value.clone());
                }
            } else if key.contains("resolution") {
                capabilities.resolutions.extend(split_list(value));
            } else if key.contains("flash") {
                capabilities.flash_modes.extend(split_list(value));
            } else if key.contains("zoom") {
                let number = value.trim().parse().ok();
                if key.contains("min") {
                    capabilities.zoom_min = number;
                } else if key.contains("max") {
                    capabilities.zoom_max = number;
                } else if let Some((min, max)) = value.split_once('-') {
                    capabilities.zoom_min = min.trim().parse().ok();
                    capabilities.zoom_max = max.trim().parse().ok();
                }
            }
        }

        capabilities.raw = raw;
        Ok(capabilities)
    }
}
