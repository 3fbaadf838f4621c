//! Recognizing the camera's own access point by SSID.

use crate::collaborators::NetworkInfo;

/// Returns the first pattern contained in `ssid`, ignoring case.
pub fn matching_pattern<'a>(ssid: &str, patterns: &'a [String]) -> Option<&'a str> {
    let ssid = ssid.to_ascii_lowercase();
    patterns
        .iter()
        .find(|pattern| !pattern.is_empty() && ssid.contains(&pattern.to_ascii_lowercase()))
        .map(String::as_str)
}

/// The current SSID, if it looks like a camera access point.
pub fn camera_ssid(network: &dyn NetworkInfo, patterns: &[String]) -> Option<String> {
    let ssid = network.current_ssid()?;
    matching_pattern(&ssid, patterns).map(|_| ssid)
}
