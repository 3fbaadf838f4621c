//! Small quick-xml helpers shared by the descriptor, SOAP and DIDL parsers.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use super::DlnaError;

pub(crate) fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

/// Looks up an attribute by local name (namespace prefixes ignored).
pub(crate) fn attribute(e: &BytesStart<'_>, name: &str) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|attr| attr.key.local_name().as_ref() == name.as_bytes())
        .and_then(|attr| attr.unescape_value().ok().map(|v| v.into_owned()))
}

/// Returns the unescaped text of the first element with the given local name.
/// `Ok(None)` when no such element exists.
pub(crate) fn element_text(xml: &str, name: &str) -> Result<Option<String>, DlnaError> {
    let mut reader = Reader::from_str(xml);
    let mut depth_inside: Option<usize> = None;
    let mut text = String::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                if let Some(depth) = depth_inside {
                    depth_inside = Some(depth + 1);
                } else if e.local_name().as_ref() == name.as_bytes() {
                    depth_inside = Some(0);
                }
            }
            Event::Empty(e) if depth_inside.is_none() && e.local_name().as_ref() == name.as_bytes() => {
                return Ok(Some(String::new()));
            }
            Event::Text(t) if depth_inside.is_some() => text.push_str(&t.unescape()?),
            Event::CData(c) if depth_inside.is_some() => text.push_str(&String::from_utf8_lossy(&c.into_inner())),
            Event::End(_) => match depth_inside {
                Some(0) => return Ok(Some(text)),
                Some(depth) => depth_inside = Some(depth - 1),
                None => {}
            },
            Event::Eof => return Ok(None),
            _ => {}
        }
    }
}

/// Collects `(element, text)` for every element that directly holds text, in
/// document order. Text that is itself escaped XML is flattened into its own
/// leaves.
pub(crate) fn leaf_values(xml: &str) -> Result<Vec<(String, String)>, DlnaError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut stack: Vec<String> = Vec::new();
    let mut values = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => stack.push(local_name(&e)),
            Event::End(_) => {
                stack.pop();
            }
            Event::Text(t) => {
                let text = t.unescape()?.trim().to_string();
                push_leaf(&mut values, stack.last(), text)?;
            }
            Event::CData(c) => {
                let text = String::from_utf8_lossy(&c.into_inner()).trim().to_string();
                push_leaf(&mut values, stack.last(), text)?;
            }
            Event::Eof => return Ok(values),
            _ => {}
        }
    }
}

fn push_leaf(values: &mut Vec<(String, String)>, element: Option<&String>, text: String) -> Result<(), DlnaError> {
    if text.starts_with('<') {
        values.extend(leaf_values(&text)?);
    } else if let Some(element) = element {
        values.push((element.clone(), text));
    }
    Ok(())
}
