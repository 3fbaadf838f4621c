//! DIDL-Lite listings carried inside a Browse `<Result>`.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use serde::Serialize;
use std::path::Path;

use super::DlnaError;
use super::xml::{attribute, local_name};
use crate::types::{CameraFile, FileFormat, handle_for_object_id, parse_capture_date};

/// One `<res>` element.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub url: String,
    pub size: u64,
    pub protocol_info: String,
    pub resolution: Option<(u32, u32)>,
}

impl Resource {
    /// MIME type, the third field of `protocolInfo`.
    pub fn mime_type(&self) -> &str {
        self.protocol_info.split(':').nth(2).unwrap_or_default()
    }

    pub fn is_thumbnail(&self) -> bool {
        self.protocol_info.contains("JPEG_TN")
    }
}

/// A DIDL-Lite `<item>`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaItem {
    pub id: String,
    pub parent_id: String,
    pub title: String,
    pub class: String,
    pub date: String,
    /// The largest resource (first seen on ties).
    pub resource: Option<Resource>,
    pub thumbnail_url: Option<String>,
}

impl MediaItem {
    /// Best guess at the file name: the title if it has an extension, else the
    /// last URL segment.
    pub fn filename(&self) -> String {
        if Path::new(&self.title).extension().is_some() {
            return self.title.clone();
        }
        self.resource
            .as_ref()
            .and_then(|res| {
                let path = res.url.split(['?', '#']).next().unwrap_or_default();
                path.rsplit('/').next().map(str::to_string)
            })
            .filter(|segment| segment.contains('.'))
            .unwrap_or_else(|| self.title.clone())
    }

    pub fn to_camera_file(&self) -> CameraFile {
        let filename = self.filename();
        let resource = self.resource.clone().unwrap_or_default();
        let (width, height) = resource.resolution.unwrap_or((0, 0));
        CameraFile {
            handle: handle_for_object_id(&self.id),
            object_id: self.id.clone(),
            format: FileFormat::from_mime(resource.mime_type(), &filename),
            filename,
            byte_size: resource.size,
            width,
            height,
            capture_date_raw: self.date.clone(),
            capture_date: parse_capture_date(&self.date),
            thumbnail: None,
            content_url: self.resource.as_ref().map(|res| res.url.clone()),
            thumbnail_url: self.thumbnail_url.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DidlEntry {
    Item(MediaItem),
    Container { id: String, title: String },
}

#[derive(Default)]
struct ItemBuilder {
    item: MediaItem,
    resources: Vec<Resource>,
    album_art: Option<String>,
}

impl ItemBuilder {
    fn finish(self) -> MediaItem {
        let mut item = self.item;

        let mut primary: Option<&Resource> = None;
        for res in self.resources.iter().filter(|r| !r.is_thumbnail()) {
            if primary.is_none_or(|best| res.size > best.size) {
                primary = Some(res);
            }
        }
        // Only thumbnails advertised: still better than nothing.
        let primary = primary.or_else(|| self.resources.first());

        item.resource = primary.cloned();
        item.thumbnail_url = self
            .resources
            .iter()
            .find(|r| r.is_thumbnail())
            .map(|r| r.url.clone())
            .or(self.album_art);
        item
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Field {
    Title,
    Class,
    Date,
    AlbumArt,
    Res,
}

fn parse_resolution(value: &str) -> Option<(u32, u32)> {
    let (w, h) = value.split_once(['x', 'X'])?;
    Some((w.trim().parse().ok()?, h.trim().parse().ok()?))
}

fn resource_from(e: &BytesStart<'_>) -> Resource {
    Resource {
        url: String::new(),
        size: attribute(e, "size").and_then(|s| s.trim().parse().ok()).unwrap_or(0),
        protocol_info: attribute(e, "protocolInfo").unwrap_or_default(),
        resolution: attribute(e, "resolution").as_deref().and_then(parse_resolution),
    }
}

/// Parses a DIDL-Lite document into items and containers, in document order.
pub fn parse(xml: &str) -> Result<Vec<DidlEntry>, DlnaError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut entries = Vec::new();
    let mut item: Option<ItemBuilder> = None;
    let mut container: Option<(String, String)> = None;
    let mut pending_res: Option<Resource> = None;
    let mut field: Option<Field> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match local_name(&e).as_str() {
                "item" => {
                    let mut builder = ItemBuilder::default();
                    builder.item.id = attribute(&e, "id").unwrap_or_default();
                    builder.item.parent_id = attribute(&e, "parentID").unwrap_or_default();
                    item = Some(builder);
                }
                "container" => container = Some((attribute(&e, "id").unwrap_or_default(), String::new())),
                "title" => field = Some(Field::Title),
                "class" => field = Some(Field::Class),
                "date" => field = Some(Field::Date),
                "albumArtURI" => field = Some(Field::AlbumArt),
                "res" => {
                    pending_res = Some(resource_from(&e));
                    field = Some(Field::Res);
                }
                _ => field = None,
            },
            Event::Empty(e) => {
                if local_name(&e) == "container" {
                    let id = attribute(&e, "id").unwrap_or_default();
                    entries.push(DidlEntry::Container { id, title: String::new() });
                }
            }
            Event::Text(t) => {
                let text = t.unescape()?.trim().to_string();
                match (field, item.as_mut(), container.as_mut()) {
                    (Some(Field::Title), Some(builder), _) => builder.item.title = text,
                    (Some(Field::Title), None, Some((_, title))) => *title = text,
                    (Some(Field::Class), Some(builder), _) => builder.item.class = text,
                    (Some(Field::Date), Some(builder), _) => builder.item.date = text,
                    (Some(Field::AlbumArt), Some(builder), _) => builder.album_art = Some(text),
                    (Some(Field::Res), _, _) => {
                        if let Some(res) = pending_res.as_mut() {
                            res.url = text;
                        }
                    }
                    _ => {}
                }
            }
            Event::End(e) => {
                match e.local_name().as_ref() {
                    b"item" => {
                        if let Some(builder) = item.take() {
                            entries.push(DidlEntry::Item(builder.finish()));
                        }
                    }
                    b"container" => {
                        if let Some((id, title)) = container.take() {
                            entries.push(DidlEntry::Container { id, title });
                        }
                    }
                    b"res" => {
                        if let (Some(res), Some(builder)) = (pending_res.take(), item.as_mut()) {
                            if !res.url.is_empty() {
                                builder.resources.push(res);
                            }
                        }
                    }
                    _ => {}
                }
                field = None;
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(entries)
}
