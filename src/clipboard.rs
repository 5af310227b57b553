//! Moodboard clipboard format and the image paste fallback chain.

use crate::error::ClipboardError;
use crate::model::{EntityId, MoodBoardItem, MoodBoardKind, Point};
use crate::spatial::fit_within;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

pub const CLIPBOARD_TAG: &str = "moodboard_item";

/// Pasted images are scaled down to fit this box, aspect preserved.
pub const PASTE_MAX_SIDE: f32 = 300.0;

#[derive(Serialize, Deserialize)]
struct Envelope {
    tag: String,
    data: MoodBoardItem,
}

/// Something the moodboard can turn into a new item.
#[derive(Clone, Debug, PartialEq)]
pub enum Pasted {
    /// An item copied from a moodboard.
    Item(MoodBoardItem),
    /// Image data, already encoded as a data URI, with its display size.
    Image {
        data_uri: String,
        width: f32,
        height: f32,
    },
}

impl Pasted {
    /// Builds the new item at `at`, with a fresh id, above `z_index`.
    pub fn into_item(self, at: Point, z_index: i32) -> MoodBoardItem {
        match self {
            Pasted::Item(mut item) => {
                item.id = EntityId::temporary();
                item.position = at;
                item.z_index = z_index;
                item
            }
            Pasted::Image {
                data_uri,
                width,
                height,
            } => MoodBoardItem {
                id: EntityId::temporary(),
                kind: MoodBoardKind::Image,
                content: data_uri,
                position: at,
                width,
                height,
                z_index,
                rotation: None,
                color: None,
            },
        }
    }
}

pub fn copy_item(item: &MoodBoardItem) -> Result<String, ClipboardError> {
    let envelope = Envelope {
        tag: CLIPBOARD_TAG.to_string(),
        data: item.clone(),
    };
    Ok(serde_json::to_string(&envelope)?)
}

fn read_envelope(text: &str) -> Option<MoodBoardItem> {
    let envelope: Envelope = serde_json::from_str(text).ok()?;
    (envelope.tag == CLIPBOARD_TAG).then_some(envelope.data)
}

fn read_data_uri(text: &str) -> Option<Pasted> {
    let rest = text.trim().strip_prefix("data:image/")?;
    let (_, payload) = rest.split_once(";base64,")?;
    let bytes = STANDARD.decode(payload.trim()).ok()?;
    let (width, height) = display_size(&bytes).ok()?;
    Some(Pasted::Image {
        data_uri: text.trim().to_string(),
        width,
        height,
    })
}

fn display_size(bytes: &[u8]) -> Result<(f32, f32), ClipboardError> {
    let image = image::load_from_memory(bytes)?;
    if image.width() == 0 || image.height() == 0 {
        return Err(ClipboardError::EmptyImage);
    }
    Ok(fit_within(
        image.width() as f32,
        image.height() as f32,
        PASTE_MAX_SIDE,
    ))
}

/// Encodes raw image bytes as a data URI sized for the moodboard.
pub fn read_image(bytes: &[u8]) -> Result<Pasted, ClipboardError> {
    let format = image::guess_format(bytes)?;
    let (width, height) = display_size(bytes)?;
    let data_uri = format!(
        "data:{};base64,{}",
        format.to_mime_type(),
        STANDARD.encode(bytes)
    );
    Ok(Pasted::Image {
        data_uri,
        width,
        height,
    })
}

/// Tries, in order: the moodboard envelope, a base64 image data URI, raw
/// image bytes. Anything else is ignored.
pub fn paste(text: Option<&str>, bytes: Option<&[u8]>) -> Option<Pasted> {
    if let Some(text) = text {
        if let Some(item) = read_envelope(text) {
            return Some(Pasted::Item(item));
        }
        if let Some(image) = read_data_uri(text) {
            return Some(image);
        }
    }
    match read_image(bytes?) {
        Ok(image) => Some(image),
        Err(e) => {
            tracing::debug!(error = %e, "ignoring clipboard content");
            None
        }
    }
}
