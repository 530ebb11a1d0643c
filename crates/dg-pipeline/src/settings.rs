//! Operation settings: media classification and default seeding.
//!
//! Settings arrive as an untyped JSON object using the camelCase keys the
//! front-end sends. They are overlaid on a base object seeded from
//! [`DefaultsConfig`] and then deserialized into the operation's typed
//! settings, whose own `Default` covers every other field.

use std::path::Path;

use dg_core::config::DefaultsConfig;
use dg_core::validate::validate_option_bag;
use dg_core::{Error, Result};
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};

const VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "mkv", "webm"];

/// Broad media class of a source file, by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Gif,
    Video,
    Image,
}

impl MediaKind {
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        if ext == "gif" {
            MediaKind::Gif
        } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            MediaKind::Video
        } else {
            MediaKind::Image
        }
    }
}

/// The base settings object derived from user defaults.
pub fn seed(defaults: &DefaultsConfig) -> Map<String, Value> {
    let value = json!({
        "width": defaults.width,
        "height": defaults.height,
        "fps": defaults.fps,
        "lossy": defaults.video_compression,
        "compressionLevel": defaults.compression_level,
        "loopCount": defaults.loop_count,
    });
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Overlay `user` on the seeded defaults and deserialize into `S`.
pub fn resolve<S: DeserializeOwned>(defaults: &DefaultsConfig, user: &Value) -> Result<S> {
    validate_option_bag(user).into_result("Invalid settings object provided")?;
    let mut merged = seed(defaults);
    if let Value::Object(user) = user {
        for (key, value) in user {
            merged.insert(key.clone(), value.clone());
        }
    }
    serde_json::from_value(Value::Object(merged))
        .map_err(|e| Error::validation(format!("Invalid settings: {e}")))
}
