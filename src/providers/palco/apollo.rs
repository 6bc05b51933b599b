//! Palco MP3 搜索页内嵌 Apollo 状态的解析。
//!
//! 页面会把 GraphQL 缓存整个塞进 `window.__APOLLO_STATE__`，
//! 有两种形态：被转义包在引号里的 JSON 字符串，或直接的对象
//! 字面量。曲目藏在 `Music:` 前缀的键下，艺术家和封面都是
//! 引用，要回到状态表里二次查找。这里全部是纯函数。

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::model::track::TrackRecord;

/// 单次搜索最多返回的曲目数。
const MAX_RESULTS: usize = 20;

static QUOTED_STATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"window\.__APOLLO_STATE__\s*=\s*"(.*?)";"#)
        .expect("引号态正则非法")
});
static OBJECT_STATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"window\.__APOLLO_STATE__\s*=\s*(\{.*?\});")
        .expect("对象态正则非法")
});

/// 从页面 HTML 中抠出 Apollo 状态表。两种形态都认不出来，
/// 或 JSON 本身损坏时返回 `None`。
pub(super) fn extract_state(html: &str) -> Option<Value> {
    if let Some(captures) = QUOTED_STATE_RE.captures(html) {
        let unescaped = captures[1].replace("\\\"", "\"").replace("\\\\", "\\");
        if let Ok(state) = serde_json::from_str(&unescaped) {
            return Some(state);
        }
    }

    OBJECT_STATE_RE
        .captures(html)
        .and_then(|c| serde_json::from_str(&c[1]).ok())
}

fn ref_id(value: &Value) -> Option<&str> {
    value.get("id")?.as_str()
}

/// 顺着引用找艺术家名和头像。
fn resolve_artist(state: &Value, track: &Value) -> (Option<String>, Option<String>) {
    let Some(artist) = track
        .get("artist")
        .and_then(ref_id)
        .and_then(|id| state.get(id))
    else {
        return (None, None);
    };

    let name = artist
        .get("name")
        .and_then(Value::as_str)
        .map(str::to_string);
    let artwork = artist
        .get("thumbnail")
        .and_then(ref_id)
        .and_then(|id| state.get(id))
        .and_then(|thumb| thumb.get("url"))
        .and_then(Value::as_str)
        .map(str::to_string);

    (name, artwork)
}

/// 艺术家没有头像时，退回第一张唱片的封面。
fn resolve_disc_artwork(state: &Value, track: &Value) -> Option<String> {
    let edge_id = track
        .get("discs")?
        .get("edges")?
        .get(0)?
        .get("id")?
        .as_str()?;
    let node_id = state.get(edge_id)?.get("node").and_then(ref_id)?;
    let picture_id = state.get(node_id)?.get("picture").and_then(ref_id)?;
    state
        .get(picture_id)?
        .get("url")?
        .as_str()
        .map(str::to_string)
}

fn to_record(state: &Value, track: &Value) -> Option<TrackRecord> {
    let mp3_file = track.get("mp3File")?.as_str()?;
    let title = track.get("title")?.as_str()?;

    let id = match track.get("musicID").or_else(|| track.get("id")) {
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::String(s)) => s.clone(),
        _ => return None,
    };

    let (artist, artist_artwork) = resolve_artist(state, track);
    let artwork = artist_artwork.or_else(|| resolve_disc_artwork(state, track));

    Some(TrackRecord {
        source: "palcomp3".to_string(),
        id,
        title: title.to_string(),
        artist: artist.unwrap_or_else(|| "Artista Desconhecido".to_string()),
        artwork,
        duration_seconds: track.get("duration").and_then(Value::as_u64),
        stream_url: format!("/palco/stream?url={}", urlencoding::encode(mp3_file)),
        plays: None,
        genre: None,
        album: None,
        year: None,
    })
}

/// 遍历状态表里的 `Music:` 条目，有封面的排前面，按 ID 去重，
/// 最多 [`MAX_RESULTS`] 条。
pub(super) fn collect_tracks(state: &Value) -> Vec<TrackRecord> {
    let Some(entries) = state.as_object() else {
        return Vec::new();
    };

    let mut records: Vec<TrackRecord> = entries
        .iter()
        .filter(|(key, _)| key.starts_with("Music:"))
        .filter_map(|(_, track)| to_record(state, track))
        .collect();

    records.sort_by_key(|r| r.artwork.is_none());

    let mut seen = HashSet::new();
    records.retain(|r| seen.insert(r.id.clone()));
    records.truncate(MAX_RESULTS);
    records
}
