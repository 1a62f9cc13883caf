//! Splits one assistant message into its thought, proposed edit actions and
//! user-facing response.
//!
//! Markers are located with a plain delimiter scan. The first complete region
//! wins and markers do not nest.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::clock::Clock;
use crate::conversation::MessageId;
use crate::state::ActionId;
use crate::state::ActionName;
use crate::state::ActionStage;
use crate::state::ThoughtStage;
use crate::state::ThoughtStatus;

const THOUGHT_OPEN: &str = "<think";
const THOUGHT_CLOSE: &str = "</think>";
const VERSION_ATTR: &str = "version=\"";
const CALL_OPEN: &str = "<function_call>";
const CALL_CLOSE: &str = "</function_call>";
const CALL_TAG_PREFIXES: [&str; 2] = ["<function_call", "</function_call"];
const NAME_OPEN: &str = "<name>";
const NAME_CLOSE: &str = "</name>";
const CONTENT_OPEN: &str = "<content>";
const CONTENT_CLOSE: &str = "</content>";

const STRIPPED_REGIONS: [(&str, &str); 3] = [
    ("<context>", "</context>"),
    ("<suggestion>", "</suggestion>"),
    ("<error>", "</error>"),
];

/// Quoted context blocks echoed back by the model; each runs to the next
/// blank line or the end of the text.
pub const QUOTED_REFERENCE_HEADERS: [&str; 6] = [
    "> [选区引用]",
    "> [光标位置上下文]",
    "> [完整文档]",
    "> [Selection]",
    "> [Cursor Context]",
    "> [Full Document]",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedMessage {
    pub thought: Option<ThoughtStage>,
    pub actions: Vec<ActionStage>,
    pub response: String,
}

pub fn parse_message(message_id: &MessageId, text: &str, clock: &dyn Clock) -> ParsedMessage {
    let thought_region = find_thought(text);
    let call_region = find_region(text, 0, CALL_OPEN, CALL_CLOSE);

    let actions = call_region
        .as_ref()
        .and_then(|region| parse_function_call(region.inner(text)))
        .map(|(name, arguments)| {
            let at = clock.now();
            vec![ActionStage::new(
                ActionId::for_message(message_id, at),
                message_id.clone(),
                name,
                arguments,
                at,
            )]
        })
        .unwrap_or_default();

    let thought = thought_region.as_ref().map(|region| ThoughtStage {
        content: region.inner(text).trim().to_string(),
        status: if region.closed {
            ThoughtStatus::Complete
        } else {
            ThoughtStatus::Streaming
        },
        version: region.version.clone(),
    });

    let response = match call_region
        .as_ref()
        .and_then(|region| tag_content(region.inner(text)))
    {
        Some(content) => content,
        None => strip_markers(text, thought_region.as_ref()),
    };

    ParsedMessage {
        thought,
        actions,
        response,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Region {
    start: usize,
    inner_start: usize,
    inner_end: usize,
    end: usize,
}

impl Region {
    fn inner<'a>(&self, text: &'a str) -> &'a str {
        &text[self.inner_start..self.inner_end]
    }
}

fn find_region(text: &str, from: usize, open: &str, close: &str) -> Option<Region> {
    let start = from + text.get(from..)?.find(open)?;
    let inner_start = start + open.len();
    let inner_end = inner_start + text[inner_start..].find(close)?;
    Some(Region {
        start,
        inner_start,
        inner_end,
        end: inner_end + close.len(),
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ThoughtRegion {
    start: usize,
    inner_start: usize,
    inner_end: usize,
    end: usize,
    version: Option<String>,
    closed: bool,
}

impl ThoughtRegion {
    fn inner<'a>(&self, text: &'a str) -> &'a str {
        &text[self.inner_start..self.inner_end]
    }
}

fn find_thought(text: &str) -> Option<ThoughtRegion> {
    let mut search = 0;
    while let Some(offset) = text[search..].find(THOUGHT_OPEN) {
        let start = search + offset;
        let after = start + THOUGHT_OPEN.len();
        let Some((consumed, version)) = parse_thought_opener(&text[after..]) else {
            search = after;
            continue;
        };
        let inner_start = after + consumed;
        return Some(match text[inner_start..].find(THOUGHT_CLOSE) {
            Some(close) => ThoughtRegion {
                start,
                inner_start,
                inner_end: inner_start + close,
                end: inner_start + close + THOUGHT_CLOSE.len(),
                version,
                closed: true,
            },
            None => ThoughtRegion {
                start,
                inner_start,
                inner_end: text.len(),
                end: text.len(),
                version,
                closed: false,
            },
        });
    }
    None
}

/// Accepts the remainder of `<think` when it is either `>` or
/// `<ws>version="N.N">`. Returns the bytes consumed and the version.
fn parse_thought_opener(rest: &str) -> Option<(usize, Option<String>)> {
    if rest.starts_with('>') {
        return Some((1, None));
    }

    let attrs = rest.trim_start();
    let whitespace = rest.len() - attrs.len();
    if whitespace == 0 {
        return None;
    }
    let body = attrs.strip_prefix(VERSION_ATTR)?;
    let quote = body.find('"')?;
    let version = &body[..quote];
    if !is_dotted_number(version) || !body[quote + 1..].starts_with('>') {
        return None;
    }
    let consumed = whitespace + VERSION_ATTR.len() + quote + 2;
    Some((consumed, Some(version.to_string())))
}

fn is_dotted_number(value: &str) -> bool {
    let Some((major, minor)) = value.split_once('.') else {
        return false;
    };
    let digits = |part: &str| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit());
    digits(major) && digits(minor)
}

fn parse_function_call(inner: &str) -> Option<(ActionName, BTreeMap<String, Value>)> {
    let payload = inner.trim();
    if payload.starts_with('{') {
        if let Some(found) = parse_object_form(payload) {
            return Some(found);
        }
    }
    parse_tag_form(payload)
}

fn parse_object_form(payload: &str) -> Option<(ActionName, BTreeMap<String, Value>)> {
    let value: Value = match serde_json::from_str(payload) {
        Ok(value) => value,
        Err(err) => {
            debug!(error = %err, "function call payload is not valid JSON");
            return None;
        }
    };
    let name = value.get("name").and_then(Value::as_str)?;
    let Some(name) = ActionName::recognized(name) else {
        debug!(name, "ignoring unrecognized function call");
        return None;
    };
    let arguments = match value.get("arguments") {
        Some(Value::Object(map)) => map
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect(),
        _ => BTreeMap::new(),
    };
    Some((name, arguments))
}

fn parse_tag_form(payload: &str) -> Option<(ActionName, BTreeMap<String, Value>)> {
    let name_region = find_region(payload, 0, NAME_OPEN, NAME_CLOSE)?;
    let raw_name = name_region.inner(payload).trim();
    let Some(name) = ActionName::recognized(raw_name) else {
        debug!(name = raw_name, "ignoring unrecognized function call");
        return None;
    };
    let mut arguments = BTreeMap::new();
    arguments.insert(
        "content".to_string(),
        Value::String(tag_content(payload).unwrap_or_default()),
    );
    Some((name, arguments))
}

fn tag_content(payload: &str) -> Option<String> {
    find_region(payload, 0, CONTENT_OPEN, CONTENT_CLOSE)
        .map(|region| region.inner(payload).trim().to_string())
}

fn strip_markers(text: &str, thought: Option<&ThoughtRegion>) -> String {
    let mut response = match thought {
        Some(region) => format!("{}{}", &text[..region.start], &text[region.end..]),
        None => text.to_string(),
    };
    for (open, close) in STRIPPED_REGIONS {
        response = strip_regions(&response, open, close);
    }
    response = strip_call_tags(&response);
    for header in QUOTED_REFERENCE_HEADERS {
        response = strip_quoted_reference(&response, header);
    }
    response.trim().to_string()
}

fn strip_regions(text: &str, open: &str, close: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    while let Some(region) = find_region(text, cursor, open, close) {
        out.push_str(&text[cursor..region.start]);
        cursor = region.end;
    }
    out.push_str(&text[cursor..]);
    out
}

/// Removes the function-call delimiter tags themselves; the payload between
/// them is left in place.
fn strip_call_tags(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    loop {
        let next = CALL_TAG_PREFIXES
            .iter()
            .filter_map(|prefix| text[cursor..].find(prefix).map(|offset| cursor + offset))
            .min();
        let Some(start) = next else {
            break;
        };
        let Some(close) = text[start..].find('>') else {
            break;
        };
        out.push_str(&text[cursor..start]);
        cursor = start + close + 1;
    }
    out.push_str(&text[cursor..]);
    out
}

fn strip_quoted_reference(text: &str, header: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    while let Some(offset) = text[cursor..].find(header) {
        let start = cursor + offset;
        let body = start + header.len();
        let end = text[body..]
            .find("\n\n")
            .map_or(text.len(), |offset| body + offset);
        out.push_str(&text[cursor..start]);
        cursor = end;
    }
    out.push_str(&text[cursor..]);
    out
}
