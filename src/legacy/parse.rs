//! Parsers for RouterOS console output.
//!
//! Console output drifts between firmware releases (column layout, quoting,
//! `Flags:` headers, 7.x `Columns:` lines), so every parser here accepts
//! several shapes. Numeric helpers never fail: malformed or missing values
//! read as 0.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::session::Record;

/// `key=value` or `key="quoted value"`. v6 prints timestamps with a space,
/// e.g. `last-logged-out=jan/02/2024 10:00:00`.
static ATTRIBUTE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"([A-Za-z0-9._-]+)=("(?:[^"\\]|\\.)*"|\S+(?: \d{2}:\d{2}:\d{2})?)"#)
        .expect("attribute regex")
});

/// `  key: value` lines of `print` on single-item menus and `monitor`.
static FIELD_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*([A-Za-z0-9-]+):\s*(.*?)\s*$").expect("field regex"));

/// Row start: an index or an internal id, then optional flag letters.
static ROW_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(\*[0-9A-Fa-f]+|\d+)\s*([A-Z]*(?:\s+[A-Z]+)*)?\s*$").expect("row regex")
});

/// `name=` at a word boundary; named items print it first.
static NAME_ATTRIBUTE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|\s)(name=)").expect("name attribute regex"));

static NUMBER_WITH_UNIT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*([0-9]+(?:\.[0-9]+)?)\s*([A-Za-z/]*)\s*$").expect("number regex")
});

static UPTIME_PART: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+)\s*([wdhms])").expect("uptime regex"));

static CLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:(\d+):)?(\d{1,2}):(\d{2})$").expect("clock regex"));

/// Prefixes the console uses for rejected commands.
const ERROR_PREFIXES: &[&str] = &[
    "failure:",
    "expected ",
    "syntax error",
    "bad command name",
    "no such item",
    "no such command",
    "input does not match",
    "invalid value",
    "ambiguous value",
    "value of ",
];

/// First line of `text` that reports a console error.
pub fn error_line(text: &str) -> Option<&str> {
    text.lines().map(str::trim).find(|line| {
        let lower = line.to_ascii_lowercase();
        ERROR_PREFIXES.iter().any(|p| lower.starts_with(p))
    })
}

fn unquote(raw: &str) -> String {
    let Some(inner) = raw.strip_prefix('"').and_then(|r| r.strip_suffix('"')) else {
        return raw.to_string();
    };
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('r') => out.push('\r'),
                Some('t') => out.push('\t'),
                Some(other) => out.push(other),
                None => {}
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// All `key=value` pairs in `text`, in order.
pub fn parse_attributes(text: &str) -> Vec<(String, String)> {
    ATTRIBUTE
        .captures_iter(text)
        .map(|cap| (cap[1].to_string(), unquote(&cap[2])))
        .collect()
}

fn apply_flags(record: &mut Record, flags: &str) {
    if record.get("disabled").is_none() {
        record.insert("disabled", if flags.contains('X') { "true" } else { "false" });
    }
    if flags.contains('D') && record.get("dynamic").is_none() {
        record.insert("dynamic", "true");
    }
}

/// Splits the text after `;;;` into the comment and what follows it.
///
/// Named items print `name=` first, so a comment sharing a line with the
/// attributes ends where `name=` starts. Without one the comment runs to the
/// end of `text`.
fn split_comment(text: &str) -> (&str, &str) {
    match NAME_ATTRIBUTE.captures(text).and_then(|cap| cap.get(1)) {
        Some(name) => (text[..name.start()].trim(), &text[name.start()..]),
        None => (text.trim(), ""),
    }
}

fn record_from(id: &str, flags: &str, comment: Option<&str>, attributes: &str) -> Record {
    let mut record = Record::new();
    if id.starts_with('*') {
        record.insert(".id", id);
    }
    if let Some(comment) = comment.filter(|c| !c.is_empty()) {
        record.insert("comment", comment);
    }
    for (k, v) in parse_attributes(attributes) {
        record.insert(k, v);
    }
    apply_flags(&mut record, flags);
    record
}

/// Parses one `print terse` row.
///
/// With `show-ids` the row starts with the internal id, which becomes the
/// `.id` field; plain index numbers are dropped.
pub fn parse_terse_line(line: &str) -> Option<Record> {
    let (prefix, comment, attributes) = match line.split_once(";;;") {
        Some((prefix, rest)) => {
            let (comment, attributes) = split_comment(rest);
            (prefix, Some(comment), attributes)
        }
        None => {
            let first = ATTRIBUTE.find(line)?;
            (&line[..first.start()], None, &line[first.start()..])
        }
    };
    ATTRIBUTE.find(attributes)?;
    let caps = ROW_PREFIX.captures(prefix)?;
    let flags = caps.get(2).map_or("", |m| m.as_str());
    Some(record_from(&caps[1], flags, comment, attributes))
}

fn is_row_start(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with(|c: char| c.is_ascii_digit())
        || (trimmed.starts_with('*') && trimmed[1..].starts_with(|c: char| c.is_ascii_hexdigit()))
}

/// Parses `print detail` output into one record per item.
///
/// Items start with an index line and continue on indented lines. A
/// `;;; text` comment on the index line is kept as `comment`; the attributes
/// come from the lines after it.
pub fn parse_detail_blocks(text: &str) -> Vec<Record> {
    // (index line, continuation lines)
    let mut blocks: Vec<(&str, Vec<&str>)> = Vec::new();
    for line in text.lines() {
        if line.trim().is_empty() || line.trim_start().starts_with("Flags:") {
            continue;
        }
        if is_row_start(line) {
            blocks.push((line, Vec::new()));
        } else if let Some((_, rest)) = blocks.last_mut() {
            rest.push(line.trim());
        }
    }

    blocks
        .iter()
        .filter_map(|(head, rest)| {
            let (head, comment, mut attributes) = match head.split_once(";;;") {
                Some((head, tail)) => {
                    let (comment, inline) = split_comment(tail);
                    (head, Some(comment), inline.trim().to_string())
                }
                None => match ATTRIBUTE.find(head) {
                    Some(first) => (&head[..first.start()], None, head[first.start()..].to_string()),
                    None => (*head, None, String::new()),
                },
            };
            for line in rest {
                if !attributes.is_empty() {
                    attributes.push(' ');
                }
                attributes.push_str(line);
            }
            ATTRIBUTE.find(&attributes)?;

            let mut tokens = head.split_whitespace();
            let id = tokens.next().unwrap_or_default();
            let flags: String = tokens.collect();
            Some(record_from(id, &flags, comment, &attributes))
        })
        .collect()
}

/// Parses column-aligned `print` output using the header offsets.
pub fn parse_table(text: &str) -> Vec<Record> {
    let mut lines = text.lines();
    let header = loop {
        match lines.next() {
            Some(line) if line.trim_start().starts_with('#') => break line,
            Some(_) => continue,
            None => return Vec::new(),
        }
    };

    // column name and its starting offset
    let mut columns: Vec<(String, usize)> = Vec::new();
    let mut offset = 0;
    for token in header.split_whitespace() {
        let Some(pos) = header[offset..].find(token) else {
            continue;
        };
        let start = offset + pos;
        offset = start + token.len();
        if token == "#" {
            continue;
        }
        columns.push((token.to_ascii_lowercase(), start));
    }
    if columns.is_empty() {
        return Vec::new();
    }

    let mut rows = Vec::new();
    for line in lines {
        if !is_row_start(line) || line.trim_start().starts_with(";;;") {
            continue;
        }
        let mut record = Record::new();
        for (idx, (name, start)) in columns.iter().enumerate() {
            let end = columns
                .get(idx + 1)
                .map_or(line.len(), |(_, next)| (*next).min(line.len()));
            let start = (*start).min(line.len());
            let value = line.get(start..end).unwrap_or_default().trim();
            record.insert(name.as_str(), value);
        }
        rows.push(record);
    }
    rows
}

/// Parses `key: value` lines.
pub fn parse_field_lines(text: &str) -> Record {
    text.lines()
        .filter_map(|line| FIELD_LINE.captures(line))
        .map(|cap| (cap[1].to_string(), cap[2].to_string()))
        .collect()
}

/// Bits per second from strings like `12.5 Mbps`, `350.4kbps` or `980bps`.
///
/// Unknown units keep the raw number; empty or unparsable input is 0.
pub fn parse_bits_per_second(raw: &str) -> u64 {
    let Some(caps) = NUMBER_WITH_UNIT.captures(raw) else {
        return 0;
    };
    let value: f64 = caps[1].parse().unwrap_or(0.0);
    let multiplier = match caps[2].to_ascii_lowercase().as_str() {
        "" | "bps" | "b/s" | "bit/s" => 1.0,
        "kbps" | "kb/s" | "kbit/s" => 1e3,
        "mbps" | "mb/s" | "mbit/s" => 1e6,
        "gbps" | "gb/s" | "gbit/s" => 1e9,
        "tbps" | "tb/s" | "tbit/s" => 1e12,
        _ => 1.0,
    };
    (value * multiplier).round() as u64
}

/// Bytes from RouterOS memory sizes (`35.2MiB`, `1024KiB`, `2GB`, `512`).
pub fn parse_memory_size(raw: &str) -> u64 {
    let Some(caps) = NUMBER_WITH_UNIT.captures(raw) else {
        return 0;
    };
    let value: f64 = caps[1].parse().unwrap_or(0.0);
    let multiplier = match caps[2].to_ascii_lowercase().as_str() {
        "kib" => 1024.0,
        "mib" => 1024.0 * 1024.0,
        "gib" => 1024.0 * 1024.0 * 1024.0,
        "tib" => 1024.0 * 1024.0 * 1024.0 * 1024.0,
        "kb" | "k" => 1e3,
        "mb" | "m" => 1e6,
        "gb" | "g" => 1e9,
        _ => 1.0,
    };
    (value * multiplier).round() as u64
}

/// Seconds from `1w2d3h4m5s`, `2d03:04:05` or `03:04:05`.
///
/// A value that overflows `u64` reads as 0.
pub fn parse_uptime(raw: &str) -> u64 {
    uptime_secs(raw.trim()).unwrap_or(0)
}

fn uptime_secs(raw: &str) -> Option<u64> {
    let mut total = 0u64;
    for cap in UPTIME_PART.captures_iter(raw) {
        let n: u64 = cap[1].parse().ok()?;
        let unit: u64 = match &cap[2] {
            "w" => 7 * 86_400,
            "d" => 86_400,
            "h" => 3_600,
            "m" => 60,
            _ => 1,
        };
        total = total.checked_add(n.checked_mul(unit)?)?;
    }
    if let Some(cap) = CLOCK.captures(raw) {
        // hours are optional: `mm:ss`
        let h: u64 = match cap.get(1) {
            Some(m) => m.as_str().parse().ok()?,
            None => 0,
        };
        let m: u64 = cap[2].parse().ok()?;
        let s: u64 = cap[3].parse().ok()?;
        total = total
            .checked_add(h.checked_mul(3_600)?)?
            .checked_add(m * 60 + s)?;
    }
    Some(total)
}

/// `3%` → 3. Values above 100 are clamped.
pub fn parse_percent(raw: &str) -> u8 {
    raw.trim()
        .trim_end_matches('%')
        .trim()
        .parse::<u32>()
        .map_or(0, |v| v.min(100) as u8)
}

/// Traffic rates of one interface.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Bandwidth {
    pub interface: String,
    pub rx_bps: u64,
    pub tx_bps: u64,
}

/// Parses `/interface monitor-traffic <if> once` in either the field-line
/// or the attribute shape. `None` when no rate is present.
pub fn parse_monitor_traffic(text: &str) -> Option<Bandwidth> {
    let mut fields = parse_field_lines(text);
    if fields.get("rx-bits-per-second").is_none() && fields.get("tx-bits-per-second").is_none() {
        fields = parse_attributes(text).into_iter().collect();
    }
    let rx = fields.get("rx-bits-per-second");
    let tx = fields.get("tx-bits-per-second");
    if rx.is_none() && tx.is_none() {
        return None;
    }
    Some(Bandwidth {
        interface: fields.get_or_empty("name").to_string(),
        rx_bps: rx.map_or(0, parse_bits_per_second),
        tx_bps: tx.map_or(0, parse_bits_per_second),
    })
}

/// `/system resource print` summary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SystemInfo {
    pub uptime: String,
    pub uptime_secs: u64,
    pub version: String,
    pub board_name: String,
    pub architecture: String,
    pub cpu_load: u8,
    pub free_memory: u64,
    pub total_memory: u64,
    pub free_hdd_space: u64,
    pub total_hdd_space: u64,
}

pub fn parse_system_resource(text: &str) -> Option<SystemInfo> {
    let mut fields = parse_field_lines(text);
    if fields.get("uptime").is_none() && fields.get("version").is_none() {
        fields = parse_attributes(text).into_iter().collect();
    }
    if fields.get("uptime").is_none() && fields.get("version").is_none() {
        return None;
    }
    let uptime = fields.get_or_empty("uptime").to_string();
    Some(SystemInfo {
        uptime_secs: parse_uptime(&uptime),
        uptime,
        version: fields.get_or_empty("version").to_string(),
        board_name: fields.get_or_empty("board-name").to_string(),
        architecture: fields.get_or_empty("architecture-name").to_string(),
        cpu_load: parse_percent(fields.get_or_empty("cpu-load")),
        free_memory: parse_memory_size(fields.get_or_empty("free-memory")),
        total_memory: parse_memory_size(fields.get_or_empty("total-memory")),
        free_hdd_space: parse_memory_size(fields.get_or_empty("free-hdd-space")),
        total_hdd_space: parse_memory_size(fields.get_or_empty("total-hdd-space")),
    })
}

/// An IP address pool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct IpPool {
    pub name: String,
    pub ranges: Vec<String>,
    pub next_pool: Option<String>,
}

fn pool_from(record: &Record) -> Option<IpPool> {
    let name = record.get("name").filter(|n| !n.is_empty())?;
    let ranges = record
        .get_or_empty("ranges")
        .split(',')
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(str::to_string)
        .collect();
    let next_pool = record
        .get("next-pool")
        .filter(|p| !p.is_empty() && *p != "none")
        .map(str::to_string);
    Some(IpPool {
        name: name.to_string(),
        ranges,
        next_pool,
    })
}

/// Pools from `print detail` output. `None` when nothing was recognised.
pub fn parse_pool_details(text: &str) -> Option<Vec<IpPool>> {
    let pools: Vec<IpPool> = parse_detail_blocks(text).iter().filter_map(pool_from).collect();
    (!pools.is_empty()).then_some(pools)
}

/// Pools from the tabular `print` output.
pub fn parse_pool_table(text: &str) -> Option<Vec<IpPool>> {
    let pools: Vec<IpPool> = parse_table(text).iter().filter_map(pool_from).collect();
    (!pools.is_empty()).then_some(pools)
}

/// A secret as seen through the console.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ConsoleSecret {
    pub name: String,
    pub service: String,
    pub profile: String,
    pub disabled: bool,
    pub last_logged_out: Option<String>,
    pub comment: Option<String>,
}

fn secret_from(record: &Record) -> Option<ConsoleSecret> {
    let name = record.get("name").filter(|n| !n.is_empty())?;
    Some(ConsoleSecret {
        name: name.to_string(),
        service: record.get_or_empty("service").to_string(),
        profile: record.get_or_empty("profile").to_string(),
        disabled: record.get_bool("disabled"),
        last_logged_out: record
            .get("last-logged-out")
            .filter(|v| !v.is_empty() && *v != "never")
            .map(str::to_string),
        comment: record
            .get("comment")
            .filter(|v| !v.is_empty())
            .map(str::to_string),
    })
}

/// Secrets from `/ppp secret print detail`.
pub fn parse_secret_details(text: &str) -> Option<Vec<ConsoleSecret>> {
    let secrets: Vec<ConsoleSecret> = parse_detail_blocks(text)
        .iter()
        .filter_map(secret_from)
        .collect();
    (!secrets.is_empty()).then_some(secrets)
}

/// Secrets from `/ppp secret print terse`.
pub fn parse_secret_terse(text: &str) -> Option<Vec<ConsoleSecret>> {
    let secrets: Vec<ConsoleSecret> = text
        .lines()
        .filter_map(parse_terse_line)
        .filter_map(|r| secret_from(&r))
        .collect();
    (!secrets.is_empty()).then_some(secrets)
}

/// Names of active PPP sessions, from detail or tabular output.
pub fn parse_active_names(text: &str) -> Option<HashSet<String>> {
    let mut names: HashSet<String> = parse_detail_blocks(text)
        .iter()
        .filter_map(|r| r.get("name").map(str::to_string))
        .collect();
    if names.is_empty() {
        names = parse_table(text)
            .iter()
            .filter_map(|r| r.get("name").filter(|n| !n.is_empty()).map(str::to_string))
            .collect();
    }
    (!names.is_empty()).then_some(names)
}
