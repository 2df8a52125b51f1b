//! Passenger status document model and decoder.
//!
//! `passenger-status --show=xml` prints an XML document with a declared
//! character encoding (usually `iso8859-1`). This module decodes that
//! document into a [`Snapshot`]: the pool-wide scalars plus one [`Group`]
//! per application, each carrying its live [`ProcessRecord`]s in the order
//! Passenger reports them.

use encoding_rs::{Encoding, UTF_8};
use serde::Deserialize;

use crate::error::ParseError;

/// One decoded, immutable view of the process pool.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub version: String,
    pub top_level_queue_size: u64,
    pub max_process_count: u64,
    pub current_process_count: u64,
    pub app_group_count: u64,
    pub capacity_used: u64,
    pub groups: Vec<Group>,
}

impl Snapshot {
    /// All processes of all groups, in document order.
    pub fn processes(&self) -> impl Iterator<Item = &ProcessRecord> {
        self.groups.iter().flat_map(|g| g.processes.iter())
    }
}

/// One application group.
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub name: String,
    pub state: String,
    pub app_root: String,
    pub app_type: String,
    pub environment: String,
    pub life_status: String,
    pub capacity_used: u64,
    pub request_queue_size: u64,
    pub processes_spawning: u64,
    pub processes: Vec<ProcessRecord>,
}

/// One live OS process serving a group.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessRecord {
    pub pid: String,
    pub requests_processed: u64,
    pub spawn_start_time_micros: i64,
    /// Memory as reported in `real_memory`.
    pub resident_memory: u64,
    pub sessions: u64,
    pub busyness: i64,
    pub concurrency: u64,
    pub cpu: u64,
    pub rss: u64,
    pub swap: u64,
    pub life_status: String,
    pub enabled: String,
    pub uptime: String,
}

/// Decodes raw status command output into a [`Snapshot`].
///
/// The character encoding comes from a byte-order mark if present, else from
/// the XML declaration, else UTF-8. Missing required elements, unknown
/// encodings and malformed markup all fail; nothing is partially recovered.
pub fn parse(bytes: &[u8]) -> Result<Snapshot, ParseError> {
    let text = decode(bytes)?;
    let raw: RawInfo = quick_xml::de::from_str(&text)?;
    Ok(raw.into())
}

fn decode(bytes: &[u8]) -> Result<String, ParseError> {
    let (encoding, bom_len) = match Encoding::for_bom(bytes) {
        Some(found) => found,
        None => match declared_encoding(bytes) {
            Some(label) => {
                let encoding = Encoding::for_label(label).ok_or_else(|| {
                    ParseError::UnknownEncoding(String::from_utf8_lossy(label).into_owned())
                })?;
                (encoding, 0)
            }
            None => (UTF_8, 0),
        },
    };

    encoding
        .decode_without_bom_handling_and_without_replacement(&bytes[bom_len..])
        .map(|text| text.into_owned())
        .ok_or(ParseError::InvalidEncoding(encoding.name()))
}

/// Extracts the `encoding` pseudo-attribute of a leading `<?xml ... ?>`.
fn declared_encoding(bytes: &[u8]) -> Option<&[u8]> {
    let rest = skip_ws(bytes);
    if !rest.starts_with(b"<?xml") {
        return None;
    }
    let end = rest.windows(2).position(|w| w == b"?>")?;
    let decl = &rest[..end];

    let at = decl.windows(8).position(|w| w == b"encoding")?;
    let after = skip_ws(&decl[at + 8..]);
    let after = skip_ws(after.strip_prefix(b"=")?);
    let (&quote, value) = after.split_first()?;
    if quote != b'"' && quote != b'\'' {
        return None;
    }
    let len = value.iter().position(|&b| b == quote)?;
    Some(&value[..len])
}

fn skip_ws(bytes: &[u8]) -> &[u8] {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    &bytes[start..]
}

// Wire shapes. Only the elements we consume are mapped; serde skips the rest.

#[derive(Deserialize)]
struct RawInfo {
    passenger_version: String,
    group_count: u64,
    process_count: u64,
    max: u64,
    #[serde(default)]
    capacity_used: u64,
    get_wait_list_size: u64,
    #[serde(default)]
    supergroups: RawSuperGroups,
}

#[derive(Deserialize, Default)]
struct RawSuperGroups {
    #[serde(default)]
    supergroup: Vec<RawSuperGroup>,
}

#[derive(Deserialize)]
struct RawSuperGroup {
    name: String,
    #[serde(default)]
    state: String,
    group: RawGroup,
}

#[derive(Deserialize)]
struct RawGroup {
    #[serde(default)]
    app_root: String,
    #[serde(default)]
    app_type: String,
    #[serde(default)]
    environment: String,
    #[serde(default)]
    life_status: String,
    #[serde(default)]
    capacity_used: u64,
    get_wait_list_size: u64,
    processes_being_spawned: u64,
    #[serde(default)]
    processes: RawProcesses,
}

#[derive(Deserialize, Default)]
struct RawProcesses {
    #[serde(default)]
    process: Vec<RawProcess>,
}

#[derive(Deserialize)]
struct RawProcess {
    pid: String,
    processed: u64,
    spawn_start_time: i64,
    real_memory: u64,
    #[serde(default)]
    sessions: u64,
    #[serde(default)]
    busyness: i64,
    #[serde(default)]
    concurrency: u64,
    #[serde(default)]
    cpu: u64,
    #[serde(default)]
    rss: u64,
    #[serde(default)]
    swap: u64,
    #[serde(default)]
    life_status: String,
    #[serde(default)]
    enabled: String,
    #[serde(default)]
    uptime: String,
}

impl From<RawInfo> for Snapshot {
    fn from(raw: RawInfo) -> Self {
        Snapshot {
            version: raw.passenger_version,
            top_level_queue_size: raw.get_wait_list_size,
            max_process_count: raw.max,
            current_process_count: raw.process_count,
            app_group_count: raw.group_count,
            capacity_used: raw.capacity_used,
            groups: raw
                .supergroups
                .supergroup
                .into_iter()
                .map(Group::from)
                .collect(),
        }
    }
}

impl From<RawSuperGroup> for Group {
    fn from(sg: RawSuperGroup) -> Self {
        let group = sg.group;
        Group {
            name: sg.name,
            state: sg.state,
            app_root: group.app_root,
            app_type: group.app_type,
            environment: group.environment,
            life_status: group.life_status,
            capacity_used: group.capacity_used,
            request_queue_size: group.get_wait_list_size,
            processes_spawning: group.processes_being_spawned,
            processes: group
                .processes
                .process
                .into_iter()
                .map(ProcessRecord::from)
                .collect(),
        }
    }
}

impl From<RawProcess> for ProcessRecord {
    fn from(p: RawProcess) -> Self {
        ProcessRecord {
            pid: p.pid,
            requests_processed: p.processed,
            spawn_start_time_micros: p.spawn_start_time,
            resident_memory: p.real_memory,
            sessions: p.sessions,
            busyness: p.busyness,
            concurrency: p.concurrency,
            cpu: p.cpu,
            rss: p.rss,
            swap: p.swap,
            life_status: p.life_status,
            enabled: p.enabled,
            uptime: p.uptime,
        }
    }
}
