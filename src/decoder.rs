use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use chrono::{DateTime, NaiveDateTime};
use thiserror::Error;

// Minimal reader for DLT storage files: each record is a 16-byte storage
// header (magic, epoch seconds, microseconds, ECU id) followed by the wire
// message (standard header, optional extended header, payload). Forward-only,
// one pass; a malformed record terminates iteration without invalidating
// records already produced.

pub const STORAGE_MAGIC: [u8; 4] = *b"DLT\x01";

const UEH: u8 = 0x01;
const WEID: u8 = 0x04;
const WSID: u8 = 0x08;
const WTMS: u8 = 0x10;

const TYPE_STRG: u32 = 0x0000_0200;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("read failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("bad storage magic at record {0}")]
    BadMagic(usize),
    #[error("truncated record {0}")]
    Truncated(usize),
    #[error("record {0} declares impossible length {1}")]
    BadLength(usize, u16),
}

#[derive(Clone, Debug)]
pub struct DltRecord {
    pub time: NaiveDateTime,
    pub ecu: String,
    pub app_id: String,
    pub context_id: String,
    pub kind: String,
    pub payload: String,
}

impl DltRecord {
    /// Render one text line. The first two tokens carry the storage timestamp
    /// in the format the failure scanner parses.
    pub fn to_line(&self) -> String {
        format!("{} {} {} {} {} {}", self.time.format("%Y/%m/%d %H:%M:%S%.6f"), self.ecu, self.app_id, self.context_id, self.kind, self.payload)
    }
}

pub struct DltReader<R: Read> {
    inner: R,
    index: usize,
    failed: bool,
}

impl DltReader<BufReader<File>> {
    pub fn open(path: &Path) -> std::io::Result<Self> {
        Ok(DltReader::new(BufReader::new(File::open(path)?)))
    }
}

impl<R: Read> DltReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner, index: 0, failed: false }
    }

    fn read_or_truncated(&mut self, buf: &mut [u8]) -> Result<(), DecodeError> {
        self.inner.read_exact(buf).map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof { DecodeError::Truncated(self.index) } else { DecodeError::Io(e) }
        })
    }

    fn read_record(&mut self) -> Result<Option<DltRecord>, DecodeError> {
        let mut storage = [0u8; 16];
        let n = read_full(&mut self.inner, &mut storage)?;
        if n == 0 { return Ok(None); }
        if n < storage.len() { return Err(DecodeError::Truncated(self.index)); }
        if storage[0..4] != STORAGE_MAGIC { return Err(DecodeError::BadMagic(self.index)); }
        let secs = u32::from_le_bytes(storage[4..8].try_into().unwrap());
        let micros = i32::from_le_bytes(storage[8..12].try_into().unwrap());
        let mut ecu = ascii_id(&storage[12..16]);
        let mut std_head = [0u8; 4];
        self.read_or_truncated(&mut std_head)?;
        let htyp = std_head[0];
        let len = u16::from_be_bytes([std_head[2], std_head[3]]);
        if (len as usize) < std_head.len() { return Err(DecodeError::BadLength(self.index, len)); }
        let mut body = vec![0u8; len as usize - std_head.len()];
        self.read_or_truncated(&mut body)?;

        let mut off = 0usize;
        if htyp & WEID != 0 {
            let b = take(&body, &mut off, 4).ok_or(DecodeError::Truncated(self.index))?;
            ecu = ascii_id(b);
        }
        if htyp & WSID != 0 { take(&body, &mut off, 4).ok_or(DecodeError::Truncated(self.index))?; }
        if htyp & WTMS != 0 { take(&body, &mut off, 4).ok_or(DecodeError::Truncated(self.index))?; }
        let mut app_id = "----".to_string();
        let mut context_id = "----".to_string();
        let mut kind = "log".to_string();
        let mut verbose = false;
        let mut noar = 0u8;
        if htyp & UEH != 0 {
            let ext = take(&body, &mut off, 10).ok_or(DecodeError::Truncated(self.index))?;
            let msin = ext[0];
            noar = ext[1];
            app_id = ascii_id(&ext[2..6]);
            context_id = ascii_id(&ext[6..10]);
            verbose = msin & 0x01 != 0;
            kind = kind_name(msin);
        }
        let payload = if verbose { render_verbose(&body[off..], noar) } else { render_plain(&body[off..]) };
        let time = DateTime::from_timestamp(secs as i64, micros.clamp(0, 999_999) as u32 * 1000)
            .map(|dt| dt.naive_utc())
            .unwrap_or_default();
        Ok(Some(DltRecord { time, ecu, app_id, context_id, kind, payload }))
    }
}

impl<R: Read> Iterator for DltReader<R> {
    type Item = Result<DltRecord, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed { return None; }
        match self.read_record() {
            Ok(Some(rec)) => { self.index += 1; Some(Ok(rec)) }
            Ok(None) => None,
            Err(e) => { self.failed = true; Some(Err(e)) }
        }
    }
}

fn read_full<R: Read>(r: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut n = 0;
    while n < buf.len() {
        let k = r.read(&mut buf[n..])?;
        if k == 0 { break; }
        n += k;
    }
    Ok(n)
}

fn take<'a>(buf: &'a [u8], off: &mut usize, n: usize) -> Option<&'a [u8]> {
    if *off + n > buf.len() { return None; }
    let out = &buf[*off..*off + n];
    *off += n;
    Some(out)
}

fn ascii_id(b: &[u8]) -> String {
    let s: String = b.iter().take_while(|c| **c != 0).map(|c| if c.is_ascii_graphic() { *c as char } else { '?' }).collect();
    if s.is_empty() { "----".to_string() } else { s }
}

fn kind_name(msin: u8) -> String {
    let kind = match (msin >> 1) & 0x07 { 0 => "log", 1 => "app_trace", 2 => "nw_trace", 3 => "control", _ => "reserved" };
    let detail = match ((msin >> 1) & 0x07, (msin >> 4) & 0x0f) {
        (0, 1) => "fatal",
        (0, 2) => "error",
        (0, 3) => "warn",
        (0, 4) => "info",
        (0, 5) => "debug",
        (0, 6) => "verbose",
        _ => return kind.to_string(),
    };
    format!("{} {}", kind, detail)
}

// Verbose payloads are typed argument lists; string arguments are the only
// kind these traces carry in practice, anything else falls back to a
// printable dump of the remaining bytes.
fn render_verbose(payload: &[u8], noar: u8) -> String {
    let mut off = 0usize;
    let mut parts: Vec<String> = Vec::new();
    for _ in 0..noar {
        let Some(ti_bytes) = take(payload, &mut off, 4) else { break };
        let ti = u32::from_le_bytes(ti_bytes.try_into().unwrap());
        if ti & TYPE_STRG != 0 {
            let Some(len_bytes) = take(payload, &mut off, 2) else { break };
            let n = u16::from_le_bytes(len_bytes.try_into().unwrap()) as usize;
            let Some(data) = take(payload, &mut off, n) else { break };
            let s = data.strip_suffix(&[0]).unwrap_or(data);
            parts.push(String::from_utf8_lossy(s).into_owned());
        } else {
            off -= 4;
            break;
        }
    }
    if off < payload.len() { parts.push(printable(&payload[off..])); }
    parts.join(" ")
}

// Non-verbose payloads lead with a 4-byte message id.
fn render_plain(payload: &[u8]) -> String {
    if payload.len() >= 4 {
        let id = u32::from_le_bytes(payload[0..4].try_into().unwrap());
        let rest = printable(&payload[4..]);
        if rest.is_empty() { format!("[{}]", id) } else { format!("[{}] {}", id, rest) }
    } else {
        printable(payload)
    }
}

fn printable(bytes: &[u8]) -> String {
    let text = String::from_utf8_lossy(bytes);
    text.chars().map(|c| if c.is_control() { ' ' } else { c }).collect::<String>().trim().to_string()
}

#[cfg(test)]
pub(crate) fn encode_record(time: NaiveDateTime, ecu: &str, app: &str, ctx: &str, level: u8, text: &str) -> Vec<u8> {
    let mut payload = Vec::new();
    payload.extend_from_slice(&TYPE_STRG.to_le_bytes());
    payload.extend_from_slice(&((text.len() + 1) as u16).to_le_bytes());
    payload.extend_from_slice(text.as_bytes());
    payload.push(0);

    let mut out = Vec::new();
    out.extend_from_slice(&STORAGE_MAGIC);
    out.extend_from_slice(&(time.and_utc().timestamp() as u32).to_le_bytes());
    out.extend_from_slice(&(time.and_utc().timestamp_subsec_micros() as i32).to_le_bytes());
    out.extend_from_slice(&id4(ecu));
    let len = (4 + 10 + payload.len()) as u16;
    out.push(UEH);
    out.push(0); // message counter
    out.extend_from_slice(&len.to_be_bytes());
    out.push(0x01 | (level << 4)); // verbose log message at the given level
    out.push(1); // one argument
    out.extend_from_slice(&id4(app));
    out.extend_from_slice(&id4(ctx));
    out.extend_from_slice(&payload);
    out
}

#[cfg(test)]
fn id4(s: &str) -> [u8; 4] {
    let mut b = [0u8; 4];
    for (i, c) in s.bytes().take(4).enumerate() { b[i] = c; }
    b
}
