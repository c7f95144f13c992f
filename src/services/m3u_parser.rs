use lazy_static::lazy_static;
use regex::Regex;
use sha1::{Digest, Sha1};
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::models::{Channel, PlaylistStats, DEFAULT_CATEGORY, RADIO_CATEGORY};

const M3U_HEADER: &str = "#EXTM3U";
const M3U_INFO: &str = "#EXTINF:";
const M3U_GROUP: &str = "#EXTGRP:";
const M3U_LOGO: &str = "#EXTIMG:";

// Defensive limits for streamed parsing
const MAX_LINE_BYTES: usize = 32 * 1024;
const READ_LINE_TIMEOUT: Duration = Duration::from_secs(10);

lazy_static! {
    /// Regex to parse EXTINF attributes (tvg-id="...", group-title="...", etc)
    static ref ATTR_REGEX: Regex = Regex::new(r#"(\w+(?:-\w+)*)="([^"]*)""#).unwrap();

    /// Regex to extract duration from EXTINF line
    static ref DURATION_REGEX: Regex = Regex::new(r"^\s*(-?\d+(?:\.\d+)?)").unwrap();
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Arquivo M3U inválido - cabeçalho #EXTM3U não encontrado")]
    MissingHeader,
    #[error("Nenhum canal válido encontrado na playlist")]
    NoChannels,
    #[error("Linha {line} excede o limite de {limit} bytes")]
    LineTooLong { line: usize, limit: usize },
    #[error("Tempo esgotado lendo a linha {0} da playlist")]
    ReadTimeout(usize),
    #[error("Erro de leitura da playlist: {0}")]
    Io(#[from] std::io::Error),
}

/// Parsed EXTINF line data
#[derive(Debug, Default)]
struct ExtinfData {
    duration: f64,
    attributes: HashMap<String, String>,
    title: String,
}

/// Position of the first comma that is not inside a quoted attribute value
fn find_title_separator(content: &str) -> Option<usize> {
    let mut in_quotes = false;
    for (idx, c) in content.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => return Some(idx),
            _ => {}
        }
    }
    None
}

/// Parse an EXTINF line
/// Format: #EXTINF:duration tvg-id="..." tvg-name="..." tvg-logo="..." group-title="...",Title
fn parse_extinf(line: &str) -> Option<ExtinfData> {
    let content = line.strip_prefix(M3U_INFO)?;

    let (header, title) = match find_title_separator(content) {
        Some(comma) => (&content[..comma], content[comma + 1..].trim()),
        None => (content, ""),
    };

    let duration = DURATION_REGEX
        .captures(header)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(-1.0);

    // A repeated attribute keeps its first value
    let mut attributes = HashMap::new();
    for caps in ATTR_REGEX.captures_iter(header) {
        attributes
            .entry(caps[1].to_ascii_lowercase())
            .or_insert_with(|| caps[2].to_string());
    }

    Some(ExtinfData {
        duration,
        attributes,
        title: title.to_string(),
    })
}

/// Generate SHA1 hash of playlist text, used as import fingerprint
pub fn hash_content(content: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Accumulates one channel between its EXTINF line and its URL line
#[derive(Debug)]
struct ChannelBuilder {
    id: i64,
    name: String,
    description: String,
    url: String,
    category: String,
    logo_url: Option<String>,
    is_live: bool,
    group_title: Option<String>,
    tvg_id: Option<String>,
    tvg_name: Option<String>,
    language: Option<String>,
    country: Option<String>,
}

impl ChannelBuilder {
    fn new(id: i64) -> Self {
        Self {
            id,
            name: String::new(),
            description: String::new(),
            url: String::new(),
            category: DEFAULT_CATEGORY.to_string(),
            logo_url: None,
            is_live: true,
            group_title: None,
            tvg_id: None,
            tvg_name: None,
            language: None,
            country: None,
        }
    }

    fn from_extinf(id: i64, extinf: ExtinfData) -> Self {
        let mut builder = Self::new(id);
        builder.name = extinf.title;
        builder.is_live = extinf.duration == -1.0;

        let attr = |key: &str| {
            extinf
                .attributes
                .get(key)
                .filter(|v| !v.trim().is_empty())
                .cloned()
        };

        builder.tvg_id = attr("tvg-id");
        builder.tvg_name = attr("tvg-name");
        builder.logo_url = attr("tvg-logo");
        builder.language = attr("tvg-language");
        builder.country = attr("tvg-country");

        if let Some(group) = attr("group-title") {
            builder.category = group.clone();
            builder.group_title = Some(group);
        }

        if attr("radio").is_some_and(|radio| radio.eq_ignore_ascii_case("true")) {
            builder.category = RADIO_CATEGORY.to_string();
            builder.is_live = true;
        }

        builder
    }

    fn build(self) -> Channel {
        let name = if self.name.trim().is_empty() {
            format!("Canal {}", self.id)
        } else {
            self.name
        };

        Channel {
            id: self.id,
            description: self.description,
            category: self.category,
            tvg_logo: self.logo_url.clone(),
            logo_url: self.logo_url,
            is_live: self.is_live,
            group_title: self.group_title,
            tvg_id: self.tvg_id,
            tvg_name: self.tvg_name,
            language: self.language,
            country: self.country,
            ..Channel::new(name, self.url)
        }
    }
}

/// Line-by-line parser state shared by the in-memory and streamed entry points
#[derive(Debug, Default)]
struct PlaylistAccumulator {
    line_number: usize,
    found_header: bool,
    next_id: i64,
    current: Option<ChannelBuilder>,
    channels: Vec<Channel>,
    seen_urls: HashSet<String>,
    duplicates_skipped: usize,
    invalid_skipped: usize,
}

impl PlaylistAccumulator {
    fn new() -> Self {
        Self {
            next_id: 1,
            ..Default::default()
        }
    }

    fn push_line(&mut self, raw: &str) -> Result<(), ParseError> {
        self.line_number += 1;
        let trimmed = raw.trim().trim_start_matches('\u{feff}').trim();

        if !self.found_header {
            if trimmed.is_empty() {
                return Ok(());
            }
            if !trimmed.starts_with(M3U_HEADER) {
                return Err(ParseError::MissingHeader);
            }
            self.found_header = true;
            return Ok(());
        }

        if trimmed.is_empty() {
            return Ok(());
        }

        if trimmed.starts_with(M3U_INFO) {
            let id = self.next_id;
            self.next_id += 1;
            self.current = parse_extinf(trimmed).map(|extinf| ChannelBuilder::from_extinf(id, extinf));
            return Ok(());
        }

        if let Some(group) = trimmed.strip_prefix(M3U_GROUP) {
            if let Some(builder) = self.current.as_mut() {
                builder.group_title = Some(group.trim().to_string());
            }
            return Ok(());
        }

        if let Some(logo) = trimmed.strip_prefix(M3U_LOGO) {
            if let Some(builder) = self.current.as_mut() {
                builder.logo_url = Some(logo.trim().to_string());
            }
            return Ok(());
        }

        if trimmed.starts_with("http") {
            if let Some(builder) = self.current.take() {
                self.complete(builder, trimmed);
            }
            return Ok(());
        }

        if trimmed.starts_with('#') {
            return Ok(());
        }

        // Non-HTTP stream (rtmp://, udp://, relative path)
        if self.current.is_some() && trimmed.contains('.') {
            if let Some(builder) = self.current.take() {
                self.complete(builder, trimmed);
            }
        }

        Ok(())
    }

    fn complete(&mut self, mut builder: ChannelBuilder, url: &str) {
        builder.url = url.to_string();
        let channel = builder.build();

        if !channel.is_valid() {
            self.invalid_skipped += 1;
            tracing::warn!(line = self.line_number, name = %channel.name, "Invalid channel skipped");
            return;
        }

        if !self.seen_urls.insert(channel.url.clone()) {
            self.duplicates_skipped += 1;
            return;
        }

        self.channels.push(channel);
    }

    fn finish(self) -> Result<Vec<Channel>, ParseError> {
        if !self.found_header {
            return Err(ParseError::MissingHeader);
        }

        tracing::debug!(
            channels = self.channels.len(),
            duplicates = self.duplicates_skipped,
            invalid = self.invalid_skipped,
            lines = self.line_number,
            "Playlist parsed"
        );

        if self.channels.is_empty() {
            return Err(ParseError::NoChannels);
        }

        Ok(self.channels)
    }
}

/// Channels read from a streamed source plus the fingerprint of the raw bytes
#[derive(Debug)]
pub struct ParsedPlaylist {
    pub channels: Vec<Channel>,
    pub content_hash: String,
}

/// M3U/M3U8 playlist parser
#[derive(Debug, Clone)]
pub struct M3UParser {
    max_line_bytes: usize,
    line_timeout: Duration,
}

impl Default for M3UParser {
    fn default() -> Self {
        Self {
            max_line_bytes: MAX_LINE_BYTES,
            line_timeout: READ_LINE_TIMEOUT,
        }
    }
}

impl M3UParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse playlist text into channels, de-duplicated by URL
    pub fn parse(&self, content: &str) -> Result<Vec<Channel>, ParseError> {
        let mut acc = PlaylistAccumulator::new();
        for line in content.lines() {
            acc.push_line(line)?;
        }
        acc.finish()
    }

    /// Parse a streamed playlist (file or HTTP body) line by line
    pub async fn parse_reader<R>(&self, mut reader: R) -> Result<ParsedPlaylist, ParseError>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut acc = PlaylistAccumulator::new();
        let mut hasher = Sha1::new();
        let mut buf = Vec::new();

        loop {
            buf.clear();

            let read = tokio::time::timeout(self.line_timeout, reader.read_until(b'\n', &mut buf))
                .await
                .map_err(|_| ParseError::ReadTimeout(acc.line_number + 1))??;

            if read == 0 {
                break;
            }

            if buf.len() > self.max_line_bytes {
                return Err(ParseError::LineTooLong {
                    line: acc.line_number + 1,
                    limit: self.max_line_bytes,
                });
            }

            hasher.update(&buf);
            acc.push_line(&String::from_utf8_lossy(&buf))?;
        }

        let channels = acc.finish()?;
        Ok(ParsedPlaylist {
            channels,
            content_hash: format!("{:x}", hasher.finalize()),
        })
    }

    /// Quick structural check used before importing raw content
    pub fn is_valid_m3u(&self, content: &str) -> bool {
        content.trim().trim_start_matches('\u{feff}').trim_start().starts_with(M3U_HEADER)
            && content.contains(M3U_INFO)
            && content.contains("http")
    }

    /// Statistics of a playlist; empty stats when it does not parse
    pub fn playlist_stats(&self, content: &str) -> PlaylistStats {
        match self.parse(content) {
            Ok(channels) => PlaylistStats::from_channels(&channels),
            Err(e) => {
                tracing::debug!("Stats requested for unparsable playlist: {}", e);
                PlaylistStats::default()
            }
        }
    }

    pub fn stats_for(&self, channels: &[Channel]) -> PlaylistStats {
        PlaylistStats::from_channels(channels)
    }
}
