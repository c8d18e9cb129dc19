use std::fmt;

use tracing::debug;
use url::Url;

use crate::http::HttpClient;

pub const DEFAULT_MAX_HOPS: u32 = 15;

/// Returns `true` if the HTTP status code indicates a redirect.
///
/// ```
/// use pkgmirror_fetch::is_redirect;
///
/// assert!(is_redirect(301));
/// assert!(is_redirect(308));
/// assert!(!is_redirect(200));
/// assert!(!is_redirect(304));
/// ```
pub fn is_redirect(status: u16) -> bool {
    matches!(status, 301 | 302 | 303 | 307 | 308)
}

/// The true location and name of a downloadable file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedDownload {
    pub url: String,
    pub filename: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UnresolvedReason {
    TooManyHops,
    MissingLocation,
    RemovedFile,
    NotAvailable { status: u16 },
    Transport(String),
    Malformed(String),
    NoFilename,
}

impl fmt::Display for UnresolvedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooManyHops => f.write_str("too many redirects"),
            Self::MissingLocation => f.write_str("redirect without a Location header"),
            Self::RemovedFile => f.write_str("redirected to a removed file"),
            Self::NotAvailable { status } => write!(f, "download not available (HTTP {status})"),
            Self::Transport(message) => write!(f, "transport failure: {message}"),
            Self::Malformed(message) => write!(f, "malformed URL: {message}"),
            Self::NoFilename => f.write_str("no file name in URL"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolution {
    Resolved(ResolvedDownload),
    Unresolved(UnresolvedReason),
}

/// Host rewrite applied before every hop.
///
/// Fires when the URL contains both `host` and `marker`; the host is replaced
/// and `strip` is cut out of the URL.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RewriteRule {
    pub host: String,
    pub marker: String,
    pub replacement_host: String,
    pub strip: Option<String>,
}

impl RewriteRule {
    /// Send SourceForge project downloads straight to a file mirror.
    pub fn sourceforge_mirror() -> Self {
        Self {
            host: "downloads.sourceforge.net".into(),
            marker: "project".into(),
            replacement_host: "garr.dl.sourceforge.net".into(),
            strip: Some("?download=".into()),
        }
    }

    pub fn apply(&self, url: &str) -> Option<String> {
        if !url.contains(&self.host) || !url.contains(&self.marker) {
            return None;
        }
        let mut rewritten = url.replacen(&self.host, &self.replacement_host, 1);
        if let Some(strip) = &self.strip {
            rewritten = rewritten.replace(strip.as_str(), "");
        }
        Some(rewritten)
    }
}

/// A redirect target that means the file was withdrawn upstream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemovedMarker {
    pub host: String,
    pub path: String,
}

impl RemovedMarker {
    pub fn sourceforge_old_files() -> Self {
        Self {
            host: "sourceforge.net".into(),
            path: "/OldFiles/".into(),
        }
    }

    pub fn matches(&self, url: &str) -> bool {
        url.contains(&self.host) && url.contains(&self.path)
    }
}

#[derive(Clone, Debug)]
pub struct RedirectPolicy {
    pub max_hops: u32,
    pub rewrite_rules: Vec<RewriteRule>,
    pub removed_markers: Vec<RemovedMarker>,
}

impl Default for RedirectPolicy {
    fn default() -> Self {
        Self {
            max_hops: DEFAULT_MAX_HOPS,
            rewrite_rules: vec![RewriteRule::sourceforge_mirror()],
            removed_markers: vec![RemovedMarker::sourceforge_old_files()],
        }
    }
}

impl RedirectPolicy {
    pub fn with_max_hops(mut self, max_hops: u32) -> Self {
        self.max_hops = max_hops;
        self
    }

    fn rewrite(&self, url: String) -> String {
        self.rewrite_rules
            .iter()
            .fold(url, |url, rule| rule.apply(&url).unwrap_or(url))
    }

    fn is_removed(&self, url: &str) -> bool {
        self.removed_markers.iter().any(|m| m.matches(url))
    }
}

/// Follows HEAD redirects until a URL names its file.
///
/// A URL without a query string is taken at face value and costs no network
/// call. Otherwise each HEAD spends one hop from the budget.
#[derive(Clone, Debug)]
pub struct RedirectResolver<C> {
    client: C,
    policy: RedirectPolicy,
}

impl<C: HttpClient> RedirectResolver<C> {
    pub fn new(client: C, policy: RedirectPolicy) -> Self {
        Self { client, policy }
    }

    pub fn policy(&self) -> &RedirectPolicy {
        &self.policy
    }

    pub async fn resolve(&self, raw_url: &str) -> Resolution {
        use Resolution::Unresolved;

        let mut current = raw_url.to_string();
        let mut hops = 0;
        loop {
            current = self.policy.rewrite(current);
            let parsed = match Url::parse(&current) {
                Ok(url) => url,
                Err(e) => return Unresolved(UnresolvedReason::Malformed(e.to_string())),
            };
            if parsed.query().is_none() {
                return resolved(current, file_name(&parsed));
            }

            if hops >= self.policy.max_hops {
                return Unresolved(UnresolvedReason::TooManyHops);
            }
            hops += 1;

            debug!(url = %current, hop = hops, "probing for file name");
            let head = match self.client.head(&current).await {
                Ok(head) => head,
                Err(e) => return Unresolved(UnresolvedReason::Transport(e.to_string())),
            };

            match head.status {
                status if is_redirect(status) => {
                    let Some(location) = head.location else {
                        return Unresolved(UnresolvedReason::MissingLocation);
                    };
                    let next = match parsed.join(&location) {
                        Ok(next) => next,
                        Err(e) => return Unresolved(UnresolvedReason::Malformed(e.to_string())),
                    };
                    if self.policy.is_removed(next.as_str()) {
                        return Unresolved(UnresolvedReason::RemovedFile);
                    }
                    current = next.into();
                }
                200 => {
                    let filename = head
                        .content_disposition
                        .as_deref()
                        .and_then(filename_from_disposition)
                        .or_else(|| file_name(&parsed));
                    return resolved(current, filename);
                }
                status => return Unresolved(UnresolvedReason::NotAvailable { status }),
            }
        }
    }

    /// Size reported by a HEAD on `url`, when the server answers 200 with a
    /// `Content-Length`.
    pub async fn probe_size(&self, url: &str) -> Option<u64> {
        match self.client.head(url).await {
            Ok(head) if head.status == 200 => head.content_length,
            Ok(_) => None,
            Err(e) => {
                debug!(url, error = %e, "size probe failed");
                None
            }
        }
    }
}

fn resolved(url: String, filename: Option<String>) -> Resolution {
    match filename {
        Some(filename) => Resolution::Resolved(ResolvedDownload { url, filename }),
        None => Resolution::Unresolved(UnresolvedReason::NoFilename),
    }
}

/// Last path segment of `url`, ignoring query and fragment.
pub fn file_name(url: &Url) -> Option<String> {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}

/// Filename from a `Content-Disposition` value.
///
/// An extended `filename*=charset'lang'value` parameter wins over a plain
/// `filename`. Each may appear at most once. Empty names and names with path
/// separators are rejected.
pub fn filename_from_disposition(value: &str) -> Option<String> {
    let mut plain = Vec::new();
    let mut extended = Vec::new();
    for part in value.split(';').map(str::trim) {
        let Some((key, raw)) = part.split_once('=') else {
            continue;
        };
        match key.trim().to_ascii_lowercase().as_str() {
            "filename" => plain.push(raw.trim().trim_matches('"')),
            "filename*" => extended.push(raw.trim()),
            _ => {}
        }
    }

    let name = match (plain.as_slice(), extended.as_slice()) {
        (_, [raw]) => decode_extended(raw)?,
        ([raw], []) => raw.to_string(),
        _ => return None,
    };
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
        return None;
    }
    Some(name)
}

/// Decode an RFC 5987 `charset'lang'pct-encoded` value.
fn decode_extended(raw: &str) -> Option<String> {
    let mut parts = raw.trim_matches('"').splitn(3, '\'');
    let (charset, _lang, encoded) = (parts.next()?, parts.next()?, parts.next()?);

    let mut bytes = Vec::with_capacity(encoded.len());
    let mut rest = encoded.as_bytes();
    while let Some((&b, tail)) = rest.split_first() {
        if b == b'%' {
            let hex = tail.get(..2)?;
            let hex = std::str::from_utf8(hex).ok()?;
            bytes.push(u8::from_str_radix(hex, 16).ok()?);
            rest = &tail[2..];
        } else {
            bytes.push(b);
            rest = tail;
        }
    }

    if charset.eq_ignore_ascii_case("iso-8859-1") {
        Some(bytes.into_iter().map(char::from).collect())
    } else {
        String::from_utf8(bytes).ok()
    }
}
