use once_cell::sync::Lazy;
use pkgmirror_verify::Digest;
use regex::Regex;
use tracing::debug;
use url::Url;

static HREF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<a\s(?:[^>]*?\s)?href\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>]+))"#).unwrap()
});

/// Like [`HREF`], but also captures the anchor text.
static ANCHOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?is)<a\s(?:[^>]*?\s)?href\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>]+))[^>]*>(.*?)</a\s*>"#,
    )
    .unwrap()
});

/// Anchor texts marking a package's own download and home page links.
const EXTERNAL_MARKERS: &[&str] = &["download_url", "home_page"];

/// A downloadable link found on a package index page.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteReference {
    pub url: String,
    pub digest: Option<Digest>,
}

/// Globs restricting which artifact links are mirrored.
///
/// A link matches when a glob matches the whole URL, or when the glob's
/// literal tail is followed by a query string (`*.tar.gz` also accepts
/// `.../foo.tar.gz?download`).
#[derive(Clone, Debug, Default)]
pub struct FilenameFilter {
    patterns: Vec<(glob::Pattern, String)>,
}

impl FilenameFilter {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, glob::PatternError> {
        let patterns = patterns
            .iter()
            .map(|p| {
                let p = p.as_ref();
                let tail = format!("{}?", p.trim_start_matches('*'));
                glob::Pattern::new(p).map(|glob| (glob, tail))
            })
            .collect::<Result<_, _>>()?;
        Ok(Self { patterns })
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn matches(&self, url: &str) -> bool {
        if self.patterns.is_empty() {
            return true;
        }
        self.patterns
            .iter()
            .any(|(glob, tail)| glob.matches(url) || url.contains(tail.as_str()))
    }
}

/// Collect artifact links from an index page.
///
/// Relative links are resolved against `page_url`. A `#md5=` or `#sha256=`
/// fragment becomes the expected digest; links without one are kept only
/// when `include_undigested` is set.
pub fn scan_index(
    page_url: &Url,
    html: &str,
    filter: &FilenameFilter,
    include_undigested: bool,
) -> Vec<RemoteReference> {
    let mut refs = Vec::new();
    for caps in HREF.captures_iter(html) {
        let Some(mut url) = link_url(page_url, &caps) else {
            continue;
        };
        let digest = url.fragment().and_then(|f| Digest::from_fragment(f).ok());
        url.set_fragment(None);
        if digest.is_none() && !include_undigested {
            continue;
        }
        let url = String::from(url);
        if !filter.matches(&url) {
            continue;
        }
        refs.push(RemoteReference { url, digest });
    }
    refs
}

/// Collect the `download_url` and `home_page` links of an index page.
///
/// These point off the index and carry no digest. A link is kept only when
/// it names a file `filter` accepts, so an empty filter keeps nothing. Pages
/// behind the links are not crawled.
pub fn scan_external(page_url: &Url, html: &str, filter: &FilenameFilter) -> Vec<RemoteReference> {
    let mut refs: Vec<RemoteReference> = Vec::new();
    if filter.is_empty() {
        return refs;
    }
    for caps in ANCHOR.captures_iter(html) {
        let text = caps.get(4).map_or("", |m| m.as_str()).trim();
        if !EXTERNAL_MARKERS.iter().any(|marker| text.ends_with(marker)) {
            continue;
        }
        let Some(mut url) = link_url(page_url, &caps) else {
            continue;
        };
        url.set_fragment(None);
        let url = String::from(url);
        if !filter.matches(&url) || refs.iter().any(|r| r.url == url) {
            continue;
        }
        refs.push(RemoteReference { url, digest: None });
    }
    refs
}

fn link_url(page_url: &Url, caps: &regex::Captures<'_>) -> Option<Url> {
    let raw = caps.get(1).or(caps.get(2)).or(caps.get(3))?;
    let href = raw.as_str().trim().replace("&amp;", "&");
    if href.is_empty() {
        return None;
    }
    let url = match page_url.join(&href) {
        Ok(url) => url,
        Err(e) => {
            debug!(href, error = %e, "skipping unparsable link");
            return None;
        }
    };
    matches!(url.scheme(), "http" | "https").then_some(url)
}
