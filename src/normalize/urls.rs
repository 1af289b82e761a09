//! Classification of the links found in a record.

use std::collections::BTreeSet;

/// What a record link points to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlKind {
    /// Retrievable PDF fulltext
    Pdf,
    /// XML fulltext, attached as a hidden file
    Xml,
    /// Landing page (DOI resolver)
    Splash,
    /// Anything else
    Discarded,
}

/// Classify one link. The first matching rule wins: `pdf`, then `xml`,
/// then `dx.doi.org`, compared case-insensitively as substrings.
pub fn classify_url(url: &str) -> UrlKind {
    let lower = url.to_lowercase();
    if lower.contains("pdf") {
        UrlKind::Pdf
    } else if lower.contains("xml") {
        UrlKind::Xml
    } else if lower.contains("dx.doi.org") {
        UrlKind::Splash
    } else {
        UrlKind::Discarded
    }
}

/// Links of a record, deduplicated and split by [`UrlKind`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassifiedUrls {
    pub pdf: Vec<String>,
    pub xml: Vec<String>,
    pub splash: Vec<String>,
    pub discarded: usize,
}

/// Deduplicate `urls` and sort every distinct link into exactly one bucket.
pub fn classify_urls<I, S>(urls: I) -> ClassifiedUrls
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let unique: BTreeSet<String> = urls.into_iter().map(|u| u.as_ref().to_string()).collect();

    let mut out = ClassifiedUrls::default();
    for url in unique {
        match classify_url(&url) {
            UrlKind::Pdf => out.pdf.push(url),
            UrlKind::Xml => out.xml.push(url),
            UrlKind::Splash => out.splash.push(url),
            UrlKind::Discarded => out.discarded += 1,
        }
    }
    out
}
