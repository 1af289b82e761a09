//! Record normalization for the Hindawi MARC21-XML feed.
//!
//! Tag and subfield codes are fixed by the vendor:
//!
//! | field            | MARC            |
//! |------------------|-----------------|
//! | authors          | `100`/`700` `$a`, affiliations `$u` |
//! | title            | `245 $a`        |
//! | abstract         | `520 $a`        |
//! | date published   | `260 $c`        |
//! | source           | `260 $b`        |
//! | page count       | `300 $a`        |
//! | DOIs             | `024 $a` where `$2` contains `DOI` |
//! | journal          | `773 $p $a $y $n $c` |
//! | license          | `540 $a $u`     |
//! | copyright        | `542 $f`        |
//! | links            | `856 $u`, `FFT $a` |

pub mod license;
pub mod urls;

use tracing::debug;

use crate::marc::MarcRecord;
use crate::model::{
    AdditionalFile, Affiliation, Author, Copyright, Journal, License, NormalizedRecord,
};
use crate::traits::RecordParser;

pub use license::{canonical_license, is_open_access, resolve_license, ResolvedLicense};
pub use urls::{classify_url, classify_urls, ClassifiedUrls, UrlKind};

/// Access level given to XML fulltexts attached to a record.
pub const HIDDEN_ACCESS: &str = "INSPIRE-HIDDEN";

/// License type marking open-access records.
pub const OPEN_ACCESS: &str = "open-access";

/// Parser for the Hindawi MARC21-XML feed.
#[derive(Debug, Clone)]
pub struct HindawiParser {
    name: String,
}

impl HindawiParser {
    pub fn new() -> Self {
        Self::with_name("hindawi")
    }

    /// Same mapping, attributed to another source name.
    pub fn with_name(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Default for HindawiParser {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordParser for HindawiParser {
    fn source_name(&self) -> &str {
        &self.name
    }

    fn parse_record(&self, record: &MarcRecord) -> NormalizedRecord {
        normalize(record, &self.name)
    }
}

/// Build a [`NormalizedRecord`] out of one MARC record. Missing subfields
/// leave the matching output field empty.
pub fn normalize(record: &MarcRecord, source_name: &str) -> NormalizedRecord {
    let mut out = NormalizedRecord::empty();

    out.authors = extract_authors(record);
    out.abstract_text = record.first_owned("520", 'a');
    out.title = record.first_owned("245", 'a');
    out.date_published = record.first_owned("260", 'c');
    out.page_count = record.first_owned("300", 'a');
    out.dois = extract_dois(record);
    out.journal = Journal {
        title: record.first_owned("773", 'p'),
        volume: record.first_owned("773", 'a'),
        year: record.first_owned("773", 'y'),
        issue: record.first_owned("773", 'n'),
        pages: record.first_owned("773", 'c'),
    };

    out.copyright = record.first("542", 'f').map(extract_copyright);

    let resolved = resolve_license(record.first("540", 'a'), record.first("540", 'u'));
    if let Some(value) = resolved.label {
        out.license = Some(License {
            value,
            url: resolved.url,
            license_type: resolved.open_access.then(|| OPEN_ACCESS.to_string()),
        });
    }

    let links = record
        .all("856", 'u')
        .into_iter()
        .chain(record.all("FFT", 'a'));
    let classified = classify_urls(links);
    if classified.discarded > 0 {
        debug!(discarded = classified.discarded, "Ignoring unclassified links");
    }
    out.urls = classified.splash;
    out.file_urls = classified.pdf;
    out.additional_files = classified
        .xml
        .into_iter()
        .map(|url| fulltext_file(url, source_name))
        .collect();

    out.source = record.first_owned("260", 'b');
    out
}

/// Main authors (`100`) first, then additional authors (`700`).
pub fn extract_authors(record: &MarcRecord) -> Vec<Author> {
    record
        .fields("100")
        .chain(record.fields("700"))
        .map(|field| Author {
            raw_name: field.first('a').map(str::to_string),
            affiliations: field
                .all('u')
                .map(|value| Affiliation {
                    value: value.to_string(),
                })
                .collect(),
        })
        .collect()
}

fn extract_dois(record: &MarcRecord) -> Vec<String> {
    record
        .fields("024")
        .filter(|field| field.has_value_containing('2', "DOI"))
        .flat_map(|field| field.all('a'))
        .map(str::to_string)
        .collect()
}

/// The copyright year keeps every digit of the statement, in order, so
/// `"(c) 2015-2016"` gives `"20152016"`. Only ASCII digits count, so the year
/// is always a plain numeral.
pub fn extract_copyright(statement: &str) -> Copyright {
    let year: String = statement.chars().filter(|c| c.is_ascii_digit()).collect();
    Copyright {
        statement: statement.to_string(),
        year: (!year.is_empty()).then_some(year),
    }
}

fn fulltext_file(url: String, source_name: &str) -> AdditionalFile {
    AdditionalFile {
        access: HIDDEN_ACCESS.to_string(),
        description: source_name.to_uppercase(),
        url,
        file_type: "Fulltext".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FEED_COLLECTIONS;

    const HINDAWI_RECORD: &str = r#"
<marc:record xmlns:marc="http://www.loc.gov/MARC21/slim">
  <marc:datafield tag="024" ind1="7" ind2=" ">
    <marc:subfield code="a">10.1155/2016/6425423</marc:subfield>
    <marc:subfield code="2">DOI</marc:subfield>
  </marc:datafield>
  <marc:datafield tag="024" ind1="7" ind2=" ">
    <marc:subfield code="a">9780000000002</marc:subfield>
    <marc:subfield code="2">ISBN</marc:subfield>
  </marc:datafield>
  <marc:datafield tag="100" ind1=" " ind2=" ">
    <marc:subfield code="a">Dong, Ying-Bo</marc:subfield>
    <marc:subfield code="u">Institute of High Energy Physics, Beijing</marc:subfield>
  </marc:datafield>
  <marc:datafield tag="245" ind1="1" ind2="0">
    <marc:subfield code="a">Heavy Quark Production</marc:subfield>
  </marc:datafield>
  <marc:datafield tag="260" ind1=" " ind2=" ">
    <marc:subfield code="b">Hindawi Publishing Corporation</marc:subfield>
    <marc:subfield code="c">2016-05-11</marc:subfield>
  </marc:datafield>
  <marc:datafield tag="300" ind1=" " ind2=" ">
    <marc:subfield code="a">7</marc:subfield>
  </marc:datafield>
  <marc:datafield tag="520" ind1=" " ind2=" ">
    <marc:subfield code="a">We study heavy quarks.</marc:subfield>
  </marc:datafield>
  <marc:datafield tag="540" ind1=" " ind2=" ">
    <marc:subfield code="a">Creative Commons Attribution 3.0</marc:subfield>
    <marc:subfield code="u">http://creativecommons.org/licenses/by/3.0/</marc:subfield>
  </marc:datafield>
  <marc:datafield tag="542" ind1=" " ind2=" ">
    <marc:subfield code="f">Copyright 2016, Ying-Bo Dong et al.</marc:subfield>
  </marc:datafield>
  <marc:datafield tag="700" ind1=" " ind2=" ">
    <marc:subfield code="a">Shen, Peng-Nian</marc:subfield>
    <marc:subfield code="u">CCAST</marc:subfield>
    <marc:subfield code="u">Institute of High Energy Physics, Beijing</marc:subfield>
  </marc:datafield>
  <marc:datafield tag="773" ind1=" " ind2=" ">
    <marc:subfield code="p">Advances in High Energy Physics</marc:subfield>
    <marc:subfield code="a">2016</marc:subfield>
    <marc:subfield code="y">2016</marc:subfield>
    <marc:subfield code="n">1</marc:subfield>
    <marc:subfield code="c">1-7</marc:subfield>
  </marc:datafield>
  <marc:datafield tag="856" ind1="4" ind2=" ">
    <marc:subfield code="u">http://dx.doi.org/10.1155/2016/6425423</marc:subfield>
  </marc:datafield>
  <marc:datafield tag="856" ind1="4" ind2=" ">
    <marc:subfield code="u">http://downloads.hindawi.com/journals/ahep/2016/6425423.pdf</marc:subfield>
  </marc:datafield>
  <marc:datafield tag="FFT" ind1=" " ind2=" ">
    <marc:subfield code="a">http://downloads.hindawi.com/journals/ahep/2016/6425423.xml</marc:subfield>
  </marc:datafield>
  <marc:datafield tag="FFT" ind1=" " ind2=" ">
    <marc:subfield code="a">http://downloads.hindawi.com/journals/ahep/2016/6425423.pdf</marc:subfield>
  </marc:datafield>
</marc:record>"#;

    fn parse(xml: &str) -> NormalizedRecord {
        HindawiParser::new().parse_raw(xml).unwrap()
    }

    #[test]
    fn test_full_record() {
        let record = parse(HINDAWI_RECORD);

        assert_eq!(record.title.as_deref(), Some("Heavy Quark Production"));
        assert_eq!(record.abstract_text.as_deref(), Some("We study heavy quarks."));
        assert_eq!(record.date_published.as_deref(), Some("2016-05-11"));
        assert_eq!(record.page_count.as_deref(), Some("7"));
        assert_eq!(record.dois, vec!["10.1155/2016/6425423"]);
        assert_eq!(record.source.as_deref(), Some("Hindawi Publishing Corporation"));
        assert_eq!(
            record.journal,
            Journal {
                title: Some("Advances in High Energy Physics".into()),
                volume: Some("2016".into()),
                year: Some("2016".into()),
                issue: Some("1".into()),
                pages: Some("1-7".into()),
            }
        );
        assert_eq!(record.collections, FEED_COLLECTIONS);
    }

    #[test]
    fn test_authors_keep_main_author_first() {
        let record = parse(HINDAWI_RECORD);
        let names: Vec<_> = record.authors.iter().map(|a| a.raw_name.as_deref()).collect();
        assert_eq!(names, vec![Some("Dong, Ying-Bo"), Some("Shen, Peng-Nian")]);
        assert_eq!(
            record.authors[1].affiliations,
            vec![
                Affiliation { value: "CCAST".into() },
                Affiliation { value: "Institute of High Energy Physics, Beijing".into() },
            ]
        );
    }

    #[test]
    fn test_links_are_split_by_kind() {
        let record = parse(HINDAWI_RECORD);
        assert_eq!(record.urls, vec!["http://dx.doi.org/10.1155/2016/6425423"]);
        assert_eq!(
            record.file_urls,
            vec!["http://downloads.hindawi.com/journals/ahep/2016/6425423.pdf"]
        );
        assert_eq!(
            record.additional_files,
            vec![AdditionalFile {
                access: "INSPIRE-HIDDEN".into(),
                description: "HINDAWI".into(),
                url: "http://downloads.hindawi.com/journals/ahep/2016/6425423.xml".into(),
                file_type: "Fulltext".into(),
            }]
        );
    }

    #[test]
    fn test_license_and_copyright() {
        let record = parse(HINDAWI_RECORD);
        assert_eq!(
            record.license,
            Some(License {
                value: "CC-BY-3.0".into(),
                url: Some("http://creativecommons.org/licenses/by/3.0/".into()),
                license_type: Some("open-access".into()),
            })
        );
        let copyright = record.copyright.unwrap();
        assert_eq!(copyright.statement, "Copyright 2016, Ying-Bo Dong et al.");
        assert_eq!(copyright.year.as_deref(), Some("2016"));
    }

    #[test]
    fn test_copyright_year_concatenates_all_digits() {
        // Multi-year statements run together; kept as the feed has always been read.
        assert_eq!(extract_copyright("(c) 2015-2016").year.as_deref(), Some("20152016"));
        assert_eq!(extract_copyright("Copyright 2016, Author").year.as_deref(), Some("2016"));
        assert_eq!(extract_copyright("All rights reserved").year, None);
    }

    #[test]
    fn test_copyright_year_ignores_non_ascii_digits() {
        // Arabic-Indic and superscript digits are not part of the year
        assert_eq!(extract_copyright("© ٢٠١٦ 2016").year.as_deref(), Some("2016"));
        assert_eq!(extract_copyright("(c) ٢٠١٦").year, None);
        assert_eq!(extract_copyright("2016²").year.as_deref(), Some("2016"));
    }

    #[test]
    fn test_license_url_without_label_is_dropped() {
        let xml = r#"<record><datafield tag="540"><subfield code="u">http://example.org/l</subfield></datafield></record>"#;
        assert_eq!(parse(xml).license, None);
    }

    #[test]
    fn test_empty_record_only_has_collections() {
        let record = parse("<marc:record xmlns:marc=\"http://www.loc.gov/MARC21/slim\"/>");
        assert_eq!(record, NormalizedRecord::empty());

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json, serde_json::json!({"collections": ["HEP", "Citeable", "Published"]}));
    }

    #[test]
    fn test_source_name_feeds_file_description() {
        let parser = HindawiParser::with_name("hindawi-ahep");
        let xml = r#"<record><datafield tag="FFT"><subfield code="a">http://x/a.xml</subfield></datafield></record>"#;
        let record = parser.parse_raw(xml).unwrap();
        assert_eq!(parser.source_name(), "hindawi-ahep");
        assert_eq!(record.additional_files[0].description, "HINDAWI-AHEP");
    }
}
