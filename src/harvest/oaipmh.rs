//! OAI-PMH `ListRecords` client.

use async_trait::async_trait;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use std::collections::HashSet;
use tracing::{debug, warn};
use url::Url;

use crate::harvest::source::{FetchError, RecordSource};
use crate::harvest::state::HarvestWindow;

/// OAI-PMH error code for an empty result set.
pub const NO_RECORDS_MATCH: &str = "noRecordsMatch";

/// Error code reported when a repository hands out a token it already gave.
pub const REPEATED_RESUMPTION_TOKEN: &str = "repeatedResumptionToken";

/// One page of a `ListRecords` response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListRecordsPage {
    pub records: Vec<String>,
    /// Token for the next page, absent on the last one
    pub resumption_token: Option<String>,
}

/// Harvests repositories over HTTP, following resumption tokens.
#[derive(Debug, Clone, Default)]
pub struct OaiPmhClient {
    http: reqwest::Client,
}

impl OaiPmhClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(http: reqwest::Client) -> Self {
        Self { http }
    }

    /// URL of the first page of `window`, or of the page behind `token`.
    pub fn list_records_url(
        &self,
        window: &HarvestWindow,
        token: Option<&str>,
    ) -> Result<Url, FetchError> {
        let mut url = Url::parse(&window.url)?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("verb", "ListRecords");
            if let Some(token) = token {
                // resumptionToken is an exclusive argument
                query.append_pair("resumptionToken", token);
            } else {
                query.append_pair("metadataPrefix", &window.metadata_prefix);
                if let Some(set) = &window.set {
                    query.append_pair("set", set);
                }
                if let Some(from) = window.from_date {
                    query.append_pair("from", &from.format("%Y-%m-%d").to_string());
                }
                if let Some(until) = window.until_date {
                    query.append_pair("until", &until.format("%Y-%m-%d").to_string());
                }
            }
        }
        Ok(url)
    }

    async fn fetch_page(&self, url: Url) -> Result<ListRecordsPage, FetchError> {
        debug!(%url, "Requesting ListRecords page");
        let response = self.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        let body = response.text().await?;
        parse_list_records(&body)
    }
}

#[async_trait]
impl RecordSource for OaiPmhClient {
    async fn fetch(&self, window: &HarvestWindow) -> Result<Vec<String>, FetchError> {
        let mut records = Vec::new();
        let mut token: Option<String> = None;
        let mut seen_tokens = HashSet::new();

        loop {
            let url = self.list_records_url(window, token.as_deref())?;
            let page = self.fetch_page(url).await?;
            debug!(records = page.records.len(), "ListRecords page received");
            records.extend(page.records);

            match page.resumption_token {
                Some(next) if !seen_tokens.insert(next.clone()) => {
                    warn!(token = %next, "Repository repeated a resumption token");
                    return Err(FetchError::Protocol {
                        code: REPEATED_RESUMPTION_TOKEN.to_string(),
                        message: format!("resumption token {next} was already followed"),
                    });
                }
                Some(next) => token = Some(next),
                None => break,
            }
        }

        Ok(records)
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Capture {
    Nothing,
    Error,
    Token,
}

/// Parse a `ListRecords` response body.
///
/// # Errors
///
/// An OAI-PMH `<error>` element becomes [`FetchError::NoRecordsMatch`] or
/// [`FetchError::Protocol`]; invalid XML becomes [`FetchError::MalformedFeed`].
pub fn parse_list_records(xml: &str) -> Result<ListRecordsPage, FetchError> {
    let mut reader = Reader::from_str(xml);
    let mut page = ListRecordsPage::default();
    let mut error: Option<(String, String)> = None;
    let mut capture = Capture::Nothing;
    let mut text = String::new();

    loop {
        let start = reader.buffer_position();
        match reader.read_event()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"record" => {
                    reader.read_to_end(e.name())?;
                    if let Some(fragment) = xml.get(start..reader.buffer_position()) {
                        page.records.push(fragment.to_string());
                    }
                }
                b"error" => {
                    error = Some((error_code(&e), String::new()));
                    capture = Capture::Error;
                    text.clear();
                }
                b"resumptionToken" => {
                    capture = Capture::Token;
                    text.clear();
                }
                _ => {}
            },
            Event::Empty(e) if e.local_name().as_ref() == b"error" => {
                error = Some((error_code(&e), String::new()));
            }
            Event::Text(t) if capture != Capture::Nothing => {
                text.push_str(&t.unescape()?);
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"error" => {
                    if let Some((_, message)) = error.as_mut() {
                        *message = text.trim().to_string();
                    }
                    capture = Capture::Nothing;
                }
                b"resumptionToken" => {
                    let token = text.trim();
                    if !token.is_empty() {
                        page.resumption_token = Some(token.to_string());
                    }
                    capture = Capture::Nothing;
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    match error {
        Some((code, message)) if code == NO_RECORDS_MATCH => Err(FetchError::NoRecordsMatch(message)),
        Some((code, message)) => Err(FetchError::Protocol { code, message }),
        None => Ok(page),
    }
}

fn error_code(e: &BytesStart<'_>) -> String {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == b"code")
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use wiremock::matchers::{method, path, query_param, query_param_is_missing};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn page(records: &[&str], token: Option<&str>) -> String {
        let body: String = records
            .iter()
            .map(|title| {
                format!(
                    r#"<record><header><identifier>oai:{title}</identifier></header><metadata>
                    <marc:record xmlns:marc="http://www.loc.gov/MARC21/slim">
                    <marc:datafield tag="245"><marc:subfield code="a">{title}</marc:subfield></marc:datafield>
                    </marc:record></metadata></record>"#
                )
            })
            .collect();
        let token = match token {
            Some(t) => format!(r#"<resumptionToken cursor="0">{t}</resumptionToken>"#),
            None => r#"<resumptionToken completeListSize="3" cursor="2"/>"#.to_string(),
        };
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<OAI-PMH xmlns="http://www.openarchives.org/OAI/2.0/">
  <responseDate>2017-03-01T10:00:00Z</responseDate>
  <request verb="ListRecords">http://repo.example.org/oai</request>
  <ListRecords>{body}{token}</ListRecords>
</OAI-PMH>"#
        )
    }

    const NO_MATCH: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<OAI-PMH xmlns="http://www.openarchives.org/OAI/2.0/">
  <responseDate>2017-03-01T10:00:00Z</responseDate>
  <request verb="ListRecords">http://repo.example.org/oai</request>
  <error code="noRecordsMatch">The combination of the values of the from, until, set and metadataPrefix arguments results in an empty list.</error>
</OAI-PMH>"#;

    #[test]
    fn test_parse_page_with_token() {
        let parsed = parse_list_records(&page(&["A", "B"], Some("tok-1"))).unwrap();
        assert_eq!(parsed.records.len(), 2);
        assert!(parsed.records[1].contains(">B<"));
        assert_eq!(parsed.resumption_token.as_deref(), Some("tok-1"));
    }

    #[test]
    fn test_empty_token_ends_list() {
        let parsed = parse_list_records(&page(&["A"], None)).unwrap();
        assert_eq!(parsed.resumption_token, None);
    }

    #[test]
    fn test_no_records_match() {
        match parse_list_records(NO_MATCH) {
            Err(FetchError::NoRecordsMatch(message)) => assert!(message.starts_with("The combination")),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_other_protocol_error() {
        let xml = r#"<OAI-PMH><error code="badArgument"/></OAI-PMH>"#;
        assert!(matches!(
            parse_list_records(xml),
            Err(FetchError::Protocol { code, .. }) if code == "badArgument"
        ));
    }

    #[test]
    fn test_first_page_url() {
        let window = HarvestWindow::new("http://repo.example.org/oai")
            .with_metadata_prefix("marc21")
            .with_set("HINDAWI.AHEP")
            .with_from_date(NaiveDate::from_ymd_opt(2015, 1, 1).unwrap());
        let url = OaiPmhClient::new().list_records_url(&window, None).unwrap();
        assert_eq!(
            url.as_str(),
            "http://repo.example.org/oai?verb=ListRecords&metadataPrefix=marc21&set=HINDAWI.AHEP&from=2015-01-01"
        );

        let next = OaiPmhClient::new().list_records_url(&window, Some("t=1")).unwrap();
        assert_eq!(next.as_str(), "http://repo.example.org/oai?verb=ListRecords&resumptionToken=t%3D1");
    }

    #[tokio::test]
    async fn test_fetch_follows_resumption_tokens() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/oai"))
            .and(query_param("resumptionToken", "page-2"))
            .respond_with(ResponseTemplate::new(200).set_body_string(page(&["C"], None)))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/oai"))
            .and(query_param("metadataPrefix", "marc21"))
            .and(query_param_is_missing("resumptionToken"))
            .respond_with(ResponseTemplate::new(200).set_body_string(page(&["A", "B"], Some("page-2"))))
            .expect(1)
            .mount(&server)
            .await;

        let window = HarvestWindow::new(format!("{}/oai", server.uri())).with_metadata_prefix("marc21");
        let records = OaiPmhClient::new().fetch(&window).await.unwrap();

        assert_eq!(records.len(), 3);
        assert!(records[2].contains(">C<"));
    }

    #[tokio::test]
    async fn test_fetch_stops_on_repeated_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("resumptionToken", "again"))
            .respond_with(ResponseTemplate::new(200).set_body_string(page(&["B"], Some("again"))))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(query_param_is_missing("resumptionToken"))
            .respond_with(ResponseTemplate::new(200).set_body_string(page(&["A"], Some("again"))))
            .expect(1)
            .mount(&server)
            .await;

        let window = HarvestWindow::new(format!("{}/oai", server.uri()));
        let result = OaiPmhClient::new().fetch(&window).await;

        assert!(matches!(
            result,
            Err(FetchError::Protocol { code, .. }) if code == REPEATED_RESUMPTION_TOKEN
        ));
    }

    #[tokio::test]
    async fn test_fetch_reports_no_records_match() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(NO_MATCH))
            .mount(&server)
            .await;

        let window = HarvestWindow::new(format!("{}/oai", server.uri()));
        let result = OaiPmhClient::new().fetch(&window).await;
        assert!(matches!(result, Err(FetchError::NoRecordsMatch(_))));
    }

    #[tokio::test]
    async fn test_fetch_http_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let window = HarvestWindow::new(format!("{}/oai", server.uri()));
        let result = OaiPmhClient::new().fetch(&window).await;
        assert!(matches!(result, Err(FetchError::Status(503))));
    }
}
