//! MARC21-XML record parser
//!
//! Namespace prefixes are ignored: `marc:datafield` and `datafield` are the
//! same element.

use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;

/// A MARC record reduced to its data fields, in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarcRecord {
    pub data_fields: Vec<DataField>,
}

/// A MARC data field (e.g. `245`, `856`, `FFT`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataField {
    /// Field tag
    pub tag: String,
    /// Subfields with a non-empty text value
    pub subfields: Vec<Subfield>,
}

/// A MARC subfield
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subfield {
    /// Subfield code (single character)
    pub code: char,
    /// Direct text content, trimmed
    pub value: String,
}

impl MarcRecord {
    /// Parse every `datafield` found in an XML fragment.
    ///
    /// Text nested in child elements of a subfield (MathML and the like) is
    /// not part of the subfield value. Every direct text node is joined and
    /// the result trimmed.
    pub fn from_xml(xml: &str) -> Result<Self, quick_xml::Error> {
        let mut reader = Reader::from_str(xml);

        let mut data_fields = Vec::new();
        let mut field: Option<DataField> = None;
        let mut code: Option<char> = None;
        let mut text = String::new();
        let mut nested = 0usize;

        loop {
            match reader.read_event()? {
                Event::Start(e) => {
                    if code.is_some() {
                        nested += 1;
                        continue;
                    }
                    match e.local_name().as_ref() {
                        b"datafield" => field = Some(DataField::from_element(&e)),
                        b"subfield" if field.is_some() => {
                            code = attribute(&e, b"code").and_then(|c| c.chars().next());
                            text.clear();
                        }
                        _ => {}
                    }
                }
                Event::Empty(e) => {
                    if code.is_none() && e.local_name().as_ref() == b"datafield" {
                        data_fields.push(DataField::from_element(&e));
                    }
                }
                Event::Text(t) if code.is_some() && nested == 0 => {
                    text.push_str(&t.unescape()?);
                }
                Event::CData(c) if code.is_some() && nested == 0 => {
                    text.push_str(&String::from_utf8_lossy(&c.into_inner()));
                }
                Event::End(e) => {
                    if nested > 0 {
                        nested -= 1;
                        continue;
                    }
                    match e.local_name().as_ref() {
                        b"subfield" => {
                            if let (Some(code), Some(field)) = (code.take(), field.as_mut()) {
                                let value = text.trim();
                                if !value.is_empty() {
                                    field.subfields.push(Subfield {
                                        code,
                                        value: value.to_string(),
                                    });
                                }
                            }
                            text.clear();
                        }
                        b"datafield" => {
                            if let Some(done) = field.take() {
                                data_fields.push(done);
                            }
                        }
                        _ => {}
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        Ok(MarcRecord { data_fields })
    }

    /// Get all data fields with a specific tag
    pub fn fields<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a DataField> + 'a {
        self.data_fields.iter().filter(move |f| f.tag == tag)
    }

    /// First value of `code` across every field tagged `tag`
    pub fn first(&self, tag: &str, code: char) -> Option<&str> {
        self.data_fields
            .iter()
            .filter(|f| f.tag == tag)
            .find_map(|f| f.first(code))
    }

    /// All values of `code` across every field tagged `tag`, in document order
    pub fn all(&self, tag: &str, code: char) -> Vec<&str> {
        self.data_fields
            .iter()
            .filter(|f| f.tag == tag)
            .flat_map(|f| f.all(code))
            .collect()
    }

    /// Convenience wrapper returning an owned first value.
    pub fn first_owned(&self, tag: &str, code: char) -> Option<String> {
        self.first(tag, code).map(str::to_string)
    }
}

impl DataField {
    fn from_element(e: &BytesStart<'_>) -> Self {
        DataField {
            tag: attribute(e, b"tag").unwrap_or_default(),
            subfields: Vec::new(),
        }
    }

    pub fn first(&self, code: char) -> Option<&str> {
        self.subfields
            .iter()
            .find(|s| s.code == code)
            .map(|s| s.value.as_str())
    }

    pub fn all(&self, code: char) -> impl Iterator<Item = &str> {
        self.subfields
            .iter()
            .filter(move |s| s.code == code)
            .map(|s| s.value.as_str())
    }

    /// Whether any `code` subfield contains `needle`
    pub fn has_value_containing(&self, code: char, needle: &str) -> bool {
        self.all(code).any(|v| v.contains(needle))
    }
}

fn attribute(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == key)
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}
