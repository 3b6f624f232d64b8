//! OAI-PMH response parsing with quick-xml
//!
//! Every response is parsed into an envelope: the `responseDate`, then either
//! the verb's typed body or the `<error>` conditions. Structure is validated
//! while parsing; a document that is not a usable `OAI-PMH` envelope is a
//! [`TransportCause::Malformed`].

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::error::TransportCause;

type Result<T> = std::result::Result<T, TransportCause>;

/// Answer to `Identify`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepositoryInfo {
    pub repository_name: String,
    pub base_url: String,
    pub protocol_version: String,
    pub admin_emails: Vec<String>,
    pub earliest_datestamp: Option<String>,
    /// `no`, `transient` or `persistent`
    pub deleted_record: Option<String>,
    /// `YYYY-MM-DD` or `YYYY-MM-DDThh:mm:ssZ`
    pub granularity: Option<String>,
}

/// Record header
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Header {
    pub identifier: String,
    pub datestamp: String,
    pub set_specs: Vec<String>,
    /// `status="deleted"`
    pub deleted: bool,
}

/// One harvested record
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    pub header: Header,
    /// Raw inner XML of `<metadata>`; absent for deleted records
    pub metadata: Option<String>,
    /// Raw inner XML of each `<about>` container
    pub about: Vec<String>,
}

impl Record {
    pub fn identifier(&self) -> &str {
        &self.header.identifier
    }

    pub fn is_deleted(&self) -> bool {
        self.header.deleted
    }
}

/// One page of a `ListRecords` sequence
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordPage {
    /// Records in document order
    pub records: Vec<Record>,
    /// Token for the next page; `None` on the last page
    pub resumption_token: Option<String>,
    pub complete_list_size: Option<u64>,
    pub cursor: Option<u64>,
    pub response_date: String,
}

impl RecordPage {
    /// Valid empty result (`noRecordsMatch`)
    pub fn empty(response_date: impl Into<String>) -> Self {
        Self {
            response_date: response_date.into(),
            ..Default::default()
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// No further pages follow
    pub fn is_last(&self) -> bool {
        self.resumption_token.is_none()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.records.iter()
    }

    pub(crate) fn from_body(body: ListRecordsBody, response_date: String) -> Self {
        let (resumption_token, complete_list_size, cursor) = match body.token {
            Some(t) => (
                Some(t.value).filter(|v| !v.is_empty()),
                t.complete_list_size,
                t.cursor,
            ),
            None => (None, None, None),
        };
        Self {
            records: body.records,
            resumption_token,
            complete_list_size,
            cursor,
            response_date,
        }
    }
}

impl IntoIterator for RecordPage {
    type Item = Record;
    type IntoIter = std::vec::IntoIter<Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

impl<'a> IntoIterator for &'a RecordPage {
    type Item = &'a Record;
    type IntoIter = std::slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// `<error code="...">message</error>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorCondition {
    pub code: String,
    pub message: String,
}

/// Either the verb's body or the error conditions
#[derive(Debug)]
pub(crate) enum Payload<B> {
    Body(B),
    Errors(Vec<ErrorCondition>),
}

#[derive(Debug)]
pub(crate) struct Envelope<B> {
    pub response_date: String,
    pub payload: Payload<B>,
}

/// Body element of a verb's response
pub(crate) trait VerbBody: Sized {
    /// Local name of the body element (same as the verb)
    const ELEMENT: &'static str;

    /// Parse children until the body's end tag
    fn parse(reader: &mut Reader<&[u8]>) -> Result<Self>;

    /// `<Verb/>` with no children
    fn parse_empty() -> Result<Self> {
        Err(TransportCause::malformed(format!(
            "empty <{}> element",
            Self::ELEMENT
        )))
    }
}

#[derive(Debug, Default)]
pub(crate) struct ListRecordsBody {
    pub records: Vec<Record>,
    pub token: Option<ResumptionToken>,
}

#[derive(Debug, Default)]
pub(crate) struct ResumptionToken {
    pub value: String,
    pub complete_list_size: Option<u64>,
    pub cursor: Option<u64>,
}

#[derive(Debug)]
pub(crate) struct GetRecordBody {
    pub record: Record,
}

/// Parse a response document for the verb `B`.
pub(crate) fn parse_envelope<B: VerbBody>(xml: &str) -> Result<Envelope<B>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    // Root element
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if e.local_name().as_ref() == b"OAI-PMH" => break,
            Event::Start(e) | Event::Empty(e) => {
                return Err(TransportCause::malformed(format!(
                    "missing OAI-PMH root element, found <{}>",
                    String::from_utf8_lossy(e.name().as_ref())
                )));
            }
            Event::Eof => return Err(TransportCause::malformed("empty document")),
            _ => {}
        }
        buf.clear();
    }
    buf.clear();

    let mut response_date = None;
    let mut errors = Vec::new();
    let mut body = None;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"responseDate" => response_date = Some(read_text(&mut reader)?),
                b"error" => errors.push(ErrorCondition {
                    code: attribute(&e, b"code")?.unwrap_or_default(),
                    message: read_text(&mut reader)?,
                }),
                name if name == B::ELEMENT.as_bytes() => body = Some(B::parse(&mut reader)?),
                _ => {
                    reader.read_to_end(e.name())?;
                }
            },
            Event::Empty(e) => match e.local_name().as_ref() {
                b"error" => errors.push(ErrorCondition {
                    code: attribute(&e, b"code")?.unwrap_or_default(),
                    message: String::new(),
                }),
                name if name == B::ELEMENT.as_bytes() => body = Some(B::parse_empty()?),
                _ => {}
            },
            Event::End(_) => break,
            Event::Eof => {
                return Err(TransportCause::malformed(
                    "unexpected end of document inside OAI-PMH",
                ));
            }
            _ => {}
        }
        buf.clear();
    }

    let response_date =
        response_date.ok_or_else(|| TransportCause::malformed("missing <responseDate>"))?;

    let payload = if !errors.is_empty() {
        Payload::Errors(errors)
    } else {
        match body {
            Some(body) => Payload::Body(body),
            None => {
                return Err(TransportCause::malformed(format!(
                    "missing <{}> element",
                    B::ELEMENT
                )));
            }
        }
    };

    Ok(Envelope {
        response_date,
        payload,
    })
}

impl VerbBody for RepositoryInfo {
    const ELEMENT: &'static str = "Identify";

    fn parse(reader: &mut Reader<&[u8]>) -> Result<Self> {
        let mut info = RepositoryInfo::default();
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(e) => match e.local_name().as_ref() {
                    b"repositoryName" => info.repository_name = read_text(reader)?,
                    b"baseURL" => info.base_url = read_text(reader)?,
                    b"protocolVersion" => info.protocol_version = read_text(reader)?,
                    b"adminEmail" => info.admin_emails.push(read_text(reader)?),
                    b"earliestDatestamp" => info.earliest_datestamp = Some(read_text(reader)?),
                    b"deletedRecord" => info.deleted_record = Some(read_text(reader)?),
                    b"granularity" => info.granularity = Some(read_text(reader)?),
                    _ => {
                        reader.read_to_end(e.name())?;
                    }
                },
                Event::End(_) => break,
                Event::Eof => return Err(unexpected_eof(Self::ELEMENT)),
                _ => {}
            }
            buf.clear();
        }

        if info.repository_name.is_empty() {
            return Err(TransportCause::malformed("Identify without <repositoryName>"));
        }
        if info.base_url.is_empty() {
            return Err(TransportCause::malformed("Identify without <baseURL>"));
        }
        Ok(info)
    }
}

impl VerbBody for ListRecordsBody {
    const ELEMENT: &'static str = "ListRecords";

    fn parse(reader: &mut Reader<&[u8]>) -> Result<Self> {
        let mut body = ListRecordsBody::default();
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(e) => match e.local_name().as_ref() {
                    b"record" => body.records.push(parse_record(reader)?),
                    b"resumptionToken" => {
                        let mut token = token_attributes(&e)?;
                        token.value = read_text(reader)?;
                        body.token = Some(token);
                    }
                    _ => {
                        reader.read_to_end(e.name())?;
                    }
                },
                Event::Empty(e) if e.local_name().as_ref() == b"resumptionToken" => {
                    body.token = Some(token_attributes(&e)?);
                }
                Event::End(_) => break,
                Event::Eof => return Err(unexpected_eof(Self::ELEMENT)),
                _ => {}
            }
            buf.clear();
        }

        Ok(body)
    }

    fn parse_empty() -> Result<Self> {
        Ok(Self::default())
    }
}

impl VerbBody for GetRecordBody {
    const ELEMENT: &'static str = "GetRecord";

    fn parse(reader: &mut Reader<&[u8]>) -> Result<Self> {
        let mut record = None;
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(e) if e.local_name().as_ref() == b"record" => {
                    if record.is_some() {
                        return Err(TransportCause::malformed("GetRecord with more than one record"));
                    }
                    record = Some(parse_record(reader)?);
                }
                Event::Start(e) => {
                    reader.read_to_end(e.name())?;
                }
                Event::End(_) => break,
                Event::Eof => return Err(unexpected_eof(Self::ELEMENT)),
                _ => {}
            }
            buf.clear();
        }

        record
            .map(|record| GetRecordBody { record })
            .ok_or_else(|| TransportCause::malformed("GetRecord without <record>"))
    }
}

/// Parse `<record>` children; the start tag is already consumed.
fn parse_record(reader: &mut Reader<&[u8]>) -> Result<Record> {
    let mut header = None;
    let mut metadata = None;
    let mut about = Vec::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"header" => {
                    let deleted = attribute(&e, b"status")?.as_deref() == Some("deleted");
                    header = Some(parse_header(reader, deleted)?);
                }
                b"metadata" => metadata = Some(reader.read_text(e.name())?.trim().to_string()),
                b"about" => about.push(reader.read_text(e.name())?.trim().to_string()),
                _ => {
                    reader.read_to_end(e.name())?;
                }
            },
            Event::End(_) => break,
            Event::Eof => return Err(unexpected_eof("record")),
            _ => {}
        }
        buf.clear();
    }

    let header = header.ok_or_else(|| TransportCause::malformed("record without <header>"))?;
    Ok(Record {
        header,
        metadata,
        about,
    })
}

fn parse_header(reader: &mut Reader<&[u8]>, deleted: bool) -> Result<Header> {
    let mut header = Header {
        deleted,
        ..Default::default()
    };
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"identifier" => header.identifier = read_text(reader)?,
                b"datestamp" => header.datestamp = read_text(reader)?,
                b"setSpec" => header.set_specs.push(read_text(reader)?),
                _ => {
                    reader.read_to_end(e.name())?;
                }
            },
            Event::End(_) => break,
            Event::Eof => return Err(unexpected_eof("header")),
            _ => {}
        }
        buf.clear();
    }

    if header.identifier.is_empty() {
        return Err(TransportCause::malformed("record header without <identifier>"));
    }
    Ok(header)
}

fn token_attributes(e: &BytesStart) -> Result<ResumptionToken> {
    Ok(ResumptionToken {
        value: String::new(),
        complete_list_size: attribute(e, b"completeListSize")?.and_then(|v| v.parse().ok()),
        cursor: attribute(e, b"cursor")?.and_then(|v| v.parse().ok()),
    })
}

fn attribute(e: &BytesStart, name: &[u8]) -> Result<Option<String>> {
    let attr = e.try_get_attribute(name).map_err(quick_xml::Error::from)?;
    match attr {
        Some(attr) => Ok(Some(attr.unescape_value()?.into_owned())),
        None => Ok(None),
    }
}

/// Text content up to the current element's end tag, nested markup flattened
fn read_text(reader: &mut Reader<&[u8]>) -> Result<String> {
    let mut buf = Vec::new();
    let mut text = String::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Text(e) => text.push_str(&e.unescape()?),
            Event::CData(e) => text.push_str(&String::from_utf8_lossy(&e)),
            Event::Start(_) => text.push_str(&read_text(reader)?),
            Event::End(_) => break,
            Event::Eof => return Err(unexpected_eof("text element")),
            _ => {}
        }
        buf.clear();
    }

    Ok(text)
}

fn unexpected_eof(inside: &str) -> TransportCause {
    TransportCause::malformed(format!("unexpected end of document inside <{inside}>"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIST_RECORDS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<OAI-PMH xmlns="http://www.openarchives.org/OAI/2.0/">
  <responseDate>2020-01-01T00:05:00Z</responseDate>
  <request verb="ListRecords" metadataPrefix="oai_dc">https://repo.example.org/oai</request>
  <ListRecords>
    <record>
      <header>
        <identifier>oai:repo:1</identifier>
        <datestamp>2019-12-31</datestamp>
        <setSpec>math</setSpec>
        <setSpec>physics</setSpec>
      </header>
      <metadata><oai_dc:dc xmlns:oai_dc="http://www.openarchives.org/OAI/2.0/oai_dc/"><dc:title xmlns:dc="http://purl.org/dc/elements/1.1/">A &amp; B</dc:title></oai_dc:dc></metadata>
    </record>
    <record>
      <header status="deleted">
        <identifier>oai:repo:2</identifier>
        <datestamp>2019-12-30</datestamp>
      </header>
    </record>
    <resumptionToken completeListSize="5" cursor="0">tok1</resumptionToken>
  </ListRecords>
</OAI-PMH>"#;

    fn page(xml: &str) -> RecordPage {
        let envelope = parse_envelope::<ListRecordsBody>(xml).unwrap();
        match envelope.payload {
            Payload::Body(body) => RecordPage::from_body(body, envelope.response_date),
            Payload::Errors(e) => panic!("unexpected errors: {e:?}"),
        }
    }

    #[test]
    fn list_records_in_document_order() {
        let page = page(LIST_RECORDS);
        assert_eq!(page.response_date, "2020-01-01T00:05:00Z");
        assert_eq!(page.len(), 2);
        assert_eq!(page.records[0].identifier(), "oai:repo:1");
        assert_eq!(page.records[0].header.set_specs, vec!["math", "physics"]);
        assert!(!page.records[0].is_deleted());
        assert_eq!(page.records[1].identifier(), "oai:repo:2");
        assert!(page.records[1].is_deleted());
        assert!(page.records[1].metadata.is_none());
    }

    #[test]
    fn metadata_kept_as_raw_xml() {
        let page = page(LIST_RECORDS);
        let metadata = page.records[0].metadata.as_deref().unwrap();
        assert!(metadata.starts_with("<oai_dc:dc"));
        assert!(metadata.contains("A &amp; B"));
        assert!(metadata.ends_with("</oai_dc:dc>"));
    }

    #[test]
    fn resumption_token_with_attributes() {
        let page = page(LIST_RECORDS);
        assert_eq!(page.resumption_token.as_deref(), Some("tok1"));
        assert_eq!(page.complete_list_size, Some(5));
        assert_eq!(page.cursor, Some(0));
        assert!(!page.is_last());
    }

    #[test]
    fn empty_token_marks_last_page() {
        let xml = r#"<OAI-PMH><responseDate>2020-01-02T00:00:00Z</responseDate>
            <ListRecords>
              <record><header><identifier>a</identifier><datestamp>2020-01-01</datestamp></header></record>
              <resumptionToken completeListSize="6" cursor="5"/>
            </ListRecords></OAI-PMH>"#;
        let page = page(xml);
        assert!(page.is_last());
        assert_eq!(page.complete_list_size, Some(6));
        assert_eq!(page.len(), 1);
    }

    #[test]
    fn error_conditions_collected() {
        let xml = r#"<OAI-PMH><responseDate>2020-01-01T00:00:00Z</responseDate>
            <request verb="ListRecords">http://x</request>
            <error code="noRecordsMatch">No records &amp; nothing</error></OAI-PMH>"#;
        let envelope = parse_envelope::<ListRecordsBody>(xml).unwrap();
        match envelope.payload {
            Payload::Errors(errors) => {
                assert_eq!(errors.len(), 1);
                assert_eq!(errors[0].code, "noRecordsMatch");
                assert_eq!(errors[0].message, "No records & nothing");
            }
            Payload::Body(_) => panic!("expected errors"),
        }
    }

    #[test]
    fn identify_body() {
        let xml = r#"<OAI-PMH xmlns="http://www.openarchives.org/OAI/2.0/">
            <responseDate>2020-01-01T00:00:00Z</responseDate>
            <request verb="Identify">http://x/oai</request>
            <Identify>
              <repositoryName>Test Repository</repositoryName>
              <baseURL>http://x/oai</baseURL>
              <protocolVersion>2.0</protocolVersion>
              <adminEmail>a@x.org</adminEmail>
              <adminEmail>b@x.org</adminEmail>
              <earliestDatestamp>2001-01-01</earliestDatestamp>
              <deletedRecord>persistent</deletedRecord>
              <granularity>YYYY-MM-DD</granularity>
              <description><eprints><content><text>ignored</text></content></eprints></description>
            </Identify></OAI-PMH>"#;
        let envelope = parse_envelope::<RepositoryInfo>(xml).unwrap();
        let Payload::Body(info) = envelope.payload else {
            panic!("expected body");
        };
        assert_eq!(info.repository_name, "Test Repository");
        assert_eq!(info.admin_emails, vec!["a@x.org", "b@x.org"]);
        assert_eq!(info.deleted_record.as_deref(), Some("persistent"));
        assert_eq!(info.granularity.as_deref(), Some("YYYY-MM-DD"));
    }

    #[test]
    fn prefixed_elements_accepted() {
        let xml = r#"<oai:OAI-PMH xmlns:oai="http://www.openarchives.org/OAI/2.0/">
            <oai:responseDate>2020-01-01T00:00:00Z</oai:responseDate>
            <oai:GetRecord><oai:record>
              <oai:header><oai:identifier>x:1</oai:identifier></oai:header>
              <oai:metadata><dc/></oai:metadata>
            </oai:record></oai:GetRecord></oai:OAI-PMH>"#;
        let envelope = parse_envelope::<GetRecordBody>(xml).unwrap();
        let Payload::Body(body) = envelope.payload else {
            panic!("expected body");
        };
        assert_eq!(body.record.identifier(), "x:1");
        assert_eq!(body.record.metadata.as_deref(), Some("<dc/>"));
    }

    #[test]
    fn wrong_root_is_malformed() {
        let err = parse_envelope::<RepositoryInfo>("<html><body>502</body></html>").unwrap_err();
        assert!(matches!(err, TransportCause::Malformed(ref m) if m.contains("OAI-PMH root")));
    }

    #[test]
    fn empty_document_is_malformed() {
        let err = parse_envelope::<RepositoryInfo>("").unwrap_err();
        assert!(matches!(err, TransportCause::Malformed(_)));
    }

    #[test]
    fn truncated_document_is_rejected() {
        let xml = r#"<OAI-PMH><responseDate>2020-01-01T00:00:00Z</responseDate><ListRecords><record>"#;
        assert!(parse_envelope::<ListRecordsBody>(xml).is_err());
    }

    #[test]
    fn mismatched_tags_are_xml_errors() {
        let xml = r#"<OAI-PMH><responseDate>x</responseDate><ListRecords></Identify></OAI-PMH>"#;
        assert!(matches!(
            parse_envelope::<ListRecordsBody>(xml).unwrap_err(),
            TransportCause::Xml(_)
        ));
    }

    #[test]
    fn missing_response_date() {
        let xml = r#"<OAI-PMH><ListRecords/></OAI-PMH>"#;
        let err = parse_envelope::<ListRecordsBody>(xml).unwrap_err();
        assert!(err.to_string().contains("responseDate"));
    }

    #[test]
    fn missing_body_element() {
        let xml = r#"<OAI-PMH><responseDate>x</responseDate></OAI-PMH>"#;
        let err = parse_envelope::<GetRecordBody>(xml).unwrap_err();
        assert_eq!(err.to_string(), "missing <GetRecord> element");
    }

    #[test]
    fn record_without_identifier_is_rejected() {
        let xml = r#"<OAI-PMH><responseDate>x</responseDate><ListRecords>
            <record><header><datestamp>2020-01-01</datestamp></header></record>
            </ListRecords></OAI-PMH>"#;
        let err = parse_envelope::<ListRecordsBody>(xml).unwrap_err();
        assert!(err.to_string().contains("identifier"));
    }

    #[test]
    fn empty_list_records_element() {
        let page = page("<OAI-PMH><responseDate>x</responseDate><ListRecords/></OAI-PMH>");
        assert!(page.is_empty());
        assert!(page.is_last());
    }
}
