//! Protocol client against canned repository responses

use std::cell::RefCell;
use std::collections::VecDeque;

use oaiharvest_client::{
    ArchivingTransport, ListRecordsArgs, OaiClient, OaiError, Transport, TransportCause,
};
use tempfile::TempDir;

const BASE: &str = "https://repo.example.org/oai";

/// Replays queued bodies and records every requested URL
#[derive(Default)]
struct Canned {
    responses: RefCell<VecDeque<Result<Vec<u8>, String>>>,
    requests: RefCell<Vec<String>>,
}

impl Canned {
    fn with<S: AsRef<str>>(bodies: &[S]) -> Self {
        let canned = Self::default();
        for body in bodies {
            canned.push(body.as_ref());
        }
        canned
    }

    fn push(&self, body: &str) {
        self.responses
            .borrow_mut()
            .push_back(Ok(body.as_bytes().to_vec()));
    }

    fn push_failure(&self, message: &str) {
        self.responses
            .borrow_mut()
            .push_back(Err(message.to_string()));
    }

    fn requests(&self) -> Vec<String> {
        self.requests.borrow().clone()
    }
}

impl Transport for Canned {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, TransportCause> {
        self.requests.borrow_mut().push(url.to_string());
        match self.responses.borrow_mut().pop_front() {
            Some(Ok(body)) => Ok(body),
            Some(Err(message)) => Err(std::io::Error::other(message).into()),
            None => panic!("unexpected request: {url}"),
        }
    }
}

fn envelope(inner: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<OAI-PMH xmlns="http://www.openarchives.org/OAI/2.0/">
  <responseDate>2024-03-01T10:00:00Z</responseDate>
  <request verb="ListRecords">https://repo.example.org/oai</request>
  {inner}
</OAI-PMH>"#
    )
}

fn record(id: &str) -> String {
    format!(
        r#"<record><header><identifier>{id}</identifier><datestamp>2024-02-01</datestamp></header>
<metadata><dc>{id}</dc></metadata></record>"#
    )
}

fn list_page(ids: &[&str], token: Option<&str>) -> String {
    let records: String = ids.iter().map(|id| record(id)).collect();
    let token = match token {
        Some(t) => format!(r#"<resumptionToken completeListSize="3">{t}</resumptionToken>"#),
        None => "<resumptionToken/>".to_string(),
    };
    envelope(&format!("<ListRecords>{records}{token}</ListRecords>"))
}

#[test]
fn no_records_match_is_an_empty_page() {
    let transport = Canned::with(&[&envelope(
        r#"<error code="noRecordsMatch">nothing here</error>"#,
    )]);
    let client = OaiClient::new(BASE, &transport).unwrap();

    let page = client
        .list_records(&ListRecordsArgs::new("oai_dc").with_from("2024-01-01"))
        .unwrap();

    assert!(page.is_empty());
    assert!(page.is_last());
    assert_eq!(page.response_date, "2024-03-01T10:00:00Z");
}

#[test]
fn unknown_identifier_is_a_protocol_error() {
    let transport = Canned::with(&[&envelope(
        r#"<error code="idDoesNotExist">no such record</error>"#,
    )]);
    let client = OaiClient::new(BASE, &transport).unwrap();

    let err = client.get_record("oai:x:1", "oai_dc").unwrap_err();

    assert_eq!(err.kind(), "ProtocolError");
    assert_eq!(err.code(), Some("idDoesNotExist"));
    assert_eq!(
        err.url(),
        "https://repo.example.org/oai?verb=GetRecord&identifier=oai%3Ax%3A1&metadataPrefix=oai_dc"
    );
    assert!(err.to_string().contains("no such record"));
}

#[test]
fn first_of_several_errors_is_reported() {
    let transport = Canned::with(&[&envelope(
        r#"<error code="badArgument">bad from</error><error code="badArgument">bad until</error>"#,
    )]);
    let client = OaiClient::new(BASE, &transport).unwrap();

    match client.list_records(&ListRecordsArgs::new("oai_dc")) {
        Err(OaiError::Protocol { message, .. }) => assert_eq!(message, "bad from"),
        other => panic!("expected protocol error, got {other:?}"),
    }
}

#[test]
fn html_page_is_a_transport_failure() {
    let transport = Canned::with(&["<html><body>Service Unavailable</body></html>"]);
    let client = OaiClient::new(BASE, &transport).unwrap();

    let err = client.identify().unwrap_err();

    assert_eq!(err.kind(), "TransportFailure");
    assert_eq!(err.url(), "https://repo.example.org/oai?verb=Identify");
    assert!(err.code().is_none());
}

#[test]
fn fetch_failure_is_a_transport_failure() {
    let transport = Canned::default();
    transport.push_failure("connection reset");
    let client = OaiClient::new(BASE, &transport).unwrap();

    let err = client.list_records(&ListRecordsArgs::new("oai_dc")).unwrap_err();

    assert!(matches!(err, OaiError::Transport { .. }));
    assert!(err.to_string().contains("connection reset"));
}

#[test]
fn invalid_utf8_is_a_transport_failure() {
    struct Latin1;
    impl Transport for Latin1 {
        fn fetch(&self, _url: &str) -> Result<Vec<u8>, TransportCause> {
            Ok(vec![0x3c, 0x61, 0xe9, 0x3e])
        }
    }
    let client = OaiClient::new(BASE, Latin1).unwrap();

    let err = client.identify().unwrap_err();
    assert_eq!(err.kind(), "TransportFailure");
}

#[test]
fn declared_latin1_is_still_a_transport_failure() {
    struct Declared;
    impl Transport for Declared {
        fn fetch(&self, _url: &str) -> Result<Vec<u8>, TransportCause> {
            let mut body = br#"<?xml version="1.0" encoding="ISO-8859-1"?><OAI-PMH xmlns="http://www.openarchives.org/OAI/2.0/"><responseDate>2024-01-01T00:00:00Z</responseDate><Identify><repositoryName>Caf"#.to_vec();
            body.push(0xe9);
            body.extend_from_slice(b"</repositoryName></Identify></OAI-PMH>");
            Ok(body)
        }
    }
    let client = OaiClient::new(BASE, Declared).unwrap();

    let err = client.identify().unwrap_err();
    assert_eq!(err.kind(), "TransportFailure");
    assert!(err.to_string().contains("not UTF-8"), "{err}");
}

#[test]
fn identify_describes_repository() {
    let transport = Canned::with(&[&envelope(
        r#"<Identify>
  <repositoryName>Example Repository</repositoryName>
  <baseURL>https://repo.example.org/oai</baseURL>
  <protocolVersion>2.0</protocolVersion>
  <adminEmail>admin@example.org</adminEmail>
  <earliestDatestamp>2001-01-01</earliestDatestamp>
  <deletedRecord>persistent</deletedRecord>
  <granularity>YYYY-MM-DD</granularity>
</Identify>"#,
    )]);
    let client = OaiClient::new(BASE, &transport).unwrap();

    let info = client.identify().unwrap();

    assert_eq!(info.repository_name, "Example Repository");
    assert_eq!(info.admin_emails, vec!["admin@example.org".to_string()]);
    assert_eq!(info.deleted_record.as_deref(), Some("persistent"));
}

#[test]
fn pages_follow_resumption_tokens() {
    let transport = Canned::with(&[
        &list_page(&["oai:x:1", "oai:x:2"], Some("tok/1")),
        &list_page(&["oai:x:3"], None),
    ]);
    let client = OaiClient::new(BASE, &transport).unwrap();

    let pages: Vec<_> = client
        .pages(ListRecordsArgs::new("oai_dc").with_set("physics"))
        .collect::<Result<_, _>>()
        .unwrap();

    assert_eq!(pages.len(), 2);
    let ids: Vec<_> = pages
        .iter()
        .flat_map(|p| p.iter().map(|r| r.identifier().to_string()))
        .collect();
    assert_eq!(ids, ["oai:x:1", "oai:x:2", "oai:x:3"]);
    assert_eq!(pages[0].complete_list_size, Some(3));
    assert_eq!(
        transport.requests(),
        [
            "https://repo.example.org/oai?verb=ListRecords&set=physics&metadataPrefix=oai_dc",
            "https://repo.example.org/oai?verb=ListRecords&resumptionToken=tok%2F1",
        ]
    );
}

#[test]
fn pages_stop_after_first_error() {
    let transport = Canned::with(&[
        &list_page(&["oai:x:1"], Some("t2")),
        &envelope(r#"<error code="badResumptionToken">expired</error>"#),
    ]);
    let client = OaiClient::new(BASE, &transport).unwrap();
    let mut pages = client.pages(ListRecordsArgs::new("oai_dc"));

    assert!(pages.next().unwrap().is_ok());
    let err = pages.next().unwrap().unwrap_err();
    assert_eq!(err.code(), Some("badResumptionToken"));
    assert!(pages.next().is_none());
    assert_eq!(transport.requests().len(), 2);
}

#[test]
fn archive_numbers_continue_across_clients() {
    let dir = TempDir::new().unwrap();
    let archive = dir.path().join("archive");

    {
        let transport = Canned::with(&[&list_page(&["oai:x:1"], None)]);
        let archiving = ArchivingTransport::new(transport, &archive).unwrap();
        let client = OaiClient::new(BASE, archiving).unwrap();
        client.list_records(&ListRecordsArgs::new("oai_dc")).unwrap();
    }

    let transport = Canned::with(&[&list_page(&["oai:x:2"], None)]);
    let archiving = ArchivingTransport::new(transport, &archive).unwrap();
    let client = OaiClient::new(BASE, archiving).unwrap();
    client.list_records(&ListRecordsArgs::new("oai_dc")).unwrap();

    let second = std::fs::read_to_string(archive.join("oairequest.1.xml")).unwrap();
    assert!(second.contains("oai:x:2"));
    assert!(archive.join("oairequest.0.url").exists());
    assert_eq!(client.transport().counter().peek(), 2);
}
