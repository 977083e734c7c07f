use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use std::io::Cursor;

use crate::core::SourceError;

/// SOAP 1.1 envelope namespace.
pub const SOAP_ENV_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";

fn xml_io(e: std::io::Error) -> SourceError {
    SourceError::Parse(format!("XML write error: {e}"))
}

/// Writes a SOAP 1.1 request envelope around a single operation element.
pub struct EnvelopeWriter {
    writer: Writer<Cursor<Vec<u8>>>,
    operation: String,
}

impl EnvelopeWriter {
    /// Open `<soapenv:Envelope><soapenv:Body><{prefix}:{operation}>`.
    pub fn new(prefix: &str, namespace: &str, operation: &str) -> Result<Self, SourceError> {
        let mut writer = Writer::new(Cursor::new(Vec::new()));
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(xml_io)?;

        let ns_attr = format!("xmlns:{prefix}");
        let mut envelope = BytesStart::new("soapenv:Envelope");
        envelope.push_attribute(("xmlns:soapenv", SOAP_ENV_NS));
        envelope.push_attribute((ns_attr.as_str(), namespace));
        writer
            .write_event(Event::Start(envelope))
            .map_err(xml_io)?;
        writer
            .write_event(Event::Empty(BytesStart::new("soapenv:Header")))
            .map_err(xml_io)?;
        writer
            .write_event(Event::Start(BytesStart::new("soapenv:Body")))
            .map_err(xml_io)?;

        let operation = format!("{prefix}:{operation}");
        writer
            .write_event(Event::Start(BytesStart::new(operation.as_str())))
            .map_err(xml_io)?;
        Ok(Self { writer, operation })
    }

    /// Write `<name>text</name>` inside the operation element; text is escaped.
    pub fn text_element(&mut self, name: &str, text: &str) -> Result<&mut Self, SourceError> {
        self.writer
            .write_event(Event::Start(BytesStart::new(name)))
            .map_err(xml_io)?;
        self.writer
            .write_event(Event::Text(BytesText::new(text)))
            .map_err(xml_io)?;
        self.writer
            .write_event(Event::End(BytesEnd::new(name)))
            .map_err(xml_io)?;
        Ok(self)
    }

    /// Close all open elements and return the document.
    pub fn finish(mut self) -> Result<String, SourceError> {
        for name in [self.operation.as_str(), "soapenv:Body", "soapenv:Envelope"] {
            self.writer
                .write_event(Event::End(BytesEnd::new(name)))
                .map_err(xml_io)?;
        }
        let buf = self.writer.into_inner().into_inner();
        String::from_utf8(buf).map_err(|e| SourceError::Parse(format!("XML UTF-8 error: {e}")))
    }
}

/// A response node with namespace prefixes stripped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Start(String),
    Text(String),
    End(String),
}

/// Flatten a SOAP response into start/text/end nodes keyed by local name.
///
/// Empty elements produce a `Start` immediately followed by an `End`.
pub fn read_nodes(xml: &str) -> Result<Vec<Node>, SourceError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut nodes = Vec::new();
    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => nodes.push(Node::Start(local_name(e.local_name().as_ref()))),
            Ok(Event::Empty(ref e)) => {
                let name = local_name(e.local_name().as_ref());
                nodes.push(Node::Start(name.clone()));
                nodes.push(Node::End(name));
            }
            Ok(Event::Text(ref e)) => {
                let text = e
                    .unescape()
                    .map_err(|e| SourceError::Parse(format!("XML text error: {e}")))?;
                if !text.is_empty() {
                    nodes.push(Node::Text(text.into_owned()));
                }
            }
            Ok(Event::CData(e)) => {
                let bytes = e.into_inner();
                nodes.push(Node::Text(String::from_utf8_lossy(&bytes).into_owned()));
            }
            Ok(Event::End(ref e)) => nodes.push(Node::End(local_name(e.local_name().as_ref()))),
            Ok(Event::Eof) => break,
            Err(e) => return Err(SourceError::Parse(format!("XML parse error: {e}"))),
            _ => {}
        }
    }
    Ok(nodes)
}

fn local_name(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).into_owned()
}

/// `faultstring` of a SOAP fault, if the response is one.
pub fn find_fault(nodes: &[Node]) -> Option<String> {
    let mut in_fault = false;
    let mut current: Option<&str> = None;
    let mut fault_string = None;
    for node in nodes {
        match node {
            Node::Start(name) if name == "Fault" => in_fault = true,
            Node::Start(name) => current = Some(name.as_str()),
            Node::Text(text) if in_fault && current == Some("faultstring") => {
                fault_string = Some(text.clone());
            }
            Node::End(name) if name == "Fault" => {
                return Some(fault_string.unwrap_or_else(|| "unknown fault".into()));
            }
            Node::End(_) => current = None,
            Node::Text(_) => {}
        }
    }
    if in_fault {
        return Some(fault_string.unwrap_or_else(|| "unknown fault".into()));
    }
    None
}

/// Text of the first element named `name`.
pub fn first_text<'a>(nodes: &'a [Node], name: &str) -> Option<&'a str> {
    nodes.windows(2).find_map(|pair| match pair {
        [Node::Start(n), Node::Text(t)] if n == name => Some(t.as_str()),
        _ => None,
    })
}

/// Post a SOAP envelope and return the parsed response nodes.
///
/// SOAP faults come back as [`SourceError::Fault`] whatever the HTTP status.
pub async fn call(
    client: &reqwest::Client,
    url: &str,
    soap_action: &str,
    envelope: String,
) -> Result<Vec<Node>, SourceError> {
    let resp = client
        .post(url)
        .header(reqwest::header::CONTENT_TYPE, "text/xml; charset=utf-8")
        .header("SOAPAction", soap_action)
        .body(envelope)
        .send()
        .await
        .map_err(|e| SourceError::Network(e.to_string()))?;

    let status = resp.status();
    let body = resp
        .text()
        .await
        .map_err(|e| SourceError::Network(e.to_string()))?;

    // Faults are usually sent with HTTP 500, check the body before the status.
    if let Ok(nodes) = read_nodes(&body) {
        if let Some(fault) = find_fault(&nodes) {
            return Err(SourceError::Fault(fault));
        }
        if status.is_success() {
            return Ok(nodes);
        }
    }
    if !status.is_success() {
        return Err(SourceError::Status {
            status: status.as_u16(),
            body,
        });
    }
    read_nodes(&body)
}
