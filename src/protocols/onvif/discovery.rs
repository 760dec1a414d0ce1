//! WS-Discovery probe for ONVIF network video transmitters

use std::net::{Ipv4Addr, SocketAddr};

use roxmltree::Document;
use url::{Host, Url};
use uuid::Uuid;

use crate::devices::{Device, Protocol};
use crate::Result;

/// WS-Discovery multicast group and port
pub const MULTICAST_ADDR: SocketAddr = SocketAddr::new(
    std::net::IpAddr::V4(Ipv4Addr::new(239, 255, 255, 250)),
    3702,
);

/// One `ProbeMatch` entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeMatch {
    /// Endpoint reference address, usually `urn:uuid:…`
    pub endpoint: String,
    /// First advertised service address
    pub xaddr: Url,
}

impl ProbeMatch {
    /// Device descriptor for this match
    ///
    /// Keyed by host like every other family, so a camera that is both
    /// configured and discovered stays a single registry entry.
    #[must_use]
    pub fn into_device(self) -> Option<Device> {
        let host = match self.xaddr.host()? {
            Host::Domain(domain) => domain.to_string(),
            Host::Ipv4(ip) => ip.to_string(),
            Host::Ipv6(ip) => ip.to_string(),
        };
        let port = self.xaddr.port_or_known_default().unwrap_or(80);
        let mut device = Device::new(host, port, Protocol::Onvif);
        device.name = format!("ONVIF {}", device.host);
        tracing::trace!(device_id = %device.id, endpoint = %self.endpoint, "ws-discovery match");
        Some(device)
    }
}

/// Build a `Probe` message for network video transmitters
#[must_use]
pub fn probe_message(message_id: Uuid) -> String {
    format!(
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8"?>"#,
            r#"<s:Envelope xmlns:s="http://www.w3.org/2003/05/soap-envelope" "#,
            r#"xmlns:a="http://schemas.xmlsoap.org/ws/2004/08/addressing" "#,
            r#"xmlns:d="http://schemas.xmlsoap.org/ws/2005/04/discovery" "#,
            r#"xmlns:dn="http://www.onvif.org/ver10/network/wsdl">"#,
            r#"<s:Header>"#,
            r#"<a:Action s:mustUnderstand="1">http://schemas.xmlsoap.org/ws/2005/04/discovery/Probe</a:Action>"#,
            r#"<a:MessageID>uuid:{}</a:MessageID>"#,
            r#"<a:ReplyTo><a:Address>http://schemas.xmlsoap.org/ws/2004/08/addressing/role/anonymous</a:Address></a:ReplyTo>"#,
            r#"<a:To s:mustUnderstand="1">urn:schemas-xmlsoap-org:ws:2005:04:discovery</a:To>"#,
            r#"</s:Header>"#,
            r#"<s:Body><d:Probe><d:Types>dn:NetworkVideoTransmitter</d:Types></d:Probe></s:Body>"#,
            r#"</s:Envelope>"#,
        ),
        message_id
    )
}

/// Parse every `ProbeMatch` in a reply
///
/// Matches without an endpoint address or a parseable service address
/// are skipped.
///
/// # Errors
///
/// Returns error if the reply is not well-formed XML
pub fn parse_probe_matches(body: &str) -> Result<Vec<ProbeMatch>> {
    let doc = Document::parse(body)?;
    let matches = doc
        .descendants()
        .filter(|node| node.has_tag_name("ProbeMatch"))
        .filter_map(|node| {
            let endpoint = node
                .descendants()
                .find(|n| n.has_tag_name("EndpointReference"))?
                .descendants()
                .find(|n| n.has_tag_name("Address"))?
                .text()?
                .trim()
                .to_string();
            let xaddr = node
                .descendants()
                .find(|n| n.has_tag_name("XAddrs"))?
                .text()?
                .split_whitespace()
                .find_map(|candidate| Url::parse(candidate).ok())?;
            Some(ProbeMatch { endpoint, xaddr })
        })
        .collect();
    Ok(matches)
}
