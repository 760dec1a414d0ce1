//! SOAP envelopes, WS-Security headers and response parsing for ONVIF

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::Utc;
use roxmltree::{Document, Node};
use sha1::{Digest, Sha1};

use crate::{Error, Result};

pub const CONTENT_TYPE: &str = "application/soap+xml; charset=utf-8";

pub const SOAP_ENV_NS: &str = "http://www.w3.org/2003/05/soap-envelope";
pub const DEVICE_NS: &str = "http://www.onvif.org/ver10/device/wsdl";
pub const MEDIA_NS: &str = "http://www.onvif.org/ver10/media/wsdl";
pub const PTZ_NS: &str = "http://www.onvif.org/ver20/ptz/wsdl";
pub const TT_NS: &str = "http://www.onvif.org/ver10/schema";

const WSSE_NS: &str = "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-secext-1.0.xsd";
const WSU_NS: &str = "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-utility-1.0.xsd";
const PASSWORD_DIGEST_TYPE: &str =
    "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-username-token-profile-1.0#PasswordDigest";
const NONCE_ENCODING: &str =
    "http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-soap-message-security-1.0#Base64Binary";

/// Wrap a body in a SOAP 1.2 envelope, with an optional header block
#[must_use]
pub fn envelope(header: Option<&str>, body: &str) -> String {
    let header = header.map(|h| format!("<s:Header>{h}</s:Header>")).unwrap_or_default();
    format!(r#"<?xml version="1.0" encoding="UTF-8"?><s:Envelope xmlns:s="{SOAP_ENV_NS}">{header}<s:Body>{body}</s:Body></s:Envelope>"#)
}

/// WS-Security `UsernameToken` with a fresh nonce and timestamp
#[must_use]
pub fn wsse_header(username: &str, password: &str) -> String {
    let nonce: [u8; 16] = rand::random();
    let created = Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string();
    username_token(username, password, &nonce, &created)
}

fn username_token(username: &str, password: &str, nonce: &[u8], created: &str) -> String {
    format!(
        r#"<Security xmlns="{WSSE_NS}" s:mustUnderstand="1"><UsernameToken><Username>{user}</Username><Password Type="{PASSWORD_DIGEST_TYPE}">{digest}</Password><Nonce EncodingType="{NONCE_ENCODING}">{nonce}</Nonce><Created xmlns="{WSU_NS}">{created}</Created></UsernameToken></Security>"#,
        user = xml_escape(username),
        digest = password_digest(nonce, created, password),
        nonce = STANDARD.encode(nonce),
    )
}

/// `base64(sha1(nonce + created + password))`
#[must_use]
pub fn password_digest(nonce: &[u8], created: &str, password: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(nonce);
    hasher.update(created.as_bytes());
    hasher.update(password.as_bytes());
    STANDARD.encode(hasher.finalize())
}

pub fn xml_escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

#[must_use]
pub fn get_capabilities() -> String {
    format!(r#"<GetCapabilities xmlns="{DEVICE_NS}"><Category>All</Category></GetCapabilities>"#)
}

#[must_use]
pub fn get_profiles() -> String {
    format!(r#"<GetProfiles xmlns="{MEDIA_NS}"/>"#)
}

/// Velocity components, each in `[-1, 1]`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Velocity {
    pub pan: f64,
    pub tilt: f64,
    pub zoom: f64,
}

#[must_use]
pub fn continuous_move(profile: &str, velocity: Velocity) -> String {
    format!(
        r#"<ContinuousMove xmlns="{PTZ_NS}"><ProfileToken>{profile}</ProfileToken><Velocity><PanTilt xmlns="{TT_NS}" x="{pan}" y="{tilt}"/><Zoom xmlns="{TT_NS}" x="{zoom}"/></Velocity></ContinuousMove>"#,
        profile = xml_escape(profile),
        pan = format_float(velocity.pan),
        tilt = format_float(velocity.tilt),
        zoom = format_float(velocity.zoom),
    )
}

#[must_use]
pub fn stop(profile: &str, pan_tilt: bool, zoom: bool) -> String {
    format!(
        r#"<Stop xmlns="{PTZ_NS}"><ProfileToken>{profile}</ProfileToken><PanTilt>{pan_tilt}</PanTilt><Zoom>{zoom}</Zoom></Stop>"#,
        profile = xml_escape(profile),
    )
}

#[must_use]
pub fn goto_preset(profile: &str, preset: u8) -> String {
    format!(
        r#"<GotoPreset xmlns="{PTZ_NS}"><ProfileToken>{profile}</ProfileToken><PresetToken>{preset}</PresetToken></GotoPreset>"#,
        profile = xml_escape(profile),
    )
}

#[must_use]
pub fn set_preset(profile: &str, preset: u8) -> String {
    format!(
        r#"<SetPreset xmlns="{PTZ_NS}"><ProfileToken>{profile}</ProfileToken><PresetName>Preset {preset}</PresetName><PresetToken>{preset}</PresetToken></SetPreset>"#,
        profile = xml_escape(profile),
    )
}

fn format_float(value: f64) -> String {
    let normalized = if value.abs() < f64::EPSILON { 0.0 } else { value };
    format!("{normalized:.3}")
}

/// Service addresses advertised by `GetCapabilities`
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Capabilities {
    pub ptz: Option<String>,
    pub media: Option<String>,
}

/// Extract the PTZ and Media service addresses
///
/// # Errors
///
/// Returns error if the body is not well-formed XML
pub fn parse_capabilities(body: &str) -> Result<Capabilities> {
    let doc = Document::parse(body)?;
    let service = |tag: &str| {
        doc.descendants()
            .find(|node| node.has_tag_name(tag))
            .and_then(|node| child_text(node, "XAddr"))
    };
    Ok(Capabilities {
        ptz: service("PTZ"),
        media: service("Media"),
    })
}

/// Token of the first media profile
///
/// # Errors
///
/// Returns error if the body is not XML or lists no profile token
pub fn first_profile_token(body: &str) -> Result<String> {
    let doc = Document::parse(body)?;
    doc.descendants()
        .filter(|node| node.has_tag_name("Profiles"))
        .find_map(|node| node.attribute("token"))
        .map(str::to_string)
        .ok_or_else(|| Error::Protocol("no media profile token".to_string()))
}

/// Reason text of a SOAP fault, if the body is one
#[must_use]
pub fn fault_reason(body: &str) -> Option<String> {
    let doc = Document::parse(body).ok()?;
    let fault = doc.descendants().find(|node| node.has_tag_name("Fault"))?;
    let reason = fault
        .descendants()
        .find(|node| node.has_tag_name("Text") || node.has_tag_name("faultstring"))
        .and_then(|node| node.text())
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty());
    Some(reason.unwrap_or_else(|| "unspecified fault".to_string()))
}

fn child_text(node: Node<'_, '_>, tag: &str) -> Option<String> {
    node.children()
        .find(|child| child.has_tag_name(tag))
        .and_then(|child| child.text())
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}
