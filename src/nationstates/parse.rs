//! Scraping helpers for NationStates HTML pages and API XML.
//!
//! Only the handful of fields Que relies on are extracted: the anti-forgery
//! form tokens, the logged-in nation, site error banners and population.

use anyhow::{Context, Result};
use regex::Regex;
use std::sync::OnceLock;

/// Text shown by the boneyard page when a name is free to found.
const FOUNDABLE_MARKER: &str = "Available!";

fn input_tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<input\b[^>]*>").expect("static regex"))
}

fn attr_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)\b([a-z_-]+)\s*=\s*["']([^"']*)["']"#).expect("static regex")
    })
}

fn nname_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?is)<body\b[^>]*\bdata-nname\s*=\s*["']([^"']*)["']"#).expect("static regex")
    })
}

fn error_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?is)<p\b[^>]*class\s*=\s*["'][^"']*\berror\b[^"']*["'][^>]*>(.*?)</p>"#)
            .expect("static regex")
    })
}

fn tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<[^>]*>").expect("static regex"))
}

fn population_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<POPULATION>\s*(\d+)\s*</POPULATION>").expect("static regex"))
}

/// Value of the first `<input name="{name}">` on the page.
pub fn hidden_input(html: &str, name: &str) -> Option<String> {
    input_tag_re().find_iter(html).find_map(|tag| {
        let mut tag_name = None;
        let mut value = None;
        for cap in attr_re().captures_iter(tag.as_str()) {
            match cap[1].to_ascii_lowercase().as_str() {
                "name" => tag_name = Some(cap[2].to_string()),
                "value" => value = Some(cap[2].to_string()),
                _ => {}
            }
        }
        match (tag_name, value) {
            (Some(n), Some(v)) if n == name => Some(v),
            _ => None,
        }
    })
}

/// Anti-forgery token required on every state-changing form.
pub fn chk(html: &str) -> Option<String> {
    hidden_input(html, "chk")
}

/// Token required by the region-move form.
pub fn localid(html: &str) -> Option<String> {
    hidden_input(html, "localid")
}

/// Canonical name of the nation the page was rendered for, if logged in.
pub fn logged_in_nation(html: &str) -> Option<String> {
    nname_re()
        .captures(html)
        .map(|c| c[1].trim().to_string())
        .filter(|n| !n.is_empty())
}

/// Text of the first error banner on the page.
pub fn error_message(html: &str) -> Option<String> {
    let raw = error_re().captures(html)?.get(1)?.as_str();
    let text = tag_re().replace_all(raw, " ");
    let text = decode_entities(&text);
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    (!text.is_empty()).then_some(text)
}

/// Whether the boneyard page reports the name as free.
pub fn is_foundable(html: &str) -> bool {
    html.contains(FOUNDABLE_MARKER)
}

/// Population (millions) from a `q=population` API response.
pub fn population(xml: &str) -> Result<u64> {
    let caps = population_re()
        .captures(xml)
        .context("No POPULATION element in API response")?;
    caps[1]
        .parse()
        .with_context(|| format!("Invalid population value: {}", &caps[1]))
}

fn decode_entities(text: &str) -> String {
    text.replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
