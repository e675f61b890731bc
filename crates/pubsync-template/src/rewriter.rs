use std::collections::HashMap;

use pubsync_types::{ContentAddress, ManifestEntry};
use regex::{Captures, Regex};
use tracing::debug;

use crate::error::{TemplateError, TemplateResult};

/// Logical identifier of an asset: its file name without directories and
/// without everything from the first `.` on.
///
/// `assets/icons/logo.min.png` is referenced as `logo`.
pub fn logical_id(path: &str) -> &str {
    let name = path.rsplit('/').next().unwrap_or(path);
    name.split('.').next().unwrap_or(name)
}

/// Rewrites stylesheet links and image sources inside template text.
///
/// Element matching is textual and case-insensitive; templates are not
/// parsed as HTML. Attribute values may be quoted with `"` or `'`.
#[derive(Clone, Debug)]
pub struct TemplateRewriter {
    gateway: String,
    link_element: Regex,
    rel_stylesheet: Regex,
    href_attr: Regex,
    img_element: Regex,
    id_attr: Regex,
    src_attr: Regex,
}

impl TemplateRewriter {
    pub fn new(gateway: impl Into<String>) -> TemplateResult<Self> {
        Ok(Self {
            gateway: gateway.into().trim_end_matches('/').to_string(),
            link_element: Regex::new(r"(?i)(<link)(\b[^>]*>)")?,
            rel_stylesheet: Regex::new(r#"(?i)\srel\s*=\s*["']stylesheet["']"#)?,
            href_attr: Regex::new(r#"(?i)(\shref\s*=\s*)(?:"[^"]*"|'[^']*')"#)?,
            img_element: Regex::new(r"(?i)<img\b[^>]*>")?,
            id_attr: Regex::new(r#"(?i)\sid\s*=\s*(?:"([^"]*)"|'([^']*)')"#)?,
            src_attr: Regex::new(r#"(?i)(\ssrc\s*=\s*)(?:"[^"]*"|'[^']*')"#)?,
        })
    }

    pub fn gateway(&self) -> &str {
        &self.gateway
    }

    /// Gateway URL of a stored object.
    pub fn url_for(&self, address: &ContentAddress) -> String {
        format!("{}/{}", self.gateway, address)
    }

    /// Point the first `<link rel="stylesheet">` at `stylesheet`.
    ///
    /// An existing `href` has its value replaced; a link without one gets
    /// an `href` inserted. Templates without a stylesheet link come back
    /// unchanged.
    pub fn rewrite_stylesheet_link(&self, template: &str, stylesheet: &ContentAddress) -> String {
        let Some(caps) = self
            .link_element
            .captures_iter(template)
            .find(|caps| self.rel_stylesheet.is_match(&caps[0]))
        else {
            return template.to_string();
        };
        let Some(whole) = caps.get(0) else {
            return template.to_string();
        };

        let url = self.url_for(stylesheet);
        let element = whole.as_str();
        let rewritten = if self.href_attr.is_match(element) {
            self.href_attr
                .replace(element, |c: &Captures| format!("{}\"{}\"", &c[1], url))
                .into_owned()
        } else {
            format!("{} href=\"{}\"{}", &caps[1], url, &caps[2])
        };
        debug!(stylesheet = %stylesheet.short_hex(), "stylesheet link rewritten");

        let mut out = String::with_capacity(template.len() + url.len());
        out.push_str(&template[..whole.start()]);
        out.push_str(&rewritten);
        out.push_str(&template[whole.end()..]);
        out
    }

    /// Point the `src` of every `<img>` whose `id` names an asset at that
    /// asset's address.
    ///
    /// When two assets share a logical id the later one wins. Images
    /// without a `src`, and assets no image refers to, are left alone.
    pub fn rewrite_image_references(&self, template: &str, assets: &[ManifestEntry]) -> String {
        let by_id: HashMap<String, &ContentAddress> = assets
            .iter()
            .map(|asset| (logical_id(&asset.path).to_lowercase(), &asset.content_address))
            .filter(|(id, _)| !id.is_empty())
            .collect();
        if by_id.is_empty() {
            return template.to_string();
        }

        self.img_element
            .replace_all(template, |caps: &Captures| {
                let element = &caps[0];
                let address = self
                    .element_id(element)
                    .and_then(|id| by_id.get(&id.to_lowercase()));
                match address {
                    Some(address) => {
                        let url = self.url_for(address);
                        debug!(address = %address.short_hex(), "image source rewritten");
                        self.src_attr
                            .replace(element, |c: &Captures| format!("{}\"{}\"", &c[1], url))
                            .into_owned()
                    }
                    None => element.to_string(),
                }
            })
            .into_owned()
    }

    /// Apply the stylesheet rewrite (when an address is given), then the
    /// image rewrite.
    pub fn rewrite(
        &self,
        template: &str,
        stylesheet: Option<&ContentAddress>,
        assets: &[ManifestEntry],
    ) -> String {
        let linked = match stylesheet {
            Some(address) => self.rewrite_stylesheet_link(template, address),
            None => template.to_string(),
        };
        self.rewrite_image_references(&linked, assets)
    }

    /// Decode a fetched template and rewrite it.
    pub fn rewrite_bytes(
        &self,
        path: &str,
        bytes: &[u8],
        stylesheet: Option<&ContentAddress>,
        assets: &[ManifestEntry],
    ) -> TemplateResult<String> {
        let text = std::str::from_utf8(bytes).map_err(|_| TemplateError::NotUtf8 {
            path: path.to_string(),
        })?;
        Ok(self.rewrite(text, stylesheet, assets))
    }

    fn element_id<'a>(&self, element: &'a str) -> Option<&'a str> {
        let caps = self.id_attr.captures(element)?;
        caps.get(1).or_else(|| caps.get(2)).map(|m| m.as_str())
    }
}
