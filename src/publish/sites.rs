//! Build-sharing site descriptors

/// Describes one build-sharing site
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildSite {
    /// Human readable name
    pub label: &'static str,

    /// Identifier used in configuration
    pub id: &'static str,

    /// Prefix prepended to the code returned by the site
    pub code_out: Option<&'static str>,

    /// Upload endpoint; sites without one cannot be posted to
    pub post_url: Option<String>,

    /// Form field prefix placed before the export in the POST body
    pub post_fields: Option<&'static str>,

    /// Prefix used when displaying links to the site
    pub link_url: &'static str,
}

impl BuildSite {
    pub fn pobb_in() -> Self {
        Self {
            label: "pobb.in",
            id: "pobb.in",
            code_out: Some("https://pobb.in/"),
            post_url: Some("https://pobb.in/pob/".to_string()),
            post_fields: None,
            link_url: "pobb.in/",
        }
    }

    pub fn poe_ninja() -> Self {
        Self {
            label: "PoeNinja",
            id: "poe.ninja",
            code_out: None,
            post_url: Some("https://poe.ninja/pob/api/api_post.php".to_string()),
            post_fields: Some("api_paste_code="),
            link_url: "poe.ninja/pob/",
        }
    }

    pub fn poedb() -> Self {
        Self {
            label: "poedb.tw",
            id: "poedb.tw",
            code_out: None,
            post_url: Some("https://poedb.tw/pob/api/gen".to_string()),
            post_fields: None,
            link_url: "poedb.tw/pob/",
        }
    }

    /// All built-in sites
    pub fn all() -> Vec<Self> {
        vec![Self::pobb_in(), Self::poe_ninja(), Self::poedb()]
    }

    /// Looks up a built-in site by its configuration id
    pub fn by_id(id: &str) -> Option<Self> {
        Self::all()
            .into_iter()
            .find(|site| site.id.eq_ignore_ascii_case(id))
    }

    /// Looks up a built-in site by the label stored with its links
    pub fn by_label(label: &str) -> Option<Self> {
        Self::all().into_iter().find(|site| site.label == label)
    }

    pub fn supports_upload(&self) -> bool {
        self.post_url.as_deref().is_some_and(|url| !url.is_empty())
    }

    /// Replaces the upload endpoint
    pub fn with_post_url(mut self, url: impl Into<String>) -> Self {
        self.post_url = Some(url.into());
        self
    }

    /// Builds the POST body for an export
    pub fn post_body(&self, export: &str) -> String {
        format!("{}{}", self.post_fields.unwrap_or(""), export)
    }

    /// Turns the code returned by the site into the public reference
    pub fn reference(&self, code: &str) -> String {
        format!("{}{}", self.code_out.unwrap_or(""), code)
    }

    /// Short form of a reference for display, starting at the site's link prefix
    ///
    /// References that do not contain the prefix are returned unchanged.
    pub fn display_link<'a>(&self, reference: &'a str) -> &'a str {
        match reference.find(self.link_url) {
            Some(start) => &reference[start..],
            None => reference,
        }
    }
}
