//! Source selection and per-source settings.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::models::SourceKind;
use crate::registry::PlausibleRange;

pub const DEFAULT_PORTAL_URL: &str = "https://dttktt.sbv.gov.vn/TyGia/faces/TyGiaTrungTam.jspx";
pub const DEFAULT_BANK_XML_URL: &str =
    "https://portal.vietcombank.com.vn/Usercontrols/TVPortal.TyGia/pXML.aspx";
pub const DEFAULT_BANK_JSON_URL: &str =
    "https://www.vietcombank.com.vn/api/exchangerates?date={date}";
pub const DEFAULT_INTERNATIONAL_URL: &str = "https://api.exchangerate-api.com/v4/latest/USD";

/// Which sources a lookup may use, in priority order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum SourceSet {
    /// Only the official SBV portal.
    PortalOnly,
    /// Portal, bank XML, bank JSON, then the international API.
    #[default]
    FullChain,
    /// An explicit ordered list.
    Custom(Vec<SourceKind>),
}

impl SourceSet {
    pub fn kinds(&self) -> Vec<SourceKind> {
        match self {
            Self::PortalOnly => vec![SourceKind::SbvPortal],
            Self::FullChain => SourceKind::ALL.to_vec(),
            Self::Custom(kinds) => kinds.clone(),
        }
    }
}

impl FromStr for SourceSet {
    type Err = String;

    /// Accepts "portal", "all" / "full", or a comma list such as "bank_xml,intl".
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "portal" | "portal_only" | "portal-only" => return Ok(Self::PortalOnly),
            "all" | "full" | "full_chain" | "full-chain" => return Ok(Self::FullChain),
            _ => {}
        }

        let mut kinds = Vec::new();
        for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let kind = part.parse::<SourceKind>()?;
            if !kinds.contains(&kind) {
                kinds.push(kind);
            }
        }

        if kinds.is_empty() {
            return Err(format!("no sources in '{}'", s));
        }
        Ok(Self::Custom(kinds))
    }
}

/// Settings for building a [`SourceRegistry`](crate::registry::SourceRegistry).
#[derive(Clone, Debug)]
pub struct SourceConfig {
    pub sources: SourceSet,
    /// Per-request budget for the HTTP sources.
    pub http_timeout: Duration,
    /// Budget for the whole portal interaction.
    pub portal_timeout: Duration,
    pub range: PlausibleRange,
    /// Chromium executable; looked up on PATH when unset.
    pub chromium_path: Option<PathBuf>,
    pub portal_url: String,
    pub bank_xml_url: String,
    /// May contain `{date}`, replaced with the ISO date.
    pub bank_json_url: String,
    /// May contain `{date}`, replaced with the ISO date.
    pub international_url: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            sources: SourceSet::default(),
            http_timeout: Duration::from_secs(30),
            portal_timeout: Duration::from_secs(120),
            range: PlausibleRange::default(),
            chromium_path: None,
            portal_url: DEFAULT_PORTAL_URL.to_string(),
            bank_xml_url: DEFAULT_BANK_XML_URL.to_string(),
            bank_json_url: DEFAULT_BANK_JSON_URL.to_string(),
            international_url: DEFAULT_INTERNATIONAL_URL.to_string(),
        }
    }
}

impl SourceConfig {
    pub fn with_sources(mut self, sources: SourceSet) -> Self {
        self.sources = sources;
        self
    }
}
