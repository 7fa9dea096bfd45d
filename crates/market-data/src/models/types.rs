use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Source identifier - mostly static constants
pub type SourceId = Cow<'static, str>;

/// How authoritative a source's rate is.
///
/// Only the SBV portal publishes the central rate itself; bank feeds quote
/// their own rates and the international API is an indicative market rate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Authority {
    Official,
    Bank,
    Indicative,
}

impl fmt::Display for Authority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Official => "official central rate",
            Self::Bank => "commercial bank rate",
            Self::Indicative => "indicative market rate",
        };
        f.write_str(label)
    }
}

/// The known source variants, in default priority order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    SbvPortal,
    BankXml,
    BankJson,
    International,
}

impl SourceKind {
    /// All variants in default priority order.
    pub const ALL: [SourceKind; 4] = [
        SourceKind::SbvPortal,
        SourceKind::BankXml,
        SourceKind::BankJson,
        SourceKind::International,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SbvPortal => "sbv_portal",
            Self::BankXml => "bank_xml",
            Self::BankJson => "bank_json",
            Self::International => "international",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "sbv_portal" | "sbv" | "portal" => Ok(Self::SbvPortal),
            "bank_xml" | "vcb_xml" | "xml" => Ok(Self::BankXml),
            "bank_json" | "vcb_json" | "json" => Ok(Self::BankJson),
            "international" | "intl" | "exchangerate_api" => Ok(Self::International),
            other => Err(format!("unknown source '{}'", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_kind_parses_aliases() {
        assert_eq!("portal".parse::<SourceKind>(), Ok(SourceKind::SbvPortal));
        assert_eq!("VCB-XML".parse::<SourceKind>(), Ok(SourceKind::BankXml));
        assert_eq!(" json ".parse::<SourceKind>(), Ok(SourceKind::BankJson));
        assert_eq!("intl".parse::<SourceKind>(), Ok(SourceKind::International));
        assert!("yahoo".parse::<SourceKind>().is_err());
    }
}
