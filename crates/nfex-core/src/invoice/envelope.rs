//! Locating the `infNFe` block inside the known NF-e wrapper shapes.

use std::fmt;

use tracing::debug;

use crate::error::EnvelopeError;
use crate::xml::XmlValue;

/// Root of an authorized NF-e (invoice plus SEFAZ protocol).
pub const PROCESS_KEY: &str = "nfeProc";

/// Invoice element.
pub const INVOICE_KEY: &str = "NFe";

/// Invoice info element; the canonical subtree.
pub const INFO_KEY: &str = "infNFe";

/// Issuer block inside `infNFe`.
pub const ISSUER_KEY: &str = "emit";

/// Path of the ICMS totals block inside `infNFe`.
pub const ICMS_TOTALS_PATH: [&str; 2] = ["total", "ICMSTot"];

/// The wrapper around `infNFe`, tried in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvelopeShape {
    /// `nfeProc > NFe > infNFe`
    Processed,
    /// `NFe > infNFe`
    Bare,
    /// `<key> > infNFe` for the first top-level key ending in `NFe`
    /// (e.g. a namespace-prefixed `nfe:NFe`).
    Suffixed(String),
}

impl EnvelopeShape {
    /// Find the first shape that matches `tree` and the info subtree it locates.
    ///
    /// A shape matches only when its whole path exists, so a `nfeProc`
    /// without a nested `NFe > infNFe` falls through to the next shape.
    pub fn detect(tree: &XmlValue) -> Option<(EnvelopeShape, &XmlValue)> {
        if let Some(info) = tree.path(&[PROCESS_KEY, INVOICE_KEY, INFO_KEY]) {
            return Some((EnvelopeShape::Processed, info));
        }

        if let Some(info) = tree.path(&[INVOICE_KEY, INFO_KEY]) {
            return Some((EnvelopeShape::Bare, info));
        }

        tree.keys()
            .filter(|key| key.ends_with(INVOICE_KEY))
            .find_map(|key| {
                tree.path(&[key, INFO_KEY])
                    .map(|info| (EnvelopeShape::Suffixed(key.to_string()), info))
            })
    }
}

impl fmt::Display for EnvelopeShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnvelopeShape::Processed => write!(f, "{PROCESS_KEY}>{INVOICE_KEY}>{INFO_KEY}"),
            EnvelopeShape::Bare => write!(f, "{INVOICE_KEY}>{INFO_KEY}"),
            EnvelopeShape::Suffixed(key) => write!(f, "{key}>{INFO_KEY}"),
        }
    }
}

/// The `infNFe` subtree, guaranteed to hold `emit` and `total.ICMSTot`.
#[derive(Debug, Clone)]
pub struct CanonicalInvoiceInfo<'a> {
    shape: EnvelopeShape,
    issuer: &'a XmlValue,
    icms_totals: &'a XmlValue,
}

impl<'a> CanonicalInvoiceInfo<'a> {
    /// Shape the info block was found through.
    pub fn shape(&self) -> &EnvelopeShape {
        &self.shape
    }

    /// The `emit` block.
    pub fn issuer(&self) -> &'a XmlValue {
        self.issuer
    }

    /// The `total.ICMSTot` block.
    pub fn icms_totals(&self) -> &'a XmlValue {
        self.icms_totals
    }
}

/// Locate the canonical invoice info of a decoded document.
pub fn normalize(tree: &XmlValue) -> Result<CanonicalInvoiceInfo<'_>, EnvelopeError> {
    let Some((shape, info)) = EnvelopeShape::detect(tree) else {
        return Err(EnvelopeError::Unrecognized {
            keys: tree.keys().map(str::to_string).collect(),
        });
    };
    debug!(%shape, "located infNFe");

    let issuer = info.get(ISSUER_KEY).filter(|v| v.is_map()).ok_or_else(|| {
        EnvelopeError::Incomplete {
            shape: shape.to_string(),
            missing: ISSUER_KEY,
        }
    })?;

    let icms_totals = info
        .path(&ICMS_TOTALS_PATH)
        .filter(|v| v.is_map())
        .ok_or_else(|| EnvelopeError::Incomplete {
            shape: shape.to_string(),
            missing: "total.ICMSTot",
        })?;

    Ok(CanonicalInvoiceInfo {
        shape,
        issuer,
        icms_totals,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xml::parse_document;
    use pretty_assertions::assert_eq;

    const INFO: &str = "<infNFe><emit><xNome>Acme</xNome></emit>\
        <total><ICMSTot><vNF>1.00</vNF></ICMSTot></total></infNFe>";

    fn decode(xml: &str) -> XmlValue {
        parse_document(xml.as_bytes()).unwrap()
    }

    #[test]
    fn test_processed_shape() {
        let tree = decode(&format!("<nfeProc versao=\"4.00\"><NFe>{INFO}</NFe><protNFe/></nfeProc>"));
        let info = normalize(&tree).unwrap();
        assert_eq!(info.shape(), &EnvelopeShape::Processed);
        assert!(info.issuer().contains_key("xNome"));
    }

    #[test]
    fn test_bare_shape() {
        let tree = decode(&format!("<NFe xmlns=\"http://www.portalfiscal.inf.br/nfe\">{INFO}</NFe>"));
        let info = normalize(&tree).unwrap();
        assert_eq!(info.shape(), &EnvelopeShape::Bare);
        assert!(info.icms_totals().contains_key("vNF"));
    }

    #[test]
    fn test_suffixed_shape() {
        let info_prefixed = INFO.replace("infNFe", "nfe:infNFe");
        let tree = decode(&format!("<nfe:NFe>{info_prefixed}</nfe:NFe>"));
        // The info key itself must be unprefixed for the suffix shape.
        assert!(normalize(&tree).is_err());

        let tree = decode(&format!("<nfe:NFe>{INFO}</nfe:NFe>"));
        let info = normalize(&tree).unwrap();
        assert_eq!(info.shape(), &EnvelopeShape::Suffixed("nfe:NFe".to_string()));
        assert_eq!(info.shape().to_string(), "nfe:NFe>infNFe");
    }

    #[test]
    fn test_processed_without_invoice_falls_through() {
        // A process wrapper lacking the nested invoice matches no shape.
        let tree = decode("<nfeProc><protNFe/></nfeProc>");
        let err = normalize(&tree).unwrap_err();
        assert_eq!(
            err,
            EnvelopeError::Unrecognized {
                keys: vec!["nfeProc".to_string()]
            }
        );
    }

    #[test]
    fn test_suffix_scan_picks_first_match_in_order() {
        let tree = XmlValue::Map(vec![
            ("cteNFe".to_string(), XmlValue::Map(vec![])),
            ("ns2:NFe".to_string(), parse_document(INFO.as_bytes()).unwrap()),
            ("ns3:NFe".to_string(), parse_document(INFO.as_bytes()).unwrap()),
        ]);
        let (shape, _) = EnvelopeShape::detect(&tree).unwrap();
        assert_eq!(shape, EnvelopeShape::Suffixed("ns2:NFe".to_string()));
    }

    #[test]
    fn test_unknown_root() {
        let tree = decode("<CTe><infCte/></CTe>");
        let err = normalize(&tree).unwrap_err();
        assert!(matches!(err, EnvelopeError::Unrecognized { .. }));
        assert!(err.to_string().contains("CTe"));
    }

    #[test]
    fn test_missing_totals_block() {
        let tree = decode("<NFe><infNFe><emit><xNome>Acme</xNome></emit></infNFe></NFe>");
        let err = normalize(&tree).unwrap_err();
        assert_eq!(
            err,
            EnvelopeError::Incomplete {
                shape: "NFe>infNFe".to_string(),
                missing: "total.ICMSTot"
            }
        );
    }

    #[test]
    fn test_missing_issuer_block() {
        let tree = decode("<NFe><infNFe><total><ICMSTot><vNF>1</vNF></ICMSTot></total></infNFe></NFe>");
        let err = normalize(&tree).unwrap_err();
        assert!(matches!(err, EnvelopeError::Incomplete { missing: "emit", .. }));
    }
}
