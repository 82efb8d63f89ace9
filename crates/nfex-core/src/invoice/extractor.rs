//! Typed field extraction from the canonical invoice info.

use rust_decimal::Decimal;
use tracing::debug;

use super::envelope::CanonicalInvoiceInfo;
use super::rules::{parse_amount, IssuerIdKind};
use crate::error::{ExtractionError, Field};
use crate::models::InvoiceRecord;
use crate::xml::XmlValue;

/// Issuer name element inside `emit`.
pub const ISSUER_NAME_KEY: &str = "xNome";

/// Invoice total element inside `ICMSTot`.
pub const INVOICE_TOTAL_KEY: &str = "vNF";

/// ICMS total element inside `ICMSTot`.
pub const TAX_TOTAL_KEY: &str = "vICMS";

/// Reads issuer and totals out of `infNFe`.
///
/// Absence is always an error; nothing is defaulted to zero.
#[derive(Debug, Clone)]
pub struct FieldExtractor {
    /// Whether to check CNPJ/CPF check digits.
    validate_issuer_id: bool,
    /// Whether `emit.CPF` is accepted when `emit.CNPJ` is absent.
    accept_cpf: bool,
}

impl FieldExtractor {
    /// Create a new extractor with default settings.
    pub fn new() -> Self {
        Self {
            validate_issuer_id: false,
            accept_cpf: true,
        }
    }

    /// Set CNPJ/CPF check digit validation.
    pub fn with_issuer_id_validation(mut self, validate: bool) -> Self {
        self.validate_issuer_id = validate;
        self
    }

    /// Set whether individual (CPF) issuers are accepted.
    pub fn with_cpf_issuers(mut self, accept: bool) -> Self {
        self.accept_cpf = accept;
        self
    }

    /// Build the record for one document.
    pub fn extract(
        &self,
        info: &CanonicalInvoiceInfo<'_>,
        source_name: &str,
    ) -> Result<InvoiceRecord, ExtractionError> {
        let issuer_id = self.issuer_id(info.issuer(), source_name)?;
        let issuer_name = required_text(info.issuer(), ISSUER_NAME_KEY, Field::IssuerName, source_name)?;
        let invoice_total = amount(info.icms_totals(), INVOICE_TOTAL_KEY, Field::InvoiceTotal, source_name)?;
        let tax_total = amount(info.icms_totals(), TAX_TOTAL_KEY, Field::TaxTotal, source_name)?;

        debug!(
            source = source_name,
            issuer = %issuer_name,
            %invoice_total,
            %tax_total,
            "extracted invoice fields"
        );

        Ok(InvoiceRecord {
            source_name: source_name.to_string(),
            issuer_id,
            issuer_name,
            invoice_total,
            tax_total,
        })
    }

    fn issuer_id(&self, issuer: &XmlValue, source_name: &str) -> Result<String, ExtractionError> {
        let mut kinds = vec![IssuerIdKind::Cnpj];
        if self.accept_cpf {
            kinds.push(IssuerIdKind::Cpf);
        }

        for kind in kinds {
            if !issuer.contains_key(kind.key()) {
                continue;
            }

            let id = required_text(issuer, kind.key(), Field::IssuerId, source_name)?;
            if self.validate_issuer_id && !kind.validate(&id) {
                return Err(ExtractionError::invalid(
                    Field::IssuerId,
                    source_name,
                    id,
                    format!("{} check digits do not match", kind.key()),
                ));
            }
            return Ok(id);
        }

        Err(ExtractionError::missing(Field::IssuerId, source_name))
    }
}

impl Default for FieldExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Non-empty text of a child element.
fn required_text(
    parent: &XmlValue,
    key: &str,
    field: Field,
    source_name: &str,
) -> Result<String, ExtractionError> {
    match parent.get(key) {
        None | Some(XmlValue::Null) => Err(ExtractionError::missing(field, source_name)),
        Some(node) => match node.as_text() {
            Some(text) if !text.trim().is_empty() => Ok(text.trim().to_string()),
            Some(_) => Err(ExtractionError::missing(field, source_name)),
            None => Err(ExtractionError::invalid(
                field,
                source_name,
                key,
                format!("expected text, found {}", node.kind()),
            )),
        },
    }
}

fn amount(
    totals: &XmlValue,
    key: &str,
    field: Field,
    source_name: &str,
) -> Result<Decimal, ExtractionError> {
    let raw = required_text(totals, key, field, source_name)?;
    parse_amount(&raw).ok_or_else(|| {
        ExtractionError::invalid(
            field,
            source_name,
            raw,
            "not an NF-e amount (up to 13 integer and 2 decimal digits)",
        )
    })
}
