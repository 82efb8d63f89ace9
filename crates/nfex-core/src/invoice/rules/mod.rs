//! Value rules for NF-e fields.

pub mod amounts;
pub mod issuer_id;

pub use amounts::{format_brl_amount, parse_amount};
pub use issuer_id::{format_cnpj, format_cpf, format_issuer_id, validate_cnpj, validate_cpf, IssuerIdKind};
