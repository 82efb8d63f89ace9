//! CNPJ/CPF (Brazilian taxpayer identifiers) validation and formatting.

/// Which identifier an issuer declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssuerIdKind {
    /// Company registry number, 14 digits.
    Cnpj,
    /// Individual taxpayer number, 11 digits.
    Cpf,
}

impl IssuerIdKind {
    /// Element name inside `emit`.
    pub fn key(&self) -> &'static str {
        match self {
            IssuerIdKind::Cnpj => "CNPJ",
            IssuerIdKind::Cpf => "CPF",
        }
    }

    /// Check digits of an identifier of this kind.
    pub fn validate(&self, id: &str) -> bool {
        match self {
            IssuerIdKind::Cnpj => validate_cnpj(id),
            IssuerIdKind::Cpf => validate_cpf(id),
        }
    }
}

fn digits_of(id: &str) -> Vec<u32> {
    id.chars().filter_map(|c| c.to_digit(10)).collect()
}

/// Mod-11 check digit shared by CNPJ and CPF.
fn check_digit(digits: &[u32], weights: &[u32]) -> u32 {
    let sum: u32 = digits.iter().zip(weights).map(|(d, w)| d * w).sum();
    match sum % 11 {
        0 | 1 => 0,
        r => 11 - r,
    }
}

fn all_same(digits: &[u32]) -> bool {
    digits.windows(2).all(|w| w[0] == w[1])
}

/// Validate a CNPJ using its two check digits.
///
/// Weights: 5,4,3,2,9,8,7,6,5,4,3,2 then 6,5,4,3,2,9,8,7,6,5,4,3,2
pub fn validate_cnpj(cnpj: &str) -> bool {
    if cnpj.chars().any(|c| !c.is_ascii_digit() && !matches!(c, '.' | '/' | '-')) {
        return false;
    }

    let digits = digits_of(cnpj);
    if digits.len() != 14 || all_same(&digits) {
        return false;
    }

    const FIRST: [u32; 12] = [5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2];
    const SECOND: [u32; 13] = [6, 5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2];

    check_digit(&digits[..12], &FIRST) == digits[12]
        && check_digit(&digits[..13], &SECOND) == digits[13]
}

/// Validate a CPF using its two check digits.
///
/// Weights: 10..=2 then 11..=2
pub fn validate_cpf(cpf: &str) -> bool {
    if cpf.chars().any(|c| !c.is_ascii_digit() && !matches!(c, '.' | '-')) {
        return false;
    }

    let digits = digits_of(cpf);
    if digits.len() != 11 || all_same(&digits) {
        return false;
    }

    let first: Vec<u32> = (2..=10).rev().collect();
    let second: Vec<u32> = (2..=11).rev().collect();

    check_digit(&digits[..9], &first) == digits[9]
        && check_digit(&digits[..10], &second) == digits[10]
}

/// Format a CNPJ as `00.000.000/0000-00`.
pub fn format_cnpj(cnpj: &str) -> String {
    let d: String = cnpj.chars().filter(|c| c.is_ascii_digit()).collect();

    if d.len() != 14 {
        return cnpj.to_string();
    }

    format!("{}.{}.{}/{}-{}", &d[0..2], &d[2..5], &d[5..8], &d[8..12], &d[12..14])
}

/// Format a CPF as `000.000.000-00`.
pub fn format_cpf(cpf: &str) -> String {
    let d: String = cpf.chars().filter(|c| c.is_ascii_digit()).collect();

    if d.len() != 11 {
        return cpf.to_string();
    }

    format!("{}.{}.{}-{}", &d[0..3], &d[3..6], &d[6..9], &d[9..11])
}

/// Format an issuer id by its length; unknown lengths are returned unchanged.
pub fn format_issuer_id(id: &str) -> String {
    match id.chars().filter(|c| c.is_ascii_digit()).count() {
        14 => format_cnpj(id),
        11 => format_cpf(id),
        _ => id.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_cnpj_valid() {
        assert!(validate_cnpj("11222333000181"));
        assert!(validate_cnpj("11.222.333/0001-81"));
        assert!(validate_cnpj("45997418000153"));
    }

    #[test]
    fn test_validate_cnpj_invalid() {
        assert!(!validate_cnpj("11222333000182")); // Invalid check digit
        assert!(!validate_cnpj("1122233300018")); // Too short
        assert!(!validate_cnpj("00000000000000")); // Repeated digits
        assert!(!validate_cnpj("11222333000A81"));
    }

    #[test]
    fn test_validate_cpf() {
        assert!(validate_cpf("52998224725"));
        assert!(validate_cpf("529.982.247-25"));
        assert!(!validate_cpf("52998224724"));
        assert!(!validate_cpf("11111111111"));
    }

    #[test]
    fn test_format_issuer_id() {
        assert_eq!(format_issuer_id("11222333000181"), "11.222.333/0001-81");
        assert_eq!(format_issuer_id("52998224725"), "529.982.247-25");
        assert_eq!(format_issuer_id("123"), "123");
    }

    #[test]
    fn test_kind_dispatch() {
        assert_eq!(IssuerIdKind::Cpf.key(), "CPF");
        assert!(IssuerIdKind::Cnpj.validate("11222333000181"));
        assert!(!IssuerIdKind::Cpf.validate("11222333000181"));
    }
}
