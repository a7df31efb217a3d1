//! Header fields and identifier formats shared by every family

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::Regex;

/// Instruction priorities (`InstrPrty`, `SttlmPrty`)
pub const PRIORITIES: &[&str] = &["HIGH", "NORM"];

field_pattern!(ISPB_RE, r"^[0-9A-Z]{8}$");
field_pattern!(MSG_ID_RE, r"^M[0-9A-Z]{8}[a-zA-Z0-9]{23}$");
field_pattern!(
    TRANSACTION_ID_RE,
    r"^(?P<kind>[A-Z])(?P<ispb>[0-9A-Z]{8})(?P<year>\d{4})(?P<month>\d{2})(?P<day>\d{2})(?P<hour>\d{2})(?P<minute>\d{2})(?P<suffix>[a-zA-Z0-9]{11})$"
);
field_pattern!(
    UTC_TIMESTAMP_RE,
    r"^\d{4}-(0[1-9]|1[0-2])-(0[1-9]|[12]\d|3[01])T([01]\d|2[0-3]):[0-5]\d:[0-5]\d\.\d{3}Z$"
);
field_pattern!(ISO_DATE_RE, r"^\d{4}-(0[1-9]|1[0-2])-(0[1-9]|[12]\d|3[01])$");
field_pattern!(EMAIL_RE, r"^[^\s@]+@[^\s@]+\.[^\s@]+$");
field_pattern!(PHONE_RE, r"^\+55\d{10,11}$");
field_pattern!(
    UUID_RE,
    r"(?i)^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$"
);
field_pattern!(ALPHANUMERIC_RE, r"^[a-zA-Z0-9]+$");

field_pattern!(FROM_RE, r"<Fr>[\s\S]*?<Id>(?P<value>[^<]+)</Id>");
field_pattern!(TO_RE, r"<To>[\s\S]*?<Id>(?P<value>[^<]+)</Id>");
field_pattern!(BIZ_MSG_IDR_RE, r"<BizMsgIdr>(?P<value>[^<]+)</BizMsgIdr>");
field_pattern!(MSG_DEF_IDR_RE, r"<MsgDefIdr>(?P<value>[^<]+)</MsgDefIdr>");
field_pattern!(CRE_DT_RE, r"<CreDt>(?P<value>[^<]+)</CreDt>");
field_pattern!(GRP_HDR_MSG_ID_RE, r"<GrpHdr>[\s\S]*?<MsgId>(?P<value>[^<]+)</MsgId>");
field_pattern!(CRE_DT_TM_RE, r"<CreDtTm>(?P<value>[^<]+)</CreDtTm>");
field_pattern!(NB_OF_TXS_RE, r"<NbOfTxs>(?P<value>[^<]+)</NbOfTxs>");

/// The `value` capture of the first match
pub(crate) fn capture(pattern: &Regex, text: &str) -> Option<String> {
    pattern
        .captures(text)
        .and_then(|caps| caps.name("value"))
        .map(|m| m.as_str().to_string())
}

/// The `value` capture of every match
pub(crate) fn capture_all(pattern: &Regex, text: &str) -> Vec<String> {
    pattern
        .captures_iter(text)
        .filter_map(|caps| caps.name("value"))
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Text of every match, used to split repeated records
pub(crate) fn blocks<'t>(pattern: &Regex, text: &'t str) -> Vec<&'t str> {
    pattern.find_iter(text).map(|m| m.as_str()).collect()
}

/// A field parsed into a typed value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Parsed<T> {
    /// The field is absent
    Missing,
    /// The field is present but does not parse; holds the raw text
    Invalid(String),
    /// The parsed value
    Value(T),
}

impl<T: FromStr> Parsed<T> {
    /// Parse optional raw text
    pub fn from_text(text: Option<String>) -> Self {
        match text {
            None => Parsed::Missing,
            Some(raw) => match raw.trim().parse() {
                Ok(value) => Parsed::Value(value),
                Err(_) => Parsed::Invalid(raw),
            },
        }
    }
}

impl<T> Parsed<T> {
    /// The parsed value, if any
    pub fn value(&self) -> Option<&T> {
        match self {
            Parsed::Value(value) => Some(value),
            _ => None,
        }
    }
}

impl<T: fmt::Display> fmt::Display for Parsed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Parsed::Missing => f.write_str("missing"),
            Parsed::Invalid(raw) => f.write_str(raw),
            Parsed::Value(value) => value.fmt(f),
        }
    }
}

/// Components of an SPI transaction identifier
///
/// End-to-end (`E`), return (`D`) and instruction identifiers share the
/// layout: kind letter, ISPB, `yyyyMMddHHmm` and an 11-character suffix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionId {
    /// Leading letter
    pub kind: char,
    /// ISPB of the issuing participant
    pub ispb: String,
    /// Embedded creation time (minute precision)
    pub created: NaiveDateTime,
    /// Random suffix
    pub suffix: String,
}

impl TransactionId {
    /// Parse an identifier whose kind letter is one of `kinds`
    pub fn parse(text: &str, kinds: &[char]) -> Option<Self> {
        let caps = TRANSACTION_ID_RE.captures(text)?;
        let kind = caps.name("kind")?.as_str().chars().next()?;
        if !kinds.contains(&kind) {
            return None;
        }
        let number = |name: &str| caps.name(name).and_then(|m| m.as_str().parse::<u32>().ok());
        let created = NaiveDate::from_ymd_opt(number("year")? as i32, number("month")?, number("day")?)?
            .and_hms_opt(number("hour")?, number("minute")?, 0)?;
        Some(Self {
            kind,
            ispb: caps.name("ispb")?.as_str().to_string(),
            created,
            suffix: caps.name("suffix")?.as_str().to_string(),
        })
    }
}

/// Participant ISPB code
pub fn is_ispb(value: &str) -> bool {
    ISPB_RE.is_match(value)
}

/// Message identifier (`BizMsgIdr`, `MsgId`)
pub fn is_msg_id(value: &str) -> bool {
    MSG_ID_RE.is_match(value)
}

/// End-to-end identifier
pub fn is_end_to_end_id(value: &str) -> bool {
    TransactionId::parse(value, &['E']).is_some()
}

/// Original instruction identifier (end-to-end or return)
pub fn is_instruction_id(value: &str) -> bool {
    TransactionId::parse(value, &['E', 'D']).is_some()
}

/// Return identifier
pub fn is_return_id(value: &str) -> bool {
    TransactionId::parse(value, &['D']).is_some()
}

/// `YYYY-MM-DDTHH:mm:ss.sssZ` on a real calendar date
pub fn is_utc_timestamp(value: &str) -> bool {
    UTC_TIMESTAMP_RE.is_match(value) && DateTime::parse_from_rfc3339(value).is_ok()
}

/// `YYYY-MM-DD` on a real calendar date
pub fn is_iso_date(value: &str) -> bool {
    ISO_DATE_RE.is_match(value) && NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok()
}

fn digits_only(value: &str) -> String {
    value.chars().filter(char::is_ascii_digit).collect()
}

/// Individual taxpayer number; punctuation is ignored
pub fn is_cpf(value: &str) -> bool {
    digits_only(value).len() == 11
}

/// Company taxpayer number; punctuation is ignored
pub fn is_cnpj(value: &str) -> bool {
    digits_only(value).len() == 14
}

/// CPF or CNPJ
pub fn is_cpf_or_cnpj(value: &str) -> bool {
    is_cpf(value) || is_cnpj(value)
}

/// Pix key: CPF, CNPJ, e-mail, `+55` phone number or random UUID key
pub fn is_pix_key(value: &str) -> bool {
    let key = value.trim();
    let all_digits = !key.is_empty() && key.chars().all(|c| c.is_ascii_digit());
    (all_digits && (key.len() == 11 || key.len() == 14))
        || EMAIL_RE.is_match(key)
        || PHONE_RE.is_match(key)
        || UUID_RE.is_match(key)
}

/// Transaction id length rules per initiation form
pub fn is_tx_id(value: &str, initiation_form: &str) -> bool {
    if !ALPHANUMERIC_RE.is_match(value) {
        return false;
    }
    let len = value.len();
    match initiation_form {
        "QRES" | "INIC" => len <= 25,
        "QRDN" | "AUTO" => (26..=35).contains(&len),
        _ => len <= 35,
    }
}

/// Business application header and group header fields
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppHdrFields {
    /// Sender ISPB (`Fr/.../Id`)
    pub from_ispb: Option<String>,
    /// Receiver ISPB (`To/.../Id`)
    pub to_ispb: Option<String>,
    /// `BizMsgIdr`
    pub biz_msg_idr: Option<String>,
    /// `MsgDefIdr`
    pub msg_def_idr: Option<String>,
    /// `CreDt`
    pub cre_dt: Option<String>,
    /// `GrpHdr/MsgId`
    pub grp_hdr_msg_id: Option<String>,
    /// `GrpHdr/CreDtTm`
    pub cre_dt_tm: Option<String>,
}

impl AppHdrFields {
    /// Extract the fields from document text
    pub fn extract(xml: &str) -> Self {
        Self {
            from_ispb: capture(&FROM_RE, xml),
            to_ispb: capture(&TO_RE, xml),
            biz_msg_idr: capture(&BIZ_MSG_IDR_RE, xml),
            msg_def_idr: capture(&MSG_DEF_IDR_RE, xml),
            cre_dt: capture(&CRE_DT_RE, xml),
            grp_hdr_msg_id: capture(&GRP_HDR_MSG_ID_RE, xml),
            cre_dt_tm: capture(&CRE_DT_TM_RE, xml),
        }
    }

    /// Check formats and cross-field equality
    pub fn check(&self, expected_msg_def_idr: &str, errors: &mut Vec<String>) {
        check_ispb(self.from_ispb.as_deref(), "From ISPB", errors);
        check_ispb(self.to_ispb.as_deref(), "To ISPB", errors);
        check_msg_id(self.biz_msg_idr.as_deref(), "BizMsgIdr", errors);
        match self.msg_def_idr.as_deref() {
            None => errors.push("Missing MsgDefIdr".to_string()),
            Some(value) if value != expected_msg_def_idr => errors.push(format!(
                "Invalid MsgDefIdr: {}. Must be \"{}\"",
                value, expected_msg_def_idr
            )),
            Some(_) => {}
        }
        check_utc_timestamp(self.cre_dt.as_deref(), "CreDt", errors);
        check_msg_id(self.grp_hdr_msg_id.as_deref(), "GrpHdr MsgId", errors);
        check_utc_timestamp(self.cre_dt_tm.as_deref(), "CreDtTm", errors);

        check_same(&self.biz_msg_idr, &self.grp_hdr_msg_id, "BizMsgIdr", "GrpHdr MsgId", errors);
        check_same(&self.cre_dt, &self.cre_dt_tm, "CreDt", "CreDtTm", errors);
    }
}

fn check_ispb(value: Option<&str>, field: &str, errors: &mut Vec<String>) {
    match value {
        None => errors.push(format!("Missing {}", field)),
        Some(v) if !is_ispb(v) => errors.push(format!(
            "Invalid {} format: {}. Must be 8 alphanumeric characters [0-9A-Z]",
            field, v
        )),
        Some(_) => {}
    }
}

fn check_msg_id(value: Option<&str>, field: &str, errors: &mut Vec<String>) {
    match value {
        None => errors.push(format!("Missing {}", field)),
        Some(v) if !is_msg_id(v) => errors.push(format!(
            "Invalid {} format: {}. Must follow pattern Mxxxxxxxxkkkkkkkkkkkkkkkkkkkkkkk",
            field, v
        )),
        Some(_) => {}
    }
}

pub(crate) fn check_utc_timestamp(value: Option<&str>, field: &str, errors: &mut Vec<String>) {
    match value {
        None => errors.push(format!("Missing {}", field)),
        Some(v) if !is_utc_timestamp(v) => errors.push(format!(
            "Invalid {} format: {}. Must be in UTC format YYYY-MM-DDTHH:mm:ss.sssZ",
            field, v
        )),
        Some(_) => {}
    }
}

fn check_same(a: &Option<String>, b: &Option<String>, a_name: &str, b_name: &str, errors: &mut Vec<String>) {
    if let (Some(a), Some(b)) = (a, b) {
        if a != b {
            errors.push(format!("{} ({}) and {} ({}) must match", a_name, a, b_name, b));
        }
    }
}

/// `GrpHdr/NbOfTxs`
pub fn extract_nb_of_txs(xml: &str) -> Parsed<i64> {
    Parsed::from_text(capture(&NB_OF_TXS_RE, xml))
}

/// `NbOfTxs` must be a number of at least one
pub fn check_nb_of_txs(nb_of_txs: &Parsed<i64>, errors: &mut Vec<String>) {
    match nb_of_txs {
        Parsed::Missing => errors.push("Missing NbOfTxs".to_string()),
        Parsed::Invalid(raw) => errors.push(format!("Invalid NbOfTxs: {}. Must be >= 1", raw)),
        Parsed::Value(n) if *n < 1 => errors.push(format!("Invalid NbOfTxs: {}. Must be >= 1", n)),
        Parsed::Value(_) => {}
    }
}

/// Declared transaction count must equal the records found
pub(crate) fn check_transaction_count(nb_of_txs: &Parsed<i64>, found: usize, errors: &mut Vec<String>) {
    if nb_of_txs.value().copied() != Some(found as i64) {
        errors.push(format!(
            "NbOfTxs ({}) does not match number of transactions ({})",
            nb_of_txs, found
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = r#"<Envelope><AppHdr><Fr><FIId><FinInstnId><Othr><Id>99999010</Id></Othr></FinInstnId></FIId></Fr><To><FIId><FinInstnId><Othr><Id>99999004</Id></Othr></FinInstnId></FIId></To><BizMsgIdr>M9999901000000000000000000000001</BizMsgIdr><MsgDefIdr>pacs.002.spi.1.14</MsgDefIdr><CreDt>2024-01-15T12:30:00.000Z</CreDt></AppHdr><Document><GrpHdr><MsgId>M9999901000000000000000000000001</MsgId><CreDtTm>2024-01-15T12:30:00.000Z</CreDtTm></GrpHdr></Document></Envelope>"#;

    #[test]
    fn test_extract_and_check_header() {
        let fields = AppHdrFields::extract(HEADER);
        assert_eq!(fields.from_ispb.as_deref(), Some("99999010"));
        assert_eq!(fields.to_ispb.as_deref(), Some("99999004"));

        let mut errors = Vec::new();
        fields.check("pacs.002.spi.1.14", &mut errors);
        assert!(errors.is_empty(), "{:?}", errors);

        fields.check("pacs.008.spi.1.13", &mut errors);
        assert_eq!(
            errors,
            vec!["Invalid MsgDefIdr: pacs.002.spi.1.14. Must be \"pacs.008.spi.1.13\"".to_string()]
        );
    }

    #[test]
    fn test_cross_field_mismatch() {
        let xml = HEADER.replace(
            "<MsgId>M9999901000000000000000000000001</MsgId>",
            "<MsgId>M9999901000000000000000000000002</MsgId>",
        );
        let mut errors = Vec::new();
        AppHdrFields::extract(&xml).check("pacs.002.spi.1.14", &mut errors);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("BizMsgIdr (M9999901000000000000000000000001) and GrpHdr MsgId"));
    }

    #[test]
    fn test_missing_header_fields() {
        let mut errors = Vec::new();
        AppHdrFields::extract("<Envelope/>").check("pacs.002.spi.1.14", &mut errors);
        assert_eq!(errors.len(), 7);
        assert_eq!(errors[0], "Missing From ISPB");
    }

    #[test]
    fn test_transaction_ids() {
        let id = TransactionId::parse("E9999901020240115123012345678901", &['E']).unwrap();
        assert_eq!(id.ispb, "99999010");
        assert_eq!(id.created.to_string(), "2024-01-15 12:30:00");
        assert_eq!(id.suffix, "12345678901");

        assert!(is_end_to_end_id("E9999901020240115123012345678901"));
        assert!(!is_end_to_end_id("D9999901020240115123012345678901"));
        assert!(is_instruction_id("D9999901020240115123012345678901"));
        assert!(is_return_id("D9999901020240115123012345678901"));
        // February 30th
        assert!(!is_end_to_end_id("E9999901020240230123012345678901"));
        assert!(!is_end_to_end_id("E99999010202401151230123"));
    }

    #[test]
    fn test_timestamps_and_dates() {
        assert!(is_utc_timestamp("2024-01-15T12:30:00.000Z"));
        assert!(!is_utc_timestamp("2024-01-15T12:30:00Z"));
        assert!(!is_utc_timestamp("2024-02-30T12:30:00.000Z"));
        assert!(is_iso_date("2024-02-29"));
        assert!(!is_iso_date("2023-02-29"));
    }

    #[test]
    fn test_party_identifiers() {
        assert!(is_cpf("123.456.789-01"));
        assert!(is_cnpj("12345678000190"));
        assert!(!is_cpf_or_cnpj("1234"));

        assert!(is_pix_key("12345678901"));
        assert!(is_pix_key("pagador@example.com"));
        assert!(is_pix_key("+5561988887777"));
        assert!(is_pix_key("123e4567-e89b-12d3-a456-426614174000"));
        assert!(!is_pix_key("not a key"));
    }

    #[test]
    fn test_tx_id_lengths() {
        assert!(is_tx_id(&"a".repeat(25), "QRES"));
        assert!(!is_tx_id(&"a".repeat(26), "INIC"));
        assert!(is_tx_id(&"a".repeat(26), "QRDN"));
        assert!(!is_tx_id(&"a".repeat(25), "AUTO"));
        assert!(is_tx_id(&"a".repeat(35), "MANU"));
        assert!(!is_tx_id("tx-1", "MANU"));
    }

    #[test]
    fn test_nb_of_txs() {
        let mut errors = Vec::new();
        check_nb_of_txs(&extract_nb_of_txs("<NbOfTxs>2</NbOfTxs>"), &mut errors);
        assert!(errors.is_empty());

        check_nb_of_txs(&extract_nb_of_txs("<NbOfTxs>0</NbOfTxs>"), &mut errors);
        check_nb_of_txs(&extract_nb_of_txs("<NbOfTxs>two</NbOfTxs>"), &mut errors);
        check_nb_of_txs(&extract_nb_of_txs(""), &mut errors);
        assert_eq!(
            errors,
            vec![
                "Invalid NbOfTxs: 0. Must be >= 1".to_string(),
                "Invalid NbOfTxs: two. Must be >= 1".to_string(),
                "Missing NbOfTxs".to_string(),
            ]
        );
    }
}
