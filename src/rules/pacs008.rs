//! pacs.008 credit transfer rules

use rust_decimal::Decimal;

use super::common::{
    blocks, capture, check_nb_of_txs, check_transaction_count, extract_nb_of_txs, is_cpf_or_cnpj,
    is_end_to_end_id, is_pix_key, is_tx_id, is_utc_timestamp, AppHdrFields, Parsed, PRIORITIES,
};
use super::BusinessRules;
use crate::detection::MessageFamily;

/// Payment initiation forms
pub const INITIATION_FORMS: &[&str] = &["APDN", "AUTO", "DICT", "INIC", "MANU", "QRDN", "QRES"];

/// Payment purposes
pub const PURPOSES: &[&str] = &["GSCB", "IPAY", "OTHR", "REFU"];

/// Service levels
pub const SERVICE_LEVELS: &[&str] = &["PAGAGD", "PAGFRD", "PAGPRI"];

/// Initiation forms that carry a transaction id
const TX_ID_FORMS: &[&str] = &["QRES", "QRDN", "INIC", "AUTO"];

/// Initiation forms that require a Pix key
const PIX_KEY_REQUIRED: &[&str] = &["QRDN", "QRES", "APDN", "INIC"];

/// Initiation forms that must not carry a Pix key
const PIX_KEY_FORBIDDEN: &[&str] = &["MANU", "AUTO"];

/// Batch size for scheduled payments
pub const MAX_SCHEDULED_TRANSACTIONS: i64 = 500;

/// Batch size for every other service level
pub const MAX_TRANSACTIONS: i64 = 10;

field_pattern!(CDT_TRF_TX_INF_RE, r"<CdtTrfTxInf>[\s\S]*?</CdtTrfTxInf>");
field_pattern!(INSTR_PRTY_RE, r"<InstrPrty>(?P<value>[^<]+)</InstrPrty>");
field_pattern!(SVC_LVL_RE, r"<SvcLvl>[\s\S]*?<Prtry>(?P<value>[^<]+)</Prtry>");
field_pattern!(END_TO_END_ID_RE, r"<EndToEndId>(?P<value>[^<]+)</EndToEndId>");
field_pattern!(TX_ID_RE, r"<TxId>(?P<value>[^<]+)</TxId>");
field_pattern!(AMOUNT_RE, r"<IntrBkSttlmAmt[^>]*>(?P<value>[^<]+)</IntrBkSttlmAmt>");
field_pattern!(ACCPTNC_DT_TM_RE, r"<AccptncDtTm>(?P<value>[^<]+)</AccptncDtTm>");
field_pattern!(INITIATION_FORM_RE, r"<MndtRltdInf>[\s\S]*?<Prtry>(?P<value>[^<]+)</Prtry>");
field_pattern!(PURPOSE_RE, r"<Purp>[\s\S]*?<Cd>(?P<value>[^<]+)</Cd>");
field_pattern!(DEBTOR_NAME_RE, r"<Dbtr>[\s\S]*?<Nm>(?P<value>[^<]+)</Nm>");
field_pattern!(DEBTOR_ID_RE, r"<Dbtr>[\s\S]*?<Id>[\s\S]*?<Id>(?P<value>[^<]+)</Id>");
field_pattern!(PIX_KEY_RE, r"<Prxy>[\s\S]*?<Id>(?P<value>[^<]+)</Id>");

/// One `CdtTrfTxInf` record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreditTransfer {
    /// `PmtId/EndToEndId`
    pub end_to_end_id: Option<String>,
    /// `PmtId/TxId`
    pub tx_id: Option<String>,
    /// `IntrBkSttlmAmt`
    pub amount: Parsed<Decimal>,
    /// `AccptncDtTm`
    pub accepted_at: Option<String>,
    /// `MndtRltdInf/Tp/LclInstrm/Prtry`
    pub initiation_form: Option<String>,
    /// `Purp/Cd`
    pub purpose: Option<String>,
    /// `Dbtr/Nm`
    pub debtor_name: Option<String>,
    /// `Dbtr/Id/.../Id`
    pub debtor_id: Option<String>,
    /// `CdtrAcct/Prxy/Id`
    pub pix_key: Option<String>,
}

impl CreditTransfer {
    fn extract(block: &str) -> Self {
        Self {
            end_to_end_id: capture(&END_TO_END_ID_RE, block),
            tx_id: capture(&TX_ID_RE, block),
            amount: Parsed::from_text(capture(&AMOUNT_RE, block)),
            accepted_at: capture(&ACCPTNC_DT_TM_RE, block),
            initiation_form: capture(&INITIATION_FORM_RE, block),
            purpose: capture(&PURPOSE_RE, block),
            debtor_name: capture(&DEBTOR_NAME_RE, block),
            debtor_id: capture(&DEBTOR_ID_RE, block),
            pix_key: capture(&PIX_KEY_RE, block),
        }
    }

    fn check(&self, number: usize, errors: &mut Vec<String>) {
        match self.end_to_end_id.as_deref() {
            None => errors.push(format!("Missing EndToEndId in transaction {}", number)),
            Some(id) if !is_end_to_end_id(id) => {
                errors.push(format!("Invalid EndToEndId format in transaction {}: {}", number, id))
            }
            Some(_) => {}
        }

        let form = self.initiation_form.as_deref();
        if let Some(form) = form.filter(|f| TX_ID_FORMS.contains(f)) {
            match self.tx_id.as_deref() {
                None => errors.push(format!(
                    "TxId is required for initiationForm {} in transaction {}",
                    form, number
                )),
                Some(tx_id) if !is_tx_id(tx_id, form) => {
                    errors.push(format!("Invalid TxId format in transaction {}: {}", number, tx_id))
                }
                Some(_) => {}
            }
        }

        match form {
            None => errors.push(format!("Missing Initiation Form in transaction {}", number)),
            Some(f) if !INITIATION_FORMS.contains(&f) => {
                errors.push(format!("Invalid Initiation Form in transaction {}: {}", number, f))
            }
            Some(_) => {}
        }

        match self.purpose.as_deref() {
            None => errors.push(format!("Missing Purpose in transaction {}", number)),
            Some(p) if !PURPOSES.contains(&p) => {
                errors.push(format!("Invalid Purpose in transaction {}: {}", number, p))
            }
            Some(_) => {}
        }

        if !self.amount.value().is_some_and(|a| *a > Decimal::ZERO) {
            errors.push(format!("Invalid amount in transaction {}: {}", number, self.amount));
        }

        match self.accepted_at.as_deref() {
            None => errors.push(format!("Missing Acceptance DateTime in transaction {}", number)),
            Some(ts) if !is_utc_timestamp(ts) => errors.push(format!(
                "Invalid Acceptance DateTime format in transaction {}: {}",
                number, ts
            )),
            Some(_) => {}
        }

        match self.debtor_id.as_deref() {
            None => errors.push(format!("Missing Debtor CPF/CNPJ in transaction {}", number)),
            Some(id) if !is_cpf_or_cnpj(id) => errors.push(format!(
                "Invalid Debtor CPF/CNPJ format in transaction {}: {}",
                number, id
            )),
            Some(_) => {}
        }

        if let Some(form) = form {
            let key_ok = self.pix_key.as_deref().is_some_and(is_pix_key);
            if PIX_KEY_REQUIRED.contains(&form) && !key_ok {
                errors.push(format!(
                    "Pix key is required for initiationForm {} in transaction {}",
                    form, number
                ));
            }
            if PIX_KEY_FORBIDDEN.contains(&form) && self.pix_key.is_some() {
                errors.push(format!(
                    "Pix key should not be provided for initiationForm {} in transaction {}",
                    form, number
                ));
            }
        }
    }
}

/// Fields checked for a credit transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pacs008Fields {
    /// Header fields
    pub header: AppHdrFields,
    /// `GrpHdr/NbOfTxs`
    pub nb_of_txs: Parsed<i64>,
    /// `PmtTpInf/InstrPrty`
    pub instruction_priority: Option<String>,
    /// `PmtTpInf/SvcLvl/Prtry`
    pub service_level: Option<String>,
    /// `CdtTrfTxInf` records
    pub transactions: Vec<CreditTransfer>,
}

impl Pacs008Fields {
    /// Extract from document text
    pub fn extract(xml: &str) -> Self {
        Self {
            header: AppHdrFields::extract(xml),
            nb_of_txs: extract_nb_of_txs(xml),
            instruction_priority: capture(&INSTR_PRTY_RE, xml),
            service_level: capture(&SVC_LVL_RE, xml),
            transactions: blocks(&CDT_TRF_TX_INF_RE, xml)
                .into_iter()
                .map(CreditTransfer::extract)
                .collect(),
        }
    }

    /// Every violated rule
    pub fn check(&self) -> Vec<String> {
        let mut errors = Vec::new();
        self.header
            .check(&MessageFamily::Pacs008.header_identifier(), &mut errors);
        check_nb_of_txs(&self.nb_of_txs, &mut errors);

        let priority = self.instruction_priority.as_deref();
        let level = self.service_level.as_deref();

        match priority {
            None => errors.push("Missing InstrPrty".to_string()),
            Some(p) if !PRIORITIES.contains(&p) => {
                errors.push(format!("Invalid InstrPrty: {}. Must be HIGH or NORM", p))
            }
            Some(_) => {}
        }
        match level {
            None => errors.push("Missing Service Level".to_string()),
            Some(l) if !SERVICE_LEVELS.contains(&l) => errors.push(format!(
                "Invalid Service Level: {}. Must be PAGPRI, PAGFRD, or PAGAGD",
                l
            )),
            Some(_) => {}
        }
        if priority == Some("HIGH") && level != Some("PAGPRI") {
            errors.push("When InstrPrty is HIGH, Service Level must be PAGPRI".to_string());
        }
        if priority == Some("NORM") && !matches!(level, Some("PAGFRD") | Some("PAGAGD")) {
            errors.push("When InstrPrty is NORM, Service Level must be PAGFRD or PAGAGD".to_string());
        }

        let limit = if level == Some("PAGAGD") {
            MAX_SCHEDULED_TRANSACTIONS
        } else {
            MAX_TRANSACTIONS
        };
        if let Some(&n) = self.nb_of_txs.value() {
            if n > limit {
                errors.push(format!(
                    "NbOfTxs ({}) exceeds maximum ({}) for service level {}",
                    n,
                    limit,
                    level.unwrap_or("none")
                ));
            }
        }

        if self.transactions.is_empty() {
            errors.push("Missing transactions (CdtTrfTxInf elements)".to_string());
            return errors;
        }
        check_transaction_count(&self.nb_of_txs, self.transactions.len(), &mut errors);
        for (i, tx) in self.transactions.iter().enumerate() {
            tx.check(i + 1, &mut errors);
        }
        errors
    }
}

/// Rules for `pacs.008`
#[derive(Debug, Clone, Copy, Default)]
pub struct Pacs008Rules;

impl BusinessRules for Pacs008Rules {
    fn family(&self) -> MessageFamily {
        MessageFamily::Pacs008
    }

    fn validate(&self, xml: &str) -> Vec<String> {
        Pacs008Fields::extract(xml).check()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const HEADER: &str = r#"<AppHdr><Fr><FIId><FinInstnId><Othr><Id>99999010</Id></Othr></FinInstnId></FIId></Fr><To><FIId><FinInstnId><Othr><Id>99999004</Id></Othr></FinInstnId></FIId></To><BizMsgIdr>M9999901000000000000000000000003</BizMsgIdr><MsgDefIdr>pacs.008.spi.1.13</MsgDefIdr><CreDt>2024-01-15T12:30:00.000Z</CreDt></AppHdr>"#;

    fn transfer(form: &str, tx_id: Option<&str>, pix_key: Option<&str>) -> String {
        let tx_id = tx_id.map(|t| format!("<TxId>{}</TxId>", t)).unwrap_or_default();
        let pix_key = pix_key
            .map(|k| format!("<CdtrAcct><Prxy><Id>{}</Id></Prxy></CdtrAcct>", k))
            .unwrap_or_default();
        format!(
            r#"<CdtTrfTxInf><PmtId><EndToEndId>E9999901020240115123012345678901</EndToEndId>{}</PmtId><IntrBkSttlmAmt Ccy="BRL">150.00</IntrBkSttlmAmt><AccptncDtTm>2024-01-15T12:29:59.000Z</AccptncDtTm><MndtRltdInf><Tp><LclInstrm><Prtry>{}</Prtry></LclInstrm></Tp></MndtRltdInf><Dbtr><Nm>Fulano de Tal</Nm><Id><PrvtId><Othr><Id>12345678901</Id></Othr></PrvtId></Id></Dbtr>{}<Purp><Cd>IPAY</Cd></Purp></CdtTrfTxInf>"#,
            tx_id, form, pix_key
        )
    }

    fn message(priority: &str, level: &str, nb: &str, txs: &[String]) -> String {
        format!(
            "<Envelope>{}<Document><FIToFICstmrCdtTrf><GrpHdr><MsgId>M9999901000000000000000000000003</MsgId><CreDtTm>2024-01-15T12:30:00.000Z</CreDtTm><NbOfTxs>{}</NbOfTxs><PmtTpInf><InstrPrty>{}</InstrPrty><SvcLvl><Prtry>{}</Prtry></SvcLvl></PmtTpInf></GrpHdr>{}</FIToFICstmrCdtTrf></Document></Envelope>",
            HEADER,
            nb,
            priority,
            level,
            txs.concat()
        )
    }

    #[test]
    fn test_valid_manual_transfer() {
        let xml = message("HIGH", "PAGPRI", "1", &[transfer("MANU", None, None)]);
        let fields = Pacs008Fields::extract(&xml);
        assert_eq!(fields.transactions[0].debtor_name.as_deref(), Some("Fulano de Tal"));
        assert_eq!(fields.transactions[0].debtor_id.as_deref(), Some("12345678901"));
        assert_eq!(fields.check(), Vec::<String>::new());
    }

    #[test]
    fn test_priority_and_service_level() {
        let xml = message("HIGH", "PAGFRD", "1", &[transfer("MANU", None, None)]);
        assert_eq!(
            Pacs008Rules.validate(&xml),
            vec!["When InstrPrty is HIGH, Service Level must be PAGPRI".to_string()]
        );

        let xml = message("NORM", "PAGAGD", "1", &[transfer("MANU", None, None)]);
        assert!(Pacs008Rules.validate(&xml).is_empty());
    }

    #[test]
    fn test_batch_limit() {
        let txs: Vec<String> = (0..11).map(|_| transfer("MANU", None, None)).collect();
        let errors = Pacs008Rules.validate(&message("NORM", "PAGFRD", "11", &txs));
        assert_eq!(
            errors,
            vec!["NbOfTxs (11) exceeds maximum (10) for service level PAGFRD".to_string()]
        );
    }

    #[test]
    fn test_pix_key_rules() {
        let xml = message("HIGH", "PAGPRI", "1", &[transfer("DICT", None, Some("pagador@example.com"))]);
        assert!(Pacs008Rules.validate(&xml).is_empty());

        let xml = message("HIGH", "PAGPRI", "1", &[transfer("INIC", Some("abc123"), None)]);
        assert_eq!(
            Pacs008Rules.validate(&xml),
            vec!["Pix key is required for initiationForm INIC in transaction 1".to_string()]
        );

        let xml = message("HIGH", "PAGPRI", "1", &[transfer("MANU", None, Some("12345678901"))]);
        assert_eq!(
            Pacs008Rules.validate(&xml),
            vec!["Pix key should not be provided for initiationForm MANU in transaction 1".to_string()]
        );
    }

    #[test]
    fn test_tx_id_rules() {
        let short = "a".repeat(20);
        let xml = message("HIGH", "PAGPRI", "1", &[transfer("QRDN", Some(&short), Some("12345678901"))]);
        assert_eq!(
            Pacs008Rules.validate(&xml),
            vec![format!("Invalid TxId format in transaction 1: {}", short)]
        );

        let xml = message("HIGH", "PAGPRI", "1", &[transfer("QRES", None, Some("12345678901"))]);
        assert_eq!(
            Pacs008Rules.validate(&xml),
            vec!["TxId is required for initiationForm QRES in transaction 1".to_string()]
        );
    }
}
