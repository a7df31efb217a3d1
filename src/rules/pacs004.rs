//! pacs.004 payment return rules

use rust_decimal::Decimal;

use super::common::{
    blocks, capture, capture_all, check_nb_of_txs, check_transaction_count, extract_nb_of_txs,
    is_end_to_end_id, is_return_id, AppHdrFields, Parsed, PRIORITIES,
};
use super::BusinessRules;
use crate::detection::MessageFamily;

/// Return reason codes
pub const RETURN_REASON_CODES: &[&str] = &["BE08", "FR01", "MD06", "SL02"];

/// Longest accepted `AddtlInf`
pub const MAX_ADDITIONAL_INFO: usize = 105;

field_pattern!(TX_INF_RE, r"<TxInf>[\s\S]*?</TxInf>");
field_pattern!(RTR_ID_RE, r"<RtrId>(?P<value>[^<]+)</RtrId>");
field_pattern!(ORGNL_END_TO_END_ID_RE, r"<OrgnlEndToEndId>(?P<value>[^<]+)</OrgnlEndToEndId>");
field_pattern!(AMOUNT_RE, r"<RtrdIntrBkSttlmAmt[^>]*>(?P<value>[^<]+)</RtrdIntrBkSttlmAmt>");
field_pattern!(STTLM_PRTY_RE, r"<SttlmPrty>(?P<value>[^<]+)</SttlmPrty>");
field_pattern!(RTR_RSN_CD_RE, r"<RtrRsnInf>[\s\S]*?<Cd>(?P<value>[^<]+)</Cd>");
field_pattern!(ADDTL_INF_RE, r"<AddtlInf>(?P<value>[^<]+)</AddtlInf>");

/// One `TxInf` record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReturnTransaction {
    /// `RtrId`
    pub return_id: Option<String>,
    /// `OrgnlEndToEndId`
    pub original_end_to_end_id: Option<String>,
    /// `RtrdIntrBkSttlmAmt`
    pub amount: Parsed<Decimal>,
    /// `SttlmPrty`
    pub settlement_priority: Option<String>,
    /// `RtrRsnInf/Rsn/Cd`
    pub reason: Option<String>,
    /// Every `AddtlInf`
    pub additional_info: Vec<String>,
}

impl ReturnTransaction {
    fn extract(block: &str) -> Self {
        Self {
            return_id: capture(&RTR_ID_RE, block),
            original_end_to_end_id: capture(&ORGNL_END_TO_END_ID_RE, block),
            amount: Parsed::from_text(capture(&AMOUNT_RE, block)),
            settlement_priority: capture(&STTLM_PRTY_RE, block),
            reason: capture(&RTR_RSN_CD_RE, block),
            additional_info: capture_all(&ADDTL_INF_RE, block),
        }
    }

    fn check(&self, number: usize, errors: &mut Vec<String>) {
        match self.return_id.as_deref() {
            None => errors.push(format!("Missing RtrId in transaction {}", number)),
            Some(id) if !is_return_id(id) => errors.push(format!(
                "Invalid RtrId format in transaction {}: {}. Must follow pattern DxxxxxxxxyyyyMMddHHmmkkkkkkkkkkk",
                number, id
            )),
            Some(_) => {}
        }

        match self.original_end_to_end_id.as_deref() {
            None => errors.push(format!("Missing OrgnlEndToEndId in transaction {}", number)),
            Some(id) if !is_end_to_end_id(id) => errors.push(format!(
                "Invalid OrgnlEndToEndId format in transaction {}: {}. Must follow pattern Exxxxxxxxyyyymmddhhmmkkkkkkkkkkk",
                number, id
            )),
            Some(_) => {}
        }

        if !self.amount.value().is_some_and(|a| *a > Decimal::ZERO) {
            errors.push(format!(
                "Invalid amount in transaction {}: {}. Must be a positive number",
                number, self.amount
            ));
        }

        match self.settlement_priority.as_deref() {
            None => errors.push(format!("Missing SttlmPrty in transaction {}", number)),
            Some(p) if !PRIORITIES.contains(&p) => errors.push(format!(
                "Invalid SttlmPrty in transaction {}: {}. Must be HIGH or NORM",
                number, p
            )),
            Some(_) => {}
        }

        match self.reason.as_deref() {
            None => errors.push(format!("Missing Return Reason Code in transaction {}", number)),
            Some(code) if !RETURN_REASON_CODES.contains(&code) => errors.push(format!(
                "Invalid Return Reason Code in transaction {}: {}. Must be one of: {}",
                number,
                code,
                RETURN_REASON_CODES.join(", ")
            )),
            Some(_) => {}
        }

        for (i, info) in self.additional_info.iter().enumerate() {
            if info.chars().count() > MAX_ADDITIONAL_INFO {
                errors.push(format!(
                    "AdditionalInfo {} in transaction {} exceeds {} characters",
                    i + 1,
                    number,
                    MAX_ADDITIONAL_INFO
                ));
            }
        }
    }
}

/// Fields checked for a payment return
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pacs004Fields {
    /// Header fields
    pub header: AppHdrFields,
    /// `GrpHdr/NbOfTxs`
    pub nb_of_txs: Parsed<i64>,
    /// `TxInf` records
    pub transactions: Vec<ReturnTransaction>,
}

impl Pacs004Fields {
    /// Extract from document text
    pub fn extract(xml: &str) -> Self {
        Self {
            header: AppHdrFields::extract(xml),
            nb_of_txs: extract_nb_of_txs(xml),
            transactions: blocks(&TX_INF_RE, xml)
                .into_iter()
                .map(ReturnTransaction::extract)
                .collect(),
        }
    }

    /// Every violated rule
    pub fn check(&self) -> Vec<String> {
        let mut errors = Vec::new();
        self.header
            .check(&MessageFamily::Pacs004.header_identifier(), &mut errors);
        check_nb_of_txs(&self.nb_of_txs, &mut errors);

        if self.transactions.is_empty() {
            errors.push("Missing transactions (TxInf elements)".to_string());
            return errors;
        }
        check_transaction_count(&self.nb_of_txs, self.transactions.len(), &mut errors);
        for (i, tx) in self.transactions.iter().enumerate() {
            tx.check(i + 1, &mut errors);
        }
        errors
    }
}

/// Rules for `pacs.004`
#[derive(Debug, Clone, Copy, Default)]
pub struct Pacs004Rules;

impl BusinessRules for Pacs004Rules {
    fn family(&self) -> MessageFamily {
        MessageFamily::Pacs004
    }

    fn validate(&self, xml: &str) -> Vec<String> {
        Pacs004Fields::extract(xml).check()
    }
}
