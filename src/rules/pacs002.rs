//! pacs.002 payment status report rules

use super::common::{capture, check_utc_timestamp, is_end_to_end_id, is_instruction_id, is_iso_date, AppHdrFields};
use super::BusinessRules;
use crate::detection::MessageFamily;

/// Transaction statuses
pub const TRANSACTION_STATUSES: &[&str] = &["ACCC", "ACSC", "ACSP", "RJCT"];

/// Status reason codes accepted by the clearing system
pub const STATUS_REASON_CODES: &[&str] = &[
    "AB03", "AB09", "AB11", "AC03", "AC06", "AC07", "AC14", "AG03", "AG12", "AG13", "AGNT",
    "AM01", "AM02", "AM04", "AM09", "AM12", "AM18", "BE01", "BE05", "BE15", "BE17", "CH11",
    "CH16", "CN01", "DS04", "DS0G", "DS27", "DT02", "DT05", "DUPL", "ED05", "FF07", "FF08",
    "FRAD", "MD01", "RC09", "RC10", "RR04", "SL02", "UPAY",
];

field_pattern!(ORGNL_INSTR_ID_RE, r"<OrgnlInstrId>(?P<value>[^<]+)</OrgnlInstrId>");
field_pattern!(ORGNL_END_TO_END_ID_RE, r"<OrgnlEndToEndId>(?P<value>[^<]+)</OrgnlEndToEndId>");
field_pattern!(TX_STS_RE, r"<TxSts>(?P<value>[^<]+)</TxSts>");
field_pattern!(STS_RSN_CD_RE, r"<StsRsnInf>[\s\S]*?<Cd>(?P<value>[^<]+)</Cd>");
field_pattern!(FCTV_DT_TM_RE, r"<FctvIntrBkSttlmDt>[\s\S]*?<DtTm>(?P<value>[^<]+)</DtTm>");
field_pattern!(INTR_BK_STTLM_DT_RE, r"<IntrBkSttlmDt>(?P<value>[^<]+)</IntrBkSttlmDt>");

/// Fields checked for a status report
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pacs002Fields {
    /// Header fields
    pub header: AppHdrFields,
    /// `OrgnlInstrId`
    pub orgnl_instr_id: Option<String>,
    /// `OrgnlEndToEndId`
    pub orgnl_end_to_end_id: Option<String>,
    /// `TxSts`
    pub tx_sts: Option<String>,
    /// `StsRsnInf/Rsn/Cd`
    pub status_reason: Option<String>,
    /// `FctvIntrBkSttlmDt/DtTm`
    pub effective_settlement: Option<String>,
    /// `IntrBkSttlmDt`
    pub settlement_date: Option<String>,
}

impl Pacs002Fields {
    /// Extract from document text
    pub fn extract(xml: &str) -> Self {
        Self {
            header: AppHdrFields::extract(xml),
            orgnl_instr_id: capture(&ORGNL_INSTR_ID_RE, xml),
            orgnl_end_to_end_id: capture(&ORGNL_END_TO_END_ID_RE, xml),
            tx_sts: capture(&TX_STS_RE, xml),
            status_reason: capture(&STS_RSN_CD_RE, xml),
            effective_settlement: capture(&FCTV_DT_TM_RE, xml),
            settlement_date: capture(&INTR_BK_STTLM_DT_RE, xml),
        }
    }

    /// Every violated rule
    pub fn check(&self) -> Vec<String> {
        let mut errors = Vec::new();
        self.header
            .check(&MessageFamily::Pacs002.header_identifier(), &mut errors);

        match self.orgnl_instr_id.as_deref() {
            None => errors.push("Missing OrgnlInstrId".to_string()),
            Some(id) if !is_instruction_id(id) => errors.push(format!(
                "Invalid OrgnlInstrId format: {}. Must follow pattern [E|D]xxxxxxxxyyyymmddhhmmkkkkkkkkkkk",
                id
            )),
            Some(_) => {}
        }

        match self.orgnl_end_to_end_id.as_deref() {
            None => errors.push("Missing OrgnlEndToEndId".to_string()),
            Some(id) if !is_end_to_end_id(id) => errors.push(format!(
                "Invalid OrgnlEndToEndId format: {}. Must follow pattern Exxxxxxxxyyyymmddhhmmkkkkkkkkkkk",
                id
            )),
            Some(_) => {}
        }

        match self.tx_sts.as_deref() {
            None => errors.push("Missing TxSts".to_string()),
            Some(status) if !TRANSACTION_STATUSES.contains(&status) => errors.push(format!(
                "Invalid TxSts: {}. Must be one of: {}",
                status,
                TRANSACTION_STATUSES.join(", ")
            )),
            Some(_) => {}
        }

        if let Some(reason) = self.status_reason.as_deref() {
            if !STATUS_REASON_CODES.contains(&reason) {
                errors.push(format!(
                    "Invalid Status Reason Code: {}. Must be a valid error code",
                    reason
                ));
            }
        }

        if self.tx_sts.as_deref() == Some("RJCT") && self.status_reason.is_none() {
            errors.push("RJCT status requires a Status Reason Code".to_string());
        }

        if self.effective_settlement.is_some() {
            check_utc_timestamp(self.effective_settlement.as_deref(), "FctvIntrBkSttlmDt", &mut errors);
        }

        if let Some(date) = self.settlement_date.as_deref() {
            if !is_iso_date(date) {
                errors.push(format!(
                    "Invalid IntrBkSttlmDt format: {}. Must be in ISO date format YYYY-MM-DD",
                    date
                ));
            }
        }

        errors
    }
}

/// Rules for `pacs.002`
#[derive(Debug, Clone, Copy, Default)]
pub struct Pacs002Rules;

impl BusinessRules for Pacs002Rules {
    fn family(&self) -> MessageFamily {
        MessageFamily::Pacs002
    }

    fn validate(&self, xml: &str) -> Vec<String> {
        Pacs002Fields::extract(xml).check()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn report(status: &str, reason: Option<&str>) -> String {
        let reason = reason
            .map(|r| format!("<StsRsnInf><Rsn><Cd>{}</Cd></Rsn></StsRsnInf>", r))
            .unwrap_or_default();
        format!(
            r#"<Envelope><AppHdr><Fr><FIId><FinInstnId><Othr><Id>99999004</Id></Othr></FinInstnId></FIId></Fr><To><FIId><FinInstnId><Othr><Id>99999010</Id></Othr></FinInstnId></FIId></To><BizMsgIdr>M9999900400000000000000000000001</BizMsgIdr><MsgDefIdr>pacs.002.spi.1.14</MsgDefIdr><CreDt>2024-01-15T12:30:05.000Z</CreDt><Sgntr/></AppHdr><Document><FIToFIPmtStsRpt><GrpHdr><MsgId>M9999900400000000000000000000001</MsgId><CreDtTm>2024-01-15T12:30:05.000Z</CreDtTm></GrpHdr><TxInfAndSts><OrgnlInstrId>E9999901020240115123012345678901</OrgnlInstrId><OrgnlEndToEndId>E9999901020240115123012345678901</OrgnlEndToEndId><TxSts>{}</TxSts>{}<FctvIntrBkSttlmDt><DtTm>2024-01-15T12:30:04.000Z</DtTm></FctvIntrBkSttlmDt><IntrBkSttlmDt>2024-01-15</IntrBkSttlmDt></TxInfAndSts></FIToFIPmtStsRpt></Document></Envelope>"#,
            status, reason
        )
    }

    #[test]
    fn test_accepted_report_passes() {
        assert_eq!(Pacs002Rules.validate(&report("ACSP", None)), Vec::<String>::new());
    }

    #[test]
    fn test_rejection_needs_reason() {
        assert_eq!(
            Pacs002Rules.validate(&report("RJCT", None)),
            vec!["RJCT status requires a Status Reason Code".to_string()]
        );
        assert!(Pacs002Rules.validate(&report("RJCT", Some("AM04"))).is_empty());
    }

    #[test]
    fn test_unknown_codes() {
        let errors = Pacs002Rules.validate(&report("DONE", Some("ZZ99")));
        assert_eq!(
            errors,
            vec![
                "Invalid TxSts: DONE. Must be one of: ACCC, ACSC, ACSP, RJCT".to_string(),
                "Invalid Status Reason Code: ZZ99. Must be a valid error code".to_string(),
            ]
        );
    }

    #[test]
    fn test_identifier_formats() {
        let xml = report("ACSC", None).replace(
            "<OrgnlInstrId>E9999901020240115123012345678901",
            "<OrgnlInstrId>X9999901020240115123012345678901",
        );
        let errors = Pacs002Rules.validate(&xml);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("Invalid OrgnlInstrId format"));
    }

    #[test]
    fn test_settlement_dates() {
        let xml = report("ACSC", None)
            .replace("2024-01-15T12:30:04.000Z", "2024-01-15 12:30")
            .replace("<IntrBkSttlmDt>2024-01-15<", "<IntrBkSttlmDt>15/01/2024<");
        let errors = Pacs002Rules.validate(&xml);
        assert_eq!(errors.len(), 2);
        assert!(errors[0].starts_with("Invalid FctvIntrBkSttlmDt format"));
        assert!(errors[1].starts_with("Invalid IntrBkSttlmDt format"));
    }
}
