//! Shared fixtures for the integration tests

#![allow(dead_code)]

use std::path::PathBuf;

use spi_xml::{EngineConfig, XmlSigner};

pub const CERT_PEM: &str = include_str!("../fixtures/cert.pem");
pub const KEY_PEM: &str = include_str!("../fixtures/key.pem");
pub const OTHER_CERT_PEM: &str = include_str!("../fixtures/other_cert.pem");

pub const END_TO_END_ID: &str = "E9999901020240115123012345678901";

pub fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests").join("fixtures")
}

pub fn schemas_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("schemas")
}

pub fn config() -> EngineConfig {
    EngineConfig::new().with_schema_dir(schemas_dir())
}

pub fn signer() -> XmlSigner {
    XmlSigner::from_pem(CERT_PEM, KEY_PEM).expect("fixture key pair loads")
}

fn app_hdr(family: &str, version: &str, from: &str, to: &str, msg_id: &str, created: &str) -> String {
    format!(
        r#"  <AppHdr>
    <Fr><FIId><FinInstnId><Othr><Id>{from}</Id></Othr></FinInstnId></FIId></Fr>
    <To><FIId><FinInstnId><Othr><Id>{to}</Id></Othr></FinInstnId></FIId></To>
    <BizMsgIdr>{msg_id}</BizMsgIdr>
    <MsgDefIdr>{family}.spi.{version}</MsgDefIdr>
    <CreDt>{created}</CreDt>
  </AppHdr>"#
    )
}

/// pacs.002 with the given `TxInfAndSts` body
pub fn pacs002_with(tx_inf_and_sts: &str) -> String {
    let msg_id = "M9999900400000000000000000000001";
    let created = "2024-01-15T12:30:05.000Z";
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<Envelope xmlns="https://www.bcb.gov.br/pi/pacs.002/1.14">
{header}
  <Document>
    <FIToFIPmtStsRpt>
      <GrpHdr>
        <MsgId>{msg_id}</MsgId>
        <CreDtTm>{created}</CreDtTm>
      </GrpHdr>
      <TxInfAndSts>{tx_inf_and_sts}</TxInfAndSts>
    </FIToFIPmtStsRpt>
  </Document>
</Envelope>
"#,
        header = app_hdr("pacs.002", "1.14", "99999004", "99999010", msg_id, created),
    )
}

/// Minimal accepted status report
pub fn pacs002() -> String {
    pacs002_with(&format!(
        "\n        <OrgnlInstrId>{id}</OrgnlInstrId>\n        <OrgnlEndToEndId>{id}</OrgnlEndToEndId>\n        <TxSts>ACSC</TxSts>\n        <FctvIntrBkSttlmDt><DtTm>2024-01-15T12:30:04.000Z</DtTm></FctvIntrBkSttlmDt>\n      ",
        id = END_TO_END_ID
    ))
}

/// Payment return with one transaction
pub fn pacs004() -> String {
    let msg_id = "M9999900400000000000000000000002";
    let created = "2024-01-15T13:00:00.000Z";
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<Envelope xmlns="https://www.bcb.gov.br/pi/pacs.004/1.5">
{header}
  <Document>
    <PmtRtr>
      <GrpHdr>
        <MsgId>{msg_id}</MsgId>
        <CreDtTm>{created}</CreDtTm>
        <NbOfTxs>1</NbOfTxs>
        <SttlmInf><SttlmMtd>CLRG</SttlmMtd></SttlmInf>
      </GrpHdr>
      <TxInf>
        <RtrId>D9999900420240115130012345678901</RtrId>
        <OrgnlEndToEndId>{e2e}</OrgnlEndToEndId>
        <RtrdIntrBkSttlmAmt Ccy="BRL">150.00</RtrdIntrBkSttlmAmt>
        <SttlmPrty>HIGH</SttlmPrty>
        <ChrgBr>SLEV</ChrgBr>
        <RtrRsnInf>
          <Rsn><Cd>MD06</Cd></Rsn>
          <AddtlInf>Devolucao solicitada pelo pagador</AddtlInf>
        </RtrRsnInf>
      </TxInf>
    </PmtRtr>
  </Document>
</Envelope>
"#,
        header = app_hdr("pacs.004", "1.5", "99999004", "99999010", msg_id, created),
        e2e = END_TO_END_ID,
    )
}

/// One `CdtTrfTxInf` record with a manual initiation form
pub fn credit_transfer(end_to_end_id: &str) -> String {
    format!(
        r#"
      <CdtTrfTxInf>
        <PmtId><EndToEndId>{end_to_end_id}</EndToEndId></PmtId>
        <IntrBkSttlmAmt Ccy="BRL">150.00</IntrBkSttlmAmt>
        <AccptncDtTm>2024-01-15T12:29:59.000Z</AccptncDtTm>
        <ChrgBr>SLEV</ChrgBr>
        <MndtRltdInf><Tp><LclInstrm><Prtry>MANU</Prtry></LclInstrm></Tp></MndtRltdInf>
        <Dbtr>
          <Nm>Fulano de Tal</Nm>
          <Id><PrvtId><Othr><Id>12345678901</Id></Othr></PrvtId></Id>
        </Dbtr>
        <DbtrAcct>
          <Id><Othr><Id>123456</Id><Issr>0001</Issr></Othr></Id>
          <Tp><Cd>CACC</Cd></Tp>
        </DbtrAcct>
        <DbtrAgt><FinInstnId><ClrSysMmbId><MmbId>99999010</MmbId></ClrSysMmbId></FinInstnId></DbtrAgt>
        <CdtrAgt><FinInstnId><ClrSysMmbId><MmbId>99999004</MmbId></ClrSysMmbId></FinInstnId></CdtrAgt>
        <Cdtr>
          <Nm>Beltrano da Silva</Nm>
          <Id><PrvtId><Othr><Id>10987654321</Id></Othr></PrvtId></Id>
        </Cdtr>
        <CdtrAcct>
          <Id><Othr><Id>654321</Id><Issr>0002</Issr></Othr></Id>
          <Tp><Cd>TRAN</Cd></Tp>
        </CdtrAcct>
        <Purp><Cd>IPAY</Cd></Purp>
      </CdtTrfTxInf>"#
    )
}

/// Credit transfer with the given records
pub fn pacs008_with(nb_of_txs: usize, transactions: &str) -> String {
    let msg_id = "M9999901000000000000000000000003";
    let created = "2024-01-15T12:30:00.000Z";
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<Envelope xmlns="https://www.bcb.gov.br/pi/pacs.008/1.13">
{header}
  <Document>
    <FIToFICstmrCdtTrf>
      <GrpHdr>
        <MsgId>{msg_id}</MsgId>
        <CreDtTm>{created}</CreDtTm>
        <NbOfTxs>{nb_of_txs}</NbOfTxs>
        <SttlmInf><SttlmMtd>CLRG</SttlmMtd></SttlmInf>
        <PmtTpInf><InstrPrty>HIGH</InstrPrty><SvcLvl><Prtry>PAGPRI</Prtry></SvcLvl></PmtTpInf>
      </GrpHdr>{transactions}
    </FIToFICstmrCdtTrf>
  </Document>
</Envelope>
"#,
        header = app_hdr("pacs.008", "1.13", "99999010", "99999004", msg_id, created),
    )
}

/// Credit transfer with one record
pub fn pacs008() -> String {
    pacs008_with(1, &credit_transfer(END_TO_END_ID))
}

pub fn messages(issues: &[spi_xml::ValidationIssue]) -> Vec<&str> {
    issues.iter().map(|i| i.message.as_str()).collect()
}
