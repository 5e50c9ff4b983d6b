mod common;
use common::*;
use trannergy_bridge::prelude::*;
use trannergy_bridge::trannergy::packet::{Parser, Request, MIN_RESPONSE_LEN};

// Request {{{
#[test]
fn request_for_short_serial() {
    common_setup();

    // 12345 = 0x3039
    assert_eq!(
        Request::build(12345),
        vec![0x68, 0x02, 0x40, 0x30, 0x39, 0x30, 0x39, 0x30, 0x01, 0x00, 0x45, 0x16]
    );
}

#[test]
fn request_for_typical_serial() {
    // 1234567890 = 0x499602d2
    let request = Request::build(1234567890);

    assert_eq!(request.len(), 16);
    assert_eq!(&request[..4], &[0x68, 0x02, 0x40, 0x30]);
    assert_eq!(
        &request[4..12],
        &[0xd2, 0x02, 0x96, 0x49, 0xd2, 0x02, 0x96, 0x49]
    );
    assert_eq!(&request[12..14], &[0x01, 0x00]);

    let sum: u32 = 115 + request[4..12].iter().map(|b| u32::from(*b)).sum::<u32>();
    assert_eq!(request[14], (sum % 256) as u8);
    assert_eq!(request[15], 0x16);
}

#[test]
fn request_pads_odd_length_serial() {
    // "123" is treated as "0123"
    assert_eq!(Request::serial_bytes(0x123), vec![0x23, 0x01, 0x23, 0x01]);
    assert_eq!(Request::serial_bytes(0x5), vec![0x05, 0x05]);
}

#[test]
fn request_for_zero_serial() {
    assert_eq!(
        Request::build(0),
        vec![0x68, 0x02, 0x40, 0x30, 0x00, 0x00, 0x01, 0x00, 0x73, 0x16]
    );
}

#[test]
fn checksum_wraps() {
    assert_eq!(Request::checksum(&[0xff, 0xff]), ((115 + 255 + 255) % 256) as u8);
    assert_eq!(Request::checksum(&[]), 115);
}
// }}}

// Parser {{{
#[test]
fn short_reply_is_offline() {
    common_setup();

    assert_eq!(Parser::parse(&[]), Snapshot::offline());
    assert_eq!(Parser::parse(&[0u8; MIN_RESPONSE_LEN - 1]), Snapshot::offline());

    // even with a sane temperature in it
    let mut reply = Factory::reply();
    reply.truncate(79);
    assert_eq!(Parser::parse(&reply), Snapshot::offline());
}

#[test]
fn minimum_length_reply_is_decoded() {
    let mut reply = vec![0u8; MIN_RESPONSE_LEN];
    Factory::put_u16(&mut reply, 31, 150);

    let snapshot = Parser::parse(&reply);
    assert!(snapshot.is_online());
    assert_eq!(snapshot.numeric(FieldKey::Temperature), Some(15.0));
    assert_eq!(snapshot.numeric(FieldKey::HoursTotal), Some(0.0));
}

#[test]
fn decodes_reply() {
    let snapshot = Parser::parse(&Factory::reply());

    assert_eq!(snapshot.status(), Status::Online);
    assert_eq!(
        snapshot.get(FieldKey::InverterSn),
        Some(&Value::Text("NLDN302015AB".to_owned()))
    );
    assert_eq!(snapshot.numeric(FieldKey::Temperature), Some(38.2));
    assert_eq!(snapshot.numeric(FieldKey::DcInputVoltage1), Some(310.5));
    assert_eq!(snapshot.numeric(FieldKey::DcInputVoltage2), Some(298.8));
    assert_eq!(snapshot.numeric(FieldKey::DcInputVoltage3), Some(0.0));
    assert_eq!(snapshot.numeric(FieldKey::DcInputCurrent1), Some(4.2));
    assert_eq!(snapshot.numeric(FieldKey::DcInputCurrent2), Some(3.8));
    assert_eq!(snapshot.numeric(FieldKey::AcOutputCurrent1), Some(5.1));
    assert_eq!(snapshot.numeric(FieldKey::AcOutputVoltage1), Some(231.1));
    assert_eq!(snapshot.numeric(FieldKey::AcOutputFrequency1), Some(49.98));
    assert_eq!(snapshot.numeric(FieldKey::AcOutputPower1), Some(1180.0));
    assert_eq!(snapshot.numeric(FieldKey::ActualPower), Some(1180.0));
    assert_eq!(snapshot.numeric(FieldKey::EnergyToday), Some(5.32));
    assert_eq!(snapshot.numeric(FieldKey::EnergyTotal), Some(1234.5));
    assert_eq!(snapshot.numeric(FieldKey::HoursTotal), Some(4321.0));

    // every key is always present
    assert_eq!(snapshot.iter().count(), FieldKey::ALL.len());
}

#[test]
fn not_present_register_decodes_as_zero() {
    let mut reply = Factory::reply();
    Factory::put_u16(&mut reply, 33, 0xffff);

    let snapshot = Parser::parse(&reply);
    assert!(snapshot.is_online());
    assert_eq!(snapshot.numeric(FieldKey::DcInputVoltage1), Some(0.0));
}

#[test]
fn missing_temperature_is_offline() {
    let mut reply = Factory::reply();
    Factory::put_u16(&mut reply, 31, 0xffff);

    assert_eq!(Parser::parse(&reply), Snapshot::offline());
}

#[test]
fn implausible_temperature_is_offline() {
    let mut reply = Factory::reply();

    Factory::put_u16(&mut reply, 31, 1500);
    assert!(Parser::parse(&reply).is_online());

    Factory::put_u16(&mut reply, 31, 1501);
    assert_eq!(Parser::parse(&reply), Snapshot::offline());
}

#[test]
fn threshold_is_configurable() {
    let reply = Factory::reply();

    assert!(Parser::parse_with_threshold(&reply, 40.0).is_online());
    assert!(!Parser::parse_with_threshold(&reply, 38.0).is_online());
}

#[test]
fn parse_is_idempotent() {
    let reply = Factory::reply();
    assert_eq!(Parser::parse(&reply), Parser::parse(&reply));
}

#[test]
fn serial_with_invalid_utf8_is_empty() {
    let mut reply = Factory::reply();
    reply[15] = 0xff;

    let snapshot = Parser::parse(&reply);
    assert_eq!(snapshot.get(FieldKey::InverterSn), Some(&Value::Text(String::new())));
}

#[test]
fn snapshot_serializes_to_flat_json() -> Result<()> {
    let json: serde_json::Value = serde_json::to_value(Parser::parse(&Factory::reply()))?;

    assert_eq!(json["status"], "Online");
    assert_eq!(json["invertersn"], "NLDN302015AB");
    assert_eq!(json["energytotal"], 1234.5);

    let json: serde_json::Value = serde_json::to_value(Snapshot::offline())?;
    assert_eq!(json["status"], "Offline");
    assert_eq!(json["actualpower"], 0.0);

    Ok(())
}
// }}}
