//! Session behaviour against the in-memory peripheral.

use decayrng::dummy::DummyConfig;
use decayrng::*;

fn fresh_session(bus: &mut DummyPeripheral) -> ModeSession<&mut DummyPeripheral, NoDelay> {
    let mut device = Device::with_config(bus, NoDelay::new(), DeviceConfig::default());
    device.reset_and_self_test().expect("self-test failed");
    ModeSession::new(device)
}

#[test]
fn lfsr_is_deterministic_on_fresh_peripherals() {
    let mut first_bus = DummyPeripheral::new();
    let mut first = fresh_session(&mut first_bus);
    first.select_lfsr(0xBEEF, 0).unwrap();
    let a = first.read_values(10).unwrap();

    let mut second_bus = DummyPeripheral::new();
    let mut second = fresh_session(&mut second_bus);
    second.select_lfsr(0xBEEF, 0).unwrap();
    let b = second.read_values(10).unwrap();

    assert_eq!(a.len(), 10);
    assert_eq!(a, b);
}

#[test]
fn reselecting_lfsr_replays_the_sequence() {
    let mut bus = DummyPeripheral::new();
    let mut session = fresh_session(&mut bus);
    session.select_lfsr(0xBEEF, 0).unwrap();
    let a: Vec<u16> = session.take(10).collect::<Result<_>>().unwrap();
    session.select_lfsr(0xBEEF, 0).unwrap();
    let b: Vec<u16> = session.take(10).collect::<Result<_>>().unwrap();
    assert_eq!(a, b);
}

#[test]
fn echo_padding_does_not_change_values() {
    let mut plain = DummyPeripheral::new();
    let mut padded = DummyPeripheral::with_config(DummyConfig {
        echo_padding: 5,
        ..DummyConfig::default()
    });

    let mut s1 = fresh_session(&mut plain);
    s1.select_lfsr(0xBEEF, POLY_ALTERNATE).unwrap();
    let mut s2 = fresh_session(&mut padded);
    s2.select_lfsr(0xBEEF, POLY_ALTERNATE).unwrap();

    assert_eq!(s1.read_values(16).unwrap(), s2.read_values(16).unwrap());
}

#[test]
fn unconfigured_session_sends_nothing() {
    let mut bus = DummyPeripheral::new();
    let mut session = ModeSession::new(Device::with_config(
        &mut bus,
        NoDelay::new(),
        DeviceConfig::default(),
    ));
    assert!(matches!(
        session.next_value(),
        Err(Error::Session(SessionError::NotConfigured))
    ));
    drop(session);
    assert!(bus.events().is_empty());
}

#[test]
fn decay_harvest_write_then_read_before_mode() {
    let mut bus = DummyPeripheral::new();
    let mut session = fresh_session(&mut bus);
    session.device_mut().transport_mut().clear_events();
    let seed = session.select_decay(true).unwrap().expect("seed requested");
    let samples = session.read_values(10).unwrap();
    drop(session);

    let events = bus.events();
    let transfers: Vec<&BusEvent> = events
        .iter()
        .filter(|e| !matches!(e, BusEvent::Select | BusEvent::Deselect))
        .collect();
    assert_eq!(transfers[0], &BusEvent::Write(vec![0x00, 0x02, 0x00, 0x00]));
    assert_eq!(transfers[1], &BusEvent::Exchange(vec![0x80, 0x02, 0x00, 0x00]));
    assert_eq!(transfers[2], &BusEvent::Write(vec![0x00, 0x03, 0x00, 0x00]));
    assert_eq!(transfers[3], &BusEvent::Write(vec![0x00, 0x00, 0x00, 0x00]));

    assert_eq!(bus.mode(), Mode::Decay);
    assert_eq!(samples.len(), 10);
    assert_ne!(seed, 0);
}

#[test]
fn every_transfer_is_framed_by_chip_select() {
    let mut bus = DummyPeripheral::new();
    let mut session = fresh_session(&mut bus);
    session.select_lfsr_harvested(POLY_DEFAULT).unwrap();
    session.read_values(3).unwrap();
    session.finish().unwrap();
    drop(session);

    for triple in bus.events().chunks(3) {
        assert_eq!(triple[0], BusEvent::Select);
        assert!(matches!(triple[1], BusEvent::Write(_) | BusEvent::Exchange(_)));
        assert_eq!(triple[2], BusEvent::Deselect);
    }
    assert!(!bus.is_selected());
}

#[test]
fn reference_run() {
    // Self-test, LFSR with fixed seed on both polynomials, harvested seed,
    // then decay sampling.
    let mut bus = DummyPeripheral::new();
    let mut session = fresh_session(&mut bus);

    session.select_lfsr(0xBEEF, POLY_DEFAULT).unwrap();
    let default_poly = session.read_values(10).unwrap();

    session.reseed(0xBEEF).unwrap();
    session.set_polynomial(POLY_ALTERNATE).unwrap();
    let alternate_poly = session.read_values(10).unwrap();
    assert_ne!(default_poly, alternate_poly);

    let seed = session.select_lfsr_harvested(POLY_DEFAULT).unwrap();
    assert_eq!(session.seed(), seed);
    session.read_values(10).unwrap();

    session.select_decay(false).unwrap();
    session.read_values(10).unwrap();
    session.finish().unwrap();
    assert_eq!(session.state(), SessionState::Streaming(Mode::Decay));
    drop(session);

    assert!(!bus.indicator(Indicator::A));
    assert!(bus.indicator(Indicator::B));
}
