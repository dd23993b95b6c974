//! Generation sessions: mode selection and value streams.
//!
//! The peripheral remembers its last configuration across calls, so a
//! session holds the mode, seed and polynomial it asserted and can write
//! them again with [`ModeSession::reapply`].

use std::iter::FusedIterator;

use crate::delay::{Delay, StdDelay};
use crate::device::Device;
use crate::registers::*;
use crate::transport::Transport;
use crate::{Result, SessionError};

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No mode selected yet.
    Uninitialized,
    /// Mode latched, nothing read since.
    Configured(Mode),
    /// At least one value read in this mode.
    Streaming(Mode),
}

impl SessionState {
    pub fn mode(self) -> Option<Mode> {
        match self {
            SessionState::Uninitialized => None,
            SessionState::Configured(m) | SessionState::Streaming(m) => Some(m),
        }
    }
}

/// Status lamps a session drives.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Lit once a mode has been selected.
    pub active_indicator: Option<Indicator>,
    /// Lit by [`ModeSession::finish`].
    pub done_indicator: Option<Indicator>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            active_indicator: Some(Indicator::A),
            done_indicator: Some(Indicator::B),
        }
    }
}

/// Orchestrates mode selection and value generation on one device.
///
/// ```no_run
/// use decayrng::{Device, ModeSession, SpiDriverTransport};
///
/// let mut session = ModeSession::new(Device::new(SpiDriverTransport::open(None, None)?));
/// session.select_lfsr(0xBEEF, 0)?;
/// for value in session.take(10) {
///     println!("{:#06x}", value?);
/// }
/// # Ok::<(), decayrng::Error>(())
/// ```
pub struct ModeSession<T: Transport, D: Delay = StdDelay> {
    device: Device<T, D>,
    config: SessionConfig,
    state: SessionState,
    seed: u16,
    polynomial: u16,
}

impl<T: Transport, D: Delay> ModeSession<T, D> {
    pub fn new(device: Device<T, D>) -> Self {
        Self::with_config(device, SessionConfig::default())
    }

    pub fn with_config(device: Device<T, D>, config: SessionConfig) -> Self {
        Self {
            device,
            config,
            state: SessionState::Uninitialized,
            seed: 0,
            polynomial: POLY_DEFAULT,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn mode(&self) -> Option<Mode> {
        self.state.mode()
    }

    /// Last seed written to the LFSR.
    pub fn seed(&self) -> u16 {
        self.seed
    }

    pub fn polynomial(&self) -> u16 {
        self.polynomial
    }

    pub fn device(&self) -> &Device<T, D> {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut Device<T, D> {
        &mut self.device
    }

    pub fn into_device(self) -> Device<T, D> {
        self.device
    }

    /// Switch to LFSR mode with the given seed and feedback polynomial.
    ///
    /// Writes MODE, then SEED, then POLYNOMIAL: seed and polynomial apply to
    /// whichever mode is latched.
    pub fn select_lfsr(&mut self, seed: u16, polynomial: u16) -> Result<()> {
        self.state = SessionState::Uninitialized;
        self.device.set_mode(Mode::Lfsr)?;
        self.device.set_seed(seed)?;
        self.device.set_polynomial(polynomial)?;
        self.mark_active()?;

        self.seed = seed;
        self.polynomial = polynomial;
        self.state = SessionState::Configured(Mode::Lfsr);
        log::debug!("session: LFSR seed={seed:#06x} polynomial={polynomial}");
        Ok(())
    }

    /// Switch to decay-sampling mode.
    ///
    /// With `harvest_seed`, a seed is first harvested from decay timing and
    /// returned. It is not applied; see [`ModeSession::select_lfsr_harvested`].
    pub fn select_decay(&mut self, harvest_seed: bool) -> Result<Option<u16>> {
        self.state = SessionState::Uninitialized;
        let harvested = if harvest_seed {
            self.device.trigger_seed_harvest()?;
            Some(self.device.read_harvested_seed()?)
        } else {
            None
        };
        self.device.set_polynomial(self.polynomial)?;
        self.device.set_mode(Mode::Decay)?;
        self.mark_active()?;

        self.state = SessionState::Configured(Mode::Decay);
        log::debug!("session: decay sampling, harvested={harvested:04x?}");
        Ok(harvested)
    }

    /// Harvest a seed from decay timing and start the LFSR from it.
    ///
    /// Returns the seed used.
    pub fn select_lfsr_harvested(&mut self, polynomial: u16) -> Result<u16> {
        self.device.trigger_seed_harvest()?;
        let seed = self.device.read_harvested_seed()?;
        self.select_lfsr(seed, polynomial)?;
        Ok(seed)
    }

    /// Rewrite SEED without touching mode or polynomial.
    ///
    /// The stream restarts from `seed`.
    pub fn reseed(&mut self, seed: u16) -> Result<()> {
        self.device.set_seed(seed)?;
        self.seed = seed;
        self.rewind();
        Ok(())
    }

    /// Change the feedback polynomial of the latched mode.
    pub fn set_polynomial(&mut self, polynomial: u16) -> Result<()> {
        self.device.set_polynomial(polynomial)?;
        self.polynomial = polynomial;
        self.rewind();
        Ok(())
    }

    /// Write the held configuration to the peripheral again.
    pub fn reapply(&mut self) -> Result<()> {
        match self.state.mode() {
            None => Err(SessionError::NotConfigured.into()),
            Some(Mode::Lfsr) => self.select_lfsr(self.seed, self.polynomial),
            Some(Mode::Decay) => self.select_decay(false).map(|_| ()),
        }
    }

    /// Read the next generated value.
    ///
    /// Fails with [`SessionError::NotConfigured`] before any `select_*`
    /// call, without touching the bus.
    pub fn next_value(&mut self) -> Result<u16> {
        let mode = self.state.mode().ok_or(SessionError::NotConfigured)?;
        let value = self.device.next_value()?;
        self.state = SessionState::Streaming(mode);
        Ok(value)
    }

    /// Lazily read exactly `n` values.
    ///
    /// Each value advances the peripheral's generator, so a second `take`
    /// continues the stream rather than repeating it. The iterator stops
    /// after the first error.
    pub fn take(&mut self, n: usize) -> Samples<'_, T, D> {
        Samples {
            session: self,
            remaining: n,
        }
    }

    /// Read `n` values into a vector.
    pub fn read_values(&mut self, n: usize) -> Result<Vec<u16>> {
        self.take(n).collect()
    }

    /// Turn the active lamp off and the done lamp on.
    pub fn finish(&mut self) -> Result<()> {
        if let Some(indicator) = self.config.active_indicator {
            self.device.set_indicator(indicator, false)?;
        }
        if let Some(indicator) = self.config.done_indicator {
            self.device.set_indicator(indicator, true)?;
        }
        log::info!("session finished");
        Ok(())
    }

    fn mark_active(&mut self) -> Result<()> {
        match self.config.active_indicator {
            Some(indicator) => self.device.set_indicator(indicator, true),
            None => Ok(()),
        }
    }

    fn rewind(&mut self) {
        if let SessionState::Streaming(m) = self.state {
            self.state = SessionState::Configured(m);
        }
    }
}

/// Finite, non-restartable stream of generated values.
///
/// Created by [`ModeSession::take`].
pub struct Samples<'a, T: Transport, D: Delay> {
    session: &'a mut ModeSession<T, D>,
    remaining: usize,
}

impl<T: Transport, D: Delay> Samples<'_, T, D> {
    /// Values still to be read.
    pub fn remaining(&self) -> usize {
        self.remaining
    }
}

impl<T: Transport, D: Delay> Iterator for Samples<'_, T, D> {
    type Item = Result<u16>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let value = self.session.next_value();
        self.remaining = if value.is_ok() { self.remaining - 1 } else { 0 };
        Some(value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining))
    }
}

impl<T: Transport, D: Delay> FusedIterator for Samples<'_, T, D> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delay::NoDelay;
    use crate::device::DeviceConfig;
    use crate::dummy::DummyPeripheral;
    use crate::Error;

    type TestSession<'a> = ModeSession<&'a mut DummyPeripheral, NoDelay>;

    fn session(bus: &mut DummyPeripheral) -> TestSession<'_> {
        ModeSession::new(Device::with_config(
            bus,
            NoDelay::new(),
            DeviceConfig::default(),
        ))
    }

    #[test]
    fn next_value_requires_selection() {
        let mut bus = DummyPeripheral::new();
        let mut s = session(&mut bus);
        let err = s.next_value().unwrap_err();
        assert!(matches!(err, Error::Session(SessionError::NotConfigured)));
        assert_eq!(s.state(), SessionState::Uninitialized);
        drop(s);
        assert!(bus.events().is_empty());
    }

    #[test]
    fn take_before_selection_yields_error_once() {
        let mut bus = DummyPeripheral::new();
        let mut s = session(&mut bus);
        let items: Vec<_> = s.take(3).collect();
        assert_eq!(items.len(), 1);
        assert!(items[0].is_err());
    }

    #[test]
    fn select_lfsr_write_order() {
        let mut bus = DummyPeripheral::new();
        let mut s = session(&mut bus);
        s.select_lfsr(0xBEEF, POLY_ALTERNATE).unwrap();
        assert_eq!(s.state(), SessionState::Configured(Mode::Lfsr));
        drop(s);
        assert_eq!(
            bus.register_writes(),
            vec![(0x00, 1), (0x01, 0xBEEF), (0x03, 2), (0x10, 1)]
        );
        assert!(bus.register_reads().is_empty());
    }

    #[test]
    fn state_moves_to_streaming_on_first_read() {
        let mut bus = DummyPeripheral::new();
        let mut s = session(&mut bus);
        s.select_lfsr(0xBEEF, 0).unwrap();
        s.next_value().unwrap();
        assert_eq!(s.state(), SessionState::Streaming(Mode::Lfsr));
        s.reseed(0x1234).unwrap();
        assert_eq!(s.state(), SessionState::Configured(Mode::Lfsr));
        assert_eq!(s.seed(), 0x1234);
    }

    #[test]
    fn take_continues_the_stream() {
        let mut bus = DummyPeripheral::new();
        let mut s = session(&mut bus);
        s.select_lfsr(0xBEEF, 0).unwrap();
        let first = s.read_values(10).unwrap();
        let second = s.read_values(10).unwrap();
        assert_eq!(first.len(), 10);
        assert_ne!(first, second);

        s.reseed(0xBEEF).unwrap();
        assert_eq!(s.read_values(10).unwrap(), first);
    }

    #[test]
    fn take_is_lazy() {
        let mut bus = DummyPeripheral::new();
        let mut s = session(&mut bus);
        s.select_lfsr(0xBEEF, 0).unwrap();
        let mut samples = s.take(4);
        assert_eq!(samples.remaining(), 4);
        samples.next().unwrap().unwrap();
        assert_eq!(samples.remaining(), 3);
        drop(samples);
        drop(s);
        assert_eq!(bus.register_reads(), vec![0x00]);
    }

    #[test]
    fn select_decay_harvest_ordering() {
        let mut bus = DummyPeripheral::new();
        let mut s = session(&mut bus);
        let seed = s.select_decay(true).unwrap();
        assert!(seed.is_some());
        assert_eq!(s.state(), SessionState::Configured(Mode::Decay));
        drop(s);

        let writes = bus.register_writes();
        assert_eq!(writes, vec![(0x02, 0), (0x03, 0), (0x00, 0), (0x10, 1)]);
        assert_eq!(bus.register_reads(), vec![0x02]);
    }

    #[test]
    fn select_decay_without_harvest() {
        let mut bus = DummyPeripheral::new();
        let mut s = session(&mut bus);
        assert_eq!(s.select_decay(false).unwrap(), None);
        drop(s);
        assert_eq!(bus.register_writes(), vec![(0x03, 0), (0x00, 0), (0x10, 1)]);
        assert!(bus.register_reads().is_empty());
    }

    #[test]
    fn harvested_seed_drives_lfsr() {
        let mut bus = DummyPeripheral::new();
        let mut s = session(&mut bus);
        let seed = s.select_lfsr_harvested(POLY_DEFAULT).unwrap();
        assert_eq!(s.seed(), seed);
        assert_eq!(s.mode(), Some(Mode::Lfsr));
        drop(s);
        assert_eq!(bus.register_writes()[2], (0x01, seed));
    }

    #[test]
    fn reapply_requires_selection() {
        let mut bus = DummyPeripheral::new();
        let err = session(&mut bus).reapply().unwrap_err();
        assert!(matches!(err, Error::Session(SessionError::NotConfigured)));
    }

    #[test]
    fn reapply_rewrites_held_config() {
        let mut bus = DummyPeripheral::new();
        let mut s = session(&mut bus);
        s.select_lfsr(0xBEEF, 0).unwrap();
        s.set_polynomial(POLY_ALTERNATE).unwrap();
        s.device_mut().transport_mut().clear_events();
        s.reapply().unwrap();
        drop(s);
        assert_eq!(
            bus.register_writes(),
            vec![(0x00, 1), (0x01, 0xBEEF), (0x03, 2), (0x10, 1)]
        );
    }

    #[test]
    fn finish_swaps_indicators() {
        let mut bus = DummyPeripheral::new();
        let mut s = session(&mut bus);
        s.select_decay(false).unwrap();
        s.finish().unwrap();
        drop(s);
        assert!(!bus.indicator(Indicator::A));
        assert!(bus.indicator(Indicator::B));
    }

    #[test]
    fn indicators_can_be_disabled() {
        let mut bus = DummyPeripheral::new();
        let mut s = ModeSession::with_config(
            Device::with_config(&mut bus, NoDelay::new(), DeviceConfig::default()),
            SessionConfig {
                active_indicator: None,
                done_indicator: None,
            },
        );
        s.select_lfsr(1, 0).unwrap();
        s.finish().unwrap();
        drop(s);
        assert_eq!(bus.register_writes(), vec![(0x00, 1), (0x01, 1), (0x03, 0)]);
    }

    #[test]
    fn stream_stops_after_transport_error() {
        let mut bus = DummyPeripheral::new();
        let mut s = session(&mut bus);
        s.select_lfsr(0xBEEF, 0).unwrap();
        s.device_mut().transport_mut().fail_after(2 * 2);
        let items: Vec<_> = s.take(5).collect();
        assert_eq!(items.len(), 3);
        assert!(items[..2].iter().all(|r| r.is_ok()));
        assert!(matches!(items[2], Err(Error::Transport(_))));
    }
}
