//! Bus transport abstraction and scoped chip-select.
//!
//! The register protocol is transport-agnostic: anything that can frame a
//! transfer with chip-select and clock bytes in both directions works.

use crate::Result;

/// Full-duplex byte bus with manual chip-select.
pub trait Transport {
    /// Assert chip-select.
    fn select(&mut self) -> Result<()>;

    /// Deassert chip-select.
    ///
    /// Must be safe to call when already deselected.
    fn deselect(&mut self) -> Result<()>;

    /// Transmit bytes, discarding whatever is clocked back.
    fn write(&mut self, data: &[u8]) -> Result<()>;

    /// Transmit bytes and return what was clocked back.
    ///
    /// The returned buffer is at least `data.len()` long; leading bytes may
    /// be echo or padding.
    fn exchange(&mut self, data: &[u8]) -> Result<Vec<u8>>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn select(&mut self) -> Result<()> {
        (**self).select()
    }

    fn deselect(&mut self) -> Result<()> {
        (**self).deselect()
    }

    fn write(&mut self, data: &[u8]) -> Result<()> {
        (**self).write(data)
    }

    fn exchange(&mut self, data: &[u8]) -> Result<Vec<u8>> {
        (**self).exchange(data)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn select(&mut self) -> Result<()> {
        (**self).select()
    }

    fn deselect(&mut self) -> Result<()> {
        (**self).deselect()
    }

    fn write(&mut self, data: &[u8]) -> Result<()> {
        (**self).write(data)
    }

    fn exchange(&mut self, data: &[u8]) -> Result<Vec<u8>> {
        (**self).exchange(data)
    }
}

/// Chip-select held for the lifetime of the guard.
///
/// Dropping the guard deselects, so an early `?` return never leaves the
/// peripheral selected. Use [`ChipSelect::release`] on the success path to
/// surface deselect errors.
pub struct ChipSelect<'a, T: Transport + ?Sized> {
    bus: &'a mut T,
    released: bool,
}

impl<'a, T: Transport + ?Sized> ChipSelect<'a, T> {
    /// Assert chip-select on `bus`.
    pub fn acquire(bus: &'a mut T) -> Result<Self> {
        if let Err(e) = bus.select() {
            // Line state is unknown after a failed select.
            let _ = bus.deselect();
            return Err(e);
        }
        Ok(Self {
            bus,
            released: false,
        })
    }

    pub fn write(&mut self, data: &[u8]) -> Result<()> {
        self.bus.write(data)
    }

    pub fn exchange(&mut self, data: &[u8]) -> Result<Vec<u8>> {
        self.bus.exchange(data)
    }

    /// Deassert chip-select, reporting any failure.
    pub fn release(mut self) -> Result<()> {
        self.released = true;
        self.bus.deselect()
    }
}

impl<T: Transport + ?Sized> Drop for ChipSelect<'_, T> {
    fn drop(&mut self) {
        if !self.released {
            if let Err(e) = self.bus.deselect() {
                log::warn!("chip-select release failed: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dummy::{BusEvent, DummyPeripheral};
    use crate::Error;

    #[test]
    fn release_deselects_once() {
        let mut bus = DummyPeripheral::new();
        let mut cs = ChipSelect::acquire(&mut bus).unwrap();
        cs.write(&[0x00, 0x10, 0x00, 0x01]).unwrap();
        cs.release().unwrap();
        assert_eq!(
            bus.events(),
            &[
                BusEvent::Select,
                BusEvent::Write(vec![0x00, 0x10, 0x00, 0x01]),
                BusEvent::Deselect,
            ]
        );
        assert!(!bus.is_selected());
    }

    #[test]
    fn drop_deselects_on_error_path() {
        let mut bus = DummyPeripheral::new();
        bus.fail_after(1);
        let result = (|| -> Result<()> {
            let mut cs = ChipSelect::acquire(&mut bus)?;
            cs.write(&[0x00, 0x10, 0x00, 0x01])?;
            cs.release()
        })();
        assert!(result.is_err());
        assert!(!bus.is_selected());
        assert_eq!(bus.events().last(), Some(&BusEvent::Deselect));
    }

    #[test]
    fn drop_deselects_when_exchange_fails() {
        let mut bus = DummyPeripheral::new();
        bus.fail_after(1);
        let result = (|| -> Result<Vec<u8>> {
            let mut cs = ChipSelect::acquire(&mut bus)?;
            let resp = cs.exchange(&[0x80, 0x00, 0x00, 0x00])?;
            cs.release()?;
            Ok(resp)
        })();
        assert!(matches!(result, Err(Error::Transport(_))));
        assert!(!bus.is_selected());
        assert_eq!(bus.events(), vec![BusEvent::Select, BusEvent::Deselect]);
    }

    #[test]
    fn failed_select_leaves_bus_deselected() {
        let mut bus = DummyPeripheral::new();
        bus.fail_after(0);
        assert!(ChipSelect::acquire(&mut bus).is_err());
        assert!(!bus.is_selected());
    }
}
