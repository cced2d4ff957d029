//! USCI_A baud-rate generator settings.
//!
//! The driver consumes a static table of [`BaudrateConfig`] entries once at
//! open time, picking the entry that matches both the requested rate and the
//! peripheral's current input clock.
//!
//! ```ignore
//! static BAUDRATES: [BaudrateConfig; 3] = [
//!     // baud, input clock, prescaler, UCBRFx, UCBRSx, oversampling
//!     BaudrateConfig::new(115_200, 8_192_000, 4, 7, 0, true),
//!     BaudrateConfig::new(9_600, 8_192_000, 53, 5, 0, true),
//!     BaudrateConfig::new(9_600, 32_768, 3, 0, 3, false),
//! ];
//! ```

/// One baud-rate generator setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BaudrateConfig {
    /// Search key: nominal baud rate.
    pub output_baudrate: u32,
    /// Search key: input clock frequency in Hz.
    pub input_clock_freq: u32,
    /// Clock prescaler (UCBRx).
    pub prescaler: u16,
    /// First modulation stage (UCBRFx), only meaningful with oversampling.
    pub first_mod: u8,
    /// Second modulation stage (UCBRSx).
    pub second_mod: u8,
    /// 16x oversampling (UCOS16).
    pub oversampling: bool,
}

/// Entries for the common 8.192 MHz SMCLK and 32.768 kHz ACLK setups.
pub const DEFAULT_BAUDRATES: [BaudrateConfig; 6] = [
    BaudrateConfig::new(115_200, 8_192_000, 4, 7, 0, true),
    BaudrateConfig::new(57_600, 8_192_000, 8, 14, 0, true),
    BaudrateConfig::new(38_400, 8_192_000, 13, 5, 0, true),
    BaudrateConfig::new(19_200, 8_192_000, 26, 11, 0, true),
    BaudrateConfig::new(9_600, 8_192_000, 53, 5, 0, true),
    BaudrateConfig::new(9_600, 32_768, 3, 0, 3, false),
];

impl BaudrateConfig {
    pub const fn new(
        output_baudrate: u32,
        input_clock_freq: u32,
        prescaler: u16,
        first_mod: u8,
        second_mod: u8,
        oversampling: bool,
    ) -> Self {
        BaudrateConfig {
            output_baudrate,
            input_clock_freq,
            prescaler,
            first_mod,
            second_mod,
            oversampling,
        }
    }

    /// Find the entry for `baudrate` at `clock_hz`.
    pub fn lookup(table: &[BaudrateConfig], baudrate: u32, clock_hz: u32) -> Option<&BaudrateConfig> {
        table
            .iter()
            .find(|e| e.output_baudrate == baudrate && e.input_clock_freq == clock_hz)
    }

    /// Derive divider values with the USCI formula, for building tables.
    ///
    /// With `N = clock / baud >= 16` oversampling is used:
    /// `UCBRx = INT(N / 16)`, `UCBRFx = round(frac(N / 16) * 16)`.
    /// Otherwise low-frequency mode: `UCBRx = INT(N)`,
    /// `UCBRSx = round(frac(N) * 8)`.
    ///
    /// Returns `None` when the clock is too slow for the rate or the
    /// prescaler would not fit in 16 bits.
    pub fn compute(baudrate: u32, clock_hz: u32) -> Option<Self> {
        if baudrate == 0 || clock_hz < baudrate {
            return None;
        }
        let n = clock_hz as f32 / baudrate as f32;

        if n >= 16.0 {
            let div = n / 16.0;
            let int = libm::floorf(div);
            let mut first = libm::roundf((div - int) * 16.0) as u32;
            let mut prescaler = int as u32;
            // Rounding up to a full step carries into the prescaler
            if first == 16 {
                first = 0;
                prescaler += 1;
            }
            if prescaler == 0 || prescaler > u16::MAX as u32 {
                return None;
            }
            Some(Self::new(baudrate, clock_hz, prescaler as u16, first as u8, 0, true))
        } else {
            let int = libm::floorf(n);
            let mut second = libm::roundf((n - int) * 8.0) as u32;
            let mut prescaler = int as u32;
            if second == 8 {
                second = 0;
                prescaler += 1;
            }
            Some(Self::new(baudrate, clock_hz, prescaler as u16, 0, second as u8, false))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_matches_rate_and_clock() {
        let e = BaudrateConfig::lookup(&DEFAULT_BAUDRATES, 9_600, 32_768).unwrap();
        assert_eq!(e.prescaler, 3);
        assert!(!e.oversampling);

        let e = BaudrateConfig::lookup(&DEFAULT_BAUDRATES, 9_600, 8_192_000).unwrap();
        assert_eq!(e.prescaler, 53);
        assert!(e.oversampling);

        assert!(BaudrateConfig::lookup(&DEFAULT_BAUDRATES, 115_200, 32_768).is_none());
        assert!(BaudrateConfig::lookup(&DEFAULT_BAUDRATES, 14_400, 8_192_000).is_none());
    }

    #[test]
    fn compute_reproduces_reference_entries() {
        assert_eq!(
            BaudrateConfig::compute(115_200, 8_192_000),
            Some(BaudrateConfig::new(115_200, 8_192_000, 4, 7, 0, true))
        );
        assert_eq!(
            BaudrateConfig::compute(9_600, 8_192_000),
            Some(BaudrateConfig::new(9_600, 8_192_000, 53, 5, 0, true))
        );
        assert_eq!(
            BaudrateConfig::compute(9_600, 32_768),
            Some(BaudrateConfig::new(9_600, 32_768, 3, 0, 3, false))
        );
    }

    #[test]
    fn default_table_agrees_with_formula() {
        for entry in DEFAULT_BAUDRATES.iter() {
            let computed =
                BaudrateConfig::compute(entry.output_baudrate, entry.input_clock_freq).unwrap();
            assert_eq!(&computed, entry, "entry for {} baud", entry.output_baudrate);
        }
    }

    #[test]
    fn compute_rejects_impossible_rates() {
        assert_eq!(BaudrateConfig::compute(0, 8_000_000), None);
        assert_eq!(BaudrateConfig::compute(115_200, 32_768), None);
    }
}
