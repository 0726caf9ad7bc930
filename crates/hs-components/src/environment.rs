//! Shared environment context: gravity and a standard atmosphere.

/// Specific gas constant of dry air (J/(kg·K)).
const R_AIR: f64 = 287.052_87;
/// Troposphere temperature lapse rate (K/m).
const LAPSE: f64 = 0.0065;
const TROPOPAUSE_M: f64 = 11_000.0;

/// Context passed to every component update.
///
/// Density follows the ISA model: a linear-lapse troposphere up to 11 km and
/// an isothermal layer above it.
#[derive(Clone, Debug, PartialEq)]
pub struct Environment {
    /// Gravitational acceleration (m/s²)
    pub gravity: f64,
    /// Sea-level temperature (K)
    pub sea_level_temperature: f64,
    /// Sea-level pressure (Pa)
    pub sea_level_pressure: f64,
}

impl Default for Environment {
    fn default() -> Self {
        Self {
            gravity: 9.806_65,
            sea_level_temperature: 288.15,
            sea_level_pressure: 101_325.0,
        }
    }
}

impl Environment {
    /// Static air temperature (K) at geometric altitude `h` (m).
    pub fn temperature(&self, h: f64) -> f64 {
        self.sea_level_temperature - LAPSE * h.clamp(0.0, TROPOPAUSE_M)
    }

    /// Static pressure (Pa) at altitude `h` (m). Altitudes below sea level
    /// are treated as sea level.
    pub fn pressure(&self, h: f64) -> f64 {
        let h = h.max(0.0);
        let exponent = self.gravity / (R_AIR * LAPSE);
        let t0 = self.sea_level_temperature;
        if h <= TROPOPAUSE_M {
            self.sea_level_pressure * (self.temperature(h) / t0).powf(exponent)
        } else {
            let t11 = self.temperature(TROPOPAUSE_M);
            let p11 = self.sea_level_pressure * (t11 / t0).powf(exponent);
            p11 * (-self.gravity * (h - TROPOPAUSE_M) / (R_AIR * t11)).exp()
        }
    }

    /// Air density (kg/m³) at altitude `h` (m).
    pub fn density(&self, h: f64) -> f64 {
        self.pressure(h) / (R_AIR * self.temperature(h))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sea_level_density_matches_isa() {
        let env = Environment::default();
        assert!((env.density(0.0) - 1.225).abs() < 1e-3);
    }

    #[test]
    fn density_falls_with_altitude() {
        let env = Environment::default();
        let rho_5k = env.density(5_000.0);
        assert!((rho_5k - 0.7364).abs() < 1e-3);
        let rho_11k = env.density(11_000.0);
        assert!((rho_11k - 0.3639).abs() < 1e-3);
        assert!(env.density(15_000.0) < rho_11k);
        assert!(env.density(15_000.0) > 0.0);
    }

    #[test]
    fn below_sea_level_clamps() {
        let env = Environment::default();
        assert_eq!(env.density(-100.0), env.density(0.0));
    }
}
