//! Heavy metals the index service scores, and the limits it scores them
//! against.
//!
//! A sheet column counts as a metal only if its header is one of the
//! symbols below. Each metal carries the drinking-water limit used as `S`
//! and the background value used as `I` in the index formulas.
//!
//! Limits are WHO / BIS drinking water guidelines, in mg/L. No background
//! contamination is assumed, so every ideal value is 0.

use std::fmt;

// ---------------------------------------------------------------------------
// Metal symbols
// ---------------------------------------------------------------------------

/// One of the ten heavy metals recognized in sample sheets.
///
/// Variant order matches `STANDARDS_REGISTRY`, so a `BTreeMap<Metal, _>`
/// iterates in registry order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Metal {
    Pb,
    Cd,
    Cr,
    As,
    Hg,
    Ni,
    Fe,
    Zn,
    Cu,
    Mn,
}

/// Every recognized metal, in registry order.
pub const ALL_METALS: [Metal; 10] = [
    Metal::Pb,
    Metal::Cd,
    Metal::Cr,
    Metal::As,
    Metal::Hg,
    Metal::Ni,
    Metal::Fe,
    Metal::Zn,
    Metal::Cu,
    Metal::Mn,
];

impl Metal {
    /// Column header / chemical symbol, e.g. `"Pb"`.
    pub fn symbol(self) -> &'static str {
        self.standard().symbol
    }

    /// Parses a column header into a metal. Matching is case-sensitive,
    /// so `"CD"` is not cadmium.
    pub fn from_symbol(symbol: &str) -> Option<Metal> {
        STANDARDS_REGISTRY
            .iter()
            .find(|s| s.symbol == symbol)
            .map(|s| s.metal)
    }

    /// Registry entry for this metal.
    pub fn standard(self) -> &'static MetalStandard {
        // Registry is indexed by variant order; see the ordering test below.
        &STANDARDS_REGISTRY[self as usize]
    }

    pub fn permissible_limit(self) -> f64 {
        self.standard().permissible_limit_mg_l
    }

    pub fn ideal_value(self) -> f64 {
        self.standard().ideal_mg_l
    }

    /// English name, e.g. `"Lead"`.
    pub fn name(self) -> &'static str {
        self.standard().name
    }
}

impl fmt::Display for Metal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

// ---------------------------------------------------------------------------
// Standards metadata
// ---------------------------------------------------------------------------

/// Regulatory metadata for a single metal.
pub struct MetalStandard {
    pub metal: Metal,
    /// Chemical symbol, also the expected CSV column header.
    pub symbol: &'static str,
    /// English name, used in log messages.
    pub name: &'static str,
    /// Maximum safe concentration in mg/L. Never zero.
    pub permissible_limit_mg_l: f64,
    /// Background concentration in mg/L.
    pub ideal_mg_l: f64,
}

/// Permissible limits and ideal values for every recognized metal.
pub static STANDARDS_REGISTRY: &[MetalStandard] = &[
    MetalStandard {
        metal: Metal::Pb,
        symbol: "Pb",
        name: "Lead",
        permissible_limit_mg_l: 0.01,
        ideal_mg_l: 0.0,
    },
    MetalStandard {
        metal: Metal::Cd,
        symbol: "Cd",
        name: "Cadmium",
        permissible_limit_mg_l: 0.003,
        ideal_mg_l: 0.0,
    },
    MetalStandard {
        metal: Metal::Cr,
        symbol: "Cr",
        name: "Chromium",
        permissible_limit_mg_l: 0.05,
        ideal_mg_l: 0.0,
    },
    MetalStandard {
        metal: Metal::As,
        symbol: "As",
        name: "Arsenic",
        permissible_limit_mg_l: 0.01,
        ideal_mg_l: 0.0,
    },
    MetalStandard {
        metal: Metal::Hg,
        symbol: "Hg",
        name: "Mercury",
        permissible_limit_mg_l: 0.001,
        ideal_mg_l: 0.0,
    },
    MetalStandard {
        metal: Metal::Ni,
        symbol: "Ni",
        name: "Nickel",
        permissible_limit_mg_l: 0.02,
        ideal_mg_l: 0.0,
    },
    MetalStandard {
        metal: Metal::Fe,
        symbol: "Fe",
        name: "Iron",
        permissible_limit_mg_l: 0.3,
        ideal_mg_l: 0.0,
    },
    MetalStandard {
        metal: Metal::Zn,
        symbol: "Zn",
        name: "Zinc",
        permissible_limit_mg_l: 5.0,
        ideal_mg_l: 0.0,
    },
    MetalStandard {
        metal: Metal::Cu,
        symbol: "Cu",
        name: "Copper",
        permissible_limit_mg_l: 0.05,
        ideal_mg_l: 0.0,
    },
    MetalStandard {
        metal: Metal::Mn,
        symbol: "Mn",
        name: "Manganese",
        permissible_limit_mg_l: 0.1,
        ideal_mg_l: 0.0,
    },
];

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_reproduces_published_limits() {
        let expected = [
            ("Pb", 0.01),
            ("Cd", 0.003),
            ("Cr", 0.05),
            ("As", 0.01),
            ("Hg", 0.001),
            ("Ni", 0.02),
            ("Fe", 0.3),
            ("Zn", 5.0),
            ("Cu", 0.05),
            ("Mn", 0.1),
        ];
        assert_eq!(STANDARDS_REGISTRY.len(), expected.len());
        for (symbol, limit) in expected {
            let standard = Metal::from_symbol(symbol)
                .map(Metal::standard)
                .unwrap_or_else(|| panic!("registry missing metal '{}'", symbol));
            assert_eq!(
                standard.permissible_limit_mg_l, limit,
                "limit for '{}' does not match the published table",
                symbol
            );
        }
    }

    #[test]
    fn test_registry_order_matches_enum_discriminants() {
        // Metal::standard indexes the registry by discriminant.
        for (idx, standard) in STANDARDS_REGISTRY.iter().enumerate() {
            assert_eq!(
                standard.metal as usize, idx,
                "registry entry '{}' is out of order",
                standard.symbol
            );
        }
        for metal in ALL_METALS {
            assert_eq!(metal.standard().metal, metal);
        }
    }

    #[test]
    fn test_limits_are_positive_and_above_ideal() {
        // Both the weights and the sub-indices divide by these.
        for standard in STANDARDS_REGISTRY {
            assert!(
                standard.permissible_limit_mg_l > 0.0,
                "limit for '{}' must be strictly positive",
                standard.name
            );
            assert!(
                standard.permissible_limit_mg_l - standard.ideal_mg_l > 0.0,
                "ideal for '{}' must be below its limit",
                standard.name
            );
        }
    }

    #[test]
    fn test_every_ideal_is_zero() {
        for metal in ALL_METALS {
            assert_eq!(metal.ideal_value(), 0.0, "ideal for {} should be 0", metal);
        }
    }

    #[test]
    fn test_no_duplicate_symbols() {
        let mut seen = std::collections::HashSet::new();
        for standard in STANDARDS_REGISTRY {
            assert!(
                seen.insert(standard.symbol),
                "duplicate symbol '{}' in STANDARDS_REGISTRY",
                standard.symbol
            );
        }
    }

    #[test]
    fn test_from_symbol_round_trips_for_every_metal() {
        for metal in ALL_METALS {
            assert_eq!(Metal::from_symbol(metal.symbol()), Some(metal));
        }
    }

    #[test]
    fn test_from_symbol_is_case_sensitive() {
        assert_eq!(Metal::from_symbol("CD"), None);
        assert_eq!(Metal::from_symbol("pb"), None);
        assert_eq!(Metal::from_symbol("Notes"), None);
    }

    #[test]
    fn test_names_describe_the_metal() {
        assert_eq!(Metal::Pb.name(), "Lead");
        assert_eq!(Metal::Hg.name(), "Mercury");
        for metal in ALL_METALS {
            assert!(!metal.name().is_empty(), "{} has no name", metal);
        }
    }
}
