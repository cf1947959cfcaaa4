//! Periodic table subset (H through Pu)

use std::fmt;

/// Noble gases sort after every other element in reduced formulas.
const NO_ELECTRONEGATIVITY: f64 = f64::MAX;

/// (symbol, standard atomic mass in g/mol, Pauling electronegativity)
const TABLE: [(&str, f64, f64); 94] = [
    ("H", 1.008, 2.20),
    ("He", 4.0026, NO_ELECTRONEGATIVITY),
    ("Li", 6.94, 0.98),
    ("Be", 9.0122, 1.57),
    ("B", 10.81, 2.04),
    ("C", 12.011, 2.55),
    ("N", 14.007, 3.04),
    ("O", 15.999, 3.44),
    ("F", 18.998, 3.98),
    ("Ne", 20.180, NO_ELECTRONEGATIVITY),
    ("Na", 22.990, 0.93),
    ("Mg", 24.305, 1.31),
    ("Al", 26.982, 1.61),
    ("Si", 28.085, 1.90),
    ("P", 30.974, 2.19),
    ("S", 32.06, 2.58),
    ("Cl", 35.45, 3.16),
    ("Ar", 39.948, NO_ELECTRONEGATIVITY),
    ("K", 39.098, 0.82),
    ("Ca", 40.078, 1.00),
    ("Sc", 44.956, 1.36),
    ("Ti", 47.867, 1.54),
    ("V", 50.942, 1.63),
    ("Cr", 51.996, 1.66),
    ("Mn", 54.938, 1.55),
    ("Fe", 55.845, 1.83),
    ("Co", 58.933, 1.88),
    ("Ni", 58.693, 1.91),
    ("Cu", 63.546, 1.90),
    ("Zn", 65.38, 1.65),
    ("Ga", 69.723, 1.81),
    ("Ge", 72.630, 2.01),
    ("As", 74.922, 2.18),
    ("Se", 78.971, 2.55),
    ("Br", 79.904, 2.96),
    ("Kr", 83.798, 3.00),
    ("Rb", 85.468, 0.82),
    ("Sr", 87.62, 0.95),
    ("Y", 88.906, 1.22),
    ("Zr", 91.224, 1.33),
    ("Nb", 92.906, 1.60),
    ("Mo", 95.95, 2.16),
    ("Tc", 98.0, 1.90),
    ("Ru", 101.07, 2.20),
    ("Rh", 102.91, 2.28),
    ("Pd", 106.42, 2.20),
    ("Ag", 107.87, 1.93),
    ("Cd", 112.41, 1.69),
    ("In", 114.82, 1.78),
    ("Sn", 118.71, 1.96),
    ("Sb", 121.76, 2.05),
    ("Te", 127.60, 2.10),
    ("I", 126.90, 2.66),
    ("Xe", 131.29, 2.60),
    ("Cs", 132.91, 0.79),
    ("Ba", 137.33, 0.89),
    ("La", 138.91, 1.10),
    ("Ce", 140.12, 1.12),
    ("Pr", 140.91, 1.13),
    ("Nd", 144.24, 1.14),
    ("Pm", 145.0, 1.13),
    ("Sm", 150.36, 1.17),
    ("Eu", 151.96, 1.20),
    ("Gd", 157.25, 1.20),
    ("Tb", 158.93, 1.10),
    ("Dy", 162.50, 1.22),
    ("Ho", 164.93, 1.23),
    ("Er", 167.26, 1.24),
    ("Tm", 168.93, 1.25),
    ("Yb", 173.05, 1.10),
    ("Lu", 174.97, 1.27),
    ("Hf", 178.49, 1.30),
    ("Ta", 180.95, 1.50),
    ("W", 183.84, 2.36),
    ("Re", 186.21, 1.90),
    ("Os", 190.23, 2.20),
    ("Ir", 192.22, 2.20),
    ("Pt", 195.08, 2.28),
    ("Au", 196.97, 2.54),
    ("Hg", 200.59, 2.00),
    ("Tl", 204.38, 1.62),
    ("Pb", 207.2, 2.33),
    ("Bi", 208.98, 2.02),
    ("Po", 209.0, 2.00),
    ("At", 210.0, 2.20),
    ("Rn", 222.0, 2.20),
    ("Fr", 223.0, 0.70),
    ("Ra", 226.0, 0.90),
    ("Ac", 227.0, 1.10),
    ("Th", 232.04, 1.30),
    ("Pa", 231.04, 1.50),
    ("U", 238.03, 1.38),
    ("Np", 237.0, 1.36),
    ("Pu", 244.0, 1.28),
];

/// Chemical element, identified by atomic number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Element(u8);

impl Element {
    /// Look up an element by its symbol (case-sensitive, e.g. `"Cu"`).
    #[must_use]
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        TABLE
            .iter()
            .position(|(s, _, _)| *s == symbol)
            .and_then(|index| u8::try_from(index + 1).ok())
            .map(Self)
    }

    /// Atomic number.
    #[must_use]
    pub const fn atomic_number(self) -> u8 {
        self.0
    }

    /// Element symbol.
    #[must_use]
    pub fn symbol(self) -> &'static str {
        TABLE[usize::from(self.0) - 1].0
    }

    /// Standard atomic mass (g/mol).
    #[must_use]
    pub fn atomic_mass(self) -> f64 {
        TABLE[usize::from(self.0) - 1].1
    }

    /// Pauling electronegativity; noble gases report `f64::MAX`.
    #[must_use]
    pub fn electronegativity(self) -> f64 {
        TABLE[usize::from(self.0) - 1].2
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}
