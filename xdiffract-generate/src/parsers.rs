use std::path::Path;

use xdiffract_data::{ElementRecord, ScatteringFactorRecord, VersionRecord};

/// Henke tables flag energies without an f1 value with this sentinel.
const MISSING_F1: f64 = -9999.0;

pub fn parse_version(path: &Path) -> Vec<VersionRecord> {
    let content = std::fs::read_to_string(path).expect("failed to read Version.dat");
    let mut records = Vec::new();
    for line in content.lines() {
        if line.starts_with('#') || line.trim().len() < 3 {
            continue;
        }
        let parts: Vec<&str> = line.splitn(3, "//").collect();
        if parts.len() == 3 {
            records.push(VersionRecord {
                tag: parts[0].trim().to_string(),
                date: parts[1].trim().to_string(),
                notes: parts[2].trim().to_string(),
            });
        }
    }
    records
}

/// `Z symbol name molar_mass [...]` per line.
pub fn parse_elements(path: &Path) -> Vec<ElementRecord> {
    let content = std::fs::read_to_string(path).expect("failed to read elemental_data.txt");
    let mut records = Vec::new();
    for line in content.lines() {
        if line.starts_with('#') || line.trim().is_empty() {
            continue;
        }
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() >= 4 {
            records.push(ElementRecord {
                atomic_number: parts[0].parse().expect("bad atomic number"),
                symbol: parts[1].to_string(),
                name: parts[2].to_string(),
                molar_mass: parts[3].parse().expect("bad molar mass"),
            });
        }
    }
    records
}

/// Parse one Henke `<symbol>.nff` table: a header line, then
/// `E(eV) f1 f2` rows.
///
/// Rows without an f1 value and repeated energies (the tables list both
/// sides of an absorption edge) are dropped so energies strictly increase.
pub fn parse_nff(symbol: &str, content: &str) -> ScatteringFactorRecord {
    let mut energy: Vec<f64> = Vec::new();
    let mut f1 = Vec::new();
    let mut f2 = Vec::new();
    for line in content.lines() {
        let values: Vec<f64> = line
            .split_whitespace()
            .filter_map(|w| w.parse().ok())
            .collect();
        let [e, a, b] = values[..] else {
            continue;
        };
        if a <= MISSING_F1 {
            continue;
        }
        if energy.last().is_some_and(|&last| e <= last) {
            continue;
        }
        energy.push(e);
        f1.push(a);
        f2.push(b);
    }
    ScatteringFactorRecord {
        element: symbol.to_string(),
        energy,
        f1,
        f2,
    }
}

/// Read `<dir>/<symbol>.nff` for every element that has one.
pub fn parse_henke(dir: &Path, elements: &[ElementRecord]) -> Vec<ScatteringFactorRecord> {
    let mut records = Vec::new();
    for element in elements {
        let path = dir.join(format!("{}.nff", element.symbol.to_lowercase()));
        let Ok(content) = std::fs::read_to_string(&path) else {
            continue;
        };
        let record = parse_nff(&element.symbol, &content);
        if !record.energy.is_empty() {
            records.push(record);
        }
    }
    records
}
