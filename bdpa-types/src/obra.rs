//! Site constants for the Los Encinos project.
//!
//! Location constants for the payload validators plus the acceptance
//! ranges used to assess measurements — the full building-structure
//! lookup tables live with the UI layer.

use crate::records::{Certificacion, EstadoMedicion, TipoMedicion, ValoresMedicion};

/// Tower letters.
pub const TORRES: [&str; 10] = ["A", "B", "C", "D", "E", "F", "G", "H", "I", "J"];

/// Floors with distribution infrastructure.
pub const PISOS: [u8; 2] = [1, 3];

/// Towers without a Norte sector.
pub const TORRES_SIN_NORTE: [&str; 2] = ["C", "H"];

/// Acceptance range for a measured value.
#[derive(Clone, Copy, Debug)]
pub struct Rango {
    pub min: f64,
    pub max: f64,
    pub unidad: &'static str,
}

/// Wired T1/T2 signal level.
pub const RANGO_ALAMBRICO: Rango = Rango { min: 45.0, max: 75.0, unidad: "dBμV" };
/// Coaxial signal level.
pub const RANGO_COAXIAL: Rango = Rango { min: 45.0, max: 75.0, unidad: "dBμV" };
/// Optical power (Tx/Rx).
pub const RANGO_FIBRA_POTENCIA: Rango = Rango { min: -30.0, max: -8.0, unidad: "dBm" };
/// Maximum attenuation.
pub const ATENUACION_MAX: f64 = 0.5;
/// WiFi received power.
pub const RANGO_WIFI: Rango = Rango { min: -80.0, max: -30.0, unidad: "dBm" };

impl Rango {
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// True if `torre` is a valid tower letter.
pub fn torre_valida(torre: &str) -> bool {
    TORRES.contains(&torre)
}

/// True if `piso` is a floor with infrastructure.
pub fn piso_valido(piso: u8) -> bool {
    PISOS.contains(&piso)
}

/// True if the tower has a Norte sector.
pub fn tiene_sector_norte(torre: &str) -> bool {
    !TORRES_SIN_NORTE.contains(&torre)
}

// Readings inside the acceptance range but within this margin of either
// edge are flagged as a warning.
const MARGEN_ALAMBRICO: f64 = 5.0;
const MARGEN_FIBRA: f64 = 3.0;
const MARGEN_WIFI: f64 = 10.0;

fn evaluar_valor(rango: &Rango, margen: f64, valor: f64) -> EstadoMedicion {
    if !rango.contains(valor) {
        return EstadoMedicion::Falla;
    }
    if valor < rango.min + margen || valor > rango.max - margen {
        return EstadoMedicion::Advertencia;
    }
    EstadoMedicion::Ok
}

fn peor(a: EstadoMedicion, b: EstadoMedicion) -> EstadoMedicion {
    use EstadoMedicion::{Advertencia, Falla, Ok};
    match (a, b) {
        (Falla, _) | (_, Falla) => Falla,
        (Advertencia, _) | (_, Advertencia) => Advertencia,
        _ => Ok,
    }
}

/// Assesses a measurement against the acceptance ranges.
///
/// A missing reading for the measurement type is a `Falla` — the payload
/// validator rejects such records before they are stored, so this only
/// matters for direct callers.
pub fn evaluar(tipo: TipoMedicion, valores: &ValoresMedicion) -> EstadoMedicion {
    let con_rango = |valor: Option<f64>, rango: &Rango, margen: f64| {
        valor.map_or(EstadoMedicion::Falla, |v| evaluar_valor(rango, margen, v))
    };
    match tipo {
        TipoMedicion::AlambricoT1 => {
            con_rango(valores.alambrico_t1, &RANGO_ALAMBRICO, MARGEN_ALAMBRICO)
        }
        TipoMedicion::AlambricoT2 => {
            con_rango(valores.alambrico_t2, &RANGO_ALAMBRICO, MARGEN_ALAMBRICO)
        }
        TipoMedicion::Coaxial => con_rango(valores.coaxial, &RANGO_COAXIAL, MARGEN_ALAMBRICO),
        TipoMedicion::Fibra => {
            let tx = con_rango(valores.potencia_tx, &RANGO_FIBRA_POTENCIA, MARGEN_FIBRA);
            let rx = con_rango(valores.potencia_rx, &RANGO_FIBRA_POTENCIA, MARGEN_FIBRA);
            let atenuacion = match valores.atenuacion {
                Some(a) if a > ATENUACION_MAX => EstadoMedicion::Falla,
                _ => EstadoMedicion::Ok,
            };
            peor(peor(tx, rx), atenuacion)
        }
        TipoMedicion::Wifi => con_rango(valores.wifi, &RANGO_WIFI, MARGEN_WIFI),
        TipoMedicion::Certificacion => match valores.certificacion {
            Some(Certificacion::Aprobado) => EstadoMedicion::Ok,
            Some(Certificacion::AprobadoConObservaciones) => EstadoMedicion::Advertencia,
            Some(Certificacion::Rechazado) | None => EstadoMedicion::Falla,
        },
    }
}
