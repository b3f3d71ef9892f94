//! Payload validation, applied before a mutation is enqueued.
//!
//! A malformed payload never reaches the sync queue: the enqueue call fails
//! synchronously with a `ValidationError` instead.

use crate::obra;
use crate::records::{Avance, Medicion, Sector, TipoMedicion};
use crate::sync::{EntityKind, Operation};
use serde_json::Value;
use thiserror::Error;

/// A payload rejected before enqueue.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("torre desconocida: {0}")]
    UnknownTorre(String),

    #[error("piso sin infraestructura: {0}")]
    InvalidPiso(u8),

    #[error("torre {torre} no tiene sector Norte")]
    SectorUnavailable { torre: String },

    #[error("porcentaje fuera de rango: {0} (esperado 0–100)")]
    PorcentajeOutOfRange(u64),

    #[error("valor de {campo} fuera de rango instrumental: {valor}")]
    ValorFueraDeRango { campo: &'static str, valor: f64 },

    #[error("medición {0:?} sin valor correspondiente")]
    MissingValor(TipoMedicion),

    #[error("payload de foto incompleto: falta {0}")]
    FotoIncomplete(&'static str),

    #[error("campo obligatorio ausente: {0}")]
    MissingField(&'static str),

    #[error("payload malformado: {0}")]
    Malformed(String),
}

/// Validates an enqueue payload for `(kind, operation)`.
///
/// Creates must deserialize to the full record type; updates are partial
/// diffs so only the fields present are range-checked; deletes carry nothing
/// worth validating; foto payloads must name the bytes and the owning record.
pub fn validate_payload(
    kind: EntityKind,
    operation: Operation,
    payload: &Value,
) -> Result<(), ValidationError> {
    if operation == Operation::Delete {
        return Ok(());
    }

    match kind {
        EntityKind::Avance => match operation {
            Operation::Create => {
                let avance: Avance = serde_json::from_value(payload.clone())
                    .map_err(|e| ValidationError::Malformed(e.to_string()))?;
                validate_avance(&avance)
            }
            _ => validate_avance_diff(payload),
        },
        EntityKind::Medicion => match operation {
            Operation::Create => {
                let medicion: Medicion = serde_json::from_value(payload.clone())
                    .map_err(|e| ValidationError::Malformed(e.to_string()))?;
                validate_medicion(&medicion)
            }
            _ => validate_medicion_diff(payload),
        },
        EntityKind::Foto => validate_foto(payload),
    }
}

/// Validates a full avance record.
pub fn validate_avance(avance: &Avance) -> Result<(), ValidationError> {
    if !obra::torre_valida(&avance.torre) {
        return Err(ValidationError::UnknownTorre(avance.torre.clone()));
    }
    if let Some(piso) = avance.piso {
        if !obra::piso_valido(piso) {
            return Err(ValidationError::InvalidPiso(piso));
        }
    }
    if avance.sector == Some(Sector::Norte) && !obra::tiene_sector_norte(&avance.torre) {
        return Err(ValidationError::SectorUnavailable { torre: avance.torre.clone() });
    }
    if avance.porcentaje > 100 {
        return Err(ValidationError::PorcentajeOutOfRange(avance.porcentaje as u64));
    }
    if avance.ubicacion.is_empty() {
        return Err(ValidationError::MissingField("ubicacion"));
    }
    Ok(())
}

/// Validates a full medición record, including instrument ranges.
///
/// Range violations here mean an implausible reading (entry error), not a
/// failing measurement — a legitimately bad signal still syncs, with
/// `estado` reflecting the failure.
pub fn validate_medicion(medicion: &Medicion) -> Result<(), ValidationError> {
    if !obra::torre_valida(&medicion.torre) {
        return Err(ValidationError::UnknownTorre(medicion.torre.clone()));
    }
    if !obra::piso_valido(medicion.piso) {
        return Err(ValidationError::InvalidPiso(medicion.piso));
    }
    if medicion.identificador.is_empty() {
        return Err(ValidationError::MissingField("identificador"));
    }

    let v = &medicion.valores;
    match medicion.tipo_medicion {
        TipoMedicion::AlambricoT1 => {
            let valor = v.alambrico_t1.ok_or(ValidationError::MissingValor(medicion.tipo_medicion))?;
            check_plausible("alambrico_t1", valor, 0.0, 120.0)?;
        }
        TipoMedicion::AlambricoT2 => {
            let valor = v.alambrico_t2.ok_or(ValidationError::MissingValor(medicion.tipo_medicion))?;
            check_plausible("alambrico_t2", valor, 0.0, 120.0)?;
        }
        TipoMedicion::Coaxial => {
            let valor = v.coaxial.ok_or(ValidationError::MissingValor(medicion.tipo_medicion))?;
            check_plausible("coaxial", valor, 0.0, 120.0)?;
        }
        TipoMedicion::Fibra => {
            let tx = v.potencia_tx.ok_or(ValidationError::MissingValor(medicion.tipo_medicion))?;
            let rx = v.potencia_rx.ok_or(ValidationError::MissingValor(medicion.tipo_medicion))?;
            check_plausible("potencia_tx", tx, -60.0, 10.0)?;
            check_plausible("potencia_rx", rx, -60.0, 10.0)?;
            if let Some(at) = v.atenuacion {
                check_plausible("atenuacion", at, 0.0, 50.0)?;
            }
        }
        TipoMedicion::Wifi => {
            let valor = v.wifi.ok_or(ValidationError::MissingValor(medicion.tipo_medicion))?;
            check_plausible("wifi", valor, -100.0, 0.0)?;
        }
        TipoMedicion::Certificacion => {
            if v.certificacion.is_none() {
                return Err(ValidationError::MissingValor(medicion.tipo_medicion));
            }
        }
    }
    Ok(())
}

/// Range-checks the fields present in a partial update diff.
fn validate_avance_diff(payload: &Value) -> Result<(), ValidationError> {
    let obj = payload
        .as_object()
        .ok_or_else(|| ValidationError::Malformed("update diff must be an object".into()))?;

    if let Some(torre) = obj.get("torre").and_then(Value::as_str) {
        if !obra::torre_valida(torre) {
            return Err(ValidationError::UnknownTorre(torre.to_string()));
        }
    }
    if let Some(piso) = obj.get("piso").and_then(Value::as_u64) {
        if piso > u8::MAX as u64 || !obra::piso_valido(piso as u8) {
            return Err(ValidationError::InvalidPiso(piso.min(255) as u8));
        }
    }
    if let Some(pct) = obj.get("porcentaje").and_then(Value::as_u64) {
        if pct > 100 {
            return Err(ValidationError::PorcentajeOutOfRange(pct));
        }
    }
    Ok(())
}

/// Plausibility bounds per `valores` field. Readings outside these are entry
/// errors, not failing measurements.
const RANGOS_PLAUSIBLES: [(&str, f64, f64); 7] = [
    ("alambrico_t1", 0.0, 120.0),
    ("alambrico_t2", 0.0, 120.0),
    ("coaxial", 0.0, 120.0),
    ("potencia_tx", -60.0, 10.0),
    ("potencia_rx", -60.0, 10.0),
    ("atenuacion", 0.0, 50.0),
    ("wifi", -100.0, 0.0),
];

/// Range-checks the fields present in a medición update diff, including any
/// `valores` readings it carries.
fn validate_medicion_diff(payload: &Value) -> Result<(), ValidationError> {
    let obj = payload
        .as_object()
        .ok_or_else(|| ValidationError::Malformed("update diff must be an object".into()))?;

    if let Some(torre) = obj.get("torre").and_then(Value::as_str) {
        if !obra::torre_valida(torre) {
            return Err(ValidationError::UnknownTorre(torre.to_string()));
        }
    }
    if let Some(piso) = obj.get("piso").and_then(Value::as_u64) {
        if piso > u8::MAX as u64 || !obra::piso_valido(piso as u8) {
            return Err(ValidationError::InvalidPiso(piso.min(255) as u8));
        }
    }
    if let Some(valores) = obj.get("valores").and_then(Value::as_object) {
        for (campo, min, max) in RANGOS_PLAUSIBLES {
            if let Some(valor) = valores.get(campo).and_then(Value::as_f64) {
                check_plausible(campo, valor, min, max)?;
            }
        }
    }
    Ok(())
}

/// A foto payload must carry the local path, the bucket path, and the
/// owning avance id.
fn validate_foto(payload: &Value) -> Result<(), ValidationError> {
    let obj = payload
        .as_object()
        .ok_or_else(|| ValidationError::Malformed("foto payload must be an object".into()))?;
    for field in ["local_path", "bucket_path", "avance_id"] {
        match obj.get(field).and_then(Value::as_str) {
            Some(s) if !s.is_empty() => {}
            _ => {
                return Err(ValidationError::FotoIncomplete(match field {
                    "local_path" => "local_path",
                    "bucket_path" => "bucket_path",
                    _ => "avance_id",
                }))
            }
        }
    }
    Ok(())
}

fn check_plausible(
    campo: &'static str,
    valor: f64,
    min: f64,
    max: f64,
) -> Result<(), ValidationError> {
    if !valor.is_finite() || valor < min || valor > max {
        return Err(ValidationError::ValorFueraDeRango { campo, valor });
    }
    Ok(())
}
