//! Domain records collected in the field.
//!
//! Both record types carry a `sync_status` that only the sync engine or the
//! initiating local write may change, and a `deleted_at` tombstone: deletes
//! are soft until the remote store confirms the deletion.

use crate::sync::SyncStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of physical space an avance applies to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TipoEspacio {
    Unidad,
    Sotu,
    Shaft,
    Lateral,
    Antena,
}

/// Sector within a floor. Towers C and H have no Norte sector.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sector {
    Norte,
    Poniente,
    Oriente,
}

/// An installation-progress record tied to a physical location and work category.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Avance {
    pub id: String,
    pub obra_id: String,
    pub fecha: DateTime<Utc>,
    /// Tower letter, A through J.
    pub torre: String,
    pub piso: Option<u8>,
    pub sector: Option<Sector>,
    pub tipo_espacio: TipoEspacio,
    /// Specific location identifier, e.g. "A101" or "SOTU-A1".
    pub ubicacion: String,
    pub categoria: String,
    /// Completion percentage, 0–100.
    pub porcentaje: u8,
    /// Local path of the attached photo, if any.
    pub foto_path: Option<String>,
    /// Public URL once the photo has been uploaded.
    pub foto_url: Option<String>,
    pub observaciones: Option<String>,
    pub usuario_id: String,
    pub sync_status: SyncStatus,
    pub last_sync: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Soft-delete tombstone. Set locally; the row is physically removed
    /// only after the remote store confirms the deletion.
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Measurement type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TipoMedicion {
    AlambricoT1,
    AlambricoT2,
    Coaxial,
    Fibra,
    Wifi,
    Certificacion,
}

/// Certification outcome.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Certificacion {
    Aprobado,
    AprobadoConObservaciones,
    Rechazado,
}

/// Measured values. Which fields are present depends on `TipoMedicion`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ValoresMedicion {
    /// dBμV
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alambrico_t1: Option<f64>,
    /// dBμV
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alambrico_t2: Option<f64>,
    /// dBμV
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coaxial: Option<f64>,
    /// dBm
    #[serde(skip_serializing_if = "Option::is_none")]
    pub potencia_tx: Option<f64>,
    /// dBm
    #[serde(skip_serializing_if = "Option::is_none")]
    pub potencia_rx: Option<f64>,
    /// dB
    #[serde(skip_serializing_if = "Option::is_none")]
    pub atenuacion: Option<f64>,
    /// dBm
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wifi: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificacion: Option<Certificacion>,
}

/// Overall assessment of a measurement against the acceptance ranges.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EstadoMedicion {
    Ok,
    Advertencia,
    Falla,
}

/// A technical measurement record tied to a unit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Medicion {
    pub id: String,
    pub obra_id: String,
    pub fecha: DateTime<Utc>,
    pub torre: String,
    pub piso: u8,
    /// Unit identifier the measurement was taken at.
    pub identificador: String,
    pub tipo_medicion: TipoMedicion,
    pub valores: ValoresMedicion,
    pub estado: EstadoMedicion,
    pub usuario_id: String,
    pub observaciones: Option<String>,
    pub sync_status: SyncStatus,
    pub last_sync: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}
