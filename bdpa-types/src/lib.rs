//! Shared domain and sync data model for BDPA.
//!
//! Pure data: domain records (avances, mediciones), the sync queue item
//! model, configuration, site constants and payload validation. No I/O —
//! storage and network live in `bdpa-storage` / `bdpa-cloud`.

pub mod obra;
pub mod records;
pub mod sync;
pub mod validate;

pub use records::{
    Avance, Certificacion, EstadoMedicion, Medicion, Sector, TipoEspacio, TipoMedicion,
    ValoresMedicion,
};
pub use sync::{
    EntityKind, ItemStatus, Operation, QueueItem, SyncConfig, SyncErrorEntry, SyncSnapshot,
    SyncStatus,
};
pub use validate::ValidationError;
