//! Taxonomía de errores del núcleo de analítica.
//!
//! Todas las condiciones son locales y terminales para la petición actual:
//! el núcleo nunca escribe, así que no hay nada que revertir.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    /// Un comentario pedido por id pertenece a otro usuario. Se aborta antes
    /// de devolver ningún dato (sin fuga parcial).
    #[error("No está permitido acceder a comentarios de otros usuarios")]
    Forbidden,

    /// Alguno de los tags de la comparación no existe, o resolvieron menos
    /// de dos tags distintos.
    #[error("No se pudieron encontrar los tags con los IDs indicados: {ids:?}")]
    TagNotFound { ids: Vec<i64> },

    /// Fallo del codificador de exportación. Nunca se emiten bytes parciales.
    #[error("Error de serialización en la exportación: {0}")]
    Serialization(String),

    /// Fallo del adaptador de almacenamiento; se propaga sin reintentos.
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<csv::Error> for CoreError {
    fn from(err: csv::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
