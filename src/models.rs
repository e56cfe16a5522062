//! Modelos de dominio (tags jerárquicos y comentarios analizados).

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sentimiento asignado a un comentario, manualmente o por el clasificador externo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

impl Sentiment {
    pub fn from_str(s: &str) -> Result<Self> {
        match s {
            "positive" => Ok(Self::Positive),
            "neutral" => Ok(Self::Neutral),
            "negative" => Ok(Self::Negative),
            other => Err(anyhow!("Sentimiento no soportado: {other}")),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Neutral => "neutral",
            Self::Negative => "negative",
        }
    }
}

/// Emoción dominante asignada a un comentario.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Joy,
    Anger,
    Sadness,
    Fear,
    Surprise,
    Neutral,
}

impl Emotion {
    pub fn from_str(s: &str) -> Result<Self> {
        match s {
            "joy" => Ok(Self::Joy),
            "anger" => Ok(Self::Anger),
            "sadness" => Ok(Self::Sadness),
            "fear" => Ok(Self::Fear),
            "surprise" => Ok(Self::Surprise),
            "neutral" => Ok(Self::Neutral),
            other => Err(anyhow!("Emoción no soportada: {other}")),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Joy => "joy",
            Self::Anger => "anger",
            Self::Sadness => "sadness",
            Self::Fear => "fear",
            Self::Surprise => "surprise",
            Self::Neutral => "neutral",
        }
    }
}

/// Etiqueta jerárquica con alcance por usuario.
/// Forma un bosque: cada tag tiene como mucho un padre (`parent_id = None`
/// para las raíces). `path` es derivado (nombres de ancestros unidos por "/"),
/// se rellena al construir el índice de tags y nunca se persiste.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    pub id: i64,
    pub name: String,
    pub color: String,
    pub parent_id: Option<i64>,
    pub user_id: i64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub path: Option<String>,
}

/// Comentario de texto libre. Pertenece a exactamente un usuario y a cero o
/// más tags a través de `tag_ids` (relación muchos-a-muchos; el modelo con
/// columna `tag_id` singular queda descartado como legado).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: i64,
    pub text: String,
    pub user_id: i64,
    pub created_str: DateTime<Utc>,
    pub modified_str: DateTime<Utc>,
    pub analyzed: bool,
    pub sentiment: Option<Sentiment>,
    pub emotion: Option<Emotion>,
    /// Ids de tag ascendentes y sin duplicados.
    pub tag_ids: Vec<i64>,
}

/// Comentario nuevo o editado tal y como llega del cliente.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentDraft {
    pub id: Option<i64>,
    pub text: String,
    #[serde(default)]
    pub analyzed: bool,
    pub sentiment: Option<Sentiment>,
    pub emotion: Option<Emotion>,
    #[serde(default)]
    pub tag_ids: Vec<i64>,
}

/// Hijo nuevo dentro de una edición compuesta de jerarquía.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewChildTag {
    pub name: String,
    pub color: String,
}

/// Edición compuesta de un tag: cambio del propio tag más altas y bajas de
/// hijos. El adaptador de almacenamiento la aplica como una única operación
/// transaccional (todo o nada).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagEdit {
    /// `None` crea un tag nuevo.
    pub id: Option<i64>,
    pub name: String,
    pub color: String,
    pub parent_id: Option<i64>,
    #[serde(default)]
    pub children_to_delete: Vec<i64>,
    #[serde(default)]
    pub children_to_create: Vec<NewChildTag>,
}
