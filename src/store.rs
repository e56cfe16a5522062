//! Interfaces estrechas hacia el almacenamiento de tags y comentarios.
//!
//! El núcleo solo lee a través de estos traits; las escrituras (altas, bajas,
//! la edición compuesta de jerarquía) pertenecen al adaptador y a los
//! handlers, nunca a los algoritmos de analítica. Los adaptadores son
//! autoritativos para los campos de propiedad pero NO comprueban propiedad:
//! esa verificación corresponde al llamante (ver `retrieval`).

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{Comment, CommentDraft, Tag, TagEdit};

#[async_trait]
pub trait TagStore: Send + Sync {
    async fn get_tags_by_ids(&self, ids: &[i64]) -> Result<Vec<Tag>>;
    async fn get_tags_by_user(&self, user_id: i64) -> Result<Vec<Tag>>;

    /// Aplica una edición compuesta (tag + bajas y altas de hijos) con
    /// semántica todo-o-nada, en una única transacción.
    async fn apply_tag_edit(&self, user_id: i64, edit: &TagEdit) -> Result<Tag>;

    async fn delete_tags(&self, user_id: i64, ids: &[i64]) -> Result<()>;
}

#[async_trait]
pub trait CommentStore: Send + Sync {
    async fn get_comments_by_ids(&self, ids: &[i64]) -> Result<Vec<Comment>>;
    async fn get_comments_by_user(&self, user_id: i64) -> Result<Vec<Comment>>;

    /// Devuelve los comentarios con pertenencia a al menos un tag del
    /// conjunto dado (normalmente una clausura ya resuelta).
    async fn get_comments_by_tag_closure(&self, tag_ids: &[i64]) -> Result<Vec<Comment>>;

    async fn save_comment(&self, user_id: i64, draft: &CommentDraft) -> Result<Comment>;
    async fn delete_comments(&self, user_id: i64, ids: &[i64]) -> Result<()>;
}
