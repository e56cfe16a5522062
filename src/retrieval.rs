//! Recuperación de comentarios por lista de ids o por clausura de tags.

use std::collections::{HashMap, HashSet};

use crate::error::CoreError;
use crate::hierarchy;
use crate::models::{Comment, Tag};
use crate::store::{CommentStore, TagStore};

/// Devuelve todos los comentarios con pertenencia a algún tag de la clausura
/// de `roots`, deduplicados por id de comentario. Un conjunto de raíces vacío
/// produce un resultado vacío: no hay fallback implícito a "todos los
/// comentarios". El orden queda sin especificar en esta capa.
pub async fn find_by_tags(
    store: &dyn CommentStore,
    tags_snapshot: &[Tag],
    roots: &HashSet<i64>,
) -> Result<Vec<Comment>, CoreError> {
    if roots.is_empty() {
        return Ok(Vec::new());
    }

    let closure = hierarchy::closure(roots, tags_snapshot);
    let closure_ids: Vec<i64> = closure.iter().copied().collect();
    let fetched = store.get_comments_by_tag_closure(&closure_ids).await?;

    let mut seen: HashSet<i64> = HashSet::new();
    let mut comments = Vec::with_capacity(fetched.len());
    for comment in fetched {
        if comment.tag_ids.iter().any(|id| closure.contains(id)) && seen.insert(comment.id) {
            comments.push(comment);
        }
    }
    Ok(comments)
}

/// Recupera los comentarios indicados junto al índice de tags del usuario
/// (con el campo `path` derivado), listos para la serialización de
/// exportación.
///
/// La comprobación de propiedad se hace aquí, no en el adaptador: si algún
/// comentario resuelto pertenece a otro usuario se aborta con `Forbidden`
/// antes de devolver dato alguno.
pub async fn fetch_comments_for_export(
    tag_store: &dyn TagStore,
    comment_store: &dyn CommentStore,
    comment_ids: &[i64],
    user_id: i64,
) -> Result<(Vec<Comment>, HashMap<i64, Tag>), CoreError> {
    let (comments, user_tags) = tokio::try_join!(
        comment_store.get_comments_by_ids(comment_ids),
        tag_store.get_tags_by_user(user_id),
    )?;

    // todo: quizá un administrador podría exportar comentarios ajenos
    if comments.iter().any(|c| c.user_id != user_id) {
        return Err(CoreError::Forbidden);
    }

    let tag_index = hierarchy::build_tag_index(&user_tags);
    Ok((comments, tag_index))
}
